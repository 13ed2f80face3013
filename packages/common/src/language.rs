use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution recipe for one programming language.
///
/// `compile_cmd` is empty for interpreted languages. Both command templates
/// may contain the `{{temp_file_dir}}` / `{{temp_file_name}}` path
/// placeholders, substituted by the worker right before execution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub id: i32,
    /// Canonical name (e.g., "Golang", "Python").
    pub name: String,
    pub compile_cmd: String,
    pub run_cmd: String,
    /// Directory inside the container where the source file is placed.
    pub temp_file_dir: String,
    /// Source file name (e.g., "main.go").
    pub temp_file_name: String,
}

/// Test case data needed for judging.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCaseData {
    pub id: Uuid,
    /// Input fed to the program on stdin.
    pub input: String,
    /// Expected output, compared after whitespace trimming.
    pub expected_output: String,
    pub is_hidden: bool,
}
