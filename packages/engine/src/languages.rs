//! Canonical language names, aliases, and placeholder tokens.

/// Canonical name for Go.
pub const GOLANG: &str = "Golang";
/// Canonical name for Python.
pub const PYTHON: &str = "Python";
/// Canonical name for Javascript.
pub const JAVASCRIPT: &str = "Javascript";

/// Path placeholder substituted into compile/run command templates.
pub const TEMP_FILE_DIR_TOKEN: &str = "{{temp_file_dir}}";
/// File-name placeholder substituted into compile/run command templates.
pub const TEMP_FILE_NAME_TOKEN: &str = "{{temp_file_name}}";

/// Resolves a user-supplied language name to its canonical form.
///
/// Matching is case-insensitive and accepts the common aliases. Unknown
/// names return `None`; callers surface that as a user error.
pub fn normalize_language(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "go" | "golang" => Some(GOLANG),
        "py" | "python" | "python3" => Some(PYTHON),
        "js" | "node" | "javascript" => Some(JAVASCRIPT),
        _ => None,
    }
}

/// Driver-code insertion tokens for one language.
#[derive(Clone, Copy, Debug)]
pub struct Placeholders {
    /// Marks where the user code goes.
    pub code: &'static str,
    /// Marks where the generated imports block goes; absent for
    /// interpreted languages.
    pub imports: Option<&'static str>,
}

/// Placeholder pair for a canonical language name.
pub fn placeholders(lang: &str) -> Option<Placeholders> {
    match lang {
        GOLANG => Some(Placeholders {
            code: "// USER_CODE_HERE",
            imports: Some("// IMPORTS_HERE"),
        }),
        PYTHON => Some(Placeholders {
            code: "# USER_CODE_HERE",
            imports: None,
        }),
        JAVASCRIPT => Some(Placeholders {
            code: "// USER_CODE_HERE",
            imports: None,
        }),
        _ => None,
    }
}
