//! Per-language static analysis of composed source files.

mod golang;

pub use golang::GoPackageAnalyzer;

use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeError {
    /// The source could not be parsed. Callers report this to the user as
    /// wrong syntax rather than as an internal failure.
    #[error("failed to analyze code")]
    Parse,
}

/// Infers which packages a composed source file needs in its imports
/// block. Compiled languages supply an implementation; interpreted
/// languages have none and the code builder skips imports substitution.
pub trait PackageAnalyzer: Send + Sync {
    /// Canonical language this analyzer understands.
    fn language(&self) -> &'static str;

    /// Returns the set of package paths that must appear in the imports
    /// block: those explicitly imported plus those implied by
    /// `pkg.Identifier` usage.
    fn analyze(&self, code: &str) -> Result<BTreeSet<String>, AnalyzeError>;
}
