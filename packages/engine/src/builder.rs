use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::analyzer::PackageAnalyzer;
use crate::languages;

/// Default cap on user code length, in bytes.
pub const DEFAULT_MAX_CODE_LENGTH: usize = 1000;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("code exceeds the maximum length ({len} > {max})")]
    TooLong { len: usize, max: usize },
    #[error("code contains a forbidden token: {0}")]
    ForbiddenToken(String),
    /// The analyzer rejected the composed source. Callers report this to
    /// the user as wrong syntax.
    #[error("failed to analyze code")]
    Parse,
    #[error("unsupported language: {0}")]
    UnknownLanguage(String),
}

impl BuildError {
    /// Sanitization and syntax failures are the user's fault; anything
    /// else is ours.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::TooLong { .. } | Self::ForbiddenToken(_) | Self::Parse
        )
    }
}

/// Composes a runnable source file from a driver template and user code.
///
/// The builder sanitizes the user code, substitutes the user-code
/// placeholder, and, when the language has a registered analyzer, derives
/// and substitutes the imports block. Building is a pure function of its
/// inputs.
pub struct CodeBuilder {
    analyzers: HashMap<&'static str, Arc<dyn PackageAnalyzer>>,
    denied_tokens: HashMap<&'static str, Vec<String>>,
    max_code_length: usize,
}

impl CodeBuilder {
    pub fn new(analyzers: Vec<Arc<dyn PackageAnalyzer>>) -> Self {
        Self {
            analyzers: analyzers.into_iter().map(|a| (a.language(), a)).collect(),
            denied_tokens: default_denied_tokens(),
            max_code_length: DEFAULT_MAX_CODE_LENGTH,
        }
    }

    pub fn with_max_code_length(mut self, max_code_length: usize) -> Self {
        self.max_code_length = max_code_length;
        self
    }

    /// Replaces the deny-list for one language.
    pub fn with_denied_tokens(mut self, lang: &'static str, tokens: Vec<String>) -> Self {
        self.denied_tokens.insert(lang, tokens);
        self
    }

    /// Builds the final source for `lang` (canonical name) from the
    /// problem's driver template and the submitted user code.
    pub fn build(&self, lang: &str, driver_code: &str, user_code: &str) -> Result<String, BuildError> {
        let placeholders = languages::placeholders(lang)
            .ok_or_else(|| BuildError::UnknownLanguage(lang.to_string()))?;

        self.sanitize(lang, user_code)?;

        // Each placeholder is substituted at most once; a driver without
        // one is left untouched.
        let mut final_code = driver_code.replacen(placeholders.code, user_code, 1);

        if let Some(analyzer) = self.analyzers.get(lang) {
            let pkgs = analyzer.analyze(&final_code).map_err(|_| BuildError::Parse)?;
            let imports = render_imports(&pkgs);
            debug!(language = lang, imports = %imports, "Generated imports block");

            if let Some(imports_token) = placeholders.imports {
                final_code = final_code.replacen(imports_token, &imports, 1);
            }
        }

        Ok(final_code)
    }

    fn sanitize(&self, lang: &str, user_code: &str) -> Result<(), BuildError> {
        if user_code.len() > self.max_code_length {
            return Err(BuildError::TooLong {
                len: user_code.len(),
                max: self.max_code_length,
            });
        }

        if let Some(tokens) = self.denied_tokens.get(lang) {
            for token in tokens {
                if user_code.contains(token.as_str()) {
                    warn!(language = lang, token = %token, "Rejected code with forbidden token");
                    return Err(BuildError::ForbiddenToken(token.clone()));
                }
            }
        }

        Ok(())
    }
}

/// Renders a deterministic imports block in the language's syntax.
fn render_imports(pkgs: &BTreeSet<String>) -> String {
    if pkgs.is_empty() {
        return String::new();
    }

    let mut out = String::from("import (\n");
    for pkg in pkgs {
        out.push_str(&format!("\t\"{pkg}\"\n"));
    }
    out.push(')');
    out
}

/// Shell substitution plus the per-language escape hatches out of the
/// standard library scope. Tokens are chosen to never collide with
/// legitimate syntax in that language.
fn default_denied_tokens() -> HashMap<&'static str, Vec<String>> {
    let mut map: HashMap<&'static str, Vec<String>> = HashMap::new();
    map.insert(
        languages::GOLANG,
        ["$(", "syscall", "unsafe", "os/exec", "cgo"]
            .map(String::from)
            .to_vec(),
    );
    map.insert(
        languages::PYTHON,
        ["$(", "subprocess", "os.system", "__import__", "eval(", "exec("]
            .map(String::from)
            .to_vec(),
    );
    map.insert(
        languages::JAVASCRIPT,
        ["$(", "child_process", "process.binding", "eval("]
            .map(String::from)
            .to_vec(),
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::GoPackageAnalyzer;
    use crate::languages::{GOLANG, JAVASCRIPT, PYTHON};

    const GO_DRIVER: &str = "package main\n// IMPORTS_HERE\nfunc main() {\n\t// USER_CODE_HERE\n}\n";

    fn builder() -> CodeBuilder {
        CodeBuilder::new(vec![Arc::new(GoPackageAnalyzer::new())])
    }

    #[test]
    fn test_build_substitutes_code_and_imports() {
        let out = builder()
            .build(GOLANG, GO_DRIVER, "fmt.Println(\"42\")")
            .unwrap();
        assert!(out.contains("fmt.Println(\"42\")"));
        assert!(out.contains("import (\n\t\"fmt\"\n)"));
        assert!(!out.contains("// USER_CODE_HERE"));
        assert!(!out.contains("// IMPORTS_HERE"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let b = builder();
        let first = b.build(GOLANG, GO_DRIVER, "fmt.Println(strconv.Itoa(1))").unwrap();
        let second = b.build(GOLANG, GO_DRIVER, "fmt.Println(strconv.Itoa(1))").unwrap();
        assert_eq!(first, second);
        // sorted imports
        let fmt_pos = first.find("\"fmt\"").unwrap();
        let strconv_pos = first.find("\"strconv\"").unwrap();
        assert!(fmt_pos < strconv_pos);
    }

    #[test]
    fn test_missing_placeholder_is_noop() {
        let out = builder()
            .build(GOLANG, "package main\nfunc main() {}\n", "fmt.Println(1)")
            .unwrap();
        assert_eq!(out, "package main\nfunc main() {}\n");
    }

    #[test]
    fn test_interpreted_language_skips_imports() {
        let out = builder()
            .build(PYTHON, "# USER_CODE_HERE\n", "print(42)")
            .unwrap();
        assert_eq!(out, "print(42)\n");
    }

    #[test]
    fn test_oversize_code_rejected() {
        let b = builder().with_max_code_length(10);
        let err = b.build(GOLANG, GO_DRIVER, "fmt.Println(\"too long\")").unwrap_err();
        assert!(matches!(err, BuildError::TooLong { .. }));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_forbidden_token_rejected() {
        let err = builder()
            .build(GOLANG, GO_DRIVER, "syscall.Exit(1)")
            .unwrap_err();
        assert!(matches!(err, BuildError::ForbiddenToken(_)));

        let err = builder()
            .build(JAVASCRIPT, "// USER_CODE_HERE", "require('child_process')")
            .unwrap_err();
        assert!(matches!(err, BuildError::ForbiddenToken(_)));
    }

    #[test]
    fn test_wrong_syntax_surfaces_as_parse_error() {
        let err = builder()
            .build(GOLANG, GO_DRIVER, "fmt.Println(")
            .unwrap_err();
        assert!(matches!(err, BuildError::Parse));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_unknown_language_rejected() {
        let err = builder().build("Cobol", "...", "x").unwrap_err();
        assert!(matches!(err, BuildError::UnknownLanguage(_)));
        assert!(!err.is_user_error());
    }
}
