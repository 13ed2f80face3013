use std::collections::BTreeSet;

use super::{AnalyzeError, PackageAnalyzer};
use crate::languages;

/// Import analysis for Go source files.
///
/// Works on a lexical scan of the composed file: comments and string/rune
/// literals are blanked out first, which doubles as a shallow syntax check
/// (unterminated literals or unbalanced delimiters fail the analysis the
/// same way a real parser would reject the file).
#[derive(Debug, Default)]
pub struct GoPackageAnalyzer;

impl GoPackageAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl PackageAnalyzer for GoPackageAnalyzer {
    fn language(&self) -> &'static str {
        languages::GOLANG
    }

    fn analyze(&self, code: &str) -> Result<BTreeSet<String>, AnalyzeError> {
        let stripped = strip_literals(code)?;

        // Explicit `import` clauses, read from the raw source since the
        // paths live inside string literals.
        let mut pkgs = explicit_imports(code);

        // Implicit imports: `pkg.Ident` selector usage of a standard
        // library package that never appears in an import clause.
        for ident in selector_idents(&stripped) {
            if let Some(path) = stdlib_path(ident) {
                pkgs.insert(path.to_string());
            }
        }

        Ok(pkgs)
    }
}

#[derive(PartialEq)]
enum ScanState {
    Code,
    LineComment,
    BlockComment,
    Str,
    RawStr,
    Rune,
}

/// Blanks comments and literals, preserving line structure, and validates
/// delimiter balance and literal termination.
fn strip_literals(code: &str) -> Result<String, AnalyzeError> {
    use ScanState::*;

    let mut state = Code;
    let mut out = String::with_capacity(code.len());
    let mut escaped = false;
    let mut parens: i32 = 0;
    let mut braces: i32 = 0;
    let mut brackets: i32 = 0;

    let mut chars = code.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = BlockComment;
                }
                '"' => {
                    escaped = false;
                    out.push(' ');
                    state = Str;
                }
                '`' => {
                    out.push(' ');
                    state = RawStr;
                }
                '\'' => {
                    escaped = false;
                    out.push(' ');
                    state = Rune;
                }
                '(' => {
                    parens += 1;
                    out.push(c);
                }
                ')' => {
                    parens -= 1;
                    if parens < 0 {
                        return Err(AnalyzeError::Parse);
                    }
                    out.push(c);
                }
                '{' => {
                    braces += 1;
                    out.push(c);
                }
                '}' => {
                    braces -= 1;
                    if braces < 0 {
                        return Err(AnalyzeError::Parse);
                    }
                    out.push(c);
                }
                '[' => {
                    brackets += 1;
                    out.push(c);
                }
                ']' => {
                    brackets -= 1;
                    if brackets < 0 {
                        return Err(AnalyzeError::Parse);
                    }
                    out.push(c);
                }
                _ => out.push(c),
            },
            LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = Code;
                } else {
                    out.push(' ');
                }
            }
            BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            Str => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if c == '"' {
                    out.push(' ');
                    state = Code;
                } else if c == '\n' {
                    // interpreted string literals cannot span lines
                    return Err(AnalyzeError::Parse);
                } else {
                    out.push(' ');
                }
            }
            RawStr => {
                if c == '`' {
                    out.push(' ');
                    state = Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            Rune => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if c == '\'' {
                    out.push(' ');
                    state = Code;
                } else if c == '\n' {
                    return Err(AnalyzeError::Parse);
                } else {
                    out.push(' ');
                }
            }
        }
    }

    if !matches!(state, Code | LineComment) {
        return Err(AnalyzeError::Parse);
    }
    if parens != 0 || braces != 0 || brackets != 0 {
        return Err(AnalyzeError::Parse);
    }

    Ok(out)
}

/// Collects the paths of all explicit import clauses (single and block
/// form, with or without aliases).
fn explicit_imports(code: &str) -> BTreeSet<String> {
    let mut pkgs = BTreeSet::new();
    let mut in_block = false;

    for line in code.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
            } else if let Some(path) = quoted_path(trimmed) {
                pkgs.insert(path);
            }
        } else if let Some(rest) = trimmed.strip_prefix("import") {
            let rest = rest.trim_start();
            if rest.starts_with('(') {
                in_block = true;
            } else if let Some(path) = quoted_path(rest) {
                pkgs.insert(path);
            }
        }
    }

    pkgs
}

fn quoted_path(s: &str) -> Option<String> {
    let start = s.find('"')?;
    let rest = &s[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Identifiers used in qualified position (`ident.Something`), excluding
/// the middle links of chains like `a.b.c`.
fn selector_idents(code: &str) -> BTreeSet<&str> {
    let bytes = code.as_bytes();
    let mut out = BTreeSet::new();
    let mut i = 0;

    while i < bytes.len() {
        if is_ident_start(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_ident_char(bytes[i]) {
                i += 1;
            }
            let preceded_by_dot = start > 0 && bytes[start - 1] == b'.';
            if !preceded_by_dot
                && i + 1 < bytes.len()
                && bytes[i] == b'.'
                && is_ident_start(bytes[i + 1])
            {
                out.insert(&code[start..i]);
            }
        } else {
            i += 1;
        }
    }

    out
}

/// Import path of a standard library package referenced by its bare name.
fn stdlib_path(ident: &str) -> Option<&'static str> {
    Some(match ident {
        "bufio" => "bufio",
        "bytes" => "bytes",
        "errors" => "errors",
        "fmt" => "fmt",
        "io" => "io",
        "math" => "math",
        "os" => "os",
        "rand" => "math/rand",
        "regexp" => "regexp",
        "slices" => "slices",
        "sort" => "sort",
        "strconv" => "strconv",
        "strings" => "strings",
        "time" => "time",
        "unicode" => "unicode",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(code: &str) -> Result<BTreeSet<String>, AnalyzeError> {
        GoPackageAnalyzer::new().analyze(code)
    }

    #[test]
    fn test_explicit_single_import() {
        let pkgs = analyze("package main\nimport \"fmt\"\nfunc main() {}\n").unwrap();
        assert!(pkgs.contains("fmt"));
    }

    #[test]
    fn test_explicit_import_block_with_alias() {
        let code = r#"package main
import (
    f "fmt"
    "strings"
)
func main() {}
"#;
        let pkgs = analyze(code).unwrap();
        assert!(pkgs.contains("fmt"));
        assert!(pkgs.contains("strings"));
    }

    #[test]
    fn test_implied_stdlib_usage() {
        let code = "package main\nfunc main() { fmt.Println(strconv.Itoa(42)) }\n";
        let pkgs = analyze(code).unwrap();
        assert!(pkgs.contains("fmt"));
        assert!(pkgs.contains("strconv"));
    }

    #[test]
    fn test_nested_path_packages() {
        let code = "package main\nfunc main() { fmt.Println(rand.Intn(10)) }\n";
        let pkgs = analyze(code).unwrap();
        assert!(pkgs.contains("math/rand"));
    }

    #[test]
    fn test_non_stdlib_selectors_ignored() {
        let code = "package main\nfunc main() { foo.Bar(); chain.a.b() }\n";
        let pkgs = analyze(code).unwrap();
        assert!(pkgs.is_empty());
    }

    #[test]
    fn test_selectors_inside_strings_and_comments_ignored() {
        let code = "package main\n// fmt.Println in a comment\nfunc main() { x := \"strings.Trim\"; _ = x }\n";
        let pkgs = analyze(code).unwrap();
        assert!(pkgs.is_empty());
    }

    #[test]
    fn test_unbalanced_parens_is_parse_error() {
        let code = "package main\nfunc main() { fmt.Println( }\n";
        assert_eq!(analyze(code), Err(AnalyzeError::Parse));
    }

    #[test]
    fn test_unterminated_string_is_parse_error() {
        let code = "package main\nfunc main() { x := \"oops }\n";
        assert_eq!(analyze(code), Err(AnalyzeError::Parse));
    }

    #[test]
    fn test_raw_string_may_span_lines_and_hold_braces() {
        let code = "package main\nfunc main() { x := `{\n(` ; _ = x }\n";
        assert!(analyze(code).is_ok());
    }

    #[test]
    fn test_block_comment_is_skipped() {
        let code = "package main\n/* fmt.Println(\n unbalanced ( */\nfunc main() {}\n";
        let pkgs = analyze(code).unwrap();
        assert!(pkgs.is_empty());
    }
}
