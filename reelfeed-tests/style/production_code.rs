//! Production Code Enforcement
//!
//! Production sources must not silence dead code warnings or unwrap results.
//! Everything from a file's first `#[cfg(test)]` onward is test code and is
//! exempt, as are the test double modules.

use std::fs;
use std::path::{Path, PathBuf};

/// A rule violation found in production code
#[derive(Debug)]
struct Violation {
    file_path: String,
    line_number: usize,
    rule: &'static str,
    context: String,
}

/// Checker for production code rules
struct ProductionCodeChecker {
    violations: Vec<Violation>,
    files_checked: usize,
}

impl ProductionCodeChecker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
            files_checked: 0,
        }
    }

    /// Source directories of every crate except this one.
    fn crate_source_dirs(root: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if name.starts_with("reelfeed-") && name != "reelfeed-tests" {
                let src = path.join("src");
                if src.is_dir() {
                    dirs.push(src);
                }
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn find_rust_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::find_rust_files(&path, files)?;
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
        Ok(())
    }

    fn is_test_file(path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name == "test_support.rs" || name == "tests.rs")
    }

    fn check_source(&mut self, file_path: &str, content: &str) {
        self.files_checked += 1;

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed == "#[cfg(test)]" {
                break;
            }
            if trimmed.starts_with("//") {
                continue;
            }

            let rule = if trimmed.contains("#[allow(") && trimmed.contains("dead_code") {
                Some("dead code allowance")
            } else if trimmed.contains(".unwrap()") {
                Some("unwrap in production code")
            } else {
                None
            };

            if let Some(rule) = rule {
                self.violations.push(Violation {
                    file_path: file_path.to_string(),
                    line_number: index + 1,
                    rule,
                    context: trimmed.to_string(),
                });
            }
        }
    }

    fn check_workspace(&mut self, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let mut files = Vec::new();
        for dir in Self::crate_source_dirs(root)? {
            Self::find_rust_files(&dir, &mut files)?;
        }

        for file in files.iter().filter(|file| !Self::is_test_file(file)) {
            let content = fs::read_to_string(file)?;
            self.check_source(&file.to_string_lossy(), &content);
        }

        Ok(())
    }

    fn report(&self) -> bool {
        for violation in &self.violations {
            println!(
                "{}:{} [{}]\n  {}",
                violation.file_path, violation.line_number, violation.rule, violation.context
            );
        }
        println!(
            "Production code enforcement: {} files checked, {} violation(s)",
            self.files_checked,
            self.violations.len()
        );
        self.violations.is_empty()
    }
}

#[test]
fn test_detects_violations_before_test_module() {
    let mut checker = ProductionCodeChecker::new();
    let source = r#"
#[allow(dead_code)]
fn unused() {}

fn risky(value: Option<u8>) -> u8 {
    // value.unwrap() is fine in a comment
    value.unwrap()
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_ok() {
        Some(1).unwrap();
    }
}
"#;

    checker.check_source("sample.rs", source);

    let lines: Vec<usize> = checker.violations.iter().map(|v| v.line_number).collect();
    assert_eq!(lines, vec![2, 7]);
}

#[test]
fn test_allows_fallible_combinators() {
    let mut checker = ProductionCodeChecker::new();
    checker.check_source(
        "sample.rs",
        "let x = value.unwrap_or_default();\nlet y = other.unwrap_or_else(|| 1);\n",
    );
    assert!(checker.violations.is_empty());
}

#[test]
fn production_code_enforcement() {
    let mut checker = ProductionCodeChecker::new();

    checker
        .check_workspace(Path::new(".."))
        .expect("Failed to scan workspace sources");

    assert!(checker.files_checked > 0, "no production sources found");
    assert!(checker.report(), "production code rules violated");
}
