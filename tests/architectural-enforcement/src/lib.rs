//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in the core: wait on I/O, timers or cancellation instead
//! - No blocking HTTP clients anywhere in the workspace
//! - No `unwrap()`/`expect()` in core production code
//!
//! Helpers here locate production sources; the checks live under `tests/`.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// A production source file with its non-test lines
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// Lines before the first `#[cfg(test)]`, numbered from 1
    pub lines: Vec<(usize, String)>,
}

impl SourceFile {
    /// Lines whose code (comments stripped) contains any of `patterns`
    pub fn find(&self, patterns: &[&str]) -> Vec<String> {
        self.lines
            .iter()
            .filter(|(_, line)| {
                let code = code_part(line);
                patterns.iter().any(|p| code.contains(p))
            })
            .map(|(n, line)| format!("{}:{} - {}", self.path.display(), n, line.trim()))
            .collect()
    }
}

/// Strip `//` comments (including doc comments) from a line
fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Every `.rs` file under `dir` (relative to the workspace root), test
/// modules cut off
pub fn production_sources(dir: &str) -> Vec<SourceFile> {
    let root = workspace_root();
    let base = root.join(dir);

    let mut files: Vec<SourceFile> = walkdir::WalkDir::new(&base)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|entry| {
            let content = fs::read_to_string(entry.path()).ok()?;
            let lines = content
                .lines()
                .enumerate()
                .take_while(|(_, line)| !line.trim_start().starts_with("#[cfg(test)]"))
                .map(|(i, line)| (i + 1, line.to_string()))
                .collect();
            let path = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();
            Some(SourceFile { path, lines })
        })
        .collect();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Print violations and fail
pub fn report(title: &str, hint: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!("\n{hint}");
    panic!("\nFound {} violation(s). Fix these before merging!", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(1)"), "let x = 1; ");
        assert_eq!(code_part("/// docs .unwrap()"), "");
    }

    #[test]
    fn test_core_sources_are_found() {
        let files = production_sources("conductor/core/src");
        assert!(files.iter().any(|f| f.path.ends_with("conductor.rs")));
    }
}
