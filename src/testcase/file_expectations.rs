//! File-expectation checks for a Runner and its Differs.
//!
//! Grounded on `original_source/moosetools/moosetest/base/Runner.py`'s
//! `_preExecuteExpectedFiles` / `_postExecuteExpectedFiles` /
//! `_getExpectedFiles` / `Runner.filenames`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::FileExpectationError;

/// The `file` sub-parameter group carried by a Runner or Differ (§3).
#[derive(Debug, Clone, Default)]
pub struct FileExpectations {
    pub base: Option<PathBuf>,
    pub names: Vec<String>,
    pub check_created: Option<bool>,
    pub clean: bool,
    /// `*`/`?` glob patterns (matched against the file's base-relative
    /// name) excluded from `check_created`'s unexpected-file report.
    pub ignore_patterns: Vec<String>,
}

impl FileExpectations {
    /// Resolve `names` to absolute-or-base-relative paths, per
    /// `Runner.filenames`.
    pub fn resolved_names(&self) -> Vec<PathBuf> {
        self.names
            .iter()
            .map(|n| {
                let p = PathBuf::from(n);
                if p.is_absolute() {
                    p
                } else if let Some(base) = &self.base {
                    base.join(n)
                } else {
                    p
                }
            })
            .collect()
    }
}

/// Merges a Runner's file-expectations with those of its Differs and drives
/// the pre/post-execution checks described in §4.4.
pub struct FileExpectationChecker {
    expected: Vec<PathBuf>,
    base: Option<PathBuf>,
    check_created: bool,
    clean: bool,
    ignore_patterns: Vec<String>,
    pre_snapshot: Option<HashSet<PathBuf>>,
}

impl FileExpectationChecker {
    pub fn new(runner: &FileExpectations, differs: &[FileExpectations]) -> Self {
        let mut expected = runner.resolved_names();
        let mut ignore_patterns = runner.ignore_patterns.clone();
        for differ in differs {
            expected.extend(differ.resolved_names());
            ignore_patterns.extend(differ.ignore_patterns.iter().cloned());
        }
        let base = runner.base.clone();
        let check_created = runner.check_created.unwrap_or(base.is_some());
        Self {
            expected,
            base,
            check_created,
            clean: runner.clean,
            ignore_patterns,
            pre_snapshot: None,
        }
    }

    pub fn pre_execute(&mut self) -> Result<(), FileExpectationError> {
        let non_abs: Vec<String> = self
            .expected
            .iter()
            .filter(|p| !p.is_absolute())
            .map(|p| p.display().to_string())
            .collect();
        if !non_abs.is_empty() {
            return Err(FileExpectationError::NotAbsolute(non_abs));
        }

        if let Some(root) = git_root_dir() {
            let tracked = git_ls_files(&root);
            let intersect: Vec<String> = self
                .expected
                .iter()
                .filter(|p| tracked.contains(*p))
                .map(|p| p.display().to_string())
                .collect();
            if !intersect.is_empty() {
                return Err(FileExpectationError::VersionControlled(intersect));
            }
        }

        if self.clean {
            for f in &self.expected {
                if f.is_file() {
                    std::fs::remove_file(f).map_err(|e| FileExpectationError::Io(e.to_string()))?;
                }
            }
        }

        let exist: Vec<String> = self
            .expected
            .iter()
            .filter(|p| p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !exist.is_empty() {
            return Err(FileExpectationError::AlreadyExists(exist));
        }

        if self.check_created {
            let base = self
                .base
                .as_ref()
                .ok_or(FileExpectationError::CheckCreatedRequiresBase)?;
            self.pre_snapshot = Some(snapshot_dir(base)?);
        }

        Ok(())
    }

    pub fn post_execute(&self) -> Result<(), FileExpectationError> {
        let missing: Vec<String> = self
            .expected
            .iter()
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FileExpectationError::NotCreated(missing));
        }

        if let Some(pre) = &self.pre_snapshot {
            let base = self.base.as_ref().expect("check_created implies base");
            let post = snapshot_dir(base)?;
            let expected_set: HashSet<PathBuf> = self.expected.iter().cloned().collect();
            let unexpected: Vec<String> = post
                .difference(pre)
                .filter(|p| !expected_set.contains(*p))
                .filter(|p| !self.is_ignored(p, base))
                .map(|p| p.display().to_string())
                .collect();
            if !unexpected.is_empty() {
                return Err(FileExpectationError::UnexpectedlyCreated(unexpected));
            }
        }

        Ok(())
    }

    fn is_ignored(&self, path: &Path, base: &Path) -> bool {
        let relative = path.strip_prefix(base).unwrap_or(path);
        let name = relative.display().to_string();
        self.ignore_patterns.iter().any(|pattern| glob_match(pattern, &name))
    }
}

/// A minimal `*`/`?` glob matcher: `*` matches any run of characters, `?`
/// matches exactly one. No ecosystem glob crate is pulled in solely for
/// this one-off filter.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => inner(&pattern[1..], text) || (!text.is_empty() && inner(pattern, &text[1..])),
            Some(b'?') => !text.is_empty() && inner(&pattern[1..], &text[1..]),
            Some(&c) => text.first() == Some(&c) && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

fn snapshot_dir(base: &Path) -> Result<HashSet<PathBuf>, FileExpectationError> {
    std::fs::read_dir(base)
        .map_err(|e| FileExpectationError::Io(e.to_string()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .map(Ok)
        .collect()
}

fn git_root_dir() -> Option<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(PathBuf::from(text.trim()))
}

fn git_ls_files(root: &Path) -> HashSet<PathBuf> {
    Command::new("git")
        .arg("ls-files")
        .current_dir(root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).to_string())
        .map(|text| text.lines().map(|l| root.join(l)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_removes_preexisting_expected_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");
        std::fs::write(&target, "stale").unwrap();

        let runner = FileExpectations {
            base: Some(dir.path().to_path_buf()),
            names: vec!["out.txt".to_string()],
            check_created: None,
            clean: true,
            ..Default::default()
        };
        let mut checker = FileExpectationChecker::new(&runner, &[]);
        checker.pre_execute().unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn pre_execute_rejects_relative_path_without_base() {
        let runner = FileExpectations {
            base: None,
            names: vec!["relative.txt".to_string()],
            check_created: None,
            clean: false,
            ..Default::default()
        };
        let mut checker = FileExpectationChecker::new(&runner, &[]);
        let err = checker.pre_execute().unwrap_err();
        assert!(matches!(err, FileExpectationError::NotAbsolute(_)));
    }

    #[test]
    fn post_execute_detects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FileExpectations {
            base: Some(dir.path().to_path_buf()),
            names: vec!["never_created.txt".to_string()],
            check_created: None,
            clean: false,
            ..Default::default()
        };
        let checker = FileExpectationChecker::new(&runner, &[]);
        let err = checker.post_execute().unwrap_err();
        assert!(matches!(err, FileExpectationError::NotCreated(_)));
    }

    #[test]
    fn post_execute_detects_unexpected_file_when_check_created() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("expected.txt");
        let runner = FileExpectations {
            base: Some(dir.path().to_path_buf()),
            names: vec!["expected.txt".to_string()],
            check_created: Some(true),
            clean: false,
            ..Default::default()
        };
        let mut checker = FileExpectationChecker::new(&runner, &[]);
        checker.pre_execute().unwrap();
        std::fs::write(&expected, "ok").unwrap();
        std::fs::write(dir.path().join("surprise.txt"), "oops").unwrap();
        let err = checker.post_execute().unwrap_err();
        assert!(matches!(err, FileExpectationError::UnexpectedlyCreated(_)));
    }

    #[test]
    fn post_execute_ignores_unexpected_files_matching_ignore_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let expected = dir.path().join("expected.txt");
        let runner = FileExpectations {
            base: Some(dir.path().to_path_buf()),
            names: vec!["expected.txt".to_string()],
            check_created: Some(true),
            clean: false,
            ignore_patterns: vec!["*.log".to_string()],
        };
        let mut checker = FileExpectationChecker::new(&runner, &[]);
        checker.pre_execute().unwrap();
        std::fs::write(&expected, "ok").unwrap();
        std::fs::write(dir.path().join("scratch.log"), "noise").unwrap();
        checker.post_execute().unwrap();
    }

    #[test]
    fn glob_match_handles_star_and_question_mark() {
        assert!(glob_match("*.log", "scratch.log"));
        assert!(!glob_match("*.log", "scratch.txt"));
        assert!(glob_match("out-?.txt", "out-1.txt"));
        assert!(!glob_match("out-?.txt", "out-10.txt"));
        assert!(glob_match("*", "anything"));
    }
}
