//! Locating the file that defines a test class or test method.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::bytes::Regex;
use tracing::debug;

/// Search `base/<dir>` for each of `test_dirs`, in order, for the single
/// file defining `name`.
///
/// Names starting with `test` are methods (`public function <name>`), any
/// other name is a class (`class <name>`). Missing directories are skipped.
/// More than one matching file in a directory is an error.
pub fn find_test_file(base: &Path, name: &str, test_dirs: &[String]) -> Result<Option<PathBuf>> {
    let pattern = definition_pattern(name)?;
    for dir in test_dirs {
        let full = base.join(dir);
        if !full.is_dir() {
            debug!(dir = %full.display(), "test directory missing, skipping");
            continue;
        }
        let mut matches = Vec::new();
        collect_matches(&full, &pattern, &mut matches)?;
        match matches.len() {
            0 => continue,
            1 => return Ok(matches.pop()),
            n => bail!(
                "{n} files define '{}' under {}, please rename your test",
                name.trim(),
                full.display()
            ),
        }
    }
    Ok(None)
}

fn definition_pattern(name: &str) -> Result<Regex> {
    let name = name.trim();
    let escaped = regex::escape(name);
    let pattern = if name.starts_with("test") {
        format!(r"public function {escaped}\b")
    } else {
        format!(r"class {escaped}\b")
    };
    Regex::new(&pattern).with_context(|| format!("invalid test name '{name}'"))
}

fn collect_matches(dir: &Path, pattern: &Regex, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", dir.display()))?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();
        let meta = fs::symlink_metadata(&path)
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.file_type().is_symlink() {
            continue;
        }
        if meta.is_dir() {
            collect_matches(&path, pattern, out)?;
            continue;
        }
        if !owner_readable(&meta) {
            continue;
        }
        let content =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        if pattern.is_match(&content) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(unix)]
fn owner_readable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o400 != 0
}

#[cfg(not(unix))]
fn owner_readable(_meta: &fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs() -> Vec<String> {
        vec!["testing".into(), "tests".into()]
    }

    fn write(base: &Path, rel: &str, content: &str) -> PathBuf {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn finds_class_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let file = write(tmp.path(), "tests/Unit/UserTest.php", "<?php\nclass UserTest extends TestCase {}\n");
        write(tmp.path(), "tests/Unit/OrderTest.php", "<?php\nclass OrderTest extends TestCase {}\n");

        let found = find_test_file(tmp.path(), "UserTest", &dirs()).unwrap();
        assert_eq!(found, Some(file));
    }

    #[test]
    fn finds_method_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let file = write(
            tmp.path(),
            "tests/UserTest.php",
            "class UserTest {\n    public function testItSavesUsers() {}\n}\n",
        );

        let found = find_test_file(tmp.path(), "testItSavesUsers", &dirs()).unwrap();
        assert_eq!(found, Some(file));
    }

    #[test]
    fn name_must_match_whole_word() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "tests/UserTestCase.php", "class UserTestCase {}\n");

        assert_eq!(find_test_file(tmp.path(), "UserTest", &dirs()).unwrap(), None);
    }

    #[test]
    fn duplicate_definitions_are_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "tests/A.php", "public function testDup() {}\n");
        write(tmp.path(), "tests/B.php", "public function testDup() {}\n");

        let err = find_test_file(tmp.path(), "testDup", &dirs()).unwrap_err();
        assert!(err.to_string().contains("please rename"));
    }

    #[test]
    fn earlier_directory_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = write(tmp.path(), "testing/FooTest.php", "class FooTest {}\n");
        write(tmp.path(), "tests/FooTest.php", "class FooTest {}\n");

        assert_eq!(find_test_file(tmp.path(), "FooTest", &dirs()).unwrap(), Some(first));
    }

    #[test]
    fn missing_directories_yield_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(find_test_file(tmp.path(), "FooTest", &dirs()).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let real = write(tmp.path(), "elsewhere/FooTest.php", "class FooTest {}\n");
        fs::create_dir_all(tmp.path().join("tests")).unwrap();
        std::os::unix::fs::symlink(&real, tmp.path().join("tests/FooTest.php")).unwrap();

        assert_eq!(find_test_file(tmp.path(), "FooTest", &dirs()).unwrap(), None);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "tests/A.php", "class AxB {}\n");

        assert_eq!(find_test_file(tmp.path(), "A.B", &dirs()).unwrap(), None);
    }
}
