//! Directory snapshot.
//!
//! The whole tree is listed before anything is moved or deleted, so the
//! pipeline never walks a directory it is changing.

use crate::config::CompiledFilters;
use crate::error::{OrganizeError, OrganizeResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub struct Scanner {
    filters: CompiledFilters,
}

impl Scanner {
    pub fn new(filters: CompiledFilters) -> Self {
        Self { filters }
    }

    /// Lists every regular file below `root` that passes the filters.
    ///
    /// Entries are sorted by name within each directory, so the order is the
    /// same from run to run. Hidden directories are not entered and symlinks
    /// are neither followed nor returned.
    ///
    /// # Errors
    ///
    /// [`OrganizeError::InvalidRoot`] if `root` is missing, not a directory or
    /// unreadable. Problems further down the tree are logged and skipped.
    pub fn snapshot(&self, root: &Path) -> OrganizeResult<Vec<PathBuf>> {
        let invalid_root = |source| OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(root).map_err(invalid_root)?;
        if !metadata.is_dir() {
            return Err(invalid_root(io::Error::new(
                io::ErrorKind::NotADirectory,
                "not a directory",
            )));
        }
        fs::read_dir(root).map_err(invalid_root)?;

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.filters.hides(&entry.file_name().to_string_lossy())
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "skipping symlink");
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if self.filters.should_include(relative) {
                files.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "filtered out");
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExcludeRules, FilterRules, IncludeRules};
    use tempfile::TempDir;

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b_dir")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join("z.txt"), "z").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join(".env"), "SECRET=1").unwrap();
        fs::write(root.join("b_dir/inner.md"), "#").unwrap();
        fs::write(root.join(".git/objects/pack"), "p").unwrap();
        dir
    }

    #[test]
    fn test_snapshot_is_sorted_and_skips_hidden() {
        let dir = tree();
        let files = Scanner::new(CompiledFilters::default())
            .snapshot(dir.path())
            .unwrap();

        assert_eq!(names(dir.path(), &files), ["a.txt", "b_dir/inner.md", "z.txt"]);
    }

    #[test]
    fn test_snapshot_applies_filters() {
        let dir = tree();
        let rules = FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                extensions: vec!["md".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        };
        let files = Scanner::new(rules.compile().unwrap())
            .snapshot(dir.path())
            .unwrap();

        assert_eq!(names(dir.path(), &files), ["a.txt", "z.txt"]);
    }

    #[test]
    fn test_snapshot_with_hidden_enabled() {
        let dir = tree();
        let rules = FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        };
        let files = Scanner::new(rules.compile().unwrap())
            .snapshot(dir.path())
            .unwrap();

        assert_eq!(files.len(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let files = Scanner::new(CompiledFilters::default())
            .snapshot(dir.path())
            .unwrap();
        assert_eq!(names(dir.path(), &files), ["real.txt"]);
    }

    #[test]
    fn test_invalid_root() {
        let dir = TempDir::new().unwrap();
        let scanner = Scanner::new(CompiledFilters::default());

        let missing = scanner.snapshot(&dir.path().join("missing"));
        assert!(matches!(missing, Err(OrganizeError::InvalidRoot { .. })));

        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            scanner.snapshot(&file),
            Err(OrganizeError::InvalidRoot { .. })
        ));
    }
}
