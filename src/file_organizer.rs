/// Filesystem mutations: moving files into category folders, deleting files,
/// and pruning directories left empty afterwards.
///
/// Nothing in here decides *what* to do with a file. The pipeline decides,
/// this module carries it out, refusing to overwrite anything on the way.
use crate::config::CompiledFilters;
use crate::error::{OrganizeError, OrganizeResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// A move that has been decided but not yet carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl PendingMove {
    /// True when the file is already where it should be.
    pub fn is_in_place(&self) -> bool {
        self.source == self.destination
    }
}

/// Picks destination names that do not collide with anything on disk or with
/// anything already handed out during this run.
#[derive(Debug)]
pub struct ConflictResolver {
    max_attempts: u32,
    claimed: HashSet<PathBuf>,
}

impl ConflictResolver {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            claimed: HashSet::new(),
        }
    }

    /// Finds a free path for `base_name` + `ext` inside `category_dir`.
    ///
    /// Tries `base_name.ext` first, then `base_name_1.ext`, `base_name_2.ext`
    /// and so on, up to `max_attempts` suffixes. A `source` that already sits
    /// in `category_dir` under one of those names is left where it is, even if
    /// a lower-numbered name has become free since.
    ///
    /// # Arguments
    ///
    /// * `category_dir` - Folder the file should end up in
    /// * `base_name` - Sanitized stem; empty means `untitled`
    /// * `ext` - Extension including its leading dot, or empty
    /// * `source` - Current location of the file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sortwise::file_organizer::ConflictResolver;
    /// use std::path::Path;
    ///
    /// let mut resolver = ConflictResolver::new(10_000);
    /// let dest = resolver
    ///     .resolve(Path::new("/data/Documents"), "Report", ".pdf", Path::new("/data/scan.pdf"))
    ///     .unwrap();
    /// println!("{}", dest.display());
    /// ```
    pub fn resolve(
        &mut self,
        category_dir: &Path,
        base_name: &str,
        ext: &str,
        source: &Path,
    ) -> OrganizeResult<PathBuf> {
        let base = if base_name.is_empty() {
            crate::naming::FALLBACK_STEM
        } else {
            base_name
        };

        if !self.claimed.contains(source) && self.holds_variant(category_dir, base, ext, source) {
            self.claimed.insert(source.to_path_buf());
            return Ok(source.to_path_buf());
        }

        for attempt in 0..=self.max_attempts {
            let file_name = if attempt == 0 {
                format!("{base}{ext}")
            } else {
                format!("{base}_{attempt}{ext}")
            };
            let candidate = category_dir.join(file_name);

            if candidate == source || !self.is_taken(&candidate) {
                self.claimed.insert(candidate.clone());
                return Ok(candidate);
            }
        }

        Err(OrganizeError::ConflictExhausted {
            dir: category_dir.to_path_buf(),
            base: base.to_string(),
            ext: ext.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// `source` is `category_dir/base.ext` or `category_dir/base_<n>.ext`
    /// with `1 <= n <= max_attempts`.
    fn holds_variant(&self, category_dir: &Path, base: &str, ext: &str, source: &Path) -> bool {
        if source.parent() != Some(category_dir) {
            return false;
        }
        let Some(stem) = source
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(ext))
        else {
            return false;
        };
        if stem == base {
            return true;
        }

        stem.strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|digits| {
                digits
                    .parse::<u32>()
                    .ok()
                    .filter(|n| n.to_string() == digits)
            })
            .is_some_and(|n| (1..=self.max_attempts).contains(&n))
    }

    fn is_taken(&self, candidate: &Path) -> bool {
        self.claimed.contains(candidate) || fs::symlink_metadata(candidate).is_ok()
    }
}

/// Carries out moves, deletions and pruning. In dry-run mode every operation
/// succeeds without touching the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOrganizer {
    dry_run: bool,
}

impl FileOrganizer {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Moves `pending.source` to `pending.destination`, creating the category
    /// folders as needed.
    ///
    /// An existing destination is never overwritten. On any error the source
    /// is left where it was.
    pub fn move_file(&self, pending: &PendingMove) -> OrganizeResult<()> {
        if pending.is_in_place() || self.dry_run {
            return Ok(());
        }

        let destination = &pending.destination;
        if fs::symlink_metadata(destination).is_ok() {
            return Err(OrganizeError::DestinationExists(destination.clone()));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::rename(&pending.source, destination).map_err(|e| OrganizeError::FileMoveFailure {
            from: pending.source.clone(),
            to: destination.clone(),
            source: e,
        })?;

        debug!(from = %pending.source.display(), to = %destination.display(), "renamed");
        Ok(())
    }

    pub fn delete_file(&self, path: &Path) -> OrganizeResult<()> {
        if self.dry_run {
            return Ok(());
        }
        fs::remove_file(path).map_err(|e| OrganizeError::fs(path, e))
    }

    /// Removes every empty, non-hidden directory below `root`, deepest first,
    /// so a folder holding only empty folders goes too. `root` itself is kept,
    /// and so is anything below a directory the filters exclude.
    ///
    /// Returns the removed directories. A directory that cannot be removed is
    /// logged and left alone.
    pub fn prune_empty_dirs(&self, root: &Path, filters: &CompiledFilters) -> Vec<PathBuf> {
        if self.dry_run {
            return Vec::new();
        }

        let mut removed = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !is_hidden(entry)
                    && (!entry.file_type().is_dir() || filters.should_include(relative))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry while pruning");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let is_empty = match fs::read_dir(path) {
                Ok(mut children) => children.next().is_none(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot list directory");
                    continue;
                }
            };
            if !is_empty {
                continue;
            }

            match fs::remove_dir(path) {
                Ok(()) => {
                    info!(path = %path.display(), "removed empty directory");
                    removed.push(path.to_path_buf());
                }
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove empty directory"),
            }
        }
        removed
    }
}

/// Hidden means the name starts with a dot.
pub fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
