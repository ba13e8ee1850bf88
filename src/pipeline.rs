//! The organization pipeline.
//!
//! A run takes a snapshot of the tree and then pushes every file through the
//! same decision sequence: retention, duplicate check, excluded extensions,
//! categorization, renaming and placement. The read-only work (sampling,
//! oracle calls, hashing) runs on a worker pool; every filesystem mutation
//! happens on the calling thread, in snapshot order:
//!
//! 1. inspect (parallel): MIME type, content sample, retention verdict, digest
//! 2. retire (sequential): retention deletes, duplicate deletes, excluded deletes
//! 3. classify (parallel): category, code review, name suggestion
//! 4. place (sequential): conflict-free destination and the move
//!
//! Afterwards empty directories are pruned.

use crate::config::{CompiledFilters, OrganizerConfig};
use crate::dedup::{HashIndex, Observation, content_digest};
use crate::error::{OrganizeError, OrganizeResult};
use crate::file_category::{CategoryResolver, detect_mime};
use crate::file_organizer::{ConflictResolver, FileOrganizer, PendingMove};
use crate::naming::{NameSuggester, dotted_extension};
use crate::oracle::{Oracles, REVIEW_FALLBACK, review_or_fallback};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::retention::{RetentionPolicy, RetentionVerdict};
use crate::sampler::ContentSampler;
use crate::scanner::Scanner;
use crate::scheme::ClassificationScheme;
use chrono::{DateTime, Utc};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Everything the pipeline has learned about one file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub path: PathBuf,
    pub mime: Option<String>,
    pub sample: String,
    pub verdict: RetentionVerdict,
    /// Only computed for files the retention check keeps.
    pub digest: Option<blake3::Hash>,
    pub category: Vec<String>,
    pub base_name: String,
}

/// Why a file was deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionReason {
    Old,
    Useless,
    OldAndUseless,
    Duplicate { original: PathBuf },
    Excluded,
}

impl DeletionReason {
    pub fn from_verdict(verdict: RetentionVerdict) -> Option<Self> {
        match verdict {
            RetentionVerdict::Keep => None,
            RetentionVerdict::DeleteOld => Some(Self::Old),
            RetentionVerdict::DeleteUseless => Some(Self::Useless),
            RetentionVerdict::DeleteBoth => Some(Self::OldAndUseless),
        }
    }
}

impl fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::Useless => write!(f, "useless"),
            Self::OldAndUseless => write!(f, "old and useless"),
            Self::Duplicate { original } => write!(f, "duplicate of {}", original.display()),
            Self::Excluded => write!(f, "excluded file type"),
        }
    }
}

/// Terminal state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Already at its destination.
    Kept,
    Moved { to: PathBuf },
    Deleted { reason: DeletionReason },
    /// Something went wrong; the file was left where it was.
    Skipped { error: String },
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// What a run did, file by file, in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub root: PathBuf,
    pub files: Vec<FileReport>,
    pub pruned: Vec<PathBuf>,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn moved(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Moved { .. }))
    }

    pub fn kept(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Kept))
    }

    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Deleted { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                FileOutcome::Deleted {
                    reason: DeletionReason::Duplicate { .. }
                }
            )
        })
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    /// Outcome recorded for `path`, if it was in the snapshot.
    pub fn outcome_of(&self, path: &Path) -> Option<&FileOutcome> {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| &f.outcome)
    }
}

/// Cooperative cancellation, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tunables of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// `None` disables the age limit.
    pub max_age_days: Option<u64>,
    pub check_usefulness: bool,
    pub max_chars: usize,
    /// Worker threads for the parallel phases, 0 for one per CPU.
    pub workers: usize,
    pub max_conflict_attempts: u32,
    pub dry_run: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &OrganizerConfig) -> Self {
        Self {
            max_age_days: config.retention.max_age_days(),
            check_usefulness: config.retention.check_usefulness,
            max_chars: config.sampling.max_chars,
            workers: config.pipeline.workers,
            max_conflict_attempts: config.pipeline.max_conflict_attempts,
            dry_run: false,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&OrganizerConfig::default())
    }
}

pub struct Pipeline {
    options: PipelineOptions,
    filters: CompiledFilters,
    scheme: ClassificationScheme,
    oracles: Oracles,
    sampler: ContentSampler,
    suggester: NameSuggester,
    categories: CategoryResolver,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
    now: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn new(
        options: PipelineOptions,
        filters: CompiledFilters,
        oracles: Oracles,
        scheme: ClassificationScheme,
    ) -> Self {
        Self {
            sampler: ContentSampler::new(oracles.clone(), options.max_chars),
            suggester: NameSuggester::new(oracles.clone()),
            categories: CategoryResolver::default(),
            reporter: Arc::new(SilentReporter),
            cancel: CancelToken::new(),
            now: None,
            options,
            filters,
            scheme,
            oracles,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pins the time file ages are measured against.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Organizes the tree under `root`.
    ///
    /// Per-file failures end up as [`FileOutcome::Skipped`] in the report.
    ///
    /// # Errors
    ///
    /// Only [`OrganizeError::InvalidRoot`], when `root` cannot be scanned.
    pub fn run(&self, root: &Path) -> OrganizeResult<RunReport> {
        let root = fs::canonicalize(root).map_err(|source| OrganizeError::InvalidRoot {
            path: root.to_path_buf(),
            source,
        })?;
        let snapshot = Scanner::new(self.filters.clone()).snapshot(&root)?;
        info!(
            root = %root.display(),
            files = snapshot.len(),
            dry_run = self.options.dry_run,
            "snapshot taken"
        );
        self.reporter.on_scan_complete(snapshot.len());

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .thread_name(|i| format!("sortwise-worker-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "could not build worker pool, using the global one");
                None
            }
        };
        let organizer = FileOrganizer::new(self.options.dry_run);
        let mut report = RunReport {
            root: root.clone(),
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        // Inspect
        let policy = self.retention_policy();
        self.reporter.on_inspect_start(snapshot.len());
        let inspected = install(pool.as_ref(), || {
            snapshot
                .par_iter()
                .map(|path| {
                    let record = self.inspect(path, &policy);
                    self.reporter.on_file_inspected();
                    record
                })
                .collect::<Vec<_>>()
        });

        // Retire
        let index = HashIndex::new();
        let mut survivors = Vec::new();
        for result in inspected {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match result {
                Ok(record) => match self.retire(&organizer, &index, &record) {
                    Some(outcome) => report.files.push(FileReport {
                        path: record.path,
                        outcome,
                    }),
                    None => survivors.push(record),
                },
                Err((path, e)) => report.files.push(skipped(path, &e)),
            }
        }

        if !report.cancelled {
            // Classify
            self.reporter.on_classify_start(survivors.len());
            let classified = install(pool.as_ref(), || {
                survivors
                    .into_par_iter()
                    .map(|record| {
                        let record = self.classify(record);
                        self.reporter.on_file_classified();
                        record
                    })
                    .collect::<Vec<_>>()
            });

            // Place
            let mut conflicts = ConflictResolver::new(self.options.max_conflict_attempts);
            for record in classified {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                let outcome = self.place(&organizer, &mut conflicts, &root, &record);
                report.files.push(FileReport {
                    path: record.path,
                    outcome,
                });
            }
        }

        // Files from both sequential phases interleave; restore snapshot order.
        let order: HashMap<&Path, usize> = snapshot
            .iter()
            .enumerate()
            .map(|(i, path)| (path.as_path(), i))
            .collect();
        report
            .files
            .sort_by_key(|f| order.get(f.path.as_path()).copied().unwrap_or(usize::MAX));

        if report.cancelled {
            warn!("run cancelled, leaving remaining files untouched");
        } else {
            report.pruned = organizer.prune_empty_dirs(&root, &self.filters);
        }

        self.reporter.on_run_complete();
        info!(
            moved = report.moved(),
            kept = report.kept(),
            deleted = report.deleted(),
            skipped = report.skipped(),
            pruned = report.pruned.len(),
            "run complete"
        );
        Ok(report)
    }

    fn retention_policy(&self) -> RetentionPolicy {
        let policy =
            RetentionPolicy::new(self.options.max_age_days, self.options.check_usefulness);
        match self.now {
            Some(now) => policy.with_now(now),
            None => policy,
        }
    }

    fn inspect(
        &self,
        path: &Path,
        policy: &RetentionPolicy,
    ) -> Result<FileRecord, (PathBuf, OrganizeError)> {
        let fail = |e| (path.to_path_buf(), e);

        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| fail(OrganizeError::fs(path, e)))?;
        let mime = detect_mime(path);
        let sample = self.sampler.sample(path, mime.as_deref());
        let verdict = policy.judge(modified, &sample, &self.oracles);
        let digest = if verdict.is_delete() {
            None
        } else {
            Some(content_digest(path).map_err(fail)?)
        };

        debug!(
            path = %path.display(),
            mime = mime.as_deref().unwrap_or("unknown"),
            sample_chars = sample.chars().count(),
            ?verdict,
            "inspected"
        );

        Ok(FileRecord {
            path: path.to_path_buf(),
            mime,
            sample,
            verdict,
            digest,
            category: Vec::new(),
            base_name: String::new(),
        })
    }

    /// Applies the deleting decisions in their fixed order: retention,
    /// duplicates, excluded extensions. `None` means the file survives.
    fn retire(
        &self,
        organizer: &FileOrganizer,
        index: &HashIndex,
        record: &FileRecord,
    ) -> Option<FileOutcome> {
        if let Some(reason) = DeletionReason::from_verdict(record.verdict) {
            return Some(self.delete(organizer, &record.path, reason));
        }

        if let Some(digest) = record.digest
            && let Observation::Duplicate { original } = index.observe_digest(digest, &record.path)
        {
            return Some(self.delete(organizer, &record.path, DeletionReason::Duplicate { original }));
        }

        if self.categories.is_excluded(&record.path) {
            return Some(self.delete(organizer, &record.path, DeletionReason::Excluded));
        }

        None
    }

    fn delete(&self, organizer: &FileOrganizer, path: &Path, reason: DeletionReason) -> FileOutcome {
        info!(path = %path.display(), %reason, dry_run = self.options.dry_run, "deleting");
        match organizer.delete_file(path) {
            Ok(()) => {
                info!(path = %path.display(), %reason, "deleted");
                FileOutcome::Deleted { reason }
            }
            Err(e) => skipped(path.to_path_buf(), &e).outcome,
        }
    }

    fn classify(&self, mut record: FileRecord) -> FileRecord {
        record.category = self
            .categories
            .resolve(&record.path, record.mime.as_deref(), &self.scheme);

        if self.categories.is_code(&record.path) {
            let review = if record.sample.trim().is_empty() {
                REVIEW_FALLBACK.to_string()
            } else {
                review_or_fallback(&self.oracles, &record.sample)
            };
            info!(path = %record.path.display(), %review, "code review");
        }

        record.base_name = self.suggester.base_name(&record.path, &record.sample);
        record
    }

    fn place(
        &self,
        organizer: &FileOrganizer,
        conflicts: &mut ConflictResolver,
        root: &Path,
        record: &FileRecord,
    ) -> FileOutcome {
        let category_dir = record
            .category
            .iter()
            .fold(root.to_path_buf(), |dir, segment| dir.join(segment));
        let ext = dotted_extension(&record.path);

        let destination =
            match conflicts.resolve(&category_dir, &record.base_name, &ext, &record.path) {
                Ok(destination) => destination,
                Err(e) => return skipped(record.path.clone(), &e).outcome,
            };

        let pending = PendingMove {
            source: record.path.clone(),
            destination,
        };
        if pending.is_in_place() {
            info!(path = %pending.source.display(), "already in place");
            return FileOutcome::Kept;
        }

        info!(
            path = %pending.source.display(),
            destination = %pending.destination.display(),
            category = %record.category.join("/"),
            dry_run = self.options.dry_run,
            "moving"
        );
        match organizer.move_file(&pending) {
            Ok(()) => {
                info!(path = %pending.source.display(), destination = %pending.destination.display(), "moved");
                FileOutcome::Moved {
                    to: pending.destination,
                }
            }
            Err(e) => skipped(pending.source, &e).outcome,
        }
    }
}

/// Runs `work` on `pool`, or on the global pool when there is none.
fn install<R, F>(pool: Option<&ThreadPool>, work: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match pool {
        Some(pool) => pool.install(work),
        None => work(),
    }
}

fn skipped(path: PathBuf, error: &OrganizeError) -> FileReport {
    warn!(path = %path.display(), %error, "skipping file");
    FileReport {
        path,
        outcome: FileOutcome::Skipped {
            error: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            PipelineOptions {
                max_age_days: None,
                workers: 2,
                ..Default::default()
            },
            CompiledFilters::default(),
            Oracles::disabled(),
            ClassificationScheme::new(),
        )
    }

    #[test]
    fn test_deletion_reason_display() {
        assert_eq!(DeletionReason::OldAndUseless.to_string(), "old and useless");
        assert_eq!(
            DeletionReason::Duplicate {
                original: PathBuf::from("/a/b.txt")
            }
            .to_string(),
            "duplicate of /a/b.txt"
        );
        assert_eq!(DeletionReason::from_verdict(RetentionVerdict::Keep), None);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancelled_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "same").unwrap();
        fs::write(dir.path().join("b.txt"), "same").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let pipeline = pipeline();
        pipeline.cancel_token().cancel();
        let report = pipeline.run(dir.path()).unwrap();

        assert!(report.cancelled);
        assert!(report.files.is_empty());
        assert!(dir.path().join("a.txt").exists());
        assert!(dir.path().join("b.txt").exists());
        assert!(dir.path().join("empty").exists());
    }

    #[test]
    fn test_report_is_in_snapshot_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "same").unwrap();
        fs::write(dir.path().join("b.txt"), "same").unwrap();
        fs::write(dir.path().join("c.txt"), "different").unwrap();

        let report = pipeline().run(dir.path()).unwrap();
        let names: Vec<_> = report
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
        assert!(matches!(report.files[0].outcome, FileOutcome::Moved { .. }));
        assert!(matches!(
            report.files[1].outcome,
            FileOutcome::Deleted {
                reason: DeletionReason::Duplicate { .. }
            }
        ));
        assert_eq!(report.duplicates(), 1);
    }

    #[test]
    fn test_unreadable_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = pipeline().run(&dir.path().join("missing"));
        assert!(matches!(result, Err(OrganizeError::InvalidRoot { .. })));
    }
}
