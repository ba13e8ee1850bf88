//! sortwise - organize a directory tree with optional AI help
//!
//! A run snapshots the tree, deletes files that are too old, judged useless,
//! exact duplicates or disk images, and moves everything else into category
//! folders under a descriptive, conflict-free name. Empty directories are
//! removed at the end.
//!
//! The AI parts (scheme generation, renaming, usefulness, code review) and the
//! text extractors sit behind the traits in [`oracle`]; every one of them may
//! fail without stopping the run.

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod logging;
pub mod naming;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retention;
pub mod sampler;
pub mod scanner;
pub mod scheme;

pub use config::{CompiledFilters, ConfigError, OrganizerConfig};
pub use error::{ExtractionError, OracleError, OrganizeError, OrganizeResult};
pub use file_category::CategoryResolver;
pub use file_organizer::{ConflictResolver, FileOrganizer, PendingMove};
pub use oracle::Oracles;
pub use pipeline::{
    CancelToken, DeletionReason, FileOutcome, Pipeline, PipelineOptions, RunReport,
};
pub use progress::{ProgressReporter, SilentReporter};
pub use retention::{RetentionPolicy, RetentionVerdict};
pub use scheme::ClassificationScheme;
