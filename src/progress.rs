/// Progress callbacks for a run.
///
/// All methods have default no-op implementations. The parallel phases call
/// the per-file hooks from worker threads.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_complete(&self, _total_files: usize) {}
    fn on_inspect_start(&self, _total_files: usize) {}
    fn on_file_inspected(&self) {}
    fn on_classify_start(&self, _total_files: usize) {}
    fn on_file_classified(&self) {}
    fn on_run_complete(&self) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
