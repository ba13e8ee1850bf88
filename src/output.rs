//! Output formatting and styling module.
//!
//! Everything the user reads on the terminal goes through here: status lines,
//! the per-file listing, the summary table and the progress bars. Diagnostics
//! go through `tracing` instead.

use crate::pipeline::{FileOutcome, RunReport};
use crate::progress::ProgressReporter;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortwise::output::OutputFormatter;
    /// OutputFormatter::success("Directory organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortwise::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100, "Inspecting");
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64, message: &'static str) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.set_message(message);
        pb
    }

    /// One line per file, in snapshot order.
    pub fn file_listing(report: &RunReport) {
        let verb = |done: &'static str, planned: &'static str| {
            if report.dry_run { planned } else { done }
        };

        for file in &report.files {
            let name = display_relative(&report.root, &file.path);
            match &file.outcome {
                FileOutcome::Moved { to } => println!(
                    " - {} {} {}",
                    name,
                    verb("→", "→ would move to").green(),
                    display_relative(&report.root, to)
                ),
                FileOutcome::Kept => println!(" - {} {}", name, "already in place".dimmed()),
                FileOutcome::Deleted { reason } => println!(
                    " - {} {} ({})",
                    name,
                    verb("deleted", "would be deleted").red(),
                    reason
                ),
                FileOutcome::Skipped { error } => {
                    println!(" - {} {} {}", name, "skipped:".yellow(), error)
                }
            }
        }
    }

    /// Prints outcome counts and, for moved files, counts per category folder.
    pub fn summary_table(report: &RunReport) {
        Self::header(if report.dry_run {
            "DRY RUN SUMMARY"
        } else {
            "SUMMARY"
        });

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for file in &report.files {
            if let FileOutcome::Moved { to } = &file.outcome {
                let folder = to
                    .parent()
                    .map(|dir| display_relative(&report.root, dir))
                    .unwrap_or_default();
                *categories.entry(folder).or_insert(0) += 1;
            }
        }

        let rows = [
            ("Moved", report.moved()),
            ("In place", report.kept()),
            ("Deleted", report.deleted()),
            ("  of which duplicates", report.duplicates()),
            ("Skipped", report.skipped()),
            ("Empty dirs removed", report.pruned.len()),
        ];

        let width = rows
            .iter()
            .map(|(label, _)| label.len())
            .chain(categories.keys().map(|name| name.len() + 2))
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "Outcome".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            println!("{:<width$} | {}", label, count.to_string().green(), width = width);
        }

        if !categories.is_empty() {
            println!("{}", "-".repeat(width + 10));
            for (folder, count) in &categories {
                println!(
                    "{:<width$} | {} {}",
                    format!("  {folder}"),
                    count,
                    if *count == 1 { "file" } else { "files" },
                    width = width
                );
            }
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            report.files.len().to_string().green().bold(),
            width = width
        );

        if report.cancelled {
            Self::warning("Run was cancelled; remaining files were left untouched.");
        }
    }
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Progress bars for the parallel phases.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn tick(&self) {
        let guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = guard.as_ref() {
            pb.inc(1);
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_complete(&self, total_files: usize) {
        OutputFormatter::info(&format!("Found {total_files} files to consider"));
    }

    fn on_inspect_start(&self, total_files: usize) {
        self.set_bar(OutputFormatter::create_progress_bar(
            total_files as u64,
            "Inspecting",
        ));
    }

    fn on_file_inspected(&self) {
        self.tick();
    }

    fn on_classify_start(&self, total_files: usize) {
        self.set_bar(OutputFormatter::create_progress_bar(
            total_files as u64,
            "Classifying",
        ));
    }

    fn on_file_classified(&self) {
        self.tick();
    }

    fn on_run_complete(&self) {
        self.finish_bar();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_relative() {
        let root = Path::new("/data");
        assert_eq!(
            display_relative(root, Path::new("/data/Documents/a.pdf")),
            "Documents/a.pdf"
        );
        assert_eq!(display_relative(root, Path::new("/elsewhere/b")), "/elsewhere/b");
    }

    #[test]
    fn test_reporter_counts_ticks() {
        let reporter = CliReporter::new();
        reporter.on_inspect_start(3);
        reporter.on_file_inspected();
        reporter.on_file_inspected();
        let position = reporter
            .bar
            .lock()
            .unwrap()
            .as_ref()
            .map(|pb| pb.position());
        assert_eq!(position, Some(2));

        reporter.on_run_complete();
        assert!(reporter.bar.lock().unwrap().is_none());
    }
}
