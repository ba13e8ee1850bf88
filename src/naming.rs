//! Content-based file names.

use crate::oracle::Oracles;
use std::path::Path;
use tracing::debug;

/// Extensions whose files keep their own name.
pub const NO_RENAME_EXTENSIONS: &[&str] = &["exe", "app", "iso", "dmg", "msi", "pkg"];

/// Stem used when nothing usable is left after sanitizing.
pub const FALLBACK_STEM: &str = "untitled";

/// Keeps alphanumerics, spaces, `-` and `_`, then trims trailing whitespace.
///
/// # Examples
///
/// ```
/// use sortwise::naming::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My: Report!"), "My Report");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Whether files with this path's extension may be renamed.
pub fn should_rename(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !NO_RENAME_EXTENSIONS.contains(&ext.as_str())
}

/// Asks the rename oracle for descriptive names.
#[derive(Clone)]
pub struct NameSuggester {
    oracles: Oracles,
}

impl NameSuggester {
    pub fn new(oracles: Oracles) -> Self {
        Self { oracles }
    }

    /// Suggests a sanitized name for `sample`, or `None` when there is
    /// nothing to go on or the oracle gives nothing usable.
    pub fn suggest(&self, sample: &str) -> Option<String> {
        if sample.trim().is_empty() {
            return None;
        }
        match self.oracles.suggest_name(sample) {
            Ok(raw) => {
                let name = sanitize_filename(&raw);
                (!name.is_empty()).then_some(name)
            }
            Err(e) => {
                debug!(error = %e, "no name suggestion");
                None
            }
        }
    }

    /// The stem the file should be stored under, without extension.
    ///
    /// Renamable files get the suggested name when there is one; everything
    /// else keeps its sanitized original stem.
    pub fn base_name(&self, path: &Path, sample: &str) -> String {
        let suggested = if should_rename(path) {
            self.suggest(sample)
        } else {
            None
        };
        suggested.unwrap_or_else(|| original_base_name(path))
    }
}

/// Sanitized stem of `path`, or [`FALLBACK_STEM`] if that comes out empty.
pub fn original_base_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| sanitize_filename(&stem.to_string_lossy()))
        .unwrap_or_default();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// Extension of `path` with its leading dot, or an empty string.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleResult;
    use crate::oracle::RenameOracle;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Namer {
        reply: &'static str,
        calls: AtomicUsize,
    }

    impl RenameOracle for Namer {
        fn suggest_name(&self, _sample: &str) -> OracleResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn suggester(reply: &'static str) -> (NameSuggester, Arc<Namer>) {
        let namer = Arc::new(Namer {
            reply,
            calls: AtomicUsize::new(0),
        });
        let mut oracles = Oracles::disabled();
        oracles.rename = namer.clone();
        (NameSuggester::new(oracles), namer)
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My: Report!"), "My Report");
        assert_eq!(sanitize_filename("Tax_Return-2023  "), "Tax_Return-2023");
        assert_eq!(sanitize_filename("???"), "");
        assert_eq!(sanitize_filename("Zażółć gęślą"), "Zażółć gęślą");
    }

    #[test]
    fn test_should_rename() {
        assert!(should_rename(Path::new("notes.txt")));
        assert!(should_rename(Path::new("README")));
        assert!(!should_rename(Path::new("setup.exe")));
        assert!(!should_rename(Path::new("Installer.DMG")));
        assert!(!should_rename(Path::new("ubuntu.iso")));
    }

    #[test]
    fn test_empty_sample_never_calls_oracle() {
        let (suggester, namer) = suggester("Anything");
        assert_eq!(suggester.suggest(""), None);
        assert_eq!(suggester.suggest("  \n"), None);
        assert_eq!(namer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_suggestion_is_sanitized() {
        let (suggester, _) = suggester("Q3: Budget/Plan");
        assert_eq!(suggester.suggest("numbers").as_deref(), Some("Q3 BudgetPlan"));
    }

    #[test]
    fn test_unusable_suggestion_is_none() {
        let (suggester, _) = suggester("!!!");
        assert_eq!(suggester.suggest("numbers"), None);

        let offline = NameSuggester::new(Oracles::disabled());
        assert_eq!(offline.suggest("numbers"), None);
    }

    #[test]
    fn test_base_name() {
        let (suggester, namer) = suggester("Quarterly Report");
        assert_eq!(
            suggester.base_name(Path::new("/x/scan_001.pdf"), "revenue"),
            "Quarterly Report"
        );
        assert_eq!(
            suggester.base_name(Path::new("/x/My Setup!.exe"), "MZ"),
            "My Setup"
        );
        assert_eq!(namer.calls.load(Ordering::SeqCst), 1);

        assert_eq!(suggester.base_name(Path::new("/x/@@@.txt"), ""), "untitled");
    }

    #[test]
    fn test_dotted_extension() {
        assert_eq!(dotted_extension(Path::new("a/report.PDF")), ".PDF");
        assert_eq!(dotted_extension(Path::new("a/Makefile")), "");
        assert_eq!(dotted_extension(Path::new("a/archive.tar.gz")), ".gz");
    }
}
