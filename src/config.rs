//! Run configuration.
//!
//! Configuration is read from TOML. Every section is optional and falls back to
//! its defaults, so an empty file is a valid configuration:
//!
//! ```toml
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["**/node_modules/**"]
//! extensions = ["part", "crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [retention]
//! max_age_days = 365
//! check_usefulness = true
//!
//! [sampling]
//! max_chars = 1000
//!
//! [pipeline]
//! workers = 0
//! max_conflict_attempts = 10000
//!
//! [oracle]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-3.5-turbo"
//! api_key_env = "OPENAI_API_KEY"
//! timeout_secs = 30
//! tesseract = "tesseract"
//!
//! [logging]
//! file = "sortwise.log"
//!
//! [scheme]
//! ".pdf" = ["Documents", "Reports"]
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("Invalid classification scheme: {0}")]
    InvalidScheme(String),

    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Everything a run can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    pub filters: FilterRules,
    pub retention: RetentionSettings,
    pub sampling: SamplingSettings,
    pub pipeline: PipelineSettings,
    pub oracle: OracleSettings,
    pub logging: LoggingSettings,
    /// Static classification scheme. Validated when the run starts.
    pub scheme: BTreeMap<String, Vec<String>>,
}

/// Which files the scanner is allowed to hand to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether hidden files and directories (leading ".") are processed. Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist; overrides every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Files and directories never touched by a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns, matched against the path relative to the root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions without the leading dot, case-insensitive.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regexes matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    /// Files untouched for longer than this are deleted. 0 disables the age limit.
    pub max_age_days: u64,
    /// Ask the usefulness oracle about every sampled file.
    pub check_usefulness: bool,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_age_days: 365,
            check_usefulness: true,
        }
    }
}

impl RetentionSettings {
    pub fn max_age_days(&self) -> Option<u64> {
        (self.max_age_days > 0).then_some(self.max_age_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    pub max_chars: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            max_chars: crate::sampler::DEFAULT_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Worker threads for the read-only phases. 0 means one per CPU.
    pub workers: usize,
    pub max_conflict_attempts: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            max_conflict_attempts: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Path or name of the tesseract binary used for OCR.
    pub tesseract: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            tesseract: "tesseract".to_string(),
        }
    }
}

impl OracleSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Optional log file, written without ANSI colors in addition to stderr.
    pub file: Option<PathBuf>,
}

impl OrganizerConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if given (must exist)
    /// 2. `.sortwiserc.toml` in the current directory
    /// 3. `~/.config/sortwise/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".sortwiserc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sortwise")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }
}

impl FilterRules {
    /// Compile the rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

/// Filter rules with every pattern compiled up front.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Whether a name is hidden and hidden entries are switched off.
    pub fn hides(&self, name: &str) -> bool {
        !self.enable_hidden_files && name.starts_with('.')
    }

    /// Check whether a file, given relative to the scan root, is handed to the pipeline.
    ///
    /// Order, first match wins:
    /// 1. include patterns: keep
    /// 2. hidden name: drop
    /// 3. exact filename: drop
    /// 4. extension: drop
    /// 5. glob pattern: drop
    /// 6. regex on the name: drop
    /// 7. otherwise keep
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        if self.hides(&file_name) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules_with(exclude: ExcludeRules) -> FilterRules {
        FilterRules {
            enable_hidden_files: false,
            exclude,
            include: IncludeRules::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = OrganizerConfig::default();
        assert!(!config.filters.enable_hidden_files);
        assert_eq!(config.retention.max_age_days(), Some(365));
        assert!(config.retention.check_usefulness);
        assert_eq!(config.sampling.max_chars, 1000);
        assert_eq!(config.pipeline.max_conflict_attempts, 10_000);
        assert!(config.scheme.is_empty());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = OrganizerConfig::from_toml("").unwrap();
        assert_eq!(config.retention.max_age_days, 365);
        assert_eq!(config.oracle.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_partial_sections() {
        let config = OrganizerConfig::from_toml(
            r#"
            [retention]
            max_age_days = 0

            [oracle]
            timeout_secs = 5

            [scheme]
            ".pdf" = ["Documents", "Reports"]
            "image" = ["Pictures"]
            "#,
        )
        .unwrap();

        assert_eq!(config.retention.max_age_days(), None);
        assert!(config.retention.check_usefulness);
        assert_eq!(config.oracle.timeout(), Duration::from_secs(5));
        assert_eq!(config.oracle.api_key_env, "OPENAI_API_KEY");
        assert_eq!(
            config.scheme.get(".pdf"),
            Some(&vec!["Documents".to_string(), "Reports".to_string()])
        );
    }

    #[test]
    fn test_invalid_toml() {
        let result = OrganizerConfig::from_toml("[retention]\nmax_age_days = \"soon\"");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_missing_explicit_config() {
        let result = OrganizerConfig::load(Some(Path::new("/non/existent/sortwise.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let compiled = FilterRules::default().compile().unwrap();
        assert!(!compiled.should_include(Path::new(".DS_Store")));
        assert!(compiled.hides(".git"));
        assert!(compiled.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_hidden_files_included_when_enabled() {
        let rules = FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        };
        let compiled = rules.compile().unwrap();
        assert!(compiled.should_include(Path::new(".env")));
        assert!(!compiled.hides(".git"));
    }

    #[test]
    fn test_exclude_extensions_case_insensitive() {
        let compiled = rules_with(ExcludeRules {
            extensions: vec![".part".to_string(), "crdownload".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include(Path::new("movie.part")));
        assert!(!compiled.should_include(Path::new("setup.CRDOWNLOAD")));
        assert!(compiled.should_include(Path::new("movie.mp4")));
    }

    #[test]
    fn test_exclude_relative_glob() {
        let compiled = rules_with(ExcludeRules {
            patterns: vec!["**/node_modules/**".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include(Path::new("web/node_modules/pkg/index.js")));
        assert!(compiled.should_include(Path::new("web/my_node_modules/index.js")));
    }

    #[test]
    fn test_exclude_filename_and_regex() {
        let compiled = rules_with(ExcludeRules {
            filenames: vec!["Thumbs.db".to_string()],
            regex: vec![r"^~\$".to_string()],
            ..Default::default()
        })
        .compile()
        .unwrap();

        assert!(!compiled.should_include(Path::new("photos/Thumbs.db")));
        assert!(!compiled.should_include(Path::new("~$budget.xlsx")));
        assert!(compiled.should_include(Path::new("budget.xlsx")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let rules = FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                extensions: vec!["log".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["keep/*.log".to_string(), ".important".to_string()],
            },
        };
        let compiled = rules.compile().unwrap();

        assert!(compiled.should_include(Path::new("keep/app.log")));
        assert!(!compiled.should_include(Path::new("app.log")));
        assert!(compiled.should_include(Path::new(".important")));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let bad_regex = rules_with(ExcludeRules {
            regex: vec!["[invalid(".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = rules_with(ExcludeRules {
            patterns: vec!["[invalid".to_string()],
            ..Default::default()
        });
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }
}
