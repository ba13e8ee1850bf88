//! Classification schemes: which folder a file type belongs in.
//!
//! A scheme maps a key to an ordered list of folder names. Keys come in three
//! flavours, all lower-cased:
//! - an extension with its leading dot (`.pdf`)
//! - a full MIME type (`text/plain`)
//! - a primary MIME type (`image`)
//!
//! Schemes coming from an oracle are untrusted text. They are parsed as a JSON
//! object of string to array-of-strings and every folder name is validated, so
//! a reply can never point a file outside the organized tree.

use crate::config::ConfigError;
use crate::error::{OracleError, OracleResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Immutable mapping from file type keys to category path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationScheme {
    entries: BTreeMap<String, Vec<String>>,
}

impl ClassificationScheme {
    /// An empty scheme, which makes categorization fall back to MIME defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scheme from trusted input (configuration files).
    ///
    /// Any invalid key or folder name is an error.
    pub fn from_entries<I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut scheme = Self::new();
        for (key, segments) in entries {
            let (key, segments) = validate_entry(&key, &segments)
                .map_err(|reason| ConfigError::InvalidScheme(format!("'{key}': {reason}")))?;
            scheme.entries.insert(key, segments);
        }
        Ok(scheme)
    }

    /// Loads a scheme from a JSON file shaped like `{".pdf": ["Documents"]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let map: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)
            .map_err(|e| ConfigError::InvalidScheme(e.to_string()))?;
        Self::from_entries(map)
    }

    /// Parses a classification oracle reply.
    ///
    /// The reply must be a JSON object, optionally wrapped in a markdown code
    /// fence. Entries that fail validation are dropped with a warning; a reply
    /// that is not a JSON object at all is an error.
    pub fn from_oracle_reply(reply: &str) -> OracleResult<Self> {
        let body = strip_code_fence(reply);
        let value: Value =
            serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;
        let Value::Object(object) = value else {
            return Err(OracleError::Malformed(
                "expected a JSON object of file types to folder lists".to_string(),
            ));
        };

        let mut scheme = Self::new();
        for (key, value) in object {
            let segments = match value {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s),
                        other => Err(format!("folder names must be strings, got {other}")),
                    })
                    .collect::<Result<Vec<_>, _>>(),
                other => Err(format!("expected a list of folder names, got {other}")),
            };

            match segments.and_then(|segments| validate_entry(&key, &segments)) {
                Ok((key, segments)) => {
                    scheme.entries.insert(key, segments);
                }
                Err(reason) => warn!(key = %key, %reason, "dropping invalid scheme entry"),
            }
        }
        Ok(scheme)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up a key. Keys are compared lower-cased.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .get(&key.to_lowercase())
            .map(|segments| segments.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, segments)| (key.as_str(), segments.as_slice()))
    }
}

impl fmt::Display for ClassificationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(empty: MIME-type defaults)");
        }
        for (i, (key, segments)) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{key} -> {}", segments.join("/"))?;
        }
        Ok(())
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn validate_entry(key: &str, segments: &[String]) -> Result<(String, Vec<String>), String> {
    let key = key.trim().to_lowercase();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err("key must be an extension, a MIME type or a MIME category".to_string());
    }
    if segments.is_empty() {
        return Err("folder list is empty".to_string());
    }
    let segments = segments
        .iter()
        .map(|segment| validate_segment(segment))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((key, segments))
}

/// A folder name must stay a single, visible path component.
fn validate_segment(segment: &str) -> Result<String, String> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err("empty folder name".to_string());
    }
    if segment.starts_with('.') {
        return Err(format!("folder name '{segment}' is hidden or relative"));
    }
    if segment
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
    {
        return Err(format!("folder name '{segment}' contains a path separator"));
    }
    Ok(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json_reply() {
        let scheme = ClassificationScheme::from_oracle_reply(
            r#"{".PDF": ["Documents", "Reports"], "image": ["Pictures"]}"#,
        )
        .unwrap();

        assert_eq!(scheme.len(), 2);
        assert_eq!(
            scheme.get(".pdf"),
            Some(&["Documents".to_string(), "Reports".to_string()][..])
        );
        assert_eq!(scheme.get("IMAGE"), Some(&["Pictures".to_string()][..]));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\".py\": [\"Code\"]}\n```";
        let scheme = ClassificationScheme::from_oracle_reply(reply).unwrap();
        assert_eq!(scheme.get(".py"), Some(&["Code".to_string()][..]));
    }

    #[test]
    fn test_python_dict_reply_is_rejected() {
        // Single-quoted dicts are not JSON and are never evaluated.
        let reply = "{'.pdf': ['Documents'], '.jpg': __import__('os').getcwd()}";
        assert!(matches!(
            ClassificationScheme::from_oracle_reply(reply),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_reply_is_rejected() {
        assert!(ClassificationScheme::from_oracle_reply(r#"["Documents"]"#).is_err());
        assert!(ClassificationScheme::from_oracle_reply("Sure! Here is a scheme").is_err());
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let scheme = ClassificationScheme::from_oracle_reply(
            r#"{
                ".txt": ["Notes"],
                ".sh": ["..", "etc"],
                ".md": "Docs",
                ".csv": [],
                ".log": ["Logs/Old"],
                ".png": [42]
            }"#,
        )
        .unwrap();

        assert_eq!(scheme.len(), 1);
        assert!(scheme.get(".txt").is_some());
    }

    #[test]
    fn test_from_entries_is_strict() {
        let ok = ClassificationScheme::from_entries([(
            ".pdf".to_string(),
            vec!["Documents".to_string()],
        )]);
        assert!(ok.is_ok());

        let bad = ClassificationScheme::from_entries([(
            ".pdf".to_string(),
            vec!["../outside".to_string()],
        )]);
        assert!(matches!(bad, Err(ConfigError::InvalidScheme(_))));
    }

    #[test]
    fn test_display() {
        let scheme = ClassificationScheme::from_entries([(
            ".pdf".to_string(),
            vec!["Documents".to_string(), "Reports".to_string()],
        )])
        .unwrap();
        assert_eq!(scheme.to_string(), ".pdf -> Documents/Reports");
        assert_eq!(
            ClassificationScheme::new().to_string(),
            "(empty: MIME-type defaults)"
        );
    }
}
