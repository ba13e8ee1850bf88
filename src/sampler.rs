//! Bounded text samples of file content.
//!
//! The sample is what the oracles get to see. Extraction never fails from the
//! caller's point of view: anything that goes wrong produces an empty sample,
//! which downstream stages read as "no content available".

use crate::error::ExtractionError;
use crate::oracle::Oracles;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Default sample length in characters.
pub const DEFAULT_MAX_CHARS: usize = 1000;

/// Returns the first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Decodes UTF-8, silently dropping invalid sequences.
fn decode_dropping_invalid(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Extracts text samples, dispatching on MIME type.
#[derive(Clone)]
pub struct ContentSampler {
    oracles: Oracles,
    max_chars: usize,
}

impl ContentSampler {
    pub fn new(oracles: Oracles, max_chars: usize) -> Self {
        Self { oracles, max_chars }
    }

    /// Samples `path`, returning an empty string on any failure.
    pub fn sample(&self, path: &Path, mime: Option<&str>) -> String {
        match self.try_sample(path, mime) {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no content sample");
                String::new()
            }
        }
    }

    /// Samples `path`:
    /// - `image/*` goes through OCR and is cut to `max_chars` characters
    /// - `application/pdf` goes through page-wise text extraction bounded by `max_chars`
    /// - anything else is read raw, at most `max_chars` bytes, and decoded as UTF-8
    pub fn try_sample(&self, path: &Path, mime: Option<&str>) -> Result<String, ExtractionError> {
        let read_err = |source| ExtractionError::Read {
            path: path.to_path_buf(),
            source,
        };
        let oracle_err = |source| ExtractionError::Oracle {
            path: path.to_path_buf(),
            source,
        };

        match mime {
            Some(m) if m.starts_with("image") => {
                let bytes = fs::read(path).map_err(read_err)?;
                let text = self.oracles.image_text(bytes).map_err(oracle_err)?;
                Ok(truncate_chars(&text, self.max_chars))
            }
            Some("application/pdf") => {
                let bytes = fs::read(path).map_err(read_err)?;
                let text = self
                    .oracles
                    .pdf_text(bytes, self.max_chars)
                    .map_err(oracle_err)?;
                Ok(truncate_chars(&text, self.max_chars))
            }
            _ => {
                let mut raw = Vec::with_capacity(self.max_chars);
                File::open(path)
                    .and_then(|file| file.take(self.max_chars as u64).read_to_end(&mut raw))
                    .map_err(read_err)?;
                Ok(decode_dropping_invalid(&raw))
            }
        }
    }
}
