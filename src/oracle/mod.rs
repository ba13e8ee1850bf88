//! External judgment services.
//!
//! Each oracle is a one-method trait so tests (or other backends) can swap in
//! their own implementation. The pipeline only ever talks to an [`Oracles`]
//! bundle, which runs every call under a timeout: a hung service costs at most
//! `timeout` per call and then the caller takes its fallback.

pub mod local;
pub mod openai;

use crate::config::OracleSettings;
use crate::error::{OracleError, OracleResult};
use crate::scheme::ClassificationScheme;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Turns a free-text description of the desired layout into a scheme.
pub trait SchemeOracle: Send + Sync {
    fn generate_scheme(&self, description: &str) -> OracleResult<ClassificationScheme>;
}

/// Proposes a short, extension-less file name for a content sample.
pub trait RenameOracle: Send + Sync {
    fn suggest_name(&self, sample: &str) -> OracleResult<String>;
}

/// Judges whether a content sample is worth keeping.
pub trait UsefulnessOracle: Send + Sync {
    fn is_useless(&self, sample: &str) -> OracleResult<bool>;
}

/// Summarizes what a piece of source code does.
pub trait CodeReviewOracle: Send + Sync {
    fn review_code(&self, code: &str) -> OracleResult<String>;
}

/// Reads text out of an image.
pub trait OcrOracle: Send + Sync {
    fn image_text(&self, image: &[u8]) -> OracleResult<String>;
}

/// Extracts text from a PDF, stopping once `max_chars` characters are collected.
pub trait PdfTextOracle: Send + Sync {
    fn pdf_text(&self, pdf: &[u8], max_chars: usize) -> OracleResult<String>;
}

/// Oracle that is never available. Every stage using it takes its fallback.
#[derive(Debug, Clone, Default)]
pub struct Disabled {
    reason: String,
}

impl Disabled {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable<T>(&self) -> OracleResult<T> {
        Err(OracleError::Unavailable(self.reason.clone()))
    }
}

impl SchemeOracle for Disabled {
    fn generate_scheme(&self, _description: &str) -> OracleResult<ClassificationScheme> {
        self.unavailable()
    }
}

impl RenameOracle for Disabled {
    fn suggest_name(&self, _sample: &str) -> OracleResult<String> {
        self.unavailable()
    }
}

impl UsefulnessOracle for Disabled {
    fn is_useless(&self, _sample: &str) -> OracleResult<bool> {
        self.unavailable()
    }
}

impl CodeReviewOracle for Disabled {
    fn review_code(&self, _code: &str) -> OracleResult<String> {
        self.unavailable()
    }
}

impl OcrOracle for Disabled {
    fn image_text(&self, _image: &[u8]) -> OracleResult<String> {
        self.unavailable()
    }
}

impl PdfTextOracle for Disabled {
    fn pdf_text(&self, _pdf: &[u8], _max_chars: usize) -> OracleResult<String> {
        self.unavailable()
    }
}

/// Runs `call` on its own thread and gives up after `timeout`.
///
/// A call that panics is reported as a process failure. A call that times out
/// keeps running detached; its result is discarded.
pub fn call_with_timeout<O, T, F>(timeout: Duration, oracle: &Arc<O>, call: F) -> OracleResult<T>
where
    O: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&O) -> OracleResult<T> + Send + 'static,
{
    let oracle = Arc::clone(oracle);
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("sortwise-oracle".to_string())
        .spawn(move || {
            let _ = tx.send(call(&*oracle));
        })
        .map_err(|e| OracleError::Process(format!("could not spawn oracle thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(OracleError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(OracleError::Process("oracle call panicked".to_string()))
        }
    }
}

/// The full set of oracles a run uses, plus the per-call timeout.
#[derive(Clone)]
pub struct Oracles {
    pub scheme: Arc<dyn SchemeOracle>,
    pub rename: Arc<dyn RenameOracle>,
    pub usefulness: Arc<dyn UsefulnessOracle>,
    pub code_review: Arc<dyn CodeReviewOracle>,
    pub ocr: Arc<dyn OcrOracle>,
    pub pdf: Arc<dyn PdfTextOracle>,
    pub timeout: Duration,
}

impl Oracles {
    /// Every oracle disabled: a purely local, MIME-driven run.
    pub fn disabled() -> Self {
        let off = Arc::new(Disabled::new("no oracle configured"));
        Self {
            scheme: off.clone(),
            rename: off.clone(),
            usefulness: off.clone(),
            code_review: off.clone(),
            ocr: off.clone(),
            pdf: off,
            timeout: Duration::from_secs(30),
        }
    }

    /// Builds the default oracle set from configuration.
    ///
    /// Text extraction always uses the local extractors. The chat-based oracles
    /// use the OpenAI-compatible endpoint when an API key is present in the
    /// environment, and are disabled otherwise.
    pub fn from_settings(settings: &OracleSettings) -> Self {
        let oracles = Self::disabled()
            .with_ocr(local::TesseractOcr::new(&settings.tesseract).with_timeout(settings.timeout()))
            .with_pdf(local::PdfExtractor)
            .with_timeout(settings.timeout());

        match std::env::var(&settings.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                match openai::OpenAiClient::new(settings, key.trim().to_string()) {
                    Ok(client) => oracles.with_chat(client),
                    Err(e) => {
                        warn!(error = %e, "could not build the AI client, AI features are off");
                        oracles
                    }
                }
            }
            _ => {
                warn!(
                    env = %settings.api_key_env,
                    "no API key found, AI classification, renaming and review are off"
                );
                oracles
            }
        }
    }

    /// Uses one chat backend for the scheme, rename, usefulness and review oracles.
    pub fn with_chat<C>(mut self, chat: C) -> Self
    where
        C: SchemeOracle + RenameOracle + UsefulnessOracle + CodeReviewOracle + 'static,
    {
        let chat = Arc::new(chat);
        self.scheme = chat.clone();
        self.rename = chat.clone();
        self.usefulness = chat.clone();
        self.code_review = chat;
        self
    }

    pub fn with_ocr(mut self, ocr: impl OcrOracle + 'static) -> Self {
        self.ocr = Arc::new(ocr);
        self
    }

    pub fn with_pdf(mut self, pdf: impl PdfTextOracle + 'static) -> Self {
        self.pdf = Arc::new(pdf);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn generate_scheme(&self, description: &str) -> OracleResult<ClassificationScheme> {
        let description = description.to_owned();
        call_with_timeout(self.timeout, &self.scheme, move |o| {
            o.generate_scheme(&description)
        })
    }

    pub fn suggest_name(&self, sample: &str) -> OracleResult<String> {
        let sample = sample.to_owned();
        call_with_timeout(self.timeout, &self.rename, move |o| o.suggest_name(&sample))
    }

    pub fn is_useless(&self, sample: &str) -> OracleResult<bool> {
        let sample = sample.to_owned();
        call_with_timeout(self.timeout, &self.usefulness, move |o| {
            o.is_useless(&sample)
        })
    }

    pub fn review_code(&self, code: &str) -> OracleResult<String> {
        let code = code.to_owned();
        call_with_timeout(self.timeout, &self.code_review, move |o| {
            o.review_code(&code)
        })
    }

    pub fn image_text(&self, image: Vec<u8>) -> OracleResult<String> {
        call_with_timeout(self.timeout, &self.ocr, move |o| o.image_text(&image))
    }

    pub fn pdf_text(&self, pdf: Vec<u8>, max_chars: usize) -> OracleResult<String> {
        call_with_timeout(self.timeout, &self.pdf, move |o| o.pdf_text(&pdf, max_chars))
    }
}

/// Asks the scheme oracle for a scheme, falling back to the empty scheme.
pub fn scheme_from_description(oracles: &Oracles, description: &str) -> ClassificationScheme {
    match oracles.generate_scheme(description) {
        Ok(scheme) => scheme,
        Err(e) => {
            warn!(error = %e, "could not generate a classification scheme, using MIME defaults");
            ClassificationScheme::new()
        }
    }
}

/// Fallback text recorded when a code review cannot be obtained.
pub const REVIEW_FALLBACK: &str = "Unable to review the file.";

/// Asks for a code review, degrading to [`REVIEW_FALLBACK`].
pub fn review_or_fallback(oracles: &Oracles, code: &str) -> String {
    match oracles.review_code(code) {
        Ok(review) if !review.trim().is_empty() => review.trim().to_string(),
        Ok(_) => REVIEW_FALLBACK.to_string(),
        Err(e) => {
            debug!(error = %e, "code review unavailable");
            REVIEW_FALLBACK.to_string()
        }
    }
}
