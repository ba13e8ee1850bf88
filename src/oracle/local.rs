//! Text extraction that runs on this machine: OCR through the `tesseract`
//! binary and PDF text through `pdf-extract`.

use super::{OcrOracle, PdfTextOracle};
use crate::error::{OracleError, OracleResult};
use crate::sampler::truncate_chars;
use pdf_extract::{Document, PlainTextOutput};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// OCR via the tesseract command line tool, image piped through stdin.
///
/// A tesseract process that outlives its timeout is killed.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl OcrOracle for TesseractOcr {
    fn image_text(&self, image: &[u8]) -> OracleResult<String> {
        let handle = duct::cmd(&self.binary, ["stdin", "stdout"])
            .stdin_bytes(image.to_vec())
            .stdout_capture()
            .stderr_null()
            .start()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    OracleError::Unavailable(format!("'{}' not found", self.binary))
                }
                _ => OracleError::Process(e.to_string()),
            })?;

        let deadline = Instant::now() + self.timeout;
        loop {
            match handle.try_wait() {
                Ok(Some(output)) => {
                    let text = String::from_utf8_lossy(&output.stdout);
                    return Ok(text.trim_end_matches(['\n', '\r']).to_string());
                }
                Ok(None) if Instant::now() >= deadline => {
                    if let Err(e) = handle.kill() {
                        warn!(binary = %self.binary, error = %e, "could not kill tesseract");
                    }
                    return Err(OracleError::Timeout(self.timeout));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(OracleError::Process(e.to_string())),
            }
        }
    }
}

/// PDF text extraction, page by page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfTextOracle for PdfExtractor {
    fn pdf_text(&self, pdf: &[u8], max_chars: usize) -> OracleResult<String> {
        // pdf-extract can panic on malformed fonts.
        panic::catch_unwind(AssertUnwindSafe(|| {
            let mut doc =
                Document::load_mem(pdf).map_err(|e| OracleError::Process(e.to_string()))?;
            if doc.is_encrypted() {
                doc.decrypt("")
                    .map_err(|e| OracleError::Process(e.to_string()))?;
            }

            let page_count = doc.get_pages().len() as u32;
            let pages = (1..=page_count).map_while(|page_num| page_text(&doc, page_num));
            Ok(collect_pages(pages, max_chars))
        }))
        .map_err(|_| OracleError::Process("PDF extraction panicked".to_string()))?
    }
}

/// Text of one page. Pages are only parsed when asked for, so a sample
/// never costs more pages than it needs.
fn page_text(doc: &Document, page_num: u32) -> Option<String> {
    let mut text = String::new();
    let result = {
        let mut output = PlainTextOutput::new(&mut text);
        pdf_extract::output_doc_page(doc, &mut output, page_num)
    };
    match result {
        Ok(()) => Some(text),
        Err(e) => {
            debug!(page = page_num, error = %e, "stopping at unreadable page");
            None
        }
    }
}

/// Appends pages until `max_chars` characters are reached, then cuts at exactly `max_chars`.
fn collect_pages<I>(pages: I, max_chars: usize) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut text = String::new();
    let mut chars = 0;
    for (index, page) in pages.into_iter().enumerate() {
        chars += page.chars().count();
        text.push_str(&page);
        if chars >= max_chars {
            debug!(pages = index + 1, "PDF sample complete");
            return truncate_chars(&text, max_chars);
        }
    }
    text
}
