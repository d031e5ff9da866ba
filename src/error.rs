//! Error types for the edgequake-pdftriage library.
//!
//! Four error types, one per layer:
//!
//! * [`TriageError`] — **Fatal for one document**: the file cannot be opened,
//!   is not a PDF, needs a password, or no transport could be configured.
//!   Returned as `Err(TriageError)` from the top-level `extract*` functions.
//!   In batch mode the failure is recorded and the next document proceeds.
//!
//! * [`PageError`] — **Non-fatal**: model extraction failed for one page.
//!   Stored inside [`crate::output::PageResult`] next to the sentinel content
//!   so the report stays auditable.
//!
//! * [`TransportError`] — a single failed remote call, tagged with a
//!   [`TransportErrorKind`] that drives the retry decision.
//!
//! * [`InvokeError`] — what the retry wrapper gives up with.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal (document-level) errors returned by the library.
#[derive(Debug, Error)]
pub enum TriageError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path does not exist.
    #[error("Path not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not a PDF (wrong extension or magic bytes).
    #[error("File is not a PDF: '{path}'")]
    NotAPdf { path: PathBuf },

    /// A directory was given but it contains no PDF files.
    #[error("No PDF files found under '{path}'")]
    NoPdfFiles { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range [1, {total}]")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium failed to load, read or rasterise a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pricing file could not be read or parsed.
    #[error("Invalid pricing table '{path}': {detail}")]
    InvalidPricing { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// The page still appears in the report, with sentinel content and zero
/// usage, so totals stay auditable.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The backend handed us a page that cannot be addressed.
    #[error("Page {page}: invalid page handle")]
    InvalidPage { page: usize },

    /// Model extraction failed (retries exhausted or a fatal transport error).
    #[error("Page {page}: model extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The page did not finish before the configured deadline.
    #[error("Page {page}: extraction timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The backend could not read or rasterise the page.
    #[error("Page {page}: could not be loaded: {detail}")]
    LoadFailed { page: usize, detail: String },
}

impl PageError {
    /// The failure reason without the page prefix.
    pub fn reason(&self) -> String {
        match self {
            PageError::InvalidPage { .. } => "invalid page handle".to_string(),
            PageError::ExtractionFailed { detail, .. } => detail.clone(),
            PageError::Timeout { secs, .. } => format!("timed out after {secs}s"),
            PageError::LoadFailed { detail, .. } => detail.clone(),
        }
    }
}

/// How the retry wrapper should treat a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Explicit throttling / rate-limit signal (HTTP 429 and friends).
    Throttled,
    /// Network hiccup, timeout or 5xx: worth another attempt.
    Transient,
    /// Malformed request, auth failure, unreadable response: retrying won't help.
    Fatal,
}

impl TransportErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Throttled | Self::Transient)
    }
}

/// One failed call to the remote visual-extraction service.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn throttled(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Throttled,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Terminal failure of a retried remote operation.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    /// Every attempt failed with a retryable error.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: TransportError,
    },

    /// The call failed with an error that must not be retried.
    #[error("{operation} failed: {source}")]
    Fatal {
        operation: String,
        #[source]
        source: TransportError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_out_of_range_display() {
        let e = TriageError::PageOutOfRange { page: 7, total: 3 };
        assert_eq!(e.to_string(), "Page 7 is out of range [1, 3]");
    }

    #[test]
    fn retryable_kinds() {
        assert!(TransportError::throttled("429").is_retryable());
        assert!(TransportError::transient("reset").is_retryable());
        assert!(!TransportError::fatal("400").is_retryable());
    }

    #[test]
    fn retries_exhausted_names_operation_and_attempts() {
        let e = InvokeError::RetriesExhausted {
            operation: "VLM classifier".into(),
            attempts: 5,
            last_error: TransportError::throttled("slow down"),
        };
        let msg = e.to_string();
        assert!(msg.contains("VLM classifier"), "got: {msg}");
        assert!(msg.contains("5 attempts"), "got: {msg}");
    }

    #[test]
    fn page_error_serialises() {
        let e = PageError::ExtractionFailed {
            page: 2,
            detail: "boom".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("ExtractionFailed"));
    }

    #[test]
    fn load_failure_reason_is_the_backend_detail() {
        let e = PageError::LoadFailed {
            page: 4,
            detail: "Rasterisation failed for page 4: bad xref".into(),
        };
        assert_eq!(e.reason(), "Rasterisation failed for page 4: bad xref");
        assert!(e.to_string().starts_with("Page 4: could not be loaded"));
    }
}
