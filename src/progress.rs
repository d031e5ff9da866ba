//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] through
//! [`crate::config::ExtractionConfigBuilder::progress_callback`]. Callers can
//! forward events to a progress bar, a channel or a log without the library
//! knowing about any of them.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftriage::{ExtractionConfig, ExtractionProgressCallback, Strategy};
//! use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
//!
//! struct TokenCounter(AtomicU64);
//!
//! impl ExtractionProgressCallback for TokenCounter {
//!     fn on_page_complete(&self, page: usize, total: usize, strategy: Strategy, tokens: u64) {
//!         self.0.fetch_add(tokens, Ordering::SeqCst);
//!         eprintln!("page {page}/{total} via {strategy}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(TokenCounter(AtomicU64::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::strategy::Strategy;
use std::sync::Arc;

/// Receives events as documents and pages are processed.
///
/// Pages within one document arrive in order, but in directory mode with
/// `concurrency > 1` events from different documents interleave, so
/// implementations must be `Send + Sync`. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once per document, before its first page.
    fn on_document_start(&self, file_name: &str, total_pages: usize) {
        let _ = (file_name, total_pages);
    }

    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page produced content.
    fn on_page_complete(&self, page: usize, total_pages: usize, strategy: Strategy, tokens: u64) {
        let _ = (page, total_pages, strategy, tokens);
    }

    /// Called when a page ended with sentinel content.
    fn on_page_error(&self, page: usize, total_pages: usize, error: &str) {
        let _ = (page, total_pages, error);
    }

    /// Called once per document after its last page.
    fn on_document_complete(&self, file_name: &str, total_pages: usize, succeeded: usize) {
        let _ = (file_name, total_pages, succeeded);
    }
}

/// Does nothing. Used when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        model_pages: AtomicUsize,
        errors: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for Tracking {
        fn on_page_start(&self, _page: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page: usize, _total: usize, strategy: Strategy, _tokens: u64) {
            if strategy == Strategy::Model {
                self.model_pages.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_page_error(&self, page: usize, _total: usize, error: &str) {
            self.errors.lock().unwrap().push(format!("{page}: {error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start("a.pdf", 2);
        cb.on_page_start(1, 2);
        cb.on_page_complete(1, 2, Strategy::Deterministic, 0);
        cb.on_page_error(2, 2, "boom");
        cb.on_document_complete("a.pdf", 2, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let t = Tracking::default();
        t.on_page_start(1, 3);
        t.on_page_complete(1, 3, Strategy::Model, 120);
        t.on_page_start(2, 3);
        t.on_page_complete(2, 3, Strategy::Deterministic, 0);
        t.on_page_start(3, 3);
        t.on_page_error(3, 3, "timed out");

        assert_eq!(t.starts.load(Ordering::SeqCst), 3);
        assert_eq!(t.model_pages.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.lock().unwrap().as_slice(), ["3: timed out"]);
    }
}
