//! # edgequake-pdftriage
//!
//! Extract text from PDFs page by page, spending model tokens only where the
//! document's own text layer is not good enough.
//!
//! For each page the crate measures cheap features (text length, embedded
//! images, text density). Near-empty and scanned pages go straight to a
//! vision model; text pages are shown to a classifier that asks whether they
//! hold a table or complex diagram; everything else is read from the text
//! layer at zero cost. Token usage and USD cost are tracked per page and per
//! document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path / discover PDFs in a directory
//!  ├─ 2. Render    per-page text, image count, PNG raster (pdfium, spawn_blocking)
//!  ├─ 3. Analyze   PageFeatures
//!  ├─ 4. Classify  table/diagram gate (model, skipped when features decide)
//!  ├─ 5. Extract   text layer or vision model (+ previous-page context)
//!  ├─ 6. Clean     strip echoed tags and code fences
//!  ├─ 7. Cost      one pricing table for every call
//!  └─ 8. Output    metrics.json + pages/N.md + <stem>.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdftriage::{extract_document, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::builder()
//!         .model("claude-sonnet-4-20250514")
//!         .provider_name("anthropic")
//!         .build()?;
//!     let report = extract_document("document.pdf", &config).await?;
//!     for page in &report.pages {
//!         println!("page {} via {}: {} tokens", page.page_number, page.strategy, page.usage.total_tokens());
//!     }
//!     eprintln!("total: ${:.4}", report.total_cost_usd);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftriage` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analysis;
pub mod config;
pub mod convert;
pub mod cost;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod session;
pub mod strategy;
pub mod transport;
pub mod writer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analysis::{analyze, PageFeatures, MIN_TEXT_LENGTH};
pub use config::{
    ClassificationFallback, ExtractionConfig, ExtractionConfigBuilder, HttpDialect, HttpEndpoint,
    PageSelection,
};
pub use convert::{
    extract_batch, extract_document, extract_from_bytes, extract_pages, extract_path,
    extract_sync, extract_to_dir,
};
pub use cost::{CostMeter, ModelPrice, PricingTable};
pub use error::{InvokeError, PageError, TransportError, TransportErrorKind, TriageError};
pub use output::{
    BatchOutcome, ClassificationOutcome, DocumentFailure, DocumentMetrics, DocumentReport,
    PageResult, UsageMetrics,
};
pub use pipeline::page::PagePipeline;
pub use pipeline::render::{PageSource, PdfiumDocument, RenderedPage};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::{RecordingSleeper, RetryPolicy, RetryingInvoker, Sleeper, TokioSleeper};
pub use session::DocumentSession;
pub use strategy::{select, Strategy};
pub use transport::{
    ParseOutcome, TransportResponse, VisionRequest, VisionTransport,
};
pub use writer::{write_outputs, WrittenOutputs};
