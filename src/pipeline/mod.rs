//! Pipeline stages for page-triaged extraction.
//!
//! ```text
//! input ──▶ render ──▶ page (analyze → classify → extract → clean → cost)
//! (path)    (pdfium)     │
//!                        └─ encode (PNG → base64 for request bodies)
//! ```
//!
//! 1. [`input`]  — validate a PDF path or discover PDFs under a directory
//! 2. [`render`] — per-page text, image count, geometry and PNG raster via
//!    pdfium, in `spawn_blocking`
//! 3. [`page`]   — the per-page state machine producing a `PageResult`
//! 4. [`clean`]  — strip echoed tags and code fences from model replies
//! 5. [`encode`] — PNG / base64 helpers shared by the transports

pub mod clean;
pub mod encode;
pub mod input;
pub mod page;
pub mod render;
