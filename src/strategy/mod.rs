//! Extraction strategies and the pure rule that picks one per page.
//!
//! ```text
//! features ──▶ needs_classification? ──no──▶ Model
//!                     │ yes
//!                     ▼
//!              classifier verdict ──true──▶ Model
//!                     │ false
//!                     ▼
//!               Deterministic
//! ```

pub mod deterministic;
pub mod model;

pub use deterministic::DeterministicExtractor;
pub use model::{Classification, ModelExtractor, ModelSettings};

use crate::analysis::PageFeatures;
use crate::error::PageError;
use crate::output::UsageMetrics;
use crate::pipeline::render::RenderedPage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which extractor served a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The document's own text layer.
    Deterministic,
    /// The remote visual model.
    Model,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Deterministic => "deterministic",
            Strategy::Model => "model",
        })
    }
}

/// `true` unless the features alone already force the model.
pub fn needs_classification(features: &PageFeatures) -> bool {
    !features.has_almost_no_text && !features.is_image_based
}

/// Pick the strategy for a page. First match wins:
///
/// 1. almost no text → Model
/// 2. image-based → Model
/// 3. classifier saw a table or diagram → Model
/// 4. otherwise → Deterministic
pub fn select(features: &PageFeatures, has_table_or_diagram: bool) -> Strategy {
    if features.has_almost_no_text || features.is_image_based || has_table_or_diagram {
        Strategy::Model
    } else {
        Strategy::Deterministic
    }
}

/// Text produced for one page, with what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub text: String,
    pub usage: UsageMetrics,
    pub elapsed: Duration,
}

/// One way of turning a page into text.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> Strategy;

    /// Extract `page`. `previous` is the prior page's cleaned text, or empty.
    async fn extract(&self, page: &RenderedPage, previous: &str) -> Result<Extraction, PageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, MIN_TEXT_LENGTH};

    #[test]
    fn empty_image_page_forces_model_without_classifier() {
        let f = analyze("", 1, 10_000.0, MIN_TEXT_LENGTH);
        assert!(!needs_classification(&f));
        assert_eq!(select(&f, false), Strategy::Model);
        assert_eq!(select(&f, true), Strategy::Model);
    }

    #[test]
    fn short_text_without_images_still_forces_model() {
        let f = analyze("Figure 3", 0, 10_000.0, MIN_TEXT_LENGTH);
        assert!(!needs_classification(&f));
        assert_eq!(select(&f, false), Strategy::Model);
    }

    #[test]
    fn text_page_follows_classifier_verdict() {
        let f = analyze(&"x".repeat(800), 0, 10_000.0, MIN_TEXT_LENGTH);
        assert!(needs_classification(&f));
        assert_eq!(select(&f, false), Strategy::Deterministic);
        assert_eq!(select(&f, true), Strategy::Model);
    }

    #[test]
    fn selection_is_pure() {
        let f = analyze(&"y".repeat(150), 2, 500.0, MIN_TEXT_LENGTH);
        for verdict in [false, true] {
            let first = select(&f, verdict);
            for _ in 0..10 {
                assert_eq!(select(&f, verdict), first);
            }
        }
    }

    #[test]
    fn strategy_serialises_snake_case() {
        assert_eq!(serde_json::to_string(&Strategy::Model).unwrap(), "\"model\"");
        assert_eq!(Strategy::Deterministic.to_string(), "deterministic");
    }
}
