//! The cheap path: return the page's own text layer.

use super::{Extraction, ExtractionStrategy, Strategy};
use crate::error::PageError;
use crate::output::UsageMetrics;
use crate::pipeline::render::RenderedPage;
use async_trait::async_trait;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct DeterministicExtractor;

impl DeterministicExtractor {
    /// Trimmed backend text. Page 0 is not an addressable page.
    pub fn extract_page(&self, page: &RenderedPage) -> Result<Extraction, PageError> {
        let start = Instant::now();
        if page.number == 0 {
            return Err(PageError::InvalidPage { page: 0 });
        }
        Ok(Extraction {
            text: page.text.trim().to_string(),
            usage: UsageMetrics::ZERO,
            elapsed: start.elapsed(),
        })
    }
}

#[async_trait]
impl ExtractionStrategy for DeterministicExtractor {
    fn kind(&self) -> Strategy {
        Strategy::Deterministic
    }

    async fn extract(&self, page: &RenderedPage, _previous: &str) -> Result<Extraction, PageError> {
        self.extract_page(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn page(number: usize, text: &str) -> RenderedPage {
        RenderedPage {
            number,
            text: text.to_string(),
            image_count: 0,
            width_pt: 612.0,
            height_pt: 792.0,
            png: Arc::from(Vec::new()),
        }
    }

    #[test]
    fn returns_trimmed_text_with_zero_usage() {
        let out = DeterministicExtractor
            .extract_page(&page(2, "\n  Body text.  \n"))
            .unwrap();
        assert_eq!(out.text, "Body text.");
        assert!(out.usage.is_zero());
    }

    #[test]
    fn page_zero_is_invalid() {
        let err = DeterministicExtractor.extract_page(&page(0, "x")).unwrap_err();
        assert_eq!(err, PageError::InvalidPage { page: 0 });
    }

    #[tokio::test]
    async fn trait_object_reports_its_kind() {
        let extractor: &dyn ExtractionStrategy = &DeterministicExtractor;
        assert_eq!(extractor.kind(), Strategy::Deterministic);
        let out = extractor.extract(&page(1, " a "), "ignored").await.unwrap();
        assert_eq!(out.text, "a");
    }
}
