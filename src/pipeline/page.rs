//! Per-page state machine.
//!
//! ```text
//! Analyzed ─▶ ClassificationSkipped ─┐
//!    └──────▶ Classified ────────────┴─▶ StrategyChosen ─▶ Extracted ─▶ Cleaned ─▶ Costed ─▶ Done
//! ```
//!
//! [`PagePipeline::process`] always reaches `Done` exactly once and always
//! returns a [`PageResult`]. Extraction failures produce a degraded result
//! (sentinel content, zero usage, zero cost, `error` set) instead of an `Err`,
//! so one bad page never stops the document.

use crate::analysis::{analyze, PageFeatures};
use crate::config::{ClassificationFallback, ExtractionConfig};
use crate::cost::CostMeter;
use crate::error::{PageError, TriageError};
use crate::output::{ClassificationOutcome, PageResult, UsageMetrics};
use crate::pipeline::render::RenderedPage;
use crate::retry::{RetryingInvoker, Sleeper, TokioSleeper};
use crate::strategy::{
    needs_classification, select, Classification, DeterministicExtractor, Extraction,
    ExtractionStrategy, ModelExtractor, ModelSettings, Strategy,
};
use crate::transport::VisionTransport;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Content prefix of a page whose model extraction failed.
pub const MODEL_FAILURE_MARKER: &str = "[ERROR] VLM extraction failed";

/// Content prefix of a page whose text layer could not be read.
pub const TEXT_FAILURE_MARKER: &str = "[ERROR] text extraction failed";

/// Content prefix of a page the document backend could not load.
pub const LOAD_FAILURE_MARKER: &str = "[ERROR] page could not be loaded";

pub struct PagePipeline {
    deterministic: DeterministicExtractor,
    model: ModelExtractor,
    cost: CostMeter,
    min_text_length: usize,
    fallback: ClassificationFallback,
    page_timeout: Option<Duration>,
}

impl std::fmt::Debug for PagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePipeline")
            .field("model", &self.model)
            .field("min_text_length", &self.min_text_length)
            .field("fallback", &self.fallback)
            .field("page_timeout", &self.page_timeout)
            .finish()
    }
}

impl PagePipeline {
    /// Pipeline whose backoff sleeps on the tokio timer.
    pub fn new(config: &ExtractionConfig, transport: Arc<dyn VisionTransport>) -> Self {
        Self::with_sleeper(config, transport, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        config: &ExtractionConfig,
        transport: Arc<dyn VisionTransport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let cost = CostMeter::new(Arc::clone(&config.pricing), transport.model_id());
        let invoker = RetryingInvoker::new(config.retry, sleeper);
        Self {
            deterministic: DeterministicExtractor,
            model: ModelExtractor::new(transport, invoker, ModelSettings::from_config(config)),
            cost,
            min_text_length: config.min_text_length,
            fallback: config.classification_fallback,
            page_timeout: config.page_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Process one page. `previous` is the prior page's cleaned text, or empty.
    pub async fn process(&self, page: &RenderedPage, previous: &str) -> PageResult {
        let start = Instant::now();
        let n = page.number;

        let features = analyze(&page.text, page.image_count, page.area(), self.min_text_length);
        debug!(
            "Page {}: Analyzed (text_length={}, has_images={}, density={:.4})",
            n, features.text_length, features.has_images, features.text_density
        );

        let (classification, classifier_usage) = self.classify(page, &features).await;
        let strategy = select(&features, classification.has_table_or_diagram());
        debug!("Page {}: StrategyChosen {}", n, strategy);

        match self.run_strategy(strategy, page, previous).await {
            Ok(extraction) => {
                debug!(
                    "Page {}: Extracted + Cleaned ({} chars in {:.2}s)",
                    n,
                    extraction.text.chars().count(),
                    extraction.elapsed.as_secs_f64()
                );
                let usage = classifier_usage + extraction.usage;
                let cost_usd = self.cost.cost(&usage);
                debug!("Page {}: Costed ({} tokens, ${:.6})", n, usage.total_tokens(), cost_usd);

                PageResult {
                    page_number: n,
                    strategy,
                    content: extraction.text,
                    usage,
                    classifier_usage,
                    extractor_usage: extraction.usage,
                    classification,
                    elapsed_seconds: start.elapsed().as_secs_f64(),
                    cost_usd,
                    error: None,
                }
            }
            Err(e) => {
                error!("Page {}: {} extraction failed: {}", n, strategy, e.reason());
                let marker = match strategy {
                    Strategy::Model => MODEL_FAILURE_MARKER,
                    Strategy::Deterministic => TEXT_FAILURE_MARKER,
                };
                PageResult {
                    page_number: n,
                    strategy,
                    content: format!("{}: {}", marker, e.reason()),
                    usage: UsageMetrics::ZERO,
                    classifier_usage,
                    extractor_usage: UsageMetrics::ZERO,
                    classification,
                    elapsed_seconds: start.elapsed().as_secs_f64(),
                    cost_usd: 0.0,
                    error: Some(e),
                }
            }
        }
    }

    /// Result for a page the backend failed to hand over.
    ///
    /// No model was called, so the page is recorded as deterministic with
    /// zero usage and cost.
    pub fn load_failed(&self, number: usize, cause: &TriageError, elapsed: Duration) -> PageResult {
        let error = PageError::LoadFailed {
            page: number,
            detail: cause.to_string(),
        };
        PageResult {
            page_number: number,
            strategy: Strategy::Deterministic,
            content: format!("{}: {}", LOAD_FAILURE_MARKER, error.reason()),
            usage: UsageMetrics::ZERO,
            classifier_usage: UsageMetrics::ZERO,
            extractor_usage: UsageMetrics::ZERO,
            classification: ClassificationOutcome::Skipped,
            elapsed_seconds: elapsed.as_secs_f64(),
            cost_usd: 0.0,
            error: Some(error),
        }
    }

    async fn classify(
        &self,
        page: &RenderedPage,
        features: &PageFeatures,
    ) -> (ClassificationOutcome, UsageMetrics) {
        if !needs_classification(features) {
            debug!("Page {}: ClassificationSkipped", page.number);
            return (ClassificationOutcome::Skipped, UsageMetrics::ZERO);
        }

        match self.model.classify(&page.png).await {
            Classification::Verdict {
                has_table_or_diagram,
                usage,
            } => {
                debug!("Page {}: Classified has_table_or_diagram={}", page.number, has_table_or_diagram);
                (ClassificationOutcome::Verdict(has_table_or_diagram), usage)
            }
            Classification::Degraded { reason } => {
                let verdict = self.fallback.verdict(features.has_images);
                warn!(
                    "Page {}: classification degraded ({}); assuming has_table_or_diagram={}",
                    page.number, reason, verdict
                );
                (ClassificationOutcome::Degraded(verdict), UsageMetrics::ZERO)
            }
        }
    }

    async fn run_strategy(
        &self,
        strategy: Strategy,
        page: &RenderedPage,
        previous: &str,
    ) -> Result<Extraction, PageError> {
        let extractor: &dyn ExtractionStrategy = match strategy {
            Strategy::Deterministic => &self.deterministic,
            Strategy::Model => &self.model,
        };
        debug!("Page {}: Extracting via {}", page.number, extractor.kind());
        let extraction = extractor.extract(page, previous);

        match (strategy, self.page_timeout) {
            (Strategy::Model, Some(limit)) => tokio::time::timeout(limit, extraction)
                .await
                .unwrap_or_else(|_| {
                    Err(PageError::Timeout {
                        page: page.number,
                        secs: limit.as_secs(),
                    })
                }),
            _ => extraction.await,
        }
    }
}
