//! One document, start to finish.
//!
//! Pages run strictly in ascending order, one at a time: each page's cleaned
//! text is the next page's continuity context, so there is nothing to
//! parallelise inside a document. The session owns that previous-page text
//! and the running report totals.

use crate::config::ExtractionConfig;
use crate::output::{DocumentReport, DocumentReportBuilder};
use crate::pipeline::page::PagePipeline;
use crate::pipeline::render::PageSource;
use crate::progress::ProgressCallback;
use crate::retry::{Sleeper, TokioSleeper};
use crate::strategy::Strategy;
use crate::transport::VisionTransport;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

pub struct DocumentSession {
    pipeline: PagePipeline,
    sleeper: Arc<dyn Sleeper>,
    request_delay: Duration,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("pipeline", &self.pipeline)
            .field("request_delay", &self.request_delay)
            .finish()
    }
}

impl DocumentSession {
    pub fn new(config: &ExtractionConfig, transport: Arc<dyn VisionTransport>) -> Self {
        Self::with_sleeper(config, transport, Arc::new(TokioSleeper))
    }

    /// Session whose backoff and inter-page delays go through `sleeper`.
    pub fn with_sleeper(
        config: &ExtractionConfig,
        transport: Arc<dyn VisionTransport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            pipeline: PagePipeline::with_sleeper(config, transport, Arc::clone(&sleeper)),
            sleeper,
            request_delay: config.request_delay,
            progress: config.progress_callback.clone(),
        }
    }

    /// Process `pages` (1-indexed, ascending) of `source`.
    ///
    /// Every page ends up in the report. A page that fails to load or
    /// extract is recorded with failure content and the next page carries on.
    pub async fn run(
        &self,
        file_name: &str,
        source: &dyn PageSource,
        pages: &[usize],
    ) -> DocumentReport {
        let total = pages.len();
        let mut builder = DocumentReportBuilder::new(file_name);
        let mut previous = String::new();

        info!("Processing {} ({} pages)", file_name, total);
        if let Some(ref cb) = self.progress {
            cb.on_document_start(file_name, total);
        }

        for (i, &number) in pages.iter().enumerate() {
            if let Some(ref cb) = self.progress {
                cb.on_page_start(number, total);
            }

            let started = Instant::now();
            let result = match source.load_page(number).await {
                Ok(page) => self.pipeline.process(&page, &previous).await,
                Err(e) => {
                    error!("{}: page {} could not be loaded: {}", file_name, number, e);
                    self.pipeline.load_failed(number, &e, started.elapsed())
                }
            };

            info!(
                "{} page {}/{}: {} ({} tokens, ${:.6}, {:.2}s)",
                file_name,
                number,
                total,
                result.strategy,
                result.usage.total_tokens(),
                result.cost_usd,
                result.elapsed_seconds
            );

            if let Some(ref cb) = self.progress {
                match &result.error {
                    None => cb.on_page_complete(
                        number,
                        total,
                        result.strategy,
                        result.usage.total_tokens(),
                    ),
                    Some(e) => cb.on_page_error(number, total, &e.to_string()),
                }
            }

            previous = if result.is_success() {
                result.content.clone()
            } else {
                String::new()
            };
            let served_by_model = result.strategy == Strategy::Model;
            builder.push(result);

            let is_last = i + 1 == total;
            if served_by_model && !is_last && !self.request_delay.is_zero() {
                self.sleeper.sleep(self.request_delay).await;
            }
        }

        let report = builder.finish();
        info!(
            "{}: {} pages, {} tokens, ${:.6}, {:.2}s ({} failed)",
            file_name,
            report.total_pages,
            report.total_tokens,
            report.total_cost_usd,
            report.total_time_seconds,
            report.failed_pages()
        );
        if let Some(ref cb) = self.progress {
            cb.on_document_complete(file_name, total, report.succeeded_pages());
        }
        report
    }
}
