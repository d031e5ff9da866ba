//! The expensive path: ask the remote visual model.
//!
//! Two kinds of call, both routed through [`RetryingInvoker`]:
//!
//! * **classify**: does this page hold a table or complex diagram?
//! * **extract**: verbatim text of the page, with a bounded slice of the
//!   previous page as continuity context.

use super::{Extraction, ExtractionStrategy, Strategy};
use crate::config::ExtractionConfig;
use crate::error::{InvokeError, PageError};
use crate::output::UsageMetrics;
use crate::pipeline::clean::{clean_extracted_text, strip_json_fences};
use crate::pipeline::render::RenderedPage;
use crate::prompts::{extraction_user_text, CLASSIFIER_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT};
use crate::retry::RetryingInvoker;
use crate::transport::{ParseOutcome, VisionRequest, VisionTransport};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const CLASSIFY_OPERATION: &str = "VLM classifier";
const EXTRACT_OPERATION: &str = "VLM extraction";

/// Request parameters for model calls.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub classifier_max_tokens: u32,
    pub extraction_max_tokens: u32,
    pub temperature: f32,
    pub max_previous_chars: usize,
    pub extraction_prompt: String,
}

impl ModelSettings {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            classifier_max_tokens: config.classifier_max_tokens,
            extraction_max_tokens: config.extraction_max_tokens,
            temperature: config.temperature,
            max_previous_chars: config.max_previous_chars,
            extraction_prompt: config
                .extraction_prompt
                .clone()
                .unwrap_or_else(|| EXTRACTION_SYSTEM_PROMPT.to_string()),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Classifier answer for one page.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Verdict {
        has_table_or_diagram: bool,
        usage: UsageMetrics,
    },
    /// Every attempt failed; no usage is reported.
    Degraded { reason: String },
}

/// Strict parse of `{"has_table_or_diagram": <bool>}`, fences stripped first.
pub fn parse_verdict(raw: &str) -> ParseOutcome<bool> {
    let stripped = strip_json_fences(raw);
    serde_json::from_str::<serde_json::Value>(&stripped)
        .ok()
        .and_then(|v| v.get("has_table_or_diagram").and_then(|b| b.as_bool()))
        .map_or_else(|| ParseOutcome::Unparsed(raw.to_string()), ParseOutcome::Parsed)
}

/// Verdict from a classifier reply, falling back to a substring search when
/// the reply is not the expected JSON. An empty reply is `false`.
pub fn interpret_verdict(raw: &str) -> bool {
    match parse_verdict(raw) {
        ParseOutcome::Parsed(v) => v,
        ParseOutcome::Unparsed(text) => {
            let lower = text.to_lowercase();
            lower.contains("true") || lower.contains("\"has_table_or_diagram\": true")
        }
    }
}

pub struct ModelExtractor {
    transport: Arc<dyn VisionTransport>,
    invoker: RetryingInvoker,
    settings: ModelSettings,
}

impl std::fmt::Debug for ModelExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelExtractor")
            .field("model", &self.transport.model_id())
            .field("invoker", &self.invoker)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ModelExtractor {
    pub fn new(
        transport: Arc<dyn VisionTransport>,
        invoker: RetryingInvoker,
        settings: ModelSettings,
    ) -> Self {
        Self {
            transport,
            invoker,
            settings,
        }
    }

    pub fn model_id(&self) -> &str {
        self.transport.model_id()
    }

    /// Ask whether the page image holds a table or complex diagram.
    ///
    /// Never fails: exhaustion or a fatal error becomes
    /// [`Classification::Degraded`] and the caller applies its fallback.
    pub async fn classify(&self, png: &Arc<[u8]>) -> Classification {
        let request = VisionRequest {
            system_prompt: CLASSIFIER_SYSTEM_PROMPT.to_string(),
            image_png: Arc::clone(png),
            user_text: None,
            max_tokens: self.settings.classifier_max_tokens,
            temperature: self.settings.temperature,
        };

        match self
            .invoker
            .invoke(CLASSIFY_OPERATION, || self.transport.invoke(&request))
            .await
        {
            Ok(response) => {
                let has_table_or_diagram = interpret_verdict(&response.text);
                debug!(
                    "Classifier verdict: has_table_or_diagram={} ({} tokens)",
                    has_table_or_diagram,
                    response.usage.total_tokens()
                );
                Classification::Verdict {
                    has_table_or_diagram,
                    usage: response.usage,
                }
            }
            Err(e) => {
                warn!("Classification degraded: {}", e);
                Classification::Degraded {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Verbatim text of the page image, cleaned.
    ///
    /// A non-empty `previous` is sent, bounded to
    /// `max_previous_chars` characters, inside `<previous_page>` tags.
    pub async fn extract_text(
        &self,
        png: &Arc<[u8]>,
        previous: &str,
    ) -> Result<Extraction, InvokeError> {
        let start = Instant::now();
        let request = VisionRequest {
            system_prompt: self.settings.extraction_prompt.clone(),
            image_png: Arc::clone(png),
            user_text: Some(extraction_user_text(
                previous,
                self.settings.max_previous_chars,
            )),
            max_tokens: self.settings.extraction_max_tokens,
            temperature: self.settings.temperature,
        };

        let response = self
            .invoker
            .invoke(EXTRACT_OPERATION, || self.transport.invoke(&request))
            .await?;

        Ok(Extraction {
            text: clean_extracted_text(&response.text),
            usage: response.usage,
            elapsed: start.elapsed(),
        })
    }
}

#[async_trait]
impl ExtractionStrategy for ModelExtractor {
    fn kind(&self) -> Strategy {
        Strategy::Model
    }

    async fn extract(&self, page: &RenderedPage, previous: &str) -> Result<Extraction, PageError> {
        self.extract_text(&page.png, previous)
            .await
            .map_err(|e| PageError::ExtractionFailed {
                page: page.number,
                detail: e.to_string(),
            })
    }
}
