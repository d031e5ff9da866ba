//! Configuration types for page-triaged text extraction.
//!
//! Every knob lives in [`ExtractionConfig`], built through
//! [`ExtractionConfigBuilder`]. The config is shared read-only between the
//! documents of a batch (`Arc<ExtractionConfig>`), so nothing in here is ever
//! mutated once `build()` returns.

use crate::analysis::MIN_TEXT_LENGTH;
use crate::cost::PricingTable;
use crate::error::TriageError;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use crate::transport::VisionTransport;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for an extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdftriage::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(150)
///     .model("claude-sonnet-4-20250514")
///     .provider_name("anthropic")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_previous_chars, 500);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Model identifier. Also the key into the pricing table.
    pub model: Option<String>,

    /// `edgequake_llm` provider name (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed transport. Takes precedence over everything above.
    pub transport: Option<Arc<dyn VisionTransport>>,

    /// Raw HTTP endpoint. Used instead of an `edgequake_llm` provider when set.
    pub http_endpoint: Option<HttpEndpoint>,

    /// Raster DPI for page images. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Longest rendered edge in pixels, whatever the DPI. Default: 2400.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Pages to process. Default: all.
    pub pages: PageSelection,

    /// Attempts and backoff for every remote call. Default: 5 attempts, 1 s base.
    pub retry: RetryPolicy,

    /// Pause after a page served by the model, before the next page. Default: 200 ms.
    pub request_delay: Duration,

    /// Trimmed-character threshold below which a page counts as near-empty. Default: 100.
    pub min_text_length: usize,

    /// Characters of the previous page sent as context. Default: 500.
    pub max_previous_chars: usize,

    /// Output budget for the table/diagram classifier. Default: 1000.
    pub classifier_max_tokens: u32,

    /// Output budget for visual extraction. Default: 9000.
    pub extraction_max_tokens: u32,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// What to assume when the classifier cannot be reached.
    pub classification_fallback: ClassificationFallback,

    /// Per remote call deadline. Expiry is retried like any transient failure.
    pub api_timeout_secs: Option<u64>,

    /// Deadline for the model-extraction step of one page. Expiry fails the page.
    pub page_timeout_secs: Option<u64>,

    /// Documents processed at once in directory mode. Default: 1.
    pub concurrency: usize,

    /// The single price list used for every page of the run.
    pub pricing: Arc<PricingTable>,

    /// Replaces the built-in extraction system prompt.
    pub extraction_prompt: Option<String>,

    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            transport: None,
            http_endpoint: None,
            dpi: 200,
            max_rendered_pixels: 2400,
            password: None,
            pages: PageSelection::default(),
            retry: RetryPolicy::default(),
            request_delay: Duration::from_millis(200),
            min_text_length: MIN_TEXT_LENGTH,
            max_previous_chars: 500,
            classifier_max_tokens: 1000,
            extraction_max_tokens: 9000,
            temperature: 0.0,
            classification_fallback: ClassificationFallback::default(),
            api_timeout_secs: None,
            page_timeout_secs: None,
            concurrency: 1,
            pricing: Arc::new(PricingTable::builtin()),
            extraction_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("transport", &self.transport.as_ref().map(|t| t.model_id().to_string()))
            .field("http_endpoint", &self.http_endpoint.as_ref().map(|e| &e.url))
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("retry", &self.retry)
            .field("request_delay", &self.request_delay)
            .field("min_text_length", &self.min_text_length)
            .field("max_previous_chars", &self.max_previous_chars)
            .field("classification_fallback", &self.classification_fallback)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("pricing_models", &self.pricing.len())
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model id used for pricing when no transport has been resolved yet.
    pub fn model_id(&self) -> &str {
        match (&self.transport, &self.model) {
            (Some(t), _) => t.model_id(),
            (None, Some(m)) => m,
            (None, None) => crate::transport::llm::DEFAULT_MODEL,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtractionConfigBuilder")
            .field(&self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn VisionTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn http_endpoint(mut self, endpoint: HttpEndpoint) -> Self {
        self.config.http_endpoint = Some(endpoint);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.config.request_delay = delay;
        self
    }

    pub fn min_text_length(mut self, n: usize) -> Self {
        self.config.min_text_length = n;
        self
    }

    pub fn max_previous_chars(mut self, n: usize) -> Self {
        self.config.max_previous_chars = n;
        self
    }

    pub fn classifier_max_tokens(mut self, n: u32) -> Self {
        self.config.classifier_max_tokens = n;
        self
    }

    pub fn extraction_max_tokens(mut self, n: u32) -> Self {
        self.config.extraction_max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn classification_fallback(mut self, fallback: ClassificationFallback) -> Self {
        self.config.classification_fallback = fallback;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = Some(secs);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn pricing(mut self, table: Arc<PricingTable>) -> Self {
        self.config.pricing = table;
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, TriageError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(TriageError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(TriageError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.retry.max_attempts == 0 {
            return Err(TriageError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.retry.base_delay.is_zero() {
            return Err(TriageError::InvalidConfig(
                "retry base delay must be > 0".into(),
            ));
        }
        if c.classifier_max_tokens == 0 || c.extraction_max_tokens == 0 {
            return Err(TriageError::InvalidConfig(
                "max tokens must be ≥ 1".into(),
            ));
        }
        if matches!(c.api_timeout_secs, Some(0)) || matches!(c.page_timeout_secs, Some(0)) {
            return Err(TriageError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || end < start {
                return Err(TriageError::InvalidConfig(format!(
                    "invalid page range {start}-{end}"
                )));
            }
        }
        if let Some(ref ep) = c.http_endpoint {
            if !(ep.url.starts_with("http://") || ep.url.starts_with("https://")) {
                return Err(TriageError::InvalidConfig(format!(
                    "endpoint must be an http(s) URL, got '{}'",
                    ep.url
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What to assume about a page when the classifier fails after every retry.
///
/// | Variant | Verdict used |
/// |---------|--------------|
/// | `AssumeNoTable` | `false`: the page goes to the deterministic extractor |
/// | `PreferModelWhenImages` | `true` if the page embeds images, else `false` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationFallback {
    #[default]
    AssumeNoTable,
    PreferModelWhenImages,
}

impl ClassificationFallback {
    pub fn verdict(self, has_images: bool) -> bool {
        match self {
            Self::AssumeNoTable => false,
            Self::PreferModelWhenImages => has_images,
        }
    }
}

/// Wire dialect of a raw HTTP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpDialect {
    AnthropicMessages,
    OpenAiChat,
}

/// A raw JSON endpoint for the visual model.
#[derive(Clone, Serialize, Deserialize)]
pub struct HttpEndpoint {
    pub url: String,
    pub api_key: Option<String>,
    pub dialect: HttpDialect,
}

impl fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEndpoint")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dialect", &self.dialect)
            .finish()
    }
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    #[default]
    All,
    /// A single page (1-indexed). Out of range is an error.
    Single(usize),
    /// Contiguous range (1-indexed, inclusive), clipped to the document.
    Range(usize, usize),
    /// Specific pages (1-indexed). Out-of-range entries are dropped.
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand to a sorted, deduplicated list of 1-indexed page numbers.
    ///
    /// A `Single` page outside `[1, total_pages]` is an error; the other
    /// variants clip silently.
    pub fn resolve(&self, total_pages: usize) -> Result<Vec<usize>, TriageError> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![*p]
                } else {
                    return Err(TriageError::PageOutOfRange {
                        page: *p,
                        total: total_pages,
                    });
                }
            }
            PageSelection::Range(start, end) => ((*start).max(1)..=(*end).min(total_pages)).collect(),
            PageSelection::Set(pages) => pages
                .iter()
                .copied()
                .filter(|&p| p >= 1 && p <= total_pages)
                .collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        Ok(pages)
    }
}
