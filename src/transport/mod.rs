//! Remote visual-extraction service boundary.
//!
//! The model is an opaque, possibly-unreliable text-in/text-out service that
//! also reports token usage. Everything above this module talks to it through
//! [`VisionTransport`]; retries are *not* done here but in
//! [`crate::retry::RetryingInvoker`].
//!
//! Two implementations ship with the crate:
//!
//! * [`LlmProviderTransport`] — any `edgequake_llm` provider (OpenAI,
//!   Anthropic, Gemini, Ollama, …).
//! * [`HttpTransport`] — a raw JSON endpoint, with the wire dialect supplied
//!   by a [`ResponseAdapter`].

pub mod adapter;
pub mod http;
pub mod llm;

pub use adapter::{AnthropicMessagesAdapter, OpenAiChatAdapter, ResponseAdapter};
pub use http::HttpTransport;
pub use llm::{resolve_provider, LlmProviderTransport};

use crate::config::{ExtractionConfig, HttpDialect};
use crate::error::{TransportError, TriageError};
use crate::output::UsageMetrics;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One request to the visual model: a system prompt, one page image, and an
/// optional user text block.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub system_prompt: String,
    /// PNG bytes of the page raster.
    pub image_png: Arc<[u8]>,
    /// Extra text sent alongside the image (e.g. previous-page context).
    pub user_text: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The model's reply plus what it cost in tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub text: String,
    pub usage: UsageMetrics,
}

/// Result of parsing a loosely-structured reply.
///
/// Parsers never throw on unexpected input: they hand back the raw text and
/// let the caller choose a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    Unparsed(String),
}

impl<T> ParseOutcome<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::Unparsed(_) => None,
        }
    }
}

/// A remote service that reads a page image and answers in text.
#[async_trait]
pub trait VisionTransport: Send + Sync {
    /// Perform exactly one remote call.
    async fn invoke(&self, request: &VisionRequest) -> Result<TransportResponse, TransportError>;

    /// Model identifier used for pricing.
    fn model_id(&self) -> &str;
}

/// Pick the transport for a run: a pre-built one, a raw HTTP endpoint, or an
/// `edgequake_llm` provider resolved from config and environment.
pub fn build_transport(config: &ExtractionConfig) -> Result<Arc<dyn VisionTransport>, TriageError> {
    if let Some(ref transport) = config.transport {
        return Ok(Arc::clone(transport));
    }

    let api_timeout = config.api_timeout_secs.map(Duration::from_secs);
    if let Some(ref ep) = config.http_endpoint {
        let model = config.model_id().to_string();
        info!("Using HTTP endpoint {} ({:?}) with model '{}'", ep.url, ep.dialect, model);
        let transport: Arc<dyn VisionTransport> = match ep.dialect {
            HttpDialect::AnthropicMessages => Arc::new(HttpTransport::new(
                &ep.url,
                ep.api_key.clone(),
                model,
                AnthropicMessagesAdapter::default(),
                api_timeout,
            )?),
            HttpDialect::OpenAiChat => Arc::new(HttpTransport::new(
                &ep.url,
                ep.api_key.clone(),
                model,
                OpenAiChatAdapter,
                api_timeout,
            )?),
        };
        return Ok(transport);
    }

    Ok(Arc::new(LlmProviderTransport::from_config(config)?))
}

/// HTTP status codes that mean "slow down". Whole numbers only, so token
/// counts such as `14290` in an error message never match.
static RE_THROTTLE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b429\b").unwrap());

static RE_TRANSIENT_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:500|502|503|504|529)\b").unwrap());

/// Classify a failure by its message text.
///
/// Providers surface errors as strings more often than as structured codes,
/// so this looks for the usual throttling and transient markers.
pub fn classify_error_message(message: &str) -> TransportError {
    let lower = message.to_lowercase();
    const THROTTLE_MARKERS: &[&str] = &[
        "rate limit",
        "ratelimit",
        "rate_limit",
        "throttl",
        "too many requests",
        "toomanyrequests",
    ];
    const TRANSIENT_MARKERS: &[&str] = &[
        "timeout",
        "timed out",
        "connection",
        "temporarily unavailable",
        "overloaded",
    ];

    if RE_THROTTLE_STATUS.is_match(&lower) || THROTTLE_MARKERS.iter().any(|m| lower.contains(m)) {
        TransportError::throttled(message)
    } else if RE_TRANSIENT_STATUS.is_match(&lower)
        || TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
    {
        TransportError::transient(message)
    } else {
        TransportError::fatal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[test]
    fn classifies_throttling() {
        for msg in [
            "HTTP 429 Too Many Requests",
            "ThrottlingException: Rate exceeded",
            "TooManyRequestsException",
            "rate limit reached for gpt-4.1",
        ] {
            assert_eq!(classify_error_message(msg).kind, TransportErrorKind::Throttled, "{msg}");
        }
    }

    #[test]
    fn classifies_transient() {
        for msg in [
            "request timed out",
            "connection reset by peer",
            "503 Service Unavailable",
            "upstream returned status 529",
        ] {
            assert_eq!(classify_error_message(msg).kind, TransportErrorKind::Transient, "{msg}");
        }
    }

    #[test]
    fn everything_else_is_fatal() {
        for msg in [
            "401 Unauthorized: invalid api key",
            "ValidationException: bad image",
            "400 Bad Request: This model's maximum context length is 128000 tokens. \
             However, you requested 150042 tokens",
            "400 invalid_request_error: prompt is 14290 tokens, max is 8192",
        ] {
            assert_eq!(classify_error_message(msg).kind, TransportErrorKind::Fatal, "{msg}");
        }
    }

    #[test]
    fn parse_outcome_accessor() {
        assert_eq!(ParseOutcome::Parsed(3).parsed(), Some(3));
        assert_eq!(ParseOutcome::<i32>::Unparsed("x".into()).parsed(), None);
    }
}
