//! [`VisionTransport`] over an `edgequake_llm` provider.
//!
//! Each call sends one system message and one user message carrying the page
//! PNG (plus optional text). Provider errors are strings; they are sorted into
//! throttled / transient / fatal by [`super::classify_error_message`].

use super::{classify_error_message, TransportResponse, VisionRequest, VisionTransport};
use crate::config::ExtractionConfig;
use crate::error::{TransportError, TriageError};
use crate::output::UsageMetrics;
use crate::pipeline::encode::png_image_data;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

pub struct LlmProviderTransport {
    provider: Arc<dyn LLMProvider>,
    model: String,
    api_timeout: Option<Duration>,
}

impl std::fmt::Debug for LlmProviderTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProviderTransport")
            .field("provider", &"<dyn LLMProvider>")
            .field("model", &self.model)
            .field("api_timeout", &self.api_timeout)
            .finish()
    }
}

impl LlmProviderTransport {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_timeout: None,
        }
    }

    /// Abort a single call after `timeout`; the abort counts as transient.
    pub fn with_api_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Resolve a provider from the configuration and wrap it.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, TriageError> {
        let (provider, model) = resolve_provider(config)?;
        info!("Using vision model '{}'", model);
        Ok(Self::new(provider, model)
            .with_api_timeout(config.api_timeout_secs.map(Duration::from_secs)))
    }
}

#[async_trait]
impl VisionTransport for LlmProviderTransport {
    async fn invoke(&self, request: &VisionRequest) -> Result<TransportResponse, TransportError> {
        let image = png_image_data(&request.image_png);
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(request.user_text.as_deref().unwrap_or(""), vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens as usize),
            ..Default::default()
        };

        let call = self.provider.chat(&messages, Some(&options));
        let response = match self.api_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(r) => r,
                Err(_) => {
                    return Err(TransportError::transient(format!(
                        "call timed out after {}s",
                        limit.as_secs()
                    )))
                }
            },
            None => call.await,
        }
        .map_err(|e| classify_error_message(&e.to_string()))?;

        let usage = UsageMetrics::new(
            response.prompt_tokens as u64,
            response.completion_tokens as u64,
        );
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.model,
            usage.prompt_tokens(),
            usage.completion_tokens()
        );
        Ok(TransportResponse {
            text: response.content,
            usage,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TriageError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TriageError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider and the model id it will be priced under.
///
/// Most specific wins:
///
/// 1. `config.provider` — a pre-built provider, used as-is.
/// 2. `config.provider_name` (+ `config.model`).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. `OPENAI_API_KEY` present → OpenAI.
/// 5. `ProviderFactory::from_env()` auto-detection.
pub fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<(Arc<dyn LLMProvider>, String), TriageError> {
    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref provider) = config.provider {
        let id = provider_model_id(provider.as_ref(), model);
        return Ok((Arc::clone(provider), id));
    }

    if let Some(ref name) = config.provider_name {
        return Ok((create_vision_provider(name, model)?, model.to_string()));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok((create_vision_provider(&prov, &env_model)?, env_model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((create_vision_provider("openai", model)?, model.to_string()));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TriageError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    let id = provider_model_id(llm_provider.as_ref(), model);
    info!("Auto-detected provider {} ({})", llm_provider.name(), id);
    Ok((llm_provider, id))
}

/// The model a provider will actually run, which is also its pricing key.
/// `fallback` only applies when the provider reports no model.
fn provider_model_id(provider: &dyn LLMProvider, fallback: &str) -> String {
    match provider.model() {
        "" => fallback.to_string(),
        m => m.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::MockProvider;

    #[test]
    fn prebuilt_provider_is_priced_under_its_own_model() {
        let config = ExtractionConfig::builder()
            .provider(Arc::new(MockProvider::new()))
            .model("gpt-4.1")
            .build()
            .unwrap();

        let (_, model) = resolve_provider(&config).unwrap();
        assert_eq!(model, "mock-model");

        let transport = LlmProviderTransport::from_config(&config).unwrap();
        assert_eq!(transport.model_id(), "mock-model");
    }

    #[test]
    fn provider_model_wins_over_fallback() {
        assert_eq!(provider_model_id(&MockProvider::new(), DEFAULT_MODEL), "mock-model");
    }
}
