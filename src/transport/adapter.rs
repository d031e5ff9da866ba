//! Wire dialects for [`super::HttpTransport`].
//!
//! Each provider family shapes its request and response JSON differently.
//! A [`ResponseAdapter`] owns one dialect; supporting another provider means
//! adding an adapter, not branching inside the transport.

use super::{ParseOutcome, VisionRequest};
use crate::output::UsageMetrics;
use crate::pipeline::encode::png_base64;
use serde_json::{json, Value};

pub trait ResponseAdapter: Send + Sync {
    /// Short dialect name for logs.
    fn name(&self) -> &'static str;

    fn request_body(&self, model: &str, request: &VisionRequest) -> Value;

    /// Headers carrying the API key (and any required version header).
    fn auth_headers(&self, api_key: &str) -> Vec<(&'static str, String)>;

    /// Extract the reply text, or hand back the raw body if the shape is unknown.
    fn parse_content(&self, body: &Value) -> ParseOutcome<String>;

    /// Token usage; missing fields count as zero.
    fn parse_usage(&self, body: &Value) -> UsageMetrics;
}

fn u64_at(body: &Value, pointer: &str) -> u64 {
    body.pointer(pointer).and_then(Value::as_u64).unwrap_or(0)
}

fn user_text(request: &VisionRequest) -> Option<&str> {
    request.user_text.as_deref().filter(|t| !t.trim().is_empty())
}

/// Anthropic Messages API (`/v1/messages`).
#[derive(Debug, Clone)]
pub struct AnthropicMessagesAdapter {
    pub api_version: String,
}

impl Default for AnthropicMessagesAdapter {
    fn default() -> Self {
        Self {
            api_version: "2023-06-01".to_string(),
        }
    }
}

impl ResponseAdapter for AnthropicMessagesAdapter {
    fn name(&self) -> &'static str {
        "anthropic-messages"
    }

    fn request_body(&self, model: &str, request: &VisionRequest) -> Value {
        let mut content = vec![json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": "image/png",
                "data": png_base64(&request.image_png),
            }
        })];
        if let Some(text) = user_text(request) {
            content.push(json!({ "type": "text", "text": text }));
        }
        json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system_prompt,
            "messages": [{ "role": "user", "content": content }],
        })
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("x-api-key", api_key.to_string()),
            ("anthropic-version", self.api_version.clone()),
        ]
    }

    fn parse_content(&self, body: &Value) -> ParseOutcome<String> {
        let Some(blocks) = body.get("content").and_then(Value::as_array) else {
            return ParseOutcome::Unparsed(body.to_string());
        };
        let text: Vec<&str> = blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect();
        ParseOutcome::Parsed(text.concat())
    }

    fn parse_usage(&self, body: &Value) -> UsageMetrics {
        UsageMetrics::new(
            u64_at(body, "/usage/input_tokens"),
            u64_at(body, "/usage/output_tokens"),
        )
    }
}

/// OpenAI-compatible Chat Completions API (`/v1/chat/completions`).
#[derive(Debug, Clone, Default)]
pub struct OpenAiChatAdapter;

impl ResponseAdapter for OpenAiChatAdapter {
    fn name(&self) -> &'static str {
        "openai-chat"
    }

    fn request_body(&self, model: &str, request: &VisionRequest) -> Value {
        let mut content = vec![json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:image/png;base64,{}", png_base64(&request.image_png)),
                "detail": "high",
            }
        })];
        if let Some(text) = user_text(request) {
            content.push(json!({ "type": "text", "text": text }));
        }
        json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": content },
            ],
        })
    }

    fn auth_headers(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![("authorization", format!("Bearer {api_key}"))]
    }

    fn parse_content(&self, body: &Value) -> ParseOutcome<String> {
        match body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        {
            Some(text) => ParseOutcome::Parsed(text.to_string()),
            None => ParseOutcome::Unparsed(body.to_string()),
        }
    }

    fn parse_usage(&self, body: &Value) -> UsageMetrics {
        UsageMetrics::new(
            u64_at(body, "/usage/prompt_tokens"),
            u64_at(body, "/usage/completion_tokens"),
        )
    }
}
