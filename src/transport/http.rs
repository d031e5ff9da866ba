//! [`VisionTransport`] over a raw JSON HTTP endpoint.
//!
//! Status mapping:
//!
//! | Response                          | Kind        |
//! |-----------------------------------|-------------|
//! | 429                               | Throttled   |
//! | 408, 5xx, connect/timeout failure | Transient   |
//! | any other non-2xx                 | Fatal       |
//! | 2xx with an unrecognised shape    | Fatal       |

use super::adapter::ResponseAdapter;
use super::{ParseOutcome, TransportResponse, VisionRequest, VisionTransport};
use crate::error::{TransportError, TriageError};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in a [`TransportError`] message.
const ERROR_BODY_PREVIEW: usize = 300;

#[derive(Debug)]
pub struct HttpTransport<A> {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    adapter: A,
}

impl<A: ResponseAdapter> HttpTransport<A> {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        adapter: A,
        api_timeout: Option<Duration>,
    ) -> Result<Self, TriageError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = api_timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| TriageError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            adapter,
        })
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn classify_status(status: StatusCode, body: &str) -> TransportError {
    let message = format!("HTTP {}: {}", status.as_u16(), preview(body));
    if status == StatusCode::TOO_MANY_REQUESTS {
        TransportError::throttled(message)
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        TransportError::transient(message)
    } else {
        TransportError::fatal(message)
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        TransportError::transient(e.to_string())
    } else {
        TransportError::fatal(e.to_string())
    }
}

#[async_trait]
impl<A: ResponseAdapter> VisionTransport for HttpTransport<A> {
    async fn invoke(&self, request: &VisionRequest) -> Result<TransportResponse, TransportError> {
        let body = self.adapter.request_body(&self.model, request);
        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            for (name, value) in self.adapter.auth_headers(key) {
                req = req.header(name, value);
            }
        }

        let response = req.send().await.map_err(classify_reqwest)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest)?;
        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            TransportError::fatal(format!("response is not JSON ({e}): {}", preview(&text)))
        })?;

        match self.adapter.parse_content(&json) {
            ParseOutcome::Parsed(content) => {
                let usage = self.adapter.parse_usage(&json);
                debug!(
                    "{} via {}: {} tokens",
                    self.model,
                    self.adapter.name(),
                    usage.total_tokens()
                );
                Ok(TransportResponse {
                    text: content,
                    usage,
                })
            }
            ParseOutcome::Unparsed(raw) => Err(TransportError::fatal(format!(
                "unrecognised {} response: {}",
                self.adapter.name(),
                preview(&raw)
            ))),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use crate::transport::OpenAiChatAdapter;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response on a local port and return the URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let raw = String::from_utf8_lossy(&buf);
                if let Some(header_end) = raw.find("\r\n\r\n") {
                    let content_length = raw[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    fn request() -> VisionRequest {
        VisionRequest {
            system_prompt: "sys".into(),
            image_png: Arc::from(&b"png"[..]),
            user_text: None,
            max_tokens: 10,
            temperature: 0.0,
        }
    }

    fn transport(url: String) -> HttpTransport<OpenAiChatAdapter> {
        HttpTransport::new(url, Some("k".into()), "gpt-4.1", OpenAiChatAdapter, None).unwrap()
    }

    #[tokio::test]
    async fn success_returns_text_and_usage() {
        let url = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"content":"page text"}}],"usage":{"prompt_tokens":7,"completion_tokens":3}}"#,
        )
        .await;
        let resp = transport(url).invoke(&request()).await.unwrap();
        assert_eq!(resp.text, "page text");
        assert_eq!(resp.usage.total_tokens(), 10);
    }

    #[tokio::test]
    async fn status_429_is_throttled() {
        let url = serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#).await;
        let err = transport(url).invoke(&request()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Throttled);
    }

    #[tokio::test]
    async fn status_503_is_transient() {
        let url = serve_once("503 Service Unavailable", "{}").await;
        let err = transport(url).invoke(&request()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Transient);
    }

    #[tokio::test]
    async fn status_400_is_fatal() {
        let url = serve_once("400 Bad Request", r#"{"error":"bad image"}"#).await;
        let err = transport(url).invoke(&request()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Fatal);
    }

    #[tokio::test]
    async fn unknown_shape_is_fatal() {
        let url = serve_once("200 OK", r#"{"output":"?"}"#).await;
        let err = transport(url).invoke(&request()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Fatal);
        assert!(err.message.contains("openai-chat"));
    }

    #[test]
    fn preview_is_char_bounded() {
        let s = "é".repeat(ERROR_BODY_PREVIEW + 10);
        assert_eq!(preview(&s).chars().count(), ERROR_BODY_PREVIEW);
    }
}
