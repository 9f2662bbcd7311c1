//! Gemini `generateContent` transport.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{DrawxError, Result};
use crate::models::config::ExtractionConfig;

use super::{ClientFailure, ExtractionRequest, ModelClient};

/// Checked when the configured API key variable is unset.
pub const FALLBACK_API_KEY_ENV: &str = "VITE_GEMINI_API_KEY";

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Client for the Generative Language REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &ExtractionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("drawx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DrawxError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            temperature: config.temperature,
        })
    }

    /// Build a client with the API key taken from the environment.
    pub fn from_env(config: &ExtractionConfig) -> Result<Self> {
        let api_key = [config.api_key_env.as_str(), FALLBACK_API_KEY_ENV]
            .into_iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                DrawxError::Config(format!(
                    "no API key found; set {} (or {FALLBACK_API_KEY_ENV})",
                    config.api_key_env
                ))
            })?;
        Self::new(api_key, config)
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    fn request_body(&self, request: &ExtractionRequest) -> Value {
        let data = base64::engine::general_purpose::STANDARD.encode(&request.data);
        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| json!({"category": category, "threshold": "BLOCK_NONE"}))
            .collect();

        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": request.prompt},
                    {"inline_data": {"mime_type": request.mime_type, "data": data}}
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.schema,
                "temperature": self.temperature,
                "topP": 1,
                "topK": 1
            },
            "safetySettings": safety
        })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, request: &ExtractionRequest) -> std::result::Result<String, ClientFailure> {
        let response = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let failure = status_failure(status.as_u16(), &body);
            warn!(document = %request.source, status = status.as_u16(), "Model request failed: {failure}");
            return Err(failure);
        }

        let payload: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ClientFailure::Transient {
                    reason: format!("timed out reading response: {e}"),
                    status: None,
                }
            } else {
                ClientFailure::Fatal {
                    reason: format!("unreadable response body: {e}"),
                }
            }
        })?;

        let text = payload.into_text()?;
        debug!(document = %request.source, bytes = text.len(), "Received response");
        Ok(text)
    }
}

fn transport_failure(e: reqwest::Error) -> ClientFailure {
    if e.is_timeout() || e.is_connect() {
        ClientFailure::Transient {
            reason: format!("network error: {e}"),
            status: None,
        }
    } else {
        ClientFailure::Fatal {
            reason: format!("request failed: {e}"),
        }
    }
}

fn status_failure(status: u16, body: &str) -> ClientFailure {
    let message = error_message(body);
    let reason = format!("HTTP {status}: {message}");
    if RETRYABLE_STATUSES.contains(&status) || message.to_lowercase().contains("overloaded") {
        ClientFailure::Transient {
            reason,
            status: Some(status),
        }
    } else {
        ClientFailure::Fatal { reason }
    }
}

/// `error.message` from a Google API error body, else the raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => body.trim().chars().take(200).collect(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> std::result::Result<String, ClientFailure> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ClientFailure::Fatal {
                reason: format!("prompt blocked: {reason}"),
            });
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ClientFailure::Fatal {
                reason: "response has no candidates".to_string(),
            });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let finish = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(ClientFailure::Fatal {
                reason: format!("empty candidate (finish reason {finish})"),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Document;
    use std::sync::Arc;

    fn client() -> GeminiClient {
        GeminiClient::new("test-key", &ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint("gemini-2.5-pro"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[test]
    fn test_request_body() {
        let document = Document::from_bytes("part", b"pdf".to_vec());
        let request = ExtractionRequest::new(
            &document,
            Arc::from(&b"pdf"[..]),
            "gemini-2.5-pro",
            "extract",
            json!({"type": "OBJECT"}),
        );
        let body = client().request_body(&request);

        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "extract");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[1]["inline_data"]["data"], "cGRm");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(body["generationConfig"]["topK"], 1);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_status_classification() {
        for status in [429, 500, 502, 503, 504] {
            assert!(matches!(
                status_failure(status, ""),
                ClientFailure::Transient { status: Some(s), .. } if s == status
            ));
        }
        assert!(matches!(status_failure(401, "{}"), ClientFailure::Fatal { .. }));
        assert!(matches!(status_failure(400, "bad request"), ClientFailure::Fatal { .. }));

        let overloaded = r#"{"error": {"code": 400, "message": "The model is overloaded."}}"#;
        assert!(matches!(status_failure(400, overloaded), ClientFailure::Transient { .. }));
    }

    #[test]
    fn test_response_text() {
        let payload: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"items\": "}, {"text": "[]}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(payload.into_text().unwrap(), "{\"items\": []}");
    }

    #[test]
    fn test_blocked_and_empty_responses_are_fatal() {
        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(matches!(blocked.into_text(), Err(ClientFailure::Fatal { .. })));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(empty.into_text(), Err(ClientFailure::Fatal { .. })));

        let no_text: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#).unwrap();
        match no_text.into_text() {
            Err(ClientFailure::Fatal { reason }) => assert!(reason.contains("MAX_TOKENS")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
