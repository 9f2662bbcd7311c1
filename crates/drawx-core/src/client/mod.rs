//! Extraction client adapter.
//!
//! [`ModelClient`] is the narrow transport seam (one request in, raw
//! structured text out). [`ExtractionAdapter`] adds the per-call timeout and
//! the parse boundary, and turns every call into an [`ExtractionOutcome`].

pub mod classifier;
mod gemini;
pub mod response;

pub use gemini::{FALLBACK_API_KEY_ENV, GeminiClient};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::item::ExtractedItem;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// An input document, either on disk or already in memory.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    mime_type: String,
    source: DocumentSource,
}

#[derive(Debug, Clone)]
enum DocumentSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl Document {
    /// A PDF on disk; its name is the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            mime_type: PDF_MIME_TYPE.to_string(),
            source: DocumentSource::Path(path),
        }
    }

    /// A PDF already held in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            mime_type: PDF_MIME_TYPE.to_string(),
            source: DocumentSource::Bytes(Arc::from(bytes)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            DocumentSource::Path(path) => Some(path),
            DocumentSource::Bytes(_) => None,
        }
    }

    /// Document content. Files are read on every call.
    pub async fn read(&self) -> std::io::Result<Arc<[u8]>> {
        match &self.source {
            DocumentSource::Path(path) => Ok(Arc::from(tokio::fs::read(path).await?)),
            DocumentSource::Bytes(bytes) => Ok(Arc::clone(bytes)),
        }
    }
}

/// One call to the model: document content, prompt and response schema.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Source document name, for logging.
    pub source: String,
    pub mime_type: String,
    pub data: Arc<[u8]>,
    pub model: String,
    pub prompt: String,
    pub schema: Value,
}

impl ExtractionRequest {
    pub fn new(
        document: &Document,
        data: Arc<[u8]>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        schema: Value,
    ) -> Self {
        Self {
            source: document.name().to_string(),
            mime_type: document.mime_type().to_string(),
            data,
            model: model.into(),
            prompt: prompt.into(),
            schema,
        }
    }
}

/// Transport-level failure reported by a [`ModelClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientFailure {
    /// Rate limiting, service unavailability or a network hiccup.
    #[error("{reason}")]
    Transient { reason: String, status: Option<u16> },

    /// Authentication, malformed request, blocked content and the like.
    #[error("{reason}")]
    Fatal { reason: String },
}

/// The multimodal model behind the adapter.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one request and return the model's raw structured text.
    async fn generate(&self, request: &ExtractionRequest) -> Result<String, ClientFailure>;
}

/// Result of one adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome<T> {
    Success(T),
    /// Worth retrying (rate limit, unavailable, timeout).
    RetryableFailure { reason: String, status: Option<u16> },
    /// Retrying will not help (schema violation, malformed response, authentication).
    FatalFailure { reason: String },
}

impl<T> ExtractionOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractionOutcome::RetryableFailure { .. })
    }

    /// Run a fallible conversion on the success value; its error becomes fatal.
    pub fn and_then<U, E: std::fmt::Display>(
        self,
        f: impl FnOnce(T) -> Result<U, E>,
    ) -> ExtractionOutcome<U> {
        match self {
            ExtractionOutcome::Success(value) => match f(value) {
                Ok(value) => ExtractionOutcome::Success(value),
                Err(e) => ExtractionOutcome::FatalFailure {
                    reason: e.to_string(),
                },
            },
            ExtractionOutcome::RetryableFailure { reason, status } => {
                ExtractionOutcome::RetryableFailure { reason, status }
            }
            ExtractionOutcome::FatalFailure { reason } => ExtractionOutcome::FatalFailure { reason },
        }
    }
}

/// Timeout and parse boundary around a [`ModelClient`].
#[derive(Clone)]
pub struct ExtractionAdapter {
    client: Arc<dyn ModelClient>,
    timeout: Duration,
}

impl ExtractionAdapter {
    pub fn new(client: Arc<dyn ModelClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Extract the drawing item from a document.
    pub async fn extract(&self, request: &ExtractionRequest) -> ExtractionOutcome<ExtractedItem> {
        self.call(request).await.and_then(|text| response::parse_item(&text))
    }

    /// Ask the one-field classification question.
    pub async fn ask(&self, request: &ExtractionRequest) -> ExtractionOutcome<String> {
        self.call(request).await.and_then(|text| response::parse_answer(&text))
    }

    async fn call(&self, request: &ExtractionRequest) -> ExtractionOutcome<String> {
        debug!(document = %request.source, model = %request.model, "Sending request");

        match tokio::time::timeout(self.timeout, self.client.generate(request)).await {
            Err(_) => ExtractionOutcome::RetryableFailure {
                reason: format!("request timed out after {}s", self.timeout.as_secs()),
                status: None,
            },
            Ok(Err(ClientFailure::Transient { reason, status })) => {
                ExtractionOutcome::RetryableFailure { reason, status }
            }
            Ok(Err(ClientFailure::Fatal { reason })) => ExtractionOutcome::FatalFailure { reason },
            Ok(Ok(text)) => ExtractionOutcome::Success(text),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory model client.

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    pub type Reply = Result<String, ClientFailure>;

    /// Replies per document, in order; the last reply repeats once the script runs out.
    #[derive(Default)]
    pub struct ScriptedClient {
        scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
        fallback: Mutex<Option<Reply>>,
        delays: HashMap<String, Duration>,
        calls: AtomicUsize,
        log: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(self, document: &str, replies: Vec<Reply>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(document.to_string(), replies.into());
            self
        }

        pub fn otherwise(self, reply: Reply) -> Self {
            *self.fallback.lock().unwrap() = Some(reply);
            self
        }

        pub fn delay(mut self, document: &str, delay: Duration) -> Self {
            self.delays.insert(document.to_string(), delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Documents in call order.
        pub fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    pub fn item_json(material: &str) -> Reply {
        Ok(format!(r#"{{"items": [{{"material": "{material}", "holes": [{{"count": 4, "type": "tapped", "threadSize": "M6"}}]}}]}}"#))
    }

    pub fn unavailable() -> Reply {
        Err(ClientFailure::Transient {
            reason: "service unavailable".to_string(),
            status: Some(503),
        })
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn generate(&self, request: &ExtractionRequest) -> Result<String, ClientFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(request.source.clone());

            if let Some(delay) = self.delays.get(&request.source) {
                tokio::time::sleep(*delay).await;
            }

            let reply = {
                let mut scripts = self.scripts.lock().unwrap();
                match scripts.get_mut(&request.source) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };
            reply
                .or_else(|| self.fallback.lock().unwrap().clone())
                .unwrap_or_else(|| Err(ClientFailure::Fatal {
                    reason: format!("no reply scripted for {}", request.source),
                }))
        }
    }
}
