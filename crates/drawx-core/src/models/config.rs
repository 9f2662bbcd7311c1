//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default model used for extraction and classification.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Main configuration for the drawx pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawxConfig {
    /// Model client configuration.
    pub extraction: ExtractionConfig,

    /// Retry policy for transient model failures.
    pub retry: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit: CircuitConfig,

    /// Batch scheduling configuration.
    pub batch: BatchConfig,

    /// Rule document location.
    pub rules: RulesConfig,

    /// Output naming.
    pub output: OutputConfig,
}

/// Model client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Model identifier.
    pub model: String,

    /// Base URL of the Generative Language API.
    pub api_base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Sampling temperature (0.0 keeps answers reproducible).
    pub temperature: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 300,
            temperature: 0.0,
        }
    }
}

impl ExtractionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1).
    pub max_retries: u32,

    /// Delay before the first retry, doubled per attempt.
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay.
    pub max_delay_ms: u64,

    /// Random jitter added on top of each delay (0 disables).
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 7,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
            jitter_ms: 1_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive retryable failures (across the batch) that open the circuit.
    pub failure_threshold: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
        }
    }
}

/// Batch scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of extraction requests in flight.
    pub concurrency: usize,

    /// Re-request the assembly drawing in BOM-only mode.
    pub reextract_assembly: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            reextract_assembly: true,
        }
    }
}

/// Rule document location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directory containing `base.json` and `customers/<profile>/config.json`.
    pub rules_dir: PathBuf,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("config"),
        }
    }
}

/// Output naming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix of the order file name (`<prefix><order id>.xml`).
    pub file_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_prefix: "PDF_XML_".to_string(),
        }
    }
}

impl DrawxConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Output file name for an order.
    pub fn output_file_name(&self, order_id: &str, extension: &str) -> String {
        format!("{}{}.{}", self.output.file_prefix, order_id, extension)
    }
}
