//! Order-level results handed to the output serializers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::classifier::CustomerGuess;
use crate::rules::CustomerProfile;

use super::item::ExtractedItem;

/// The batch-level aggregate: one entry per input document, in discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// Top-level identifier (the assembly part number, else the batch identifier).
    pub order_id: String,

    /// Batch identifier (folder name or single document stem).
    pub batch_id: String,

    /// Profile whose rules were applied.
    pub customer: CustomerProfile,

    /// Classification outcome when the profile was detected automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_guess: Option<CustomerGuess>,

    /// Model identifier used for extraction.
    pub model: String,

    /// Source name of the assembly document, if one was identified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly: Option<String>,

    /// Per-document results.
    pub documents: Vec<DocumentResult>,

    pub generated_at: DateTime<Utc>,
}

impl OrderResult {
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.documents.len() - self.succeeded()
    }

    /// Result for a given source document.
    pub fn document(&self, source: &str) -> Option<&DocumentResult> {
        self.documents.iter().find(|d| d.source == source)
    }
}

/// Outcome of one input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Source document name (file stem).
    pub source: String,

    #[serde(flatten)]
    pub status: DocumentStatus,
}

impl DocumentResult {
    pub fn success(source: impl Into<String>, item: ExtractedItem, warnings: Vec<String>) -> Self {
        Self {
            source: source.into(),
            status: DocumentStatus::Success { item, warnings },
        }
    }

    pub fn failed(source: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            source: source.into(),
            status: DocumentStatus::Failed { reason },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, DocumentStatus::Success { .. })
    }

    pub fn item(&self) -> Option<&ExtractedItem> {
        match &self.status {
            DocumentStatus::Success { item, .. } => Some(item),
            DocumentStatus::Failed { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match &self.status {
            DocumentStatus::Success { warnings, .. } => warnings,
            DocumentStatus::Failed { .. } => &[],
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            DocumentStatus::Success { .. } => None,
            DocumentStatus::Failed { reason } => Some(reason),
        }
    }
}

/// Success with item and warnings, or failure with a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Success {
        item: ExtractedItem,
        warnings: Vec<String>,
    },
    Failed {
        reason: FailureReason,
    },
}

/// Why a document has no extracted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Every attempt hit a transient failure.
    RetriesExhausted {
        attempts: u32,
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },

    /// A non-retryable failure (schema violation, malformed request, authentication).
    Fatal { reason: String },

    /// The circuit breaker was open before the request could be issued.
    CircuitOpen,

    /// The batch was interrupted before this document completed.
    Interrupted,

    /// The document could not be read from disk.
    Unreadable { reason: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RetriesExhausted {
                attempts,
                reason,
                status: Some(status),
            } => write!(f, "gave up after {attempts} attempt(s): {reason} (status {status})"),
            FailureReason::RetriesExhausted { attempts, reason, .. } => {
                write!(f, "gave up after {attempts} attempt(s): {reason}")
            }
            FailureReason::Fatal { reason } => write!(f, "extraction failed: {reason}"),
            FailureReason::CircuitOpen => {
                write!(f, "circuit open: not attempted after repeated service failures")
            }
            FailureReason::Interrupted => write!(f, "interrupted before completion"),
            FailureReason::Unreadable { reason } => write!(f, "unreadable document: {reason}"),
        }
    }
}
