//! Customer classification from a representative drawing.
//!
//! Classification never fails: transport errors, unparseable answers and
//! unrecognized names all degrade to the base profile with low confidence.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::batch::RetryPolicy;
use crate::rules::CustomerProfile;
use crate::rules::prompt::{classification_prompt, classification_schema};

use super::{Document, ExtractionAdapter, ExtractionOutcome, ExtractionRequest};

/// Answers shorter than this never count as a partial match.
const MIN_PARTIAL_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => f.write_str("high"),
            Confidence::Low => f.write_str("low"),
        }
    }
}

/// The classifier's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerGuess {
    pub profile: CustomerProfile,
    pub confidence: Confidence,
    pub rationale: String,
}

impl CustomerGuess {
    pub(crate) fn fallback(rationale: impl Into<String>) -> Self {
        Self {
            profile: CustomerProfile::Base,
            confidence: Confidence::Low,
            rationale: rationale.into(),
        }
    }

    /// Map a free-text answer to a profile.
    ///
    /// A single canonical name contained in the answer is a high-confidence
    /// match. Several names are ambiguous and fall back to base. An answer
    /// that is itself part of exactly one canonical name is a low-confidence
    /// match.
    pub fn from_answer(answer: &str) -> Self {
        let normalized = answer.trim().to_uppercase();

        let named: Vec<CustomerProfile> = CustomerProfile::NAMED
            .into_iter()
            .filter(|p| normalized.contains(p.canonical_name()))
            .collect();

        match named.as_slice() {
            [profile] => {
                return Self {
                    profile: *profile,
                    confidence: Confidence::High,
                    rationale: format!("answer '{}' names {}", answer.trim(), profile.canonical_name()),
                };
            }
            [_, _, ..] => {
                return Self::fallback(format!("ambiguous answer '{}' names several customers", answer.trim()));
            }
            [] => {}
        }

        if normalized.len() >= MIN_PARTIAL_LEN && normalized != "UNKNOWN" {
            let partial: Vec<CustomerProfile> = CustomerProfile::NAMED
                .into_iter()
                .filter(|p| p.canonical_name().contains(normalized.as_str()))
                .collect();
            if let [profile] = partial.as_slice() {
                return Self {
                    profile: *profile,
                    confidence: Confidence::Low,
                    rationale: format!(
                        "answer '{}' partially matches {}",
                        answer.trim(),
                        profile.canonical_name()
                    ),
                };
            }
        }

        Self::fallback(format!("no known customer in answer '{}'", answer.trim()))
    }
}

/// Asks the model which customer a drawing belongs to.
pub struct Classifier {
    adapter: ExtractionAdapter,
    retry: RetryPolicy,
    model: String,
}

impl Classifier {
    pub fn new(adapter: ExtractionAdapter, retry: RetryPolicy, model: impl Into<String>) -> Self {
        Self {
            adapter,
            retry,
            model: model.into(),
        }
    }

    pub async fn classify(&self, document: &Document) -> CustomerGuess {
        let guess = self.try_classify(document).await;
        match guess.confidence {
            Confidence::High => info!(
                document = %document.name(),
                profile = %guess.profile,
                "Detected customer: {}", guess.rationale
            ),
            Confidence::Low => warn!(
                document = %document.name(),
                profile = %guess.profile,
                "Customer detection uncertain: {}", guess.rationale
            ),
        }
        guess
    }

    async fn try_classify(&self, document: &Document) -> CustomerGuess {
        let data = match document.read().await {
            Ok(data) => data,
            Err(e) => return CustomerGuess::fallback(format!("could not read document: {e}")),
        };
        let request = ExtractionRequest::new(
            document,
            data,
            self.model.as_str(),
            classification_prompt(),
            classification_schema(),
        );

        let mut retry = 0;
        loop {
            match self.adapter.ask(&request).await {
                ExtractionOutcome::Success(answer) => return CustomerGuess::from_answer(&answer),
                ExtractionOutcome::FatalFailure { reason } => {
                    return CustomerGuess::fallback(format!("classification failed: {reason}"));
                }
                ExtractionOutcome::RetryableFailure { reason, .. } => {
                    if retry >= self.retry.max_retries {
                        return CustomerGuess::fallback(format!(
                            "classification gave up after {} attempt(s): {reason}",
                            retry + 1
                        ));
                    }
                    let delay = self.retry.delay(retry);
                    warn!(document = %document.name(), attempt = retry + 1, ?delay, "Classification failed, retrying: {reason}");
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientFailure;
    use crate::client::testing::{ScriptedClient, unavailable};
    use std::sync::Arc;
    use std::time::Duration;

    fn classifier(client: ScriptedClient) -> (Classifier, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let adapter = ExtractionAdapter::new(client.clone(), Duration::from_secs(5));
        (
            Classifier::new(adapter, RetryPolicy::immediate(2), "test-model"),
            client,
        )
    }

    fn answer(name: &str) -> Result<String, ClientFailure> {
        Ok(format!(r#"{{"customerName": "{name}"}}"#))
    }

    #[test]
    fn test_single_match_is_high_confidence() {
        let guess = CustomerGuess::from_answer("Rademaker B.V.");
        assert_eq!(guess.profile, CustomerProfile::Rademaker);
        assert_eq!(guess.confidence, Confidence::High);
    }

    #[test]
    fn test_ambiguous_answer_falls_back() {
        let guess = CustomerGuess::from_answer("ELTEN / RADEMAKER");
        assert_eq!(guess.profile, CustomerProfile::Base);
        assert_eq!(guess.confidence, Confidence::Low);
    }

    #[test]
    fn test_partial_answer_is_low_confidence() {
        let guess = CustomerGuess::from_answer("radem");
        assert_eq!(guess.profile, CustomerProfile::Rademaker);
        assert_eq!(guess.confidence, Confidence::Low);

        // too short to mean anything
        assert_eq!(CustomerGuess::from_answer("el").profile, CustomerProfile::Base);
    }

    #[test]
    fn test_unknown_answer_falls_back() {
        let guess = CustomerGuess::from_answer("UNKNOWN");
        assert_eq!(guess.profile, CustomerProfile::Base);
        assert_eq!(guess.confidence, Confidence::Low);
    }

    #[tokio::test]
    async fn test_classify() {
        let (classifier, _) = classifier(ScriptedClient::new().script("a", vec![answer("ELTEN")]));
        let guess = classifier.classify(&Document::from_bytes("a", b"pdf".to_vec())).await;
        assert_eq!(guess.profile, CustomerProfile::Elten);
        assert_eq!(guess.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_classify_retries_transient_failures() {
        let (classifier, client) = classifier(
            ScriptedClient::new().script("a", vec![unavailable(), answer("RADEMAKER")]),
        );
        let guess = classifier.classify(&Document::from_bytes("a", b"pdf".to_vec())).await;
        assert_eq!(guess.profile, CustomerProfile::Rademaker);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_classify_failure_degrades_to_base() {
        let (classifier, client) = classifier(ScriptedClient::new().script("a", vec![unavailable()]));
        let guess = classifier.classify(&Document::from_bytes("a", b"pdf".to_vec())).await;
        assert_eq!(guess.profile, CustomerProfile::Base);
        assert_eq!(guess.confidence, Confidence::Low);
        assert!(guess.rationale.contains("gave up after 3 attempt(s)"));
        assert_eq!(client.calls(), 3);

        let (classifier, _) = classifier_fatal();
        let guess = classifier.classify(&Document::from_bytes("a", b"pdf".to_vec())).await;
        assert_eq!(guess.profile, CustomerProfile::Base);
        assert!(guess.rationale.starts_with("classification failed"));
    }

    fn classifier_fatal() -> (Classifier, Arc<ScriptedClient>) {
        classifier(ScriptedClient::new().script(
            "a",
            vec![Err(ClientFailure::Fatal {
                reason: "HTTP 401: API key not valid".to_string(),
            })],
        ))
    }
}
