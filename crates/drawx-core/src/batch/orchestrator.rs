//! Batch driver: bounded fan-out with retries and a shared circuit breaker.

use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::client::classifier::{Classifier, CustomerGuess};
use crate::client::{Document, ExtractionAdapter, ExtractionOutcome, ExtractionRequest};
use crate::error::Result;
use crate::models::config::DrawxConfig;
use crate::models::item::{ExtractedItem, meaningful};
use crate::models::order::{DocumentResult, DocumentStatus, FailureReason, OrderResult};
use crate::rules::prompt::{assembly_prompt, drawing_schema, extraction_prompt};
use crate::rules::{CustomerSelection, EffectiveConfig, RuleResolver};
use crate::warnings::generate_warnings;

use super::assembler::{self, OrderHeader};
use super::{CircuitBreaker, RetryPolicy};

/// One batch: documents in discovery order plus how to pick the customer.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Folder name, or the document stem in single-document mode.
    pub batch_id: String,
    pub documents: Vec<Document>,
    pub customer: CustomerSelection,
    pub model: String,
}

type ProgressFn = Arc<dyn Fn(&DocumentResult) + Send + Sync>;

/// Drives a batch through the extraction adapter.
#[derive(Clone)]
pub struct BatchOrchestrator {
    adapter: ExtractionAdapter,
    resolver: RuleResolver,
    retry: RetryPolicy,
    circuit_threshold: u32,
    concurrency: usize,
    reextract_assembly: bool,
    on_document: Option<ProgressFn>,
}

/// Per-batch state shared by all workers.
struct RunContext {
    rules: EffectiveConfig,
    model: String,
    prompt: String,
    schema: Value,
    circuit: CircuitBreaker,
}

impl BatchOrchestrator {
    pub fn new(adapter: ExtractionAdapter, resolver: RuleResolver) -> Self {
        let defaults = DrawxConfig::default();
        Self {
            adapter,
            resolver,
            retry: RetryPolicy::from_config(&defaults.retry),
            circuit_threshold: defaults.circuit.failure_threshold,
            concurrency: defaults.batch.concurrency,
            reextract_assembly: defaults.batch.reextract_assembly,
            on_document: None,
        }
    }

    pub fn from_config(adapter: ExtractionAdapter, resolver: RuleResolver, config: &DrawxConfig) -> Self {
        Self::new(adapter, resolver)
            .with_retry(RetryPolicy::from_config(&config.retry))
            .with_circuit_threshold(config.circuit.failure_threshold)
            .with_concurrency(config.batch.concurrency)
            .with_reextract_assembly(config.batch.reextract_assembly)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_threshold(mut self, threshold: u32) -> Self {
        self.circuit_threshold = threshold;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_reextract_assembly(mut self, enabled: bool) -> Self {
        self.reextract_assembly = enabled;
        self
    }

    /// Called once per document as soon as its result is known.
    pub fn on_document(mut self, f: impl Fn(&DocumentResult) + Send + Sync + 'static) -> Self {
        self.on_document = Some(Arc::new(f));
        self
    }

    /// Run a batch without an external abort signal.
    pub async fn run_to_completion(&self, request: BatchRequest) -> Result<OrderResult> {
        self.run(request, std::future::pending()).await
    }

    /// Run a batch until every document has a result or `interrupt` resolves.
    ///
    /// Only rule resolution errors are returned as `Err`; every per-document
    /// problem ends up in the [`OrderResult`]. On interrupt, completed results
    /// are kept and the rest are marked [`FailureReason::Interrupted`].
    pub async fn run(
        &self,
        request: BatchRequest,
        interrupt: impl Future<Output = ()>,
    ) -> Result<OrderResult> {
        let (rules, customer_guess) = self.resolve_customer(&request).await?;
        info!(
            batch = %request.batch_id,
            documents = request.documents.len(),
            profile = %rules.profile(),
            model = %request.model,
            "Starting batch"
        );

        let ctx = RunContext {
            prompt: extraction_prompt(&rules),
            schema: drawing_schema(),
            model: request.model.clone(),
            circuit: CircuitBreaker::new(self.circuit_threshold),
            rules,
        };

        let mut slots: Vec<Option<DocumentResult>> = vec![None; request.documents.len()];
        tokio::pin!(interrupt);
        let interrupted = {
            let work = stream::iter(request.documents.iter().enumerate())
                .map(|(index, document)| {
                    let ctx = &ctx;
                    async move { (index, self.process_document(document, ctx).await) }
                })
                .buffer_unordered(self.concurrency);
            tokio::pin!(work);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut interrupt => {
                        warn!(batch = %request.batch_id, "Batch interrupted; keeping completed results");
                        break true;
                    }
                    next = work.next() => match next {
                        Some((index, result)) => {
                            if let Some(on_document) = &self.on_document {
                                on_document(&result);
                            }
                            slots[index] = Some(result);
                        }
                        None => break false,
                    },
                }
            }
        };

        let mut results = assembler::complete_results(&request.documents, slots);
        let assembly = assembler::find_assembly(&request.batch_id, &results);

        match assembly {
            Some(index) => info!(assembly = %results[index].source, "Identified assembly drawing"),
            None if results.len() > 1 => {
                warn!(batch = %request.batch_id, "No document matches the batch identifier")
            }
            None => {}
        }

        if let Some(index) = assembly {
            let eligible = !interrupted
                && results.len() > 1
                && self.reextract_assembly
                && results[index].item().is_some();
            if eligible {
                let document = &request.documents[index];
                let bom = tokio::select! {
                    biased;
                    _ = &mut interrupt => {
                        warn!(document = %document.name(), "Interrupted during assembly re-extraction; keeping first pass");
                        None
                    }
                    bom = self.reextract_assembly(document, &ctx) => bom,
                };
                if let (Some(bom), DocumentStatus::Success { item, warnings }) = (bom, &mut results[index].status) {
                    merge_assembly(item, bom, &ctx.rules);
                    *warnings = generate_warnings(item, &ctx.rules);
                    info!(
                        document = %document.name(),
                        bom_parts = item.bom_part_numbers.len(),
                        "Merged assembly BOM"
                    );
                }
            }
        }

        let header = OrderHeader {
            batch_id: request.batch_id,
            customer: ctx.rules.profile(),
            customer_guess,
            model: request.model,
        };
        let order = assembler::assemble(header, results, assembly);

        info!(
            order = %order.order_id,
            succeeded = order.succeeded(),
            failed = order.failed(),
            "Batch finished"
        );
        Ok(order)
    }

    async fn resolve_customer(
        &self,
        request: &BatchRequest,
    ) -> Result<(EffectiveConfig, Option<CustomerGuess>)> {
        match request.customer {
            CustomerSelection::Profile(profile) => Ok((self.resolver.resolve_profile(profile)?, None)),
            CustomerSelection::Auto => {
                self.resolver.preflight()?;
                let guess = match request.documents.first() {
                    Some(document) => {
                        Classifier::new(self.adapter.clone(), self.retry.clone(), request.model.as_str())
                            .classify(document)
                            .await
                    }
                    None => CustomerGuess::fallback("empty batch"),
                };
                let rules = self.resolver.resolve_profile(guess.profile)?;
                Ok((rules, Some(guess)))
            }
        }
    }

    async fn process_document(&self, document: &Document, ctx: &RunContext) -> DocumentResult {
        if ctx.circuit.is_open() {
            warn!(document = %document.name(), "Skipped: circuit open");
            return DocumentResult::failed(document.name(), FailureReason::CircuitOpen);
        }

        let data = match document.read().await {
            Ok(data) => data,
            Err(e) => {
                error!(document = %document.name(), "Failed to read document: {e}");
                return DocumentResult::failed(
                    document.name(),
                    FailureReason::Unreadable {
                        reason: e.to_string(),
                    },
                );
            }
        };

        let request = ExtractionRequest::new(
            document,
            data,
            ctx.model.as_str(),
            ctx.prompt.as_str(),
            ctx.schema.clone(),
        );

        match self.extract_with_retry(&request, &ctx.circuit).await {
            Ok(item) => {
                let item = ctx.rules.normalize_item(item, document.name());
                let warnings = generate_warnings(&item, &ctx.rules);
                info!(document = %document.name(), warnings = warnings.len(), "Extracted");
                DocumentResult::success(document.name(), item, warnings)
            }
            Err(reason) => {
                error!(document = %document.name(), "Extraction failed: {reason}");
                DocumentResult::failed(document.name(), reason)
            }
        }
    }

    /// One document through the adapter. The circuit is checked before every attempt.
    async fn extract_with_retry(
        &self,
        request: &ExtractionRequest,
        circuit: &CircuitBreaker,
    ) -> std::result::Result<ExtractedItem, FailureReason> {
        let mut retry = 0;
        let mut last_failure: Option<(String, Option<u16>)> = None;

        loop {
            if circuit.is_open() {
                return Err(match last_failure {
                    Some((reason, status)) => FailureReason::RetriesExhausted {
                        attempts: retry,
                        reason,
                        status,
                    },
                    None => FailureReason::CircuitOpen,
                });
            }

            match self.adapter.extract(request).await {
                ExtractionOutcome::Success(item) => {
                    circuit.record_success();
                    return Ok(item);
                }
                ExtractionOutcome::FatalFailure { reason } => {
                    return Err(FailureReason::Fatal { reason });
                }
                ExtractionOutcome::RetryableFailure { reason, status } => {
                    let attempts = retry + 1;
                    circuit.record_failure();

                    if circuit.is_open() || retry >= self.retry.max_retries {
                        return Err(FailureReason::RetriesExhausted {
                            attempts,
                            reason,
                            status,
                        });
                    }

                    let delay = self.retry.delay(retry);
                    warn!(
                        document = %request.source,
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts(),
                        ?status,
                        ?delay,
                        "Retryable failure: {reason}"
                    );
                    tokio::time::sleep(delay).await;

                    last_failure = Some((reason, status));
                    retry += 1;
                }
            }
        }
    }

    /// Second, BOM-only pass over the assembly drawing. `None` keeps the first pass.
    async fn reextract_assembly(&self, document: &Document, ctx: &RunContext) -> Option<ExtractedItem> {
        let data = match document.read().await {
            Ok(data) => data,
            Err(e) => {
                warn!(document = %document.name(), "Assembly re-extraction skipped: {e}");
                return None;
            }
        };
        let request = ExtractionRequest::new(
            document,
            data,
            ctx.model.as_str(),
            assembly_prompt(&ctx.rules),
            ctx.schema.clone(),
        );

        match self.extract_with_retry(&request, &ctx.circuit).await {
            Ok(bom) => Some(bom),
            Err(reason) => {
                warn!(document = %document.name(), "Assembly re-extraction failed, keeping first pass: {reason}");
                None
            }
        }
    }
}

/// Fold a BOM-only extraction into the first-pass assembly item.
fn merge_assembly(item: &mut ExtractedItem, bom: ExtractedItem, rules: &EffectiveConfig) {
    if meaningful(item.surface_treatment.as_deref()).is_none() {
        item.surface_treatment = rules.canonical_surface_treatment(bom.surface_treatment.as_deref());
    }
    if meaningful(item.material.as_deref()).is_none() {
        item.material = bom.material.filter(|m| meaningful(Some(m.as_str())).is_some());
    }
    if !bom.bom_part_numbers.is_empty() {
        item.bom_part_numbers = bom.bom_part_numbers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientFailure;
    use crate::rules::CustomerProfile;
    use crate::client::testing::{ScriptedClient, item_json, unavailable};
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn rules_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let write = |relative: &str, content: &str| {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        };
        write(
            "base.json",
            r#"{"surfaceTreatments": [{"displayName": "Verzinkt", "keywords": ["galvanized"]}]}"#,
        );
        write("customers/elten/config.json", r#"{"customerName": "ELTEN"}"#);
        write("customers/rademaker/config.json", r#"{"customerName": "RADEMAKER"}"#);
        dir
    }

    fn orchestrator(client: Arc<ScriptedClient>, rules: &Path) -> BatchOrchestrator {
        let adapter = ExtractionAdapter::new(client, Duration::from_secs(5));
        BatchOrchestrator::new(adapter, RuleResolver::new(rules))
            .with_retry(RetryPolicy::immediate(0))
            .with_concurrency(1)
            .with_reextract_assembly(false)
    }

    fn request(batch_id: &str, names: &[&str]) -> BatchRequest {
        BatchRequest {
            batch_id: batch_id.to_string(),
            documents: names
                .iter()
                .map(|name| Document::from_bytes(*name, b"%PDF-1.4".to_vec()))
                .collect(),
            customer: CustomerSelection::Profile(CustomerProfile::Base),
            model: "test-model".to_string(),
        }
    }

    fn sources(order: &OrderResult) -> Vec<&str> {
        order.documents.iter().map(|d| d.source.as_str()).collect()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_every_document() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script("a", vec![item_json("S235")])
                .script("b", vec![Ok(r#"{"items": [{"holes": "not a list"}]}"#.to_string())])
                .script("c", vec![item_json("RVS 2 mm")]),
        );
        let order = orchestrator(client, rules.path())
            .run_to_completion(request("order", &["a", "b", "c"]))
            .await
            .unwrap();

        assert_eq!(sources(&order), vec!["a", "b", "c"]);
        assert_eq!(order.succeeded(), 2);
        assert_eq!(order.documents[0].warnings(), ["4x M6 tapped hole".to_string()]);
        assert!(matches!(order.documents[1].failure(), Some(FailureReason::Fatal { .. })));
        assert_eq!(order.documents[2].item().unwrap().part_number.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold() {
        let rules = rules_dir();
        let client = Arc::new(ScriptedClient::new().otherwise(unavailable()));
        let order = orchestrator(client.clone(), rules.path())
            .with_circuit_threshold(3)
            .run_to_completion(request("order", &["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 3);
        for result in &order.documents[..3] {
            assert!(matches!(result.failure(), Some(FailureReason::RetriesExhausted { .. })));
        }
        for result in &order.documents[3..] {
            assert_eq!(result.failure(), Some(&FailureReason::CircuitOpen));
        }
    }

    #[tokio::test]
    async fn test_circuit_open_stops_retries() {
        let rules = rules_dir();
        let client = Arc::new(ScriptedClient::new().otherwise(unavailable()));
        let order = orchestrator(client.clone(), rules.path())
            .with_retry(RetryPolicy::immediate(10))
            .with_circuit_threshold(2)
            .run_to_completion(request("order", &["a", "b"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(
            order.documents[0].failure(),
            Some(&FailureReason::RetriesExhausted {
                attempts: 2,
                reason: "service unavailable".to_string(),
                status: Some(503)
            })
        );
        assert_eq!(order.documents[1].failure(), Some(&FailureReason::CircuitOpen));
    }

    #[tokio::test]
    async fn test_open_circuit_stops_new_requests_while_in_flight_finish() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script("a", vec![item_json("S235")])
                .delay("a", Duration::from_millis(50))
                .otherwise(unavailable()),
        );
        let order = orchestrator(client.clone(), rules.path())
            .with_concurrency(3)
            .with_circuit_threshold(2)
            .run_to_completion(request("order", &["a", "b", "c", "d", "e", "f"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 3);
        assert_eq!(client.log(), vec!["a", "b", "c"]);
        assert!(order.document("a").unwrap().is_success());
        for name in ["b", "c"] {
            assert!(matches!(
                order.document(name).unwrap().failure(),
                Some(FailureReason::RetriesExhausted { .. })
            ));
        }
        for name in ["d", "e", "f"] {
            assert_eq!(order.document(name).unwrap().failure(), Some(&FailureReason::CircuitOpen));
        }
    }

    #[tokio::test]
    async fn test_success_resets_circuit() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script("c", vec![item_json("S235")])
                .otherwise(unavailable()),
        );
        let order = orchestrator(client.clone(), rules.path())
            .with_circuit_threshold(3)
            .run_to_completion(request("order", &["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 5);
        assert!(order.documents.iter().all(|d| d.failure() != Some(&FailureReason::CircuitOpen)));
        assert_eq!(order.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new().script("a", vec![unavailable(), unavailable(), item_json("S235")]),
        );
        let order = orchestrator(client.clone(), rules.path())
            .with_retry(RetryPolicy::immediate(2))
            .run_to_completion(request("a", &["a"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 3);
        assert_eq!(order.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_order_follows_discovery_not_completion() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .otherwise(item_json("S235"))
                .delay("first", Duration::from_millis(80))
                .delay("second", Duration::from_millis(40)),
        );
        let completed = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&completed);

        let order = orchestrator(client, rules.path())
            .with_concurrency(3)
            .on_document(move |result| log.lock().unwrap().push(result.source.clone()))
            .run_to_completion(request("order", &["first", "second", "third"]))
            .await
            .unwrap();

        assert_eq!(sources(&order), vec!["first", "second", "third"]);
        assert_eq!(*completed.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_assembly_identified() {
        let rules = rules_dir();
        let client = Arc::new(ScriptedClient::new().otherwise(item_json("S235")));
        let order = orchestrator(client, rules.path())
            .run_to_completion(request("10009043_1", &["part_xyz", "10009043_1"]))
            .await
            .unwrap();

        assert_eq!(order.assembly.as_deref(), Some("10009043_1"));
        assert_eq!(order.order_id, "10009043_1");
    }

    #[tokio::test]
    async fn test_assembly_reextraction_merges_bom() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script(
                    "frame",
                    vec![
                        Ok(r#"{"items": [{"material": "S235", "surfaceTreatment": "None"}]}"#.to_string()),
                        Ok(r#"{"items": [{"surfaceTreatment": "galvanized", "bomPartNumbers": ["10009081", "MD-21-04683"]}]}"#.to_string()),
                    ],
                )
                .otherwise(item_json("S235")),
        );
        let order = orchestrator(client.clone(), rules.path())
            .with_reextract_assembly(true)
            .run_to_completion(request("FRAME", &["frame", "plate"]))
            .await
            .unwrap();

        assert_eq!(client.calls(), 3);
        let item = order.document("frame").unwrap().item().unwrap();
        assert_eq!(item.surface_treatment.as_deref(), Some("Verzinkt"));
        assert_eq!(item.bom_part_numbers, vec!["10009081", "MD-21-04683"]);
        assert_eq!(item.material.as_deref(), Some("S235"));
        assert!(order
            .document("frame")
            .unwrap()
            .warnings()
            .contains(&"Surface treatment: Verzinkt".to_string()));
    }

    #[tokio::test]
    async fn test_failed_reextraction_keeps_first_pass() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script(
                    "frame",
                    vec![
                        item_json("S235"),
                        Err(ClientFailure::Fatal {
                            reason: "HTTP 400: bad request".to_string(),
                        }),
                    ],
                )
                .otherwise(item_json("RVS")),
        );
        let order = orchestrator(client, rules.path())
            .with_reextract_assembly(true)
            .run_to_completion(request("frame", &["frame", "plate"]))
            .await
            .unwrap();

        let frame = order.document("frame").unwrap();
        assert!(frame.is_success());
        assert_eq!(frame.item().unwrap().material.as_deref(), Some("S235"));
    }

    #[tokio::test]
    async fn test_interrupt_keeps_completed_results() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .otherwise(item_json("S235"))
                .delay("slow", Duration::from_secs(30)),
        );
        let order = orchestrator(client, rules.path())
            .with_concurrency(2)
            .run(
                request("order", &["fast", "slow"]),
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert!(order.document("fast").unwrap().is_success());
        assert_eq!(order.document("slow").unwrap().failure(), Some(&FailureReason::Interrupted));
    }

    #[tokio::test]
    async fn test_interrupt_during_assembly_reextraction_keeps_first_pass() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script("frame", vec![item_json("S235"), unavailable()])
                .otherwise(item_json("RVS")),
        );
        let started = Instant::now();
        let order = orchestrator(client.clone(), rules.path())
            .with_concurrency(2)
            .with_reextract_assembly(true)
            .with_retry(RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_millis(500),
                jitter: Duration::ZERO,
            })
            .run(
                request("frame", &["frame", "plate"]),
                tokio::time::sleep(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(client.calls(), 3);
        assert_eq!(order.succeeded(), 2);
        let frame = order.document("frame").unwrap();
        assert_eq!(frame.item().unwrap().material.as_deref(), Some("S235"));
        assert_eq!(order.assembly.as_deref(), Some("frame"));
    }

    #[tokio::test]
    async fn test_auto_mode_classifies_first_document() {
        let rules = rules_dir();
        let client = Arc::new(
            ScriptedClient::new()
                .script(
                    "a",
                    vec![Ok(r#"{"customerName": "RADEMAKER"}"#.to_string()), item_json("S235")],
                )
                .otherwise(item_json("S235")),
        );
        let mut request = request("order", &["a", "b"]);
        request.customer = CustomerSelection::Auto;

        let order = orchestrator(client, rules.path())
            .run_to_completion(request)
            .await
            .unwrap();

        assert_eq!(order.customer, CustomerProfile::Rademaker);
        assert_eq!(order.customer_guess.as_ref().unwrap().profile, CustomerProfile::Rademaker);
        assert_eq!(order.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_missing_rules_abort_before_any_request() {
        let rules = rules_dir();
        fs::remove_file(rules.path().join("customers/elten/config.json")).unwrap();
        let client = Arc::new(ScriptedClient::new().otherwise(item_json("S235")));

        let mut auto = request("order", &["a"]);
        auto.customer = CustomerSelection::Auto;
        let result = orchestrator(client.clone(), rules.path()).run_to_completion(auto).await;

        assert!(result.is_err());
        assert_eq!(client.calls(), 0);
    }
}
