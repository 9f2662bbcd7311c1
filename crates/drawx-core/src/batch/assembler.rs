//! Order-level result assembly.

use chrono::Utc;
use tracing::warn;

use crate::client::Document;
use crate::client::classifier::CustomerGuess;
use crate::models::order::{DocumentResult, FailureReason, OrderResult};
use crate::rules::CustomerProfile;

/// Batch-level facts known before any document is processed.
#[derive(Debug, Clone)]
pub struct OrderHeader {
    pub batch_id: String,
    pub customer: CustomerProfile,
    pub customer_guess: Option<CustomerGuess>,
    pub model: String,
}

/// One result per document in discovery order; empty slots become `Interrupted`.
pub fn complete_results(documents: &[Document], slots: Vec<Option<DocumentResult>>) -> Vec<DocumentResult> {
    documents
        .iter()
        .zip(slots.into_iter().chain(std::iter::repeat_with(|| None)))
        .map(|(document, slot)| {
            slot.unwrap_or_else(|| {
                warn!(document = %document.name(), "No result recorded; marking as interrupted");
                DocumentResult::failed(document.name(), FailureReason::Interrupted)
            })
        })
        .collect()
}

/// Index of the assembly document.
///
/// A single-document batch is its own assembly. Otherwise the assembly is
/// the successful document whose part number equals the batch identifier,
/// ignoring case and surrounding whitespace. A failed document matches on
/// its source name instead.
pub fn find_assembly(batch_id: &str, results: &[DocumentResult]) -> Option<usize> {
    if results.len() == 1 {
        return Some(0);
    }
    let wanted = normalize_id(batch_id);
    results.iter().position(|result| match result.item() {
        Some(item) => item
            .part_number
            .as_deref()
            .is_some_and(|part| normalize_id(part) == wanted),
        None => normalize_id(&result.source) == wanted,
    })
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Build the order. The order id is the assembly's part number, else the batch id.
pub fn assemble(header: OrderHeader, results: Vec<DocumentResult>, assembly: Option<usize>) -> OrderResult {
    let assembly = assembly.and_then(|index| results.get(index));
    let order_id = assembly
        .and_then(|result| result.item())
        .and_then(|item| item.part_number.clone())
        .unwrap_or_else(|| header.batch_id.clone());
    let assembly = assembly.map(|result| result.source.clone());

    OrderResult {
        order_id,
        batch_id: header.batch_id,
        customer: header.customer,
        customer_guess: header.customer_guess,
        model: header.model,
        assembly,
        documents: results,
        generated_at: Utc::now(),
    }
}
