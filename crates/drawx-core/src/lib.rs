//! Core library for technical-drawing extraction.
//!
//! This crate provides:
//! - Rule resolution (base rules merged with a customer override)
//! - Customer classification from a representative drawing
//! - The extraction adapter around a multimodal model client (Gemini)
//! - Batch orchestration with retry, circuit breaker and bounded concurrency
//! - Operator warnings derived from extracted items
//! - Order-level result assembly

pub mod batch;
pub mod client;
pub mod error;
pub mod models;
pub mod rules;
pub mod warnings;

pub use error::{DrawxError, ResponseError, Result, RuleError};
pub use models::config::DrawxConfig;
pub use models::item::{ExtractedItem, HoleKind, HoleSpec, ToleratedLength};
pub use models::order::{DocumentResult, DocumentStatus, FailureReason, OrderResult};
pub use rules::{CustomerProfile, CustomerSelection, EffectiveConfig, RuleResolver};
pub use client::{
    ClientFailure, Document, ExtractionAdapter, ExtractionOutcome, ExtractionRequest,
    GeminiClient, ModelClient,
};
pub use client::classifier::{Classifier, Confidence, CustomerGuess};
pub use batch::{BatchOrchestrator, BatchRequest, CircuitBreaker, RetryPolicy};
pub use warnings::generate_warnings;
