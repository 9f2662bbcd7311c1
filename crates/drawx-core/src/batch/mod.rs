//! Batch orchestration: customer resolution, per-document extraction under
//! retry and circuit-breaker discipline, assembly detection and result
//! assembly.

pub mod assembler;
mod circuit;
mod orchestrator;
mod retry;

pub use assembler::OrderHeader;
pub use circuit::CircuitBreaker;
pub use orchestrator::{BatchOrchestrator, BatchRequest};
pub use retry::RetryPolicy;
