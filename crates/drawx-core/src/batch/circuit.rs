//! Batch-wide circuit breaker.

use std::sync::{Mutex, PoisonError};

use tracing::error;

/// Halts new requests after a run of consecutive retryable failures.
///
/// One breaker is shared by every worker of a batch. Once open it stays open
/// for the rest of the batch.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    state: Mutex<CircuitState>,
}

#[derive(Debug, Default)]
struct CircuitState {
    consecutive_failures: u32,
    open: bool,
}

impl CircuitBreaker {
    /// A threshold of zero disables the breaker.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            state: Mutex::new(CircuitState::default()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut CircuitState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn is_open(&self) -> bool {
        self.with_state(|state| state.open)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.with_state(|state| state.consecutive_failures)
    }

    pub fn record_success(&self) {
        self.with_state(|state| {
            if !state.open {
                state.consecutive_failures = 0;
            }
        });
    }

    /// Count a retryable failure. Returns `true` when this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let threshold = self.threshold;
        let opened = self.with_state(|state| {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if !state.open && threshold > 0 && state.consecutive_failures >= threshold {
                state.open = true;
                true
            } else {
                false
            }
        });
        if opened {
            error!(
                threshold,
                "Circuit breaker opened after {threshold} consecutive failures; no new requests will be issued"
            );
        }
        opened
    }
}
