//! Lifecycle operation counters, exposed in the Prometheus text format.
//!
//! Counters live in a dedicated [`prometheus::Registry`] so several engines in
//! one process do not collide.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::ports::{Operation, OperationObserver, Outcome};

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "success",
        Outcome::Failure => "failure",
    }
}

/// Per-operation success and failure counters.
#[derive(Clone)]
pub struct OperationMetrics {
    registry: Registry,
    operations: IntCounterVec,
}

impl OperationMetrics {
    /// Registers the counter family and seeds every operation/outcome series at zero.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("r2p".into()), None)?;
        let operations = IntCounterVec::new(
            Opts::new("operations_total", "Lifecycle operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        for operation in Operation::ALL {
            for outcome in [Outcome::Success, Outcome::Failure] {
                operations.with_label_values(&[operation.as_str(), outcome_label(outcome)]);
            }
        }

        Ok(Self {
            registry,
            operations,
        })
    }

    pub fn count(&self, operation: Operation, outcome: Outcome) -> u64 {
        self.operations
            .with_label_values(&[operation.as_str(), outcome_label(outcome)])
            .get()
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl OperationObserver for OperationMetrics {
    fn record(&self, operation: Operation, outcome: Outcome) {
        self.operations
            .with_label_values(&[operation.as_str(), outcome_label(outcome)])
            .inc();
    }
}
