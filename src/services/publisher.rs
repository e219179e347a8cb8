use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::domain::DomainEvent;
use crate::ports::EventSink;

/// Dispatches events on detached tasks. Callers never wait on delivery and a
/// failed publish is only logged.
#[derive(Clone)]
pub struct EventPublisher {
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// The returned handle may be dropped; the task keeps running.
    pub fn publish(&self, event: DomainEvent) -> JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            match sink.publish(&event).await {
                Ok(()) => tracing::debug!(
                    event = event.name(),
                    payment_request_id = %event.payment_request_id(),
                    "Event published"
                ),
                Err(e) => tracing::warn!(
                    event = event.name(),
                    payment_request_id = %event.payment_request_id(),
                    error = %e,
                    "Event publication failed"
                ),
            }
        })
    }
}
