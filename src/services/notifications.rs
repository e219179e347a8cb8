//! Applies batches of network notifications.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::domain::requests::{NotificationBatch, NotificationEvent};
use crate::error::AppError;
use crate::services::lifecycle::{LifecycleEngine, NotificationOutcome};
use crate::services::retry::{retry_with_backoff, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedNotification {
    pub payment_request_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub applied: usize,
    pub reminded: usize,
    pub ignored: usize,
    pub dropped: Vec<DroppedNotification>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.applied + self.reminded + self.ignored + self.dropped.len()
    }
}

/// Runs every event of a batch on its own task. A failing event never affects
/// its siblings, and the batch always completes.
#[derive(Clone)]
pub struct NotificationProcessor {
    engine: Arc<LifecycleEngine>,
    policy: RetryPolicy,
}

impl NotificationProcessor {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self {
            engine,
            policy: RetryPolicy::notifications(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn process_batch(&self, batch: &NotificationBatch) -> BatchReport {
        tracing::info!(
            agent_id = %batch.agent_id,
            request_message_id = %batch.request_message_id,
            events = batch.events.len(),
            "Processing notification batch"
        );

        let handles = batch.events.iter().cloned().map(|event| {
            let engine = Arc::clone(&self.engine);
            let agent_id = batch.agent_id.clone();
            let policy = self.policy;
            tokio::spawn(async move {
                let result = process_event(&engine, policy, &agent_id, &event).await;
                (event.payment_request_id, result)
            })
        });

        let mut report = BatchReport::default();
        for (joined, event) in join_all(handles).await.into_iter().zip(&batch.events) {
            match joined {
                Ok((_, Ok(NotificationOutcome::Applied(_)))) => report.applied += 1,
                Ok((_, Ok(NotificationOutcome::Reminded))) => report.reminded += 1,
                Ok((_, Ok(NotificationOutcome::Ignored))) => report.ignored += 1,
                Ok((payment_request_id, Err(e))) => {
                    tracing::error!(
                        payment_request_id = %payment_request_id,
                        code = %e.code(),
                        "Dropping notification: {}",
                        e
                    );
                    report.dropped.push(DroppedNotification {
                        payment_request_id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!(
                        payment_request_id = %event.payment_request_id,
                        "Notification task aborted: {}",
                        e
                    );
                    report.dropped.push(DroppedNotification {
                        payment_request_id: event.payment_request_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            agent_id = %batch.agent_id,
            applied = report.applied,
            reminded = report.reminded,
            ignored = report.ignored,
            dropped = report.dropped.len(),
            "Notification batch complete"
        );
        report
    }
}

async fn process_event(
    engine: &LifecycleEngine,
    policy: RetryPolicy,
    agent_id: &str,
    event: &NotificationEvent,
) -> Result<NotificationOutcome, AppError> {
    retry_with_backoff(policy, "notification", |attempt| async move {
        tracing::debug!(
            payment_request_id = %event.payment_request_id,
            event_type = ?event.event_type,
            attempt,
            "Applying notification"
        );
        engine.apply_notification(agent_id, event).await
    })
    .await
}
