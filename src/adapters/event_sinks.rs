//! Event sink implementations.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::broadcast;

use crate::domain::DomainEvent;
use crate::ports::{EventSink, PublishError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-R2P-Signature";
pub const EVENT_HEADER: &str = "X-R2P-Event";

/// Fans events out to in-process subscribers.
#[derive(Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        // Sending without receivers is not a failure.
        if self.sender.send(event.clone()).is_err() {
            tracing::debug!(event = event.name(), "No broadcast subscribers");
        }
        Ok(())
    }
}

/// Logs each event and drops it.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        tracing::info!(
            event = event.name(),
            payment_request_id = %event.payment_request_id(),
            status = %event.transaction.transaction_status,
            version = event.transaction.version,
            "Domain event"
        );
        Ok(())
    }
}

/// POSTs events as JSON, signed with HMAC-SHA256 over the body.
///
/// Server errors and transport failures are retried up to `max_retries` times;
/// client errors are returned immediately.
pub struct WebhookEventSink {
    client: reqwest::Client,
    url: String,
    secret: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl WebhookEventSink {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PublishError::Delivery(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            secret: secret.into(),
            max_retries: 3,
            retry_delay: Duration::from_millis(200),
        })
    }

    pub fn with_retries(mut self, max_retries: usize, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn signature_for(&self, body: &[u8]) -> Result<String, PublishError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PublishError::Rejected(format!("invalid signing key: {}", e)))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl EventSink for WebhookEventSink {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let body = serde_json::to_vec(event)?;
        let signature = self.signature_for(&body)?;
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let response = self
                .client
                .post(&self.url)
                .header("Content-Type", "application/json")
                .header(SIGNATURE_HEADER, signature.as_str())
                .header(EVENT_HEADER, event.name())
                .body(body.clone())
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(event = event.name(), attempts, "Webhook delivered");
                    return Ok(());
                }
                Ok(resp) if resp.status().is_server_error() && attempts <= self.max_retries => {
                    tracing::warn!(
                        status = %resp.status(),
                        attempts,
                        "Webhook delivery failed, retrying"
                    );
                }
                Ok(resp) => {
                    return Err(PublishError::Rejected(format!(
                        "webhook responded with {} after {} attempt(s)",
                        resp.status(),
                        attempts
                    )));
                }
                Err(e) if attempts <= self.max_retries => {
                    tracing::warn!(error = %e, attempts, "Webhook transport error, retrying");
                }
                Err(e) => return Err(PublishError::Delivery(e.to_string())),
            }

            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

/// Publishes to every inner sink; the first failure is reported after all ran.
pub struct FanoutEventSink {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let results = futures::future::join_all(self.sinks.iter().map(|s| s.publish(event))).await;
        results.into_iter().collect::<Result<Vec<_>, _>>().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_hex_hmac() {
        let sink = WebhookEventSink::new("http://localhost", "my-secret").unwrap();
        let sig = sink.signature_for(b"payload").unwrap();

        let mut mac = HmacSha256::new_from_slice(b"my-secret").unwrap();
        mac.update(b"payload");
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));
        assert_eq!(sig.len(), 64);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        use crate::domain::EventKind;
        use serde_json::json;

        let sink = BroadcastEventSink::new(8);
        let tx: crate::domain::Transaction = serde_json::from_value(json!({
            "paymentRequestId": "pr", "endToEndId": "e2e", "requestMessageId": "m",
            "responseMessageId": null, "transactionStatus": "PDNG", "cancellationReason": null,
            "useCase": "P2P", "product": null, "requestedAmount": "10",
            "requestedAmountCurrency": "UAH", "acceptedAmount": null,
            "acceptedAmountCurrency": null, "creditorAgentId": "c", "debtorAgentId": "d",
            "creditorAlias": null, "creditorAliasType": null, "debtorAlias": null,
            "debtorAliasType": null, "dueDate": null, "requestReason": null, "message": null,
            "settlementDetails": null, "originalPaymentRequestId": null, "isRefund": false,
            "creditorAckMessage": null, "creditorAckEmoji": null, "version": 0,
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let event = DomainEvent::new(EventKind::Initiated, tx, &json!({}));

        assert!(sink.publish(&event).await.is_ok());

        let mut rx = sink.subscribe();
        sink.publish(&event).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().event_id, event.event_id);
    }
}
