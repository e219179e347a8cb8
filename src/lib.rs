pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod services;
pub mod validation;

use std::sync::Arc;

use crate::adapters::{BroadcastEventSink, FanoutEventSink, TracingEventSink, WebhookEventSink};
use crate::config::Config;
use crate::metrics::OperationMetrics;
use crate::ports::{EventSink, TransactionRepository};
use crate::services::{EngineSettings, EventPublisher, LifecycleEngine, NotificationProcessor};

const BROADCAST_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub notifications: NotificationProcessor,
    pub metrics: Arc<OperationMetrics>,
    pub events: BroadcastEventSink,
}

impl AppState {
    /// Wires the engine to the given store and to the sinks the config enables.
    pub fn build(
        config: &Config,
        repository: Arc<dyn TransactionRepository>,
    ) -> anyhow::Result<Self> {
        let events = BroadcastEventSink::new(BROADCAST_CAPACITY);
        let mut sinks: Vec<Arc<dyn EventSink>> =
            vec![Arc::new(TracingEventSink), Arc::new(events.clone())];

        if let (Some(url), Some(secret)) = (&config.event_webhook_url, &config.event_webhook_secret) {
            sinks.push(Arc::new(WebhookEventSink::new(url.clone(), secret.clone())?));
            tracing::info!("Webhook event sink enabled for {}", url);
        }

        let metrics = Arc::new(OperationMetrics::new()?);
        let publisher = EventPublisher::new(Arc::new(FanoutEventSink::new(sinks)));
        let engine = Arc::new(
            LifecycleEngine::new(repository, publisher)
                .with_observer(metrics.clone())
                .with_settings(EngineSettings::from(config)),
        );
        let notifications =
            NotificationProcessor::new(Arc::clone(&engine)).with_policy(config.notification_retry);

        Ok(Self {
            engine,
            notifications,
            metrics,
            events,
        })
    }
}
