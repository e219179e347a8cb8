pub mod event_sinks;
pub mod memory_transaction_repository;
pub mod postgres_transaction_repository;

pub use event_sinks::{BroadcastEventSink, FanoutEventSink, TracingEventSink, WebhookEventSink};
pub use memory_transaction_repository::InMemoryTransactionRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
