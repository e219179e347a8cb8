pub mod expiry;
pub mod lifecycle;
pub mod notifications;
pub mod publisher;
pub mod retry;

pub use expiry::run_expiry_sweeper;
pub use lifecycle::{EngineSettings, ExpirySummary, LifecycleEngine, NotificationOutcome};
pub use notifications::{BatchReport, NotificationProcessor};
pub use publisher::EventPublisher;
pub use retry::{retry_with_backoff, RetryPolicy};
