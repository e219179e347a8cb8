use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info};

use crate::services::lifecycle::LifecycleEngine;

/// Periodically expires pending requests whose due date has passed.
pub async fn run_expiry_sweeper(engine: Arc<LifecycleEngine>, interval: Duration) {
    info!("Expiry sweeper started, interval {:?}", interval);

    loop {
        if let Err(e) = engine.expire_overdue(Utc::now().date_naive()).await {
            error!("Expiry sweep error: {}", e);
        }

        sleep(interval).await;
    }
}
