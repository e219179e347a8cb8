//! Lifecycle orchestration for request-to-pay transactions.
//!
//! Every state-changing operation follows the same path: validation gate,
//! store read, in-memory transition, compare-and-swap write, detached event
//! publication, observer callback, response assembly.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde_json::json;

use crate::config::Config;
use crate::domain::events::{DomainEvent, EventKind};
use crate::domain::requests::{
    AmendRequest, CancelRequest, ConfirmRequest, InitiateRequest, NotificationEvent,
    RefundRequest, TagRequest,
};
use crate::domain::responses::{
    new_response_message_id, AmendResponse, CancelResponse, ConfirmResponse, InitiateResponse,
    PaymentRequestMinResponse, RefundResponse,
};
use crate::domain::{Transaction, TransactionStatus};
use crate::error::AppError;
use crate::ports::{
    NoopObserver, Operation, OperationObserver, Outcome, RepositoryResult, TransactionFilter,
    TransactionRepository,
};
use crate::services::publisher::EventPublisher;
use crate::services::retry::{retry_with_backoff, RetryPolicy};
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub store_timeout: Duration,
    pub write_retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            write_retry: RetryPolicy::writes(),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            store_timeout: config.store_timeout,
            write_retry: config.write_retry,
        }
    }
}

/// Result of applying one network notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    Applied(TransactionStatus),
    Reminded,
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpirySummary {
    pub expired: usize,
    pub failed: usize,
}

pub struct LifecycleEngine {
    repository: Arc<dyn TransactionRepository>,
    publisher: EventPublisher,
    observer: Arc<dyn OperationObserver>,
    settings: EngineSettings,
}

impl LifecycleEngine {
    pub fn new(repository: Arc<dyn TransactionRepository>, publisher: EventPublisher) -> Self {
        Self {
            repository,
            publisher,
            observer: Arc::new(NoopObserver),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    async fn store<T, Fut>(&self, call: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = RepositoryResult<T>>,
    {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result.map_err(AppError::from),
            Err(_) => Err(AppError::Transient(format!(
                "store call exceeded {:?}",
                self.settings.store_timeout
            ))),
        }
    }

    fn observe<T>(&self, operation: Operation, result: Result<T, AppError>) -> Result<T, AppError> {
        match &result {
            Ok(_) => self.observer.record(operation, Outcome::Success),
            Err(e) => {
                self.observer.record(operation, Outcome::Failure);
                match e {
                    AppError::Unexpected(_) => tracing::error!(
                        operation = operation.as_str(),
                        code = %e.code(),
                        "Operation failed: {}",
                        e
                    ),
                    _ => tracing::warn!(
                        operation = operation.as_str(),
                        code = %e.code(),
                        "Operation rejected: {}",
                        e
                    ),
                }
            }
        }
        result
    }

    /// One read-transition-write cycle against the current stored version.
    async fn mutate_once<F>(&self, payment_request_id: &str, apply: &F) -> Result<Transaction, AppError>
    where
        F: Fn(&mut Transaction) -> Result<(), AppError> + Send + Sync,
    {
        let mut tx = self
            .store(self.repository.find_by_payment_request_id(payment_request_id))
            .await?;
        apply(&mut tx)?;
        self.store(self.repository.compare_and_swap(&tx)).await
    }

    /// Retries conflicts and transient failures, re-reading before each attempt.
    ///
    /// A write that failed transiently may still have committed. When the
    /// re-read row is exactly what that write would have produced, it is
    /// returned as the result instead of applying the change a second time.
    async fn mutate<F>(&self, payment_request_id: &str, apply: F) -> Result<Transaction, AppError>
    where
        F: Fn(&mut Transaction) -> Result<(), AppError> + Send + Sync,
    {
        let apply = &apply;
        let unacknowledged: Mutex<Option<Transaction>> = Mutex::new(None);
        let unacknowledged = &unacknowledged;

        retry_with_backoff(self.settings.write_retry, "write", move |_| async move {
            let mut tx = self
                .store(self.repository.find_by_payment_request_id(payment_request_id))
                .await?;

            let candidate = unacknowledged.lock().ok().and_then(|mut slot| slot.take());
            if let Some(candidate) = candidate {
                if write_landed(&candidate, &tx) {
                    tracing::info!(
                        payment_request_id = %tx.payment_request_id,
                        version = tx.version,
                        "Unacknowledged write had committed"
                    );
                    return Ok(tx);
                }
            }

            apply(&mut tx)?;
            let written = self.store(self.repository.compare_and_swap(&tx)).await;
            match written {
                Err(AppError::Transient(reason)) => {
                    if let Ok(mut slot) = unacknowledged.lock() {
                        *slot = Some(tx);
                    }
                    Err(AppError::Transient(reason))
                }
                result => result,
            }
        })
        .await
    }

    pub async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse, AppError> {
        let result = self.initiate_inner(request).await;
        self.observe(Operation::Initiate, result)
    }

    async fn initiate_inner(&self, request: &InitiateRequest) -> Result<InitiateResponse, AppError> {
        validation::validate_initiate(request, Utc::now().date_naive())?;

        let existing = self
            .store(self.repository.find_by_request_message_id(&request.request_message_id))
            .await?;
        if !existing.is_empty() {
            tracing::info!(
                request_message_id = %request.request_message_id,
                "Initiation replayed, returning original response"
            );
            if let Some(response) = replay_initiation(request, existing) {
                return Ok(response);
            }
        }

        let response_message_id = new_response_message_id();
        let now = Utc::now();
        let rows: Vec<Transaction> = request
            .payment_requests
            .iter()
            .map(|detail| Transaction::from_initiation(request, detail, &response_message_id, now))
            .collect();

        let stored = match self.store(self.repository.insert_all(&rows)).await {
            Ok(stored) => stored,
            Err(AppError::Conflict(reason)) => {
                // Lost an insert race against the same request message id.
                let existing = self
                    .store(self.repository.find_by_request_message_id(&request.request_message_id))
                    .await?;
                return replay_initiation(request, existing).ok_or(AppError::Conflict(reason));
            }
            Err(e) => return Err(e),
        };

        for tx in &stored {
            self.publisher
                .publish(DomainEvent::new(EventKind::Initiated, tx.clone(), request));
        }
        tracing::info!(
            request_message_id = %request.request_message_id,
            count = stored.len(),
            "Payment requests initiated"
        );

        Ok(InitiateResponse {
            response_message_id,
            request_message_id: request.request_message_id.clone(),
            payment_requests: stored.iter().map(PaymentRequestMinResponse::from).collect(),
            creation_date_time: now,
        })
    }

    pub async fn confirm(
        &self,
        payment_request_id: &str,
        request: &ConfirmRequest,
    ) -> Result<ConfirmResponse, AppError> {
        let result = async {
            validation::validate_confirm(request)?;
            let tx = self
                .mutate(payment_request_id, |tx| {
                    tx.apply_confirmation(request)?;
                    Ok(())
                })
                .await?;

            self.publisher
                .publish(DomainEvent::new(EventKind::Confirmed, tx.clone(), request));
            tracing::info!(
                payment_request_id = %tx.payment_request_id,
                status = %tx.transaction_status,
                "Payment request confirmed"
            );

            Ok::<_, AppError>(ConfirmResponse {
                response_message_id: new_response_message_id(),
                payment_request_id: tx.payment_request_id,
                end_to_end_id: tx.end_to_end_id,
                request_message_id: request.request_message_id.clone(),
                transaction_status: tx.transaction_status,
                creation_date_time: Utc::now(),
            })
        }
        .await;
        self.observe(Operation::Confirm, result)
    }

    pub async fn cancel(
        &self,
        payment_request_id: &str,
        request: &CancelRequest,
    ) -> Result<CancelResponse, AppError> {
        let result = async {
            validation::validate_cancel(request)?;
            let tx = self
                .mutate(payment_request_id, |tx| {
                    tx.apply_cancellation(request)?;
                    Ok(())
                })
                .await?;

            self.publisher
                .publish(DomainEvent::new(EventKind::Cancelled, tx.clone(), request));
            tracing::info!(
                payment_request_id = %tx.payment_request_id,
                reason = request.cancellation_reason.as_str(),
                "Payment request cancelled"
            );

            Ok::<_, AppError>(CancelResponse {
                response_message_id: new_response_message_id(),
                payment_request_id: tx.payment_request_id,
                request_message_id: request.request_message_id.clone(),
                transaction_status: tx.transaction_status,
                creation_date_time: Utc::now(),
            })
        }
        .await;
        self.observe(Operation::Cancel, result)
    }

    pub async fn amend(
        &self,
        payment_request_id: &str,
        request: &AmendRequest,
    ) -> Result<AmendResponse, AppError> {
        let result = async {
            validation::validate_amend(request, Utc::now().date_naive())?;
            let tx = self
                .mutate(payment_request_id, |tx| {
                    tx.apply_amendment(request)?;
                    Ok(())
                })
                .await?;

            self.publisher
                .publish(DomainEvent::new(EventKind::Amended, tx.clone(), request));
            tracing::info!(payment_request_id = %tx.payment_request_id, "Payment request amended");

            Ok::<_, AppError>(AmendResponse {
                response_message_id: new_response_message_id(),
                payment_request_id: tx.payment_request_id,
                request_message_id: request.request_message_id.clone(),
                transaction_status: tx.transaction_status,
                creation_date_time: Utc::now(),
            })
        }
        .await;
        self.observe(Operation::Amend, result)
    }

    pub async fn refund(
        &self,
        original_payment_request_id: &str,
        request: &RefundRequest,
    ) -> Result<RefundResponse, AppError> {
        let result = async {
            validation::validate_refund(request)?;
            let original = self
                .store(self.repository.find_by_payment_request_id(original_payment_request_id))
                .await?;

            let response_message_id = new_response_message_id();
            let now = Utc::now();
            let rows = request
                .payment_requests
                .iter()
                .map(|line| Transaction::refund_of(&original, request, line, &response_message_id, now))
                .collect::<Result<Vec<_>, _>>()?;
            original.ensure_refund_fits(request)?;

            let stored = self.store(self.repository.insert_all(&rows)).await?;
            for tx in &stored {
                self.publisher
                    .publish(DomainEvent::new(EventKind::Refunded, tx.clone(), request));
            }
            tracing::info!(
                original_payment_request_id = %original.payment_request_id,
                count = stored.len(),
                "Refund requested"
            );

            Ok::<_, AppError>(RefundResponse {
                response_message_id,
                request_message_id: request.request_message_id.clone(),
                payment_requests: stored.iter().map(PaymentRequestMinResponse::from).collect(),
                creation_date_time: now,
            })
        }
        .await;
        self.observe(Operation::Refund, result)
    }

    pub async fn tag(&self, request: &TagRequest) -> Result<Transaction, AppError> {
        let result = async {
            validation::validate_tag(request)?;
            let tx = self
                .mutate(&request.tagged_transaction.transaction_id, |tx| {
                    tx.apply_tag(request);
                    Ok(())
                })
                .await?;

            self.publisher
                .publish(DomainEvent::new(EventKind::Tagged, tx.clone(), request));
            tracing::info!(payment_request_id = %tx.payment_request_id, "Transaction tagged");
            Ok::<_, AppError>(tx)
        }
        .await;
        self.observe(Operation::Tag, result)
    }

    /// Applies one network notification in a single attempt. Retrying is the
    /// caller's concern.
    pub async fn apply_notification(
        &self,
        agent_id: &str,
        event: &NotificationEvent,
    ) -> Result<NotificationOutcome, AppError> {
        let Some((kind, target)) = EventKind::for_notification(event.event_type) else {
            tracing::debug!(
                payment_request_id = %event.payment_request_id,
                "Ignoring unrecognised notification"
            );
            return Ok(NotificationOutcome::Ignored);
        };

        let result = async {
            match target {
                None => {
                    let tx = self
                        .store(self.repository.find_by_payment_request_id(&event.payment_request_id))
                        .await?;
                    self.publisher.publish(DomainEvent::from_agent(kind, tx, agent_id));
                    Ok::<_, AppError>(NotificationOutcome::Reminded)
                }
                Some(status) => {
                    let transition = |tx: &mut Transaction| -> Result<(), AppError> {
                        tx.ensure_not_terminal(kind.name())?;
                        tx.transition_to(status)?;
                        Ok(())
                    };
                    let tx = self
                        .mutate_once(&event.payment_request_id, &transition)
                        .await?;
                    self.publisher.publish(DomainEvent::from_agent(kind, tx, agent_id));
                    Ok(NotificationOutcome::Applied(status))
                }
            }
        }
        .await;
        self.observe(Operation::Notification, result)
    }

    /// Moves every pending request whose due date is before `today` to EXPD.
    /// Rows that fail are logged and skipped.
    pub async fn expire_overdue(&self, today: NaiveDate) -> Result<ExpirySummary, AppError> {
        let overdue = self
            .store(self.repository.list(&TransactionFilter::overdue(today)))
            .await?;
        let mut summary = ExpirySummary::default();

        for candidate in overdue {
            let result = self
                .mutate(&candidate.payment_request_id, |tx| {
                    tx.ensure_not_terminal("expire")?;
                    tx.transition_to(TransactionStatus::Expd)?;
                    Ok(())
                })
                .await;

            match self.observe(Operation::Expire, result) {
                Ok(tx) => {
                    let payload = json!({ "dueDate": tx.due_date, "sweepDate": today });
                    self.publisher
                        .publish(DomainEvent::new(EventKind::Expired, tx, &payload));
                    summary.expired += 1;
                }
                Err(_) => summary.failed += 1,
            }
        }

        if summary.expired > 0 || summary.failed > 0 {
            tracing::info!(
                expired = summary.expired,
                failed = summary.failed,
                "Expiry sweep finished"
            );
        }
        Ok(summary)
    }

    pub async fn get(&self, payment_request_id: &str) -> Result<Transaction, AppError> {
        self.store(self.repository.find_by_payment_request_id(payment_request_id))
            .await
    }

    pub async fn get_by_end_to_end_id(&self, end_to_end_id: &str) -> Result<Transaction, AppError> {
        self.store(self.repository.find_by_end_to_end_id(end_to_end_id))
            .await
    }

    pub async fn get_many(&self, payment_request_ids: &[String]) -> Result<Vec<Transaction>, AppError> {
        self.store(self.repository.find_by_payment_request_ids(payment_request_ids))
            .await
    }

    pub async fn get_many_by_end_to_end_ids(
        &self,
        end_to_end_ids: &[String],
    ) -> Result<Vec<Transaction>, AppError> {
        self.store(self.repository.find_by_end_to_end_ids(end_to_end_ids))
            .await
    }

    pub async fn refunds_of(&self, original_payment_request_id: &str) -> Result<Vec<Transaction>, AppError> {
        self.store(
            self.repository
                .list(&TransactionFilter::refunds_of(original_payment_request_id)),
        )
        .await
    }

    pub async fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, AppError> {
        self.store(self.repository.list(filter)).await
    }
}

/// True when `stored` is the row that writing `candidate` produces.
fn write_landed(candidate: &Transaction, stored: &Transaction) -> bool {
    if stored.version != candidate.version + 1 {
        return false;
    }
    let mut expected = candidate.clone();
    expected.version = stored.version;
    expected.updated_at = stored.updated_at;
    &expected == stored
}

fn replay_initiation(
    request: &InitiateRequest,
    mut existing: Vec<Transaction>,
) -> Option<InitiateResponse> {
    existing.sort_by_key(|tx| {
        request
            .payment_requests
            .iter()
            .position(|detail| detail.end_to_end_id == tx.end_to_end_id)
            .unwrap_or(usize::MAX)
    });

    let first = existing.first()?;
    Some(InitiateResponse {
        response_message_id: first
            .response_message_id
            .clone()
            .unwrap_or_else(new_response_message_id),
        request_message_id: request.request_message_id.clone(),
        payment_requests: existing.iter().map(PaymentRequestMinResponse::from).collect(),
        creation_date_time: first.created_at,
    })
}
