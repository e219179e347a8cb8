#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};

use r2p_core::adapters::InMemoryTransactionRepository;
use r2p_core::domain::requests::{
    CancelRequest, CancellationReason, ConfirmRequest, Creditor, InitiateRequest, MessageEvent,
    PaymentRequestDetail, RefundPaymentRequest, RefundRequest, TagRequest, TaggedTransaction,
};
use r2p_core::domain::{AliasType, DomainEvent, Transaction, TransactionStatus, UseCase};
use r2p_core::metrics::OperationMetrics;
use r2p_core::ports::{
    EventSink, PublishError, RepositoryError, RepositoryResult, TransactionFilter,
    TransactionRepository,
};
use r2p_core::services::{EngineSettings, EventPublisher, LifecycleEngine, RetryPolicy};

/// Collects every published event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Publication is detached, so poll until `count` events arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<DomainEvent> {
        for _ in 0..200 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.events()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(PublishError::Delivery("sink unavailable".to_string()));
        }
        Ok(())
    }
}

/// Wraps the in-memory store, injecting failures and counting calls.
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: InMemoryTransactionRepository,
    pub transient_writes: AtomicUsize,
    pub conflicting_writes: AtomicUsize,
    pub stalled_writes: AtomicUsize,
    pub write_delay: Option<Duration>,
    pub read_delay: Option<Duration>,
    pub cas_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
}

impl FlakyRepository {
    pub fn new(inner: InMemoryTransactionRepository) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn failing_writes(self, transient: usize) -> Self {
        self.transient_writes.store(transient, Ordering::SeqCst);
        self
    }

    pub fn conflicting_writes(self, conflicts: usize) -> Self {
        self.conflicting_writes.store(conflicts, Ordering::SeqCst);
        self
    }

    /// The next `count` writes commit, then hang for `delay` before answering.
    pub fn stalling_after_commit(mut self, count: usize, delay: Duration) -> Self {
        self.stalled_writes.store(count, Ordering::SeqCst);
        self.write_delay = Some(delay);
        self
    }

    pub fn slow_reads(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn cas_calls(&self) -> usize {
        self.cas_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl TransactionRepository for FlakyRepository {
    async fn insert_all(&self, txs: &[Transaction]) -> RepositoryResult<Vec<Transaction>> {
        self.inner.insert_all(txs).await
    }

    async fn find_by_payment_request_id(&self, id: &str) -> RepositoryResult<Transaction> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_by_payment_request_id(id).await
    }

    async fn find_by_end_to_end_id(&self, end_to_end_id: &str) -> RepositoryResult<Transaction> {
        self.inner.find_by_end_to_end_id(end_to_end_id).await
    }

    async fn find_by_payment_request_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>> {
        self.inner.find_by_payment_request_ids(ids).await
    }

    async fn find_by_end_to_end_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>> {
        self.inner.find_by_end_to_end_ids(ids).await
    }

    async fn find_by_request_message_id(
        &self,
        request_message_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.inner.find_by_request_message_id(request_message_id).await
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list(filter).await
    }

    async fn compare_and_swap(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.stalled_writes) {
            let committed = self.inner.compare_and_swap(tx).await;
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            return committed;
        }
        if take_one(&self.transient_writes) {
            return Err(RepositoryError::Transient("connection reset".to_string()));
        }
        if take_one(&self.conflicting_writes) {
            return Err(RepositoryError::VersionConflict {
                payment_request_id: tx.payment_request_id.clone(),
                expected: tx.version,
            });
        }
        self.inner.compare_and_swap(tx).await
    }
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        store_timeout: Duration::from_secs(2),
        write_retry: RetryPolicy::new(5, Duration::from_millis(1)),
    }
}

pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub sink: Arc<RecordingSink>,
    pub metrics: Arc<OperationMetrics>,
}

pub fn harness_with(repository: Arc<dyn TransactionRepository>, sink: RecordingSink) -> Harness {
    let sink = Arc::new(sink);
    let metrics = Arc::new(OperationMetrics::new().unwrap());
    let engine = LifecycleEngine::new(repository, EventPublisher::new(sink.clone()))
        .with_observer(metrics.clone())
        .with_settings(fast_settings());
    Harness {
        engine: Arc::new(engine),
        sink,
        metrics,
    }
}

pub fn harness(repository: &InMemoryTransactionRepository) -> Harness {
    harness_with(Arc::new(repository.clone()), RecordingSink::default())
}

pub fn creditor() -> Creditor {
    Creditor {
        creditor_agent_id: "agent-creditor".to_string(),
        creditor_country: "UA".to_string(),
        creditor_agent_country: "UA".to_string(),
        creditor_alias: Some("+380501234567".to_string()),
        creditor_alias_type: Some(AliasType::Mobl),
        creditor_first_name: Some("Olena".to_string()),
        creditor_last_name: Some("K.".to_string()),
        creditor_business_name: None,
        creditor_mcc: None,
        creditor_tax_id: None,
    }
}

pub fn line_item(end_to_end_id: &str, amount: i64) -> PaymentRequestDetail {
    PaymentRequestDetail {
        end_to_end_id: end_to_end_id.to_string(),
        debtor_alias: "payer@example.com".to_string(),
        debtor_alias_type: AliasType::Email,
        debtor_agent_id: "agent-debtor".to_string(),
        debtor_country: "UA".to_string(),
        debtor_agent_country: "UA".to_string(),
        debtor_first_name: "Ivan".to_string(),
        debtor_last_name: "P".to_string(),
        requested_amount: BigDecimal::from(amount),
        requested_amount_currency: "UAH".to_string(),
    }
}

pub fn initiate_request(request_message_id: &str, end_to_end_ids: &[&str]) -> InitiateRequest {
    InitiateRequest {
        request_message_id: request_message_id.to_string(),
        use_case: UseCase::P2P,
        product: None,
        creditor: creditor(),
        payment_requests: end_to_end_ids.iter().map(|id| line_item(id, 100)).collect(),
        due_date: Some(Utc::now().date_naive() + chrono::Duration::days(7)),
        request_reason: None,
    }
}

/// A pending row written straight to the store, bypassing validation.
pub fn pending_row(payment_request_id: &str, due_date: Option<NaiveDate>) -> Transaction {
    let now = Utc::now();
    Transaction {
        payment_request_id: payment_request_id.to_string(),
        end_to_end_id: format!("e2e-{}", payment_request_id),
        request_message_id: format!("msg-{}", payment_request_id),
        response_message_id: Some("resp".to_string()),
        transaction_status: TransactionStatus::Pdng,
        cancellation_reason: None,
        use_case: UseCase::P2P,
        product: None,
        requested_amount: BigDecimal::from(100),
        requested_amount_currency: "UAH".to_string(),
        accepted_amount: None,
        accepted_amount_currency: None,
        creditor_agent_id: "agent-creditor".to_string(),
        debtor_agent_id: "agent-debtor".to_string(),
        creditor_alias: Some("+380501234567".to_string()),
        creditor_alias_type: Some(AliasType::Mobl),
        debtor_alias: Some("payer@example.com".to_string()),
        debtor_alias_type: Some(AliasType::Email),
        due_date,
        request_reason: None,
        message: None,
        settlement_details: None,
        original_payment_request_id: None,
        is_refund: false,
        creditor_ack_message: None,
        creditor_ack_emoji: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn confirm_request(end_to_end_id: &str, status: TransactionStatus) -> ConfirmRequest {
    ConfirmRequest {
        end_to_end_id: end_to_end_id.to_string(),
        request_message_id: "confirm-msg".to_string(),
        transaction_status: status,
        status_reason: None,
        message: Some("settled by debtor".to_string()),
        accepted_amount: Some(BigDecimal::from(100)),
        accepted_amount_currency: Some("UAH".to_string()),
        settlement_details: None,
    }
}

pub fn cancel_request() -> CancelRequest {
    CancelRequest {
        request_message_id: "cancel-msg".to_string(),
        cancellation_reason: CancellationReason::Paid,
    }
}

pub fn refund_request(lines: &[(&str, i64)]) -> RefundRequest {
    RefundRequest {
        request_message_id: "refund-msg".to_string(),
        payment_requests: lines
            .iter()
            .map(|(end_to_end_id, amount)| RefundPaymentRequest {
                end_to_end_id: end_to_end_id.to_string(),
                requested_amount: BigDecimal::from(*amount),
            })
            .collect(),
    }
}

pub fn tag_request(payment_request_id: &str, message: &str) -> TagRequest {
    TagRequest {
        message_event: MessageEvent {
            creditor_ack_emoji: None,
            creditor_ack_message: Some(message.to_string()),
        },
        tagged_transaction: TaggedTransaction {
            transaction_id: payment_request_id.to_string(),
            transaction_id_type: "PAYMENT_REQUEST_ID".to_string(),
        },
    }
}
