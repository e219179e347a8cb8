//! Seams between the lifecycle engine and its collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{DomainEvent, Transaction, TransactionStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("version conflict on {payment_request_id}: expected version {expected}")]
    VersionConflict {
        payment_request_id: String,
        expected: i64,
    },

    #[error("duplicate transaction: {0}")]
    Duplicate(String),

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Unexpected(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Predicates for `TransactionRepository::list`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    /// Matches either the creditor or the debtor agent.
    pub agent_id: Option<String>,
    pub original_payment_request_id: Option<String>,
    pub is_refund: Option<bool>,
    /// Rows whose due date is strictly before this date.
    pub due_before: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn overdue(today: NaiveDate) -> Self {
        Self {
            status: Some(TransactionStatus::Pdng),
            due_before: Some(today),
            ..Self::default()
        }
    }

    pub fn refunds_of(original_payment_request_id: &str) -> Self {
        Self {
            original_payment_request_id: Some(original_payment_request_id.to_string()),
            is_refund: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(status) = self.status {
            if tx.transaction_status != status {
                return false;
            }
        }
        if let Some(agent) = &self.agent_id {
            if &tx.creditor_agent_id != agent && &tx.debtor_agent_id != agent {
                return false;
            }
        }
        if let Some(original) = &self.original_payment_request_id {
            if tx.original_payment_request_id.as_ref() != Some(original) {
                return false;
            }
        }
        if let Some(is_refund) = self.is_refund {
            if tx.is_refund != is_refund {
                return false;
            }
        }
        if let Some(cutoff) = self.due_before {
            match tx.due_date {
                Some(due) if due < cutoff => {}
                _ => return false,
            }
        }
        true
    }
}

/// Durable store of transactions.
///
/// `compare_and_swap` is the only mutation path for existing rows: it succeeds
/// only when the stored version equals `tx.version`, and returns the stored row
/// with `version + 1`.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts every row or none of them.
    async fn insert_all(&self, txs: &[Transaction]) -> RepositoryResult<Vec<Transaction>>;

    async fn find_by_payment_request_id(&self, id: &str) -> RepositoryResult<Transaction>;

    /// Most recently created row carrying this end-to-end id.
    async fn find_by_end_to_end_id(&self, end_to_end_id: &str) -> RepositoryResult<Transaction>;

    async fn find_by_payment_request_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>>;

    async fn find_by_end_to_end_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>>;

    /// Non-refund rows created by the initiation with this request message id.
    async fn find_by_request_message_id(
        &self,
        request_message_id: &str,
    ) -> RepositoryResult<Vec<Transaction>>;

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>>;

    async fn compare_and_swap(&self, tx: &Transaction) -> RepositoryResult<Transaction>;
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event rejected by sink: {0}")]
    Rejected(String),

    #[error("event delivery failed: {0}")]
    Delivery(String),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initiate,
    Confirm,
    Cancel,
    Amend,
    Refund,
    Tag,
    Notification,
    Expire,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Initiate => "initiate",
            Operation::Confirm => "confirm",
            Operation::Cancel => "cancel",
            Operation::Amend => "amend",
            Operation::Refund => "refund",
            Operation::Tag => "tag",
            Operation::Notification => "notification",
            Operation::Expire => "expire",
        }
    }

    pub const ALL: [Operation; 8] = [
        Operation::Initiate,
        Operation::Confirm,
        Operation::Cancel,
        Operation::Amend,
        Operation::Refund,
        Operation::Tag,
        Operation::Notification,
        Operation::Expire,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

/// Receives one callback per completed lifecycle operation.
pub trait OperationObserver: Send + Sync {
    fn record(&self, operation: Operation, outcome: Outcome);
}

pub struct NoopObserver;

impl OperationObserver for NoopObserver {
    fn record(&self, _operation: Operation, _outcome: Outcome) {}
}
