use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::Transaction;
use crate::ports::{RepositoryError, RepositoryResult, TransactionFilter, TransactionRepository};

/// A thread-safe in-memory transaction store.
///
/// Uses `Arc<RwLock<HashMap<String, Transaction>>>` keyed by payment request id.
/// The write lock makes each insert batch and each compare-and-swap atomic.
#[derive(Default, Clone)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }
}

fn newest_first(mut rows: Vec<Transaction>) -> Vec<Transaction> {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert_all(&self, txs: &[Transaction]) -> RepositoryResult<Vec<Transaction>> {
        let mut transactions = self.transactions.write().await;

        for (i, tx) in txs.iter().enumerate() {
            if transactions.contains_key(&tx.payment_request_id)
                || txs[..i]
                    .iter()
                    .any(|other| other.payment_request_id == tx.payment_request_id)
            {
                return Err(RepositoryError::Duplicate(tx.payment_request_id.clone()));
            }

            if !tx.is_refund {
                let clash = |other: &Transaction| {
                    !other.is_refund
                        && other.request_message_id == tx.request_message_id
                        && other.end_to_end_id == tx.end_to_end_id
                };
                if transactions.values().any(clash) || txs[..i].iter().any(clash) {
                    return Err(RepositoryError::Duplicate(format!(
                        "{}/{}",
                        tx.request_message_id, tx.end_to_end_id
                    )));
                }
            }
        }

        for tx in txs {
            transactions.insert(tx.payment_request_id.clone(), tx.clone());
        }
        Ok(txs.to_vec())
    }

    async fn find_by_payment_request_id(&self, id: &str) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_by_end_to_end_id(&self, end_to_end_id: &str) -> RepositoryResult<Transaction> {
        let transactions = self.transactions.read().await;
        transactions
            .values()
            .filter(|tx| tx.end_to_end_id == end_to_end_id)
            .max_by_key(|tx| tx.created_at)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(end_to_end_id.to_string()))
    }

    async fn find_by_payment_request_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(ids.iter().filter_map(|id| transactions.get(id).cloned()).collect())
    }

    async fn find_by_end_to_end_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let rows = transactions
            .values()
            .filter(|tx| ids.contains(&tx.end_to_end_id))
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }

    async fn find_by_request_message_id(
        &self,
        request_message_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let mut rows: Vec<Transaction> = transactions
            .values()
            .filter(|tx| !tx.is_refund && tx.request_message_id == request_message_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        let transactions = self.transactions.read().await;
        let rows = transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }

    async fn compare_and_swap(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut transactions = self.transactions.write().await;
        let stored = transactions
            .get_mut(&tx.payment_request_id)
            .ok_or_else(|| RepositoryError::NotFound(tx.payment_request_id.clone()))?;

        if stored.version != tx.version {
            return Err(RepositoryError::VersionConflict {
                payment_request_id: tx.payment_request_id.clone(),
                expected: tx.version,
            });
        }

        let mut next = tx.clone();
        next.version = tx.version + 1;
        next.created_at = stored.created_at;
        next.updated_at = Utc::now();
        *stored = next.clone();
        Ok(next)
    }
}
