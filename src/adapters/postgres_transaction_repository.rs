//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::{AliasType, Transaction, TransactionStatus, UseCase};
use crate::ports::{RepositoryError, RepositoryResult, TransactionFilter, TransactionRepository};

const COLUMNS: &str = r#"
    payment_request_id, end_to_end_id, request_message_id, response_message_id,
    transaction_status, cancellation_reason, use_case, product,
    requested_amount, requested_amount_currency, accepted_amount, accepted_amount_currency,
    creditor_agent_id, debtor_agent_id, creditor_alias, creditor_alias_type,
    debtor_alias, debtor_alias_type, due_date, request_reason, message,
    settlement_details, original_payment_request_id, is_refund,
    creditor_ack_message, creditor_ack_emoji, version, created_at, updated_at
"#;

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::Duplicate(db.message().to_string())
        }
        transient @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            RepositoryError::Transient(transient.to_string())
        }
        other => RepositoryError::Unexpected(other.to_string()),
    }
}

fn into_domain_all(rows: Vec<TransactionRow>) -> RepositoryResult<Vec<Transaction>> {
    rows.into_iter().map(TransactionRow::into_domain).collect()
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert_all(&self, txs: &[Transaction]) -> RepositoryResult<Vec<Transaction>> {
        let mut db_tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for tx in txs {
            sqlx::query(&format!(
                r#"
                INSERT INTO r2p_transactions ({})
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                        $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29)
                "#,
                COLUMNS
            ))
            .bind(&tx.payment_request_id)
            .bind(&tx.end_to_end_id)
            .bind(&tx.request_message_id)
            .bind(&tx.response_message_id)
            .bind(tx.transaction_status.as_str())
            .bind(&tx.cancellation_reason)
            .bind(tx.use_case.as_str())
            .bind(&tx.product)
            .bind(&tx.requested_amount)
            .bind(&tx.requested_amount_currency)
            .bind(&tx.accepted_amount)
            .bind(&tx.accepted_amount_currency)
            .bind(&tx.creditor_agent_id)
            .bind(&tx.debtor_agent_id)
            .bind(&tx.creditor_alias)
            .bind(tx.creditor_alias_type.map(|t| t.as_str()))
            .bind(&tx.debtor_alias)
            .bind(tx.debtor_alias_type.map(|t| t.as_str()))
            .bind(tx.due_date)
            .bind(&tx.request_reason)
            .bind(&tx.message)
            .bind(&tx.settlement_details)
            .bind(&tx.original_payment_request_id)
            .bind(tx.is_refund)
            .bind(&tx.creditor_ack_message)
            .bind(&tx.creditor_ack_emoji)
            .bind(tx.version)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .execute(&mut *db_tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        db_tx.commit().await.map_err(map_sqlx_error)?;
        Ok(txs.to_vec())
    }

    async fn find_by_payment_request_id(&self, id: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM r2p_transactions WHERE payment_request_id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn find_by_end_to_end_id(&self, end_to_end_id: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM r2p_transactions WHERE end_to_end_id = $1 ORDER BY created_at DESC LIMIT 1",
            COLUMNS
        ))
        .bind(end_to_end_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.ok_or_else(|| RepositoryError::NotFound(end_to_end_id.to_string()))?
            .into_domain()
    }

    async fn find_by_payment_request_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM r2p_transactions WHERE payment_request_id = ANY($1)",
            COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_domain_all(rows)
    }

    async fn find_by_end_to_end_ids(&self, ids: &[String]) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM r2p_transactions WHERE end_to_end_id = ANY($1) ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_domain_all(rows)
    }

    async fn find_by_request_message_id(
        &self,
        request_message_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {} FROM r2p_transactions
            WHERE request_message_id = $1 AND NOT is_refund
            ORDER BY created_at ASC
            "#,
            COLUMNS
        ))
        .bind(request_message_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        into_domain_all(rows)
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM r2p_transactions WHERE TRUE", COLUMNS));

        if let Some(status) = filter.status {
            query.push(" AND transaction_status = ").push_bind(status.as_str());
        }
        if let Some(agent) = &filter.agent_id {
            query
                .push(" AND (creditor_agent_id = ")
                .push_bind(agent.clone())
                .push(" OR debtor_agent_id = ")
                .push_bind(agent.clone())
                .push(")");
        }
        if let Some(original) = &filter.original_payment_request_id {
            query
                .push(" AND original_payment_request_id = ")
                .push_bind(original.clone());
        }
        if let Some(is_refund) = filter.is_refund {
            query.push(" AND is_refund = ").push_bind(is_refund);
        }
        if let Some(cutoff) = filter.due_before {
            query.push(" AND due_date < ").push_bind(cutoff);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        into_domain_all(rows)
    }

    async fn compare_and_swap(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE r2p_transactions SET
                transaction_status = $3,
                cancellation_reason = $4,
                requested_amount = $5,
                accepted_amount = $6,
                accepted_amount_currency = $7,
                due_date = $8,
                request_reason = $9,
                message = $10,
                settlement_details = $11,
                creditor_ack_message = $12,
                creditor_ack_emoji = $13,
                version = version + 1,
                updated_at = NOW()
            WHERE payment_request_id = $1 AND version = $2
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(&tx.payment_request_id)
        .bind(tx.version)
        .bind(tx.transaction_status.as_str())
        .bind(&tx.cancellation_reason)
        .bind(&tx.requested_amount)
        .bind(&tx.accepted_amount)
        .bind(&tx.accepted_amount_currency)
        .bind(tx.due_date)
        .bind(&tx.request_reason)
        .bind(&tx.message)
        .bind(&tx.settlement_details)
        .bind(&tx.creditor_ack_message)
        .bind(&tx.creditor_ack_emoji)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return row.into_domain();
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM r2p_transactions WHERE payment_request_id = $1)",
        )
        .bind(&tx.payment_request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if exists {
            Err(RepositoryError::VersionConflict {
                payment_request_id: tx.payment_request_id.clone(),
                expected: tx.version,
            })
        } else {
            Err(RepositoryError::NotFound(tx.payment_request_id.clone()))
        }
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    payment_request_id: String,
    end_to_end_id: String,
    request_message_id: String,
    response_message_id: Option<String>,
    transaction_status: String,
    cancellation_reason: Option<String>,
    use_case: String,
    product: Option<String>,
    requested_amount: BigDecimal,
    requested_amount_currency: String,
    accepted_amount: Option<BigDecimal>,
    accepted_amount_currency: Option<String>,
    creditor_agent_id: String,
    debtor_agent_id: String,
    creditor_alias: Option<String>,
    creditor_alias_type: Option<String>,
    debtor_alias: Option<String>,
    debtor_alias_type: Option<String>,
    due_date: Option<NaiveDate>,
    request_reason: Option<serde_json::Value>,
    message: Option<String>,
    settlement_details: Option<serde_json::Value>,
    original_payment_request_id: Option<String>,
    is_refund: bool,
    creditor_ack_message: Option<String>,
    creditor_ack_emoji: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_alias_type(raw: Option<String>) -> RepositoryResult<Option<AliasType>> {
    raw.map(|value| value.parse::<AliasType>())
        .transpose()
        .map_err(RepositoryError::Unexpected)
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let transaction_status = self
            .transaction_status
            .parse::<TransactionStatus>()
            .map_err(RepositoryError::Unexpected)?;
        let use_case = self
            .use_case
            .parse::<UseCase>()
            .map_err(RepositoryError::Unexpected)?;

        Ok(Transaction {
            payment_request_id: self.payment_request_id,
            end_to_end_id: self.end_to_end_id,
            request_message_id: self.request_message_id,
            response_message_id: self.response_message_id,
            transaction_status,
            cancellation_reason: self.cancellation_reason,
            use_case,
            product: self.product,
            requested_amount: self.requested_amount,
            requested_amount_currency: self.requested_amount_currency,
            accepted_amount: self.accepted_amount,
            accepted_amount_currency: self.accepted_amount_currency,
            creditor_agent_id: self.creditor_agent_id,
            debtor_agent_id: self.debtor_agent_id,
            creditor_alias: self.creditor_alias,
            creditor_alias_type: parse_alias_type(self.creditor_alias_type)?,
            debtor_alias: self.debtor_alias,
            debtor_alias_type: parse_alias_type(self.debtor_alias_type)?,
            due_date: self.due_date,
            request_reason: self.request_reason,
            message: self.message,
            settlement_details: self.settlement_details,
            original_payment_request_id: self.original_payment_request_id,
            is_refund: self.is_refund,
            creditor_ack_message: self.creditor_ack_message,
            creditor_ack_emoji: self.creditor_ack_emoji,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
