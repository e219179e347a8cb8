use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::transaction::{AliasType, Transaction, TransactionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestMinResponse {
    pub payment_request_id: String,
    pub end_to_end_id: String,
    pub transaction_status: TransactionStatus,
    pub debtor_id: Option<String>,
    pub debtor_id_type: Option<AliasType>,
}

impl From<&Transaction> for PaymentRequestMinResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            payment_request_id: tx.payment_request_id.clone(),
            end_to_end_id: tx.end_to_end_id.clone(),
            transaction_status: tx.transaction_status,
            debtor_id: tx.debtor_alias.clone(),
            debtor_id_type: tx.debtor_alias_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub response_message_id: String,
    pub request_message_id: String,
    pub payment_requests: Vec<PaymentRequestMinResponse>,
    pub creation_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub response_message_id: String,
    pub payment_request_id: String,
    pub end_to_end_id: String,
    pub request_message_id: String,
    pub transaction_status: TransactionStatus,
    pub creation_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub response_message_id: String,
    pub payment_request_id: String,
    pub request_message_id: String,
    pub transaction_status: TransactionStatus,
    pub creation_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendResponse {
    pub response_message_id: String,
    pub payment_request_id: String,
    pub request_message_id: String,
    pub transaction_status: TransactionStatus,
    pub creation_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub response_message_id: String,
    pub request_message_id: String,
    pub payment_requests: Vec<PaymentRequestMinResponse>,
    pub creation_date_time: DateTime<Utc>,
}

pub fn new_response_message_id() -> String {
    Uuid::new_v4().to_string()
}
