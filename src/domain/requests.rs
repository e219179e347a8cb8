//! Typed operation inputs.
//!
//! The transport layer deserializes wire payloads into these types and enforces
//! field-level constraints before the lifecycle engine sees them.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::transaction::{AliasType, TransactionStatus, UseCase};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creditor {
    pub creditor_agent_id: String,
    pub creditor_country: String,
    pub creditor_agent_country: String,
    pub creditor_alias: Option<String>,
    pub creditor_alias_type: Option<AliasType>,
    pub creditor_first_name: Option<String>,
    pub creditor_last_name: Option<String>,
    pub creditor_business_name: Option<String>,
    pub creditor_mcc: Option<String>,
    pub creditor_tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestDetail {
    pub end_to_end_id: String,
    pub debtor_alias: String,
    pub debtor_alias_type: AliasType,
    pub debtor_agent_id: String,
    pub debtor_country: String,
    pub debtor_agent_country: String,
    pub debtor_first_name: String,
    pub debtor_last_name: String,
    pub requested_amount: BigDecimal,
    pub requested_amount_currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceBlock {
    pub reference_type: String,
    pub reference_value: String,
    pub reference_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReason {
    pub message: Option<String>,
    pub unicode_emoji: Option<String>,
    pub payment_purpose: Option<String>,
    #[serde(default)]
    pub references: Vec<ReferenceBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub request_message_id: String,
    pub use_case: UseCase,
    pub product: Option<String>,
    pub creditor: Creditor,
    pub payment_requests: Vec<PaymentRequestDetail>,
    pub due_date: Option<NaiveDate>,
    pub request_reason: Option<RequestReason>,
}

/// Opaque description of how an accepted payment was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementDetails {
    pub settlement_system: String,
    pub settlement_system_reference_id: String,
    pub settlement_system_reference_type: Option<String>,
    pub settled_amount: BigDecimal,
    pub settled_amount_currency: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub end_to_end_id: String,
    pub request_message_id: String,
    pub transaction_status: TransactionStatus,
    pub status_reason: Option<String>,
    pub message: Option<String>,
    pub accepted_amount: Option<BigDecimal>,
    pub accepted_amount_currency: Option<String>,
    pub settlement_details: Option<SettlementDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CancellationReason {
    Erramt,
    Errdrinfo,
    Paid,
    Drtp,
    Err,
    Svnr,
    Fraud,
    Othr,
}

impl CancellationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationReason::Erramt => "ERRAMT",
            CancellationReason::Errdrinfo => "ERRDRINFO",
            CancellationReason::Paid => "PAID",
            CancellationReason::Drtp => "DRTP",
            CancellationReason::Err => "ERR",
            CancellationReason::Svnr => "SVNR",
            CancellationReason::Fraud => "FRAUD",
            CancellationReason::Othr => "OTHR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub request_message_id: String,
    pub cancellation_reason: CancellationReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendRequest {
    pub request_message_id: String,
    pub due_date: Option<NaiveDate>,
    pub requested_amount: Option<BigDecimal>,
    pub request_reason: Option<RequestReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundPaymentRequest {
    pub end_to_end_id: String,
    pub requested_amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub request_message_id: String,
    pub payment_requests: Vec<RefundPaymentRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub creditor_ack_emoji: Option<String>,
    pub creditor_ack_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedTransaction {
    pub transaction_id: String,
    pub transaction_id_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRequest {
    pub message_event: MessageEvent,
    pub tagged_transaction: TaggedTransaction,
}

/// Network-driven lifecycle event kinds. Anything unrecognised lands on `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationKind {
    Reminder,
    Expired,
    Rejected,
    Settled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub payment_request_id: String,
    pub event_type: NotificationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBatch {
    pub agent_id: String,
    pub request_message_id: String,
    pub events: Vec<NotificationEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_notification_kind_deserializes() {
        let batch: NotificationBatch = serde_json::from_str(
            r#"{
                "agentId": "agent-1",
                "requestMessageId": "msg-1",
                "events": [
                    {"paymentRequestId": "a", "eventType": "SETTLED"},
                    {"paymentRequestId": "b", "eventType": "ESCALATED"}
                ]
            }"#,
        )
        .expect("valid batch");

        assert_eq!(batch.events[0].event_type, NotificationKind::Settled);
        assert_eq!(batch.events[1].event_type, NotificationKind::Unknown);
    }

    #[test]
    fn confirm_request_reads_wire_names() {
        let request: ConfirmRequest = serde_json::from_str(
            r#"{
                "endToEndId": "e2e",
                "requestMessageId": "m",
                "transactionStatus": "ACSC",
                "acceptedAmount": "100.00",
                "acceptedAmountCurrency": "UAH"
            }"#,
        )
        .expect("valid confirm");

        assert_eq!(request.transaction_status, TransactionStatus::Acsc);
        assert_eq!(request.accepted_amount, Some(BigDecimal::from(100)));
        assert!(request.settlement_details.is_none());
    }

    #[test]
    fn cancellation_reason_uses_network_codes() {
        let request: CancelRequest =
            serde_json::from_str(r#"{"requestMessageId":"m","cancellationReason":"FRAUD"}"#)
                .expect("valid cancel");
        assert_eq!(request.cancellation_reason, CancellationReason::Fraud);
        assert_eq!(request.cancellation_reason.as_str(), "FRAUD");
    }
}
