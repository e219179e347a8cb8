//! Request-to-pay transaction entity.
//! Framework-agnostic representation of a payment request and its status machine.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::requests::{
    AmendRequest, CancelRequest, ConfirmRequest, InitiateRequest, PaymentRequestDetail,
    RefundPaymentRequest, RefundRequest, TagRequest,
};
use crate::error::{BusinessRuleViolation, ErrorCode};

const REFUND_ID_PREFIX: &str = "RFD";

/// Lifecycle status of a payment request.
///
/// `Pdng` is the only non-terminal state. Every other state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pdng,
    Acsc,
    Rjct,
    Cncl,
    Expd,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pdng => "PDNG",
            TransactionStatus::Acsc => "ACSC",
            TransactionStatus::Rjct => "RJCT",
            TransactionStatus::Cncl => "CNCL",
            TransactionStatus::Expd => "EXPD",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pdng)
    }

    /// PDNG -> {ACSC, RJCT, CNCL, EXPD} is the whole transition table.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (
                TransactionStatus::Pdng,
                TransactionStatus::Acsc
                    | TransactionStatus::Rjct
                    | TransactionStatus::Cncl
                    | TransactionStatus::Expd
            )
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PDNG" => Ok(TransactionStatus::Pdng),
            "ACSC" => Ok(TransactionStatus::Acsc),
            "RJCT" => Ok(TransactionStatus::Rjct),
            "CNCL" => Ok(TransactionStatus::Cncl),
            "EXPD" => Ok(TransactionStatus::Expd),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UseCase {
    P2P,
    B2C,
}

impl UseCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCase::P2P => "P2P",
            UseCase::B2C => "B2C",
        }
    }
}

impl FromStr for UseCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P2P" => Ok(UseCase::P2P),
            "B2C" => Ok(UseCase::B2C),
            other => Err(format!("unknown use case: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AliasType {
    Mobl,
    Email,
}

impl AliasType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasType::Mobl => "MOBL",
            AliasType::Email => "EMAIL",
        }
    }
}

impl FromStr for AliasType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MOBL" => Ok(AliasType::Mobl),
            "EMAIL" => Ok(AliasType::Email),
            other => Err(format!("unknown alias type: {}", other)),
        }
    }
}

/// Domain entity representing one payment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub payment_request_id: String,
    pub end_to_end_id: String,
    pub request_message_id: String,
    pub response_message_id: Option<String>,
    pub transaction_status: TransactionStatus,
    pub cancellation_reason: Option<String>,
    pub use_case: UseCase,
    pub product: Option<String>,
    pub requested_amount: BigDecimal,
    pub requested_amount_currency: String,
    pub accepted_amount: Option<BigDecimal>,
    pub accepted_amount_currency: Option<String>,
    pub creditor_agent_id: String,
    pub debtor_agent_id: String,
    pub creditor_alias: Option<String>,
    pub creditor_alias_type: Option<AliasType>,
    pub debtor_alias: Option<String>,
    pub debtor_alias_type: Option<AliasType>,
    pub due_date: Option<NaiveDate>,
    pub request_reason: Option<serde_json::Value>,
    pub message: Option<String>,
    pub settlement_details: Option<serde_json::Value>,
    pub original_payment_request_id: Option<String>,
    pub is_refund: bool,
    pub creditor_ack_message: Option<String>,
    pub creditor_ack_emoji: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Builds a fresh PDNG transaction for one line item of an initiation.
    pub fn from_initiation(
        request: &InitiateRequest,
        detail: &PaymentRequestDetail,
        response_message_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            payment_request_id: Uuid::new_v4().simple().to_string(),
            end_to_end_id: detail.end_to_end_id.clone(),
            request_message_id: request.request_message_id.clone(),
            response_message_id: Some(response_message_id.to_string()),
            transaction_status: TransactionStatus::Pdng,
            cancellation_reason: None,
            use_case: request.use_case,
            product: request.product.clone(),
            requested_amount: detail.requested_amount.clone(),
            requested_amount_currency: detail.requested_amount_currency.clone(),
            accepted_amount: None,
            accepted_amount_currency: None,
            creditor_agent_id: request.creditor.creditor_agent_id.clone(),
            debtor_agent_id: detail.debtor_agent_id.clone(),
            creditor_alias: request.creditor.creditor_alias.clone(),
            creditor_alias_type: request.creditor.creditor_alias_type,
            debtor_alias: Some(detail.debtor_alias.clone()),
            debtor_alias_type: Some(detail.debtor_alias_type),
            due_date: request.due_date,
            request_reason: request
                .request_reason
                .as_ref()
                .and_then(|reason| serde_json::to_value(reason).ok()),
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

    /// Builds the new PDNG refund transaction for a settled original.
    ///
    /// Agent roles are swapped: the original debtor's agent now collects.
    pub fn refund_of(
        original: &Transaction,
        request: &RefundRequest,
        line: &RefundPaymentRequest,
        response_message_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, BusinessRuleViolation> {
        if original.transaction_status != TransactionStatus::Acsc {
            return Err(BusinessRuleViolation::general(format!(
                "Can only refund settled transactions; {} is {}",
                original.payment_request_id, original.transaction_status
            )));
        }

        if &line.requested_amount > original.refundable_amount() {
            return Err(BusinessRuleViolation::new(
                ErrorCode::RefundExceedsOriginal,
                "Refund amount cannot exceed the original transaction amount",
            ));
        }

        Ok(Self {
            payment_request_id: format!("{}{}", REFUND_ID_PREFIX, Uuid::new_v4().simple()),
            end_to_end_id: line.end_to_end_id.clone(),
            request_message_id: request.request_message_id.clone(),
            response_message_id: Some(response_message_id.to_string()),
            transaction_status: TransactionStatus::Pdng,
            cancellation_reason: None,
            use_case: UseCase::P2P,
            product: original.product.clone(),
            requested_amount: line.requested_amount.clone(),
            requested_amount_currency: original.requested_amount_currency.clone(),
            accepted_amount: None,
            accepted_amount_currency: None,
            creditor_agent_id: original.debtor_agent_id.clone(),
            debtor_agent_id: original.creditor_agent_id.clone(),
            creditor_alias: original.debtor_alias.clone(),
            creditor_alias_type: original.debtor_alias_type,
            debtor_alias: original.creditor_alias.clone(),
            debtor_alias_type: original.creditor_alias_type,
            due_date: None,
            request_reason: None,
            message: None,
            settlement_details: None,
            original_payment_request_id: Some(original.payment_request_id.clone()),
            is_refund: true,
            creditor_ack_message: None,
            creditor_ack_emoji: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.transaction_status.is_terminal()
    }

    /// Upper bound for refunds: the accepted amount, or the requested amount
    /// when the settlement arrived without one.
    pub fn refundable_amount(&self) -> &BigDecimal {
        self.accepted_amount.as_ref().unwrap_or(&self.requested_amount)
    }

    /// The lines of one refund request share the ceiling: their sum must fit.
    pub fn ensure_refund_fits(&self, request: &RefundRequest) -> Result<(), BusinessRuleViolation> {
        let total = request
            .payment_requests
            .iter()
            .fold(BigDecimal::from(0), |sum, line| sum + &line.requested_amount);

        if &total > self.refundable_amount() {
            return Err(BusinessRuleViolation::new(
                ErrorCode::RefundExceedsOriginal,
                format!(
                    "Refund total {} exceeds the refundable amount {} of {}",
                    total,
                    self.refundable_amount(),
                    self.payment_request_id
                ),
            ));
        }
        Ok(())
    }

    pub fn ensure_not_terminal(&self, operation: &str) -> Result<(), BusinessRuleViolation> {
        if self.is_terminal() {
            return Err(BusinessRuleViolation::general(format!(
                "Cannot {} transaction {} in terminal status {}",
                operation, self.payment_request_id, self.transaction_status
            )));
        }
        Ok(())
    }

    pub fn transition_to(&mut self, next: TransactionStatus) -> Result<(), BusinessRuleViolation> {
        if !self.transaction_status.can_transition_to(next) {
            return Err(BusinessRuleViolation::general(format!(
                "Transition {} -> {} is not permitted for {}",
                self.transaction_status, next, self.payment_request_id
            )));
        }
        self.transaction_status = next;
        Ok(())
    }

    pub fn apply_confirmation(&mut self, request: &ConfirmRequest) -> Result<(), BusinessRuleViolation> {
        if self.end_to_end_id != request.end_to_end_id {
            return Err(BusinessRuleViolation::general(format!(
                "End-to-end ID mismatch for {}",
                self.payment_request_id
            )));
        }
        self.ensure_not_terminal("confirm")?;
        self.transition_to(request.transaction_status)?;

        match (&request.status_reason, &request.message) {
            (Some(reason), Some(message)) => self.message = Some(format!("{} - {}", reason, message)),
            (Some(reason), None) => self.message = Some(reason.clone()),
            (None, Some(message)) => self.message = Some(message.clone()),
            (None, None) => {}
        }

        if let Some(amount) = &request.accepted_amount {
            self.accepted_amount = Some(amount.clone());
            self.accepted_amount_currency = request.accepted_amount_currency.clone();
        }

        if let Some(details) = &request.settlement_details {
            self.settlement_details = serde_json::to_value(details).ok();
        }

        Ok(())
    }

    pub fn apply_cancellation(&mut self, request: &CancelRequest) -> Result<(), BusinessRuleViolation> {
        self.ensure_not_terminal("cancel")?;
        self.transition_to(TransactionStatus::Cncl)?;
        self.cancellation_reason = Some(request.cancellation_reason.as_str().to_string());
        Ok(())
    }

    pub fn apply_amendment(&mut self, request: &AmendRequest) -> Result<(), BusinessRuleViolation> {
        self.ensure_not_terminal("amend")?;

        if let Some(due_date) = request.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(amount) = &request.requested_amount {
            self.requested_amount = amount.clone();
        }
        if let Some(reason) = &request.request_reason {
            self.request_reason = serde_json::to_value(reason).ok();
        }
        Ok(())
    }

    /// Tagging records the creditor's acknowledgement only; status is untouched.
    pub fn apply_tag(&mut self, request: &TagRequest) {
        if let Some(message) = &request.message_event.creditor_ack_message {
            self.creditor_ack_message = Some(message.clone());
        }
        if let Some(emoji) = &request.message_event.creditor_ack_emoji {
            self.creditor_ack_emoji = Some(emoji.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::requests::{CancellationReason, MessageEvent, TaggedTransaction};
    use std::str::FromStr;

    fn sample() -> Transaction {
        let now = Utc::now();
        Transaction {
            payment_request_id: "pr-1".to_string(),
            end_to_end_id: "e2e-1".to_string(),
            request_message_id: "msg-1".to_string(),
            response_message_id: Some("resp-1".to_string()),
            transaction_status: TransactionStatus::Pdng,
            cancellation_reason: None,
            use_case: UseCase::P2P,
            product: None,
            requested_amount: BigDecimal::from(100),
            requested_amount_currency: "UAH".to_string(),
            accepted_amount: None,
            accepted_amount_currency: None,
            creditor_agent_id: "creditor-agent".to_string(),
            debtor_agent_id: "debtor-agent".to_string(),
            creditor_alias: Some("+380501234567".to_string()),
            creditor_alias_type: Some(AliasType::Mobl),
            debtor_alias: Some("payer@example.com".to_string()),
            debtor_alias_type: Some(AliasType::Email),
            due_date: None,
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

    fn confirm(status: TransactionStatus, e2e: &str) -> ConfirmRequest {
        ConfirmRequest {
            end_to_end_id: e2e.to_string(),
            request_message_id: "confirm-msg".to_string(),
            transaction_status: status,
            status_reason: None,
            message: None,
            accepted_amount: Some(BigDecimal::from(100)),
            accepted_amount_currency: Some("UAH".to_string()),
            settlement_details: None,
        }
    }

    #[test]
    fn pending_transitions_to_every_terminal_state() {
        for next in [
            TransactionStatus::Acsc,
            TransactionStatus::Rjct,
            TransactionStatus::Cncl,
            TransactionStatus::Expd,
        ] {
            assert!(TransactionStatus::Pdng.can_transition_to(next));
        }
        assert!(!TransactionStatus::Pdng.can_transition_to(TransactionStatus::Pdng));
    }

    #[test]
    fn terminal_states_are_final() {
        let all = [
            TransactionStatus::Pdng,
            TransactionStatus::Acsc,
            TransactionStatus::Rjct,
            TransactionStatus::Cncl,
            TransactionStatus::Expd,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        assert_eq!(TransactionStatus::from_str("EXPD"), Ok(TransactionStatus::Expd));
        assert!(TransactionStatus::from_str("DONE").is_err());
        assert_eq!(TransactionStatus::Cncl.to_string(), "CNCL");
    }

    #[test]
    fn confirmation_sets_accepted_amount_and_message() {
        let mut tx = sample();
        let mut request = confirm(TransactionStatus::Acsc, "e2e-1");
        request.status_reason = Some("AC01".to_string());
        request.message = Some("paid in full".to_string());

        tx.apply_confirmation(&request).unwrap();

        assert_eq!(tx.transaction_status, TransactionStatus::Acsc);
        assert_eq!(tx.accepted_amount, Some(BigDecimal::from(100)));
        assert_eq!(tx.message.as_deref(), Some("AC01 - paid in full"));
    }

    #[test]
    fn confirmation_rejects_end_to_end_mismatch() {
        let mut tx = sample();
        let err = tx
            .apply_confirmation(&confirm(TransactionStatus::Acsc, "other"))
            .unwrap_err();
        assert!(err.message.contains("End-to-end ID mismatch"));
        assert_eq!(tx.transaction_status, TransactionStatus::Pdng);
    }

    #[test]
    fn confirmation_cannot_leave_request_pending() {
        let mut tx = sample();
        assert!(tx
            .apply_confirmation(&confirm(TransactionStatus::Pdng, "e2e-1"))
            .is_err());
    }

    #[test]
    fn cancel_on_cancelled_is_rejected() {
        let mut tx = sample();
        let request = CancelRequest {
            request_message_id: "cancel-msg".to_string(),
            cancellation_reason: CancellationReason::Othr,
        };
        tx.apply_cancellation(&request).unwrap();
        assert_eq!(tx.cancellation_reason.as_deref(), Some("OTHR"));

        let err = tx.apply_cancellation(&request).unwrap_err();
        assert!(err.message.contains("terminal status CNCL"));
    }

    #[test]
    fn tagging_keeps_status() {
        let mut tx = sample();
        tx.apply_tag(&TagRequest {
            message_event: MessageEvent {
                creditor_ack_emoji: Some("👍".to_string()),
                creditor_ack_message: None,
            },
            tagged_transaction: TaggedTransaction {
                transaction_id: "pr-1".to_string(),
                transaction_id_type: "R2P".to_string(),
            },
        });
        assert_eq!(tx.creditor_ack_emoji.as_deref(), Some("👍"));
        assert_eq!(tx.transaction_status, TransactionStatus::Pdng);
    }

    #[test]
    fn refund_swaps_agents_and_links_original() {
        let mut original = sample();
        original.transaction_status = TransactionStatus::Acsc;
        original.accepted_amount = Some(BigDecimal::from(100));

        let line = RefundPaymentRequest {
            end_to_end_id: "refund-e2e".to_string(),
            requested_amount: BigDecimal::from(50),
        };
        let request = RefundRequest {
            request_message_id: "refund-msg".to_string(),
            payment_requests: vec![line.clone()],
        };

        let refund = Transaction::refund_of(&original, &request, &line, "resp", Utc::now()).unwrap();
        assert!(refund.is_refund);
        assert!(refund.payment_request_id.starts_with("RFD"));
        assert_eq!(refund.original_payment_request_id.as_deref(), Some("pr-1"));
        assert_eq!(refund.creditor_agent_id, "debtor-agent");
        assert_eq!(refund.debtor_agent_id, "creditor-agent");
        assert_eq!(refund.transaction_status, TransactionStatus::Pdng);
        assert_eq!(refund.requested_amount_currency, "UAH");
    }

    #[test]
    fn refund_above_accepted_amount_is_rejected() {
        let mut original = sample();
        original.transaction_status = TransactionStatus::Acsc;
        original.accepted_amount = Some(BigDecimal::from(100));

        let line = RefundPaymentRequest {
            end_to_end_id: "refund-e2e".to_string(),
            requested_amount: BigDecimal::from(150),
        };
        let request = RefundRequest {
            request_message_id: "refund-msg".to_string(),
            payment_requests: vec![line.clone()],
        };

        let err = Transaction::refund_of(&original, &request, &line, "resp", Utc::now()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RefundExceedsOriginal);
    }

    #[test]
    fn refund_lines_share_the_ceiling() {
        let mut original = sample();
        original.transaction_status = TransactionStatus::Acsc;
        original.accepted_amount = Some(BigDecimal::from(100));

        let line = |e2e: &str, amount: i64| RefundPaymentRequest {
            end_to_end_id: e2e.to_string(),
            requested_amount: BigDecimal::from(amount),
        };
        let split = RefundRequest {
            request_message_id: "refund-msg".to_string(),
            payment_requests: vec![line("a", 40), line("b", 60)],
        };
        assert!(original.ensure_refund_fits(&split).is_ok());

        let over = RefundRequest {
            request_message_id: "refund-msg".to_string(),
            payment_requests: vec![line("a", 80), line("b", 80)],
        };
        let err = original.ensure_refund_fits(&over).unwrap_err();
        assert_eq!(err.code, ErrorCode::RefundExceedsOriginal);
    }
}
