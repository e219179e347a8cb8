//! Domain events emitted after a lifecycle change has been committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::requests::NotificationKind;
use crate::domain::transaction::{Transaction, TransactionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Initiated,
    Confirmed,
    Cancelled,
    Amended,
    Refunded,
    Tagged,
    Reminder,
    Expired,
    Rejected,
    Settled,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Initiated => "r2p.initiated",
            EventKind::Confirmed => "r2p.confirmed",
            EventKind::Cancelled => "r2p.cancelled",
            EventKind::Amended => "r2p.amended",
            EventKind::Refunded => "r2p.refunded",
            EventKind::Tagged => "r2p.tagged",
            EventKind::Reminder => "r2p.reminder",
            EventKind::Expired => "r2p.expired",
            EventKind::Rejected => "r2p.rejected",
            EventKind::Settled => "r2p.settled",
        }
    }

    /// Event kind for a notification, with the status it drives (if any).
    pub fn for_notification(kind: NotificationKind) -> Option<(EventKind, Option<TransactionStatus>)> {
        match kind {
            NotificationKind::Reminder => Some((EventKind::Reminder, None)),
            NotificationKind::Expired => Some((EventKind::Expired, Some(TransactionStatus::Expd))),
            NotificationKind::Rejected => Some((EventKind::Rejected, Some(TransactionStatus::Rjct))),
            NotificationKind::Settled => Some((EventKind::Settled, Some(TransactionStatus::Acsc))),
            NotificationKind::Unknown => None,
        }
    }
}

/// Post-transition snapshot plus the payload that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub transaction: Transaction,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    pub fn new<P: Serialize>(kind: EventKind, transaction: Transaction, payload: &P) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind,
            occurred_at: Utc::now(),
            transaction,
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn from_agent(kind: EventKind, transaction: Transaction, agent_id: &str) -> Self {
        Self::new(kind, transaction, &json!({ "agentId": agent_id }))
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn payment_request_id(&self) -> &str {
        &self.transaction.payment_request_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_kinds_map_to_statuses() {
        assert_eq!(
            EventKind::for_notification(NotificationKind::Reminder),
            Some((EventKind::Reminder, None))
        );
        assert_eq!(
            EventKind::for_notification(NotificationKind::Settled),
            Some((EventKind::Settled, Some(TransactionStatus::Acsc)))
        );
        assert_eq!(
            EventKind::for_notification(NotificationKind::Expired),
            Some((EventKind::Expired, Some(TransactionStatus::Expd)))
        );
        assert_eq!(
            EventKind::for_notification(NotificationKind::Rejected),
            Some((EventKind::Rejected, Some(TransactionStatus::Rjct)))
        );
        assert_eq!(EventKind::for_notification(NotificationKind::Unknown), None);
    }

    #[test]
    fn event_names_are_namespaced() {
        assert_eq!(EventKind::Initiated.name(), "r2p.initiated");
        assert_eq!(EventKind::Tagged.name(), "r2p.tagged");
    }
}
