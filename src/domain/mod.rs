pub mod events;
pub mod requests;
pub mod responses;
pub mod transaction;

pub use events::{DomainEvent, EventKind};
pub use transaction::{AliasType, Transaction, TransactionStatus, UseCase};
