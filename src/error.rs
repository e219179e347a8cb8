use std::fmt;

use thiserror::Error;

use crate::ports::RepositoryError;

/// Response codes carried by every failure surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// RC1002
    MissingField,
    /// RC2000
    BusinessValidation,
    /// RC2001
    AmountExceedsLimit,
    /// RC2002
    InvalidCurrency,
    /// RC2003
    MccRequired,
    /// RC2004
    InvalidName,
    /// RC2005
    InvalidDueDate,
    /// RC2006
    RefundExceedsOriginal,
    /// RC4001
    PaymentRequestNotFound,
    /// RC5000
    Internal,
    /// RC5001
    StorageFailure,
    /// RC5002
    ServiceUnavailable,
    /// RC5003
    ConcurrentModification,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingField => "RC1002",
            ErrorCode::BusinessValidation => "RC2000",
            ErrorCode::AmountExceedsLimit => "RC2001",
            ErrorCode::InvalidCurrency => "RC2002",
            ErrorCode::MccRequired => "RC2003",
            ErrorCode::InvalidName => "RC2004",
            ErrorCode::InvalidDueDate => "RC2005",
            ErrorCode::RefundExceedsOriginal => "RC2006",
            ErrorCode::PaymentRequestNotFound => "RC4001",
            ErrorCode::Internal => "RC5000",
            ErrorCode::StorageFailure => "RC5001",
            ErrorCode::ServiceUnavailable => "RC5002",
            ErrorCode::ConcurrentModification => "RC5003",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::MissingField => "Mandatory field is missing",
            ErrorCode::BusinessValidation => "Business Validation Failure",
            ErrorCode::AmountExceedsLimit => "Payment amount exceeds limits",
            ErrorCode::InvalidCurrency => "Invalid currency for country",
            ErrorCode::MccRequired => "MCC required for B2C transactions",
            ErrorCode::InvalidName => "Invalid debtor/creditor name format",
            ErrorCode::InvalidDueDate => "Due date is outside the allowed window",
            ErrorCode::RefundExceedsOriginal => "Refund amount exceeds original transaction",
            ErrorCode::PaymentRequestNotFound => "Payment request not found",
            ErrorCode::Internal => "Internal server error",
            ErrorCode::StorageFailure => "Database connection failure",
            ErrorCode::ServiceUnavailable => "External service unavailable",
            ErrorCode::ConcurrentModification => "Concurrent modification, retry later",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected business rule, raised by the validation gate or by a lifecycle
/// precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessRuleViolation {
    pub code: ErrorCode,
    pub message: String,
}

impl BusinessRuleViolation {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BusinessValidation, message)
    }
}

impl fmt::Display for BusinessRuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BusinessRuleViolation {}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Business rule violation: {0}")]
    BusinessRule(#[from] BusinessRuleViolation),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn business(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::BusinessRule(BusinessRuleViolation::new(code, message))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::BusinessRule(violation) => violation.code,
            AppError::NotFound(_) => ErrorCode::PaymentRequestNotFound,
            // Contention outlasting the write budget is not a rule rejection.
            AppError::Conflict(_) => ErrorCode::ConcurrentModification,
            AppError::Transient(_) => ErrorCode::StorageFailure,
            AppError::Unexpected(_) => ErrorCode::Internal,
        }
    }

    /// Conflicts and transient failures may succeed on a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict(_) | AppError::Transient(_))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => {
                AppError::NotFound(format!("Payment request not found: {}", id))
            }
            RepositoryError::VersionConflict {
                payment_request_id,
                expected,
            } => AppError::Conflict(format!(
                "Transaction {} was modified concurrently (expected version {})",
                payment_request_id, expected
            )),
            RepositoryError::Duplicate(id) => {
                AppError::Conflict(format!("Transaction already exists: {}", id))
            }
            RepositoryError::Transient(msg) => AppError::Transient(msg),
            RepositoryError::Unexpected(msg) => AppError::Unexpected(msg),
        }
    }
}
