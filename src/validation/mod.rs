//! Business-rule gate run before any state-changing operation.
//!
//! Every entry point is pure and fail-fast: the first rule that fails is
//! returned as a [`BusinessRuleViolation`] and nothing is mutated.

pub mod reference;

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDate};

use crate::domain::requests::{
    AmendRequest, CancelRequest, ConfirmRequest, Creditor, InitiateRequest, PaymentRequestDetail,
    RefundRequest, TagRequest,
};
use crate::domain::{AliasType, UseCase};
use crate::error::{BusinessRuleViolation, ErrorCode};
use reference::{
    country_currency, country_limit, is_iso_currency, minimum_amount,
    INITIAL_ONLY_LAST_NAME_COUNTRIES, MAX_DUE_DATE_DAYS, NAME_MAX_LEN, SUPPORTED_COUNTRIES,
    SUPPORTED_MCCS, TAX_ID_REQUIRED_COUNTRIES,
};

pub type ValidationResult = Result<(), BusinessRuleViolation>;

fn violation(message: impl Into<String>) -> BusinessRuleViolation {
    BusinessRuleViolation::general(message)
}

pub fn validate_required(field: &str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(BusinessRuleViolation::new(
            ErrorCode::MissingField,
            format!("{} is required", field),
        ));
    }
    Ok(())
}

pub fn validate_max_len(field: &str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(BusinessRuleViolation::new(
            ErrorCode::InvalidName,
            format!("{} exceeds maximum length", field),
        ));
    }
    Ok(())
}

pub fn validate_country(country: &str) -> ValidationResult {
    if !SUPPORTED_COUNTRIES.contains(&country) {
        return Err(violation(format!("Unsupported country: {}", country)));
    }
    Ok(())
}

pub fn validate_currency(currency: &str, country: &str) -> ValidationResult {
    if !is_iso_currency(currency) {
        return Err(BusinessRuleViolation::new(
            ErrorCode::InvalidCurrency,
            format!("Invalid currency code: {}", currency),
        ));
    }

    if let Some(expected) = country_currency(country) {
        if expected != currency {
            return Err(BusinessRuleViolation::new(
                ErrorCode::InvalidCurrency,
                format!("Currency {} not supported for country {}", currency, country),
            ));
        }
    }
    Ok(())
}

pub fn validate_minimum_amount(amount: &BigDecimal) -> ValidationResult {
    if amount < &minimum_amount() {
        return Err(violation("Amount must be at least 0.01"));
    }
    Ok(())
}

pub fn validate_amount(amount: &BigDecimal, country: &str) -> ValidationResult {
    if let Some(limit) = country_limit(country) {
        if amount > &limit {
            return Err(BusinessRuleViolation::new(
                ErrorCode::AmountExceedsLimit,
                format!("Amount exceeds country limit for {}", country),
            ));
        }
    }
    validate_minimum_amount(amount)
}

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.chars().all(|ch| ch.is_ascii_digit())
}

pub fn validate_phone(phone: &str, country: &str) -> ValidationResult {
    let valid = match country {
        "UA" => phone.strip_prefix("+380").map_or(false, |rest| all_digits(rest, 9)),
        "US" => phone.strip_prefix("+1").map_or(false, |rest| all_digits(rest, 10)),
        _ => {
            let len = phone.chars().count();
            phone.starts_with('+') && (10..=15).contains(&len)
        }
    };

    if !valid {
        return Err(violation(format!(
            "Invalid phone number format for country {}",
            country
        )));
    }
    Ok(())
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// `local@domain.tld`: local and domain use word characters, `.` and `-`;
/// the top-level label is at least two ASCII letters.
pub fn validate_email(email: &str) -> ValidationResult {
    let valid = email
        .split_once('@')
        .and_then(|(local, domain)| {
            let (host, tld) = domain.rsplit_once('.')?;
            let part_ok = |s: &str| {
                !s.is_empty() && s.chars().all(|ch| is_word_char(ch) || ch == '.' || ch == '-')
            };
            Some(
                part_ok(local)
                    && part_ok(host)
                    && tld.len() >= 2
                    && tld.chars().all(|ch| ch.is_ascii_alphabetic()),
            )
        })
        .unwrap_or(false);

    if !valid {
        return Err(violation("Invalid email format"));
    }
    Ok(())
}

pub fn validate_alias(alias: &str, alias_type: Option<AliasType>, country: &str) -> ValidationResult {
    match alias_type {
        Some(AliasType::Mobl) => validate_phone(alias, country),
        Some(AliasType::Email) => validate_email(alias),
        None => Ok(()),
    }
}

fn is_initial(last_name: &str) -> bool {
    let mut chars = last_name.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(first), None, None) => first.is_ascii_uppercase(),
        (Some(first), Some('.'), None) => first.is_ascii_uppercase(),
        _ => false,
    }
}

pub fn validate_name_format(first_name: &str, last_name: &str, country: &str) -> ValidationResult {
    if INITIAL_ONLY_LAST_NAME_COUNTRIES.contains(&country) && !is_initial(last_name) {
        return Err(BusinessRuleViolation::new(
            ErrorCode::InvalidName,
            format!("Last name must be first letter + dot for country {}", country),
        ));
    }

    validate_max_len("First name", first_name, NAME_MAX_LEN)?;
    validate_max_len("Last name", last_name, NAME_MAX_LEN)
}

pub fn validate_due_date(due_date: Option<NaiveDate>, today: NaiveDate) -> ValidationResult {
    let Some(due) = due_date else {
        return Ok(());
    };

    if due < today {
        return Err(BusinessRuleViolation::new(
            ErrorCode::InvalidDueDate,
            "Due date cannot be in the past",
        ));
    }
    if due > today + Duration::days(MAX_DUE_DATE_DAYS) {
        return Err(BusinessRuleViolation::new(
            ErrorCode::InvalidDueDate,
            format!(
                "Due date cannot be more than {} days in the future",
                MAX_DUE_DATE_DAYS
            ),
        ));
    }
    Ok(())
}

fn validate_b2c_creditor(creditor: &Creditor) -> ValidationResult {
    let business_name = creditor.creditor_business_name.as_deref().unwrap_or("");
    if business_name.trim().is_empty() {
        return Err(violation("Business name is required for B2C transactions"));
    }

    match creditor.creditor_mcc.as_deref() {
        Some(mcc) if SUPPORTED_MCCS.contains(&mcc) => {}
        _ => {
            return Err(BusinessRuleViolation::new(
                ErrorCode::MccRequired,
                "Valid MCC is required for B2C transactions",
            ))
        }
    }

    if TAX_ID_REQUIRED_COUNTRIES.contains(&creditor.creditor_country.as_str())
        && creditor.creditor_tax_id.is_none()
    {
        return Err(violation(format!(
            "Tax ID is required for B2C in {}",
            creditor.creditor_country
        )));
    }
    Ok(())
}

fn validate_p2p_creditor(creditor: &Creditor) -> ValidationResult {
    match (&creditor.creditor_first_name, &creditor.creditor_last_name) {
        (Some(first), Some(last)) => validate_name_format(first, last, &creditor.creditor_country),
        _ => Err(violation(
            "First and last name are required for P2P transactions",
        )),
    }
}

pub fn validate_creditor(creditor: &Creditor, use_case: UseCase) -> ValidationResult {
    validate_required("Creditor agent ID", &creditor.creditor_agent_id)?;
    validate_country(&creditor.creditor_country)?;
    validate_country(&creditor.creditor_agent_country)?;

    match use_case {
        UseCase::B2C => validate_b2c_creditor(creditor)?,
        UseCase::P2P => validate_p2p_creditor(creditor)?,
    }

    if let Some(alias) = &creditor.creditor_alias {
        validate_alias(alias, creditor.creditor_alias_type, &creditor.creditor_country)?;
    }
    Ok(())
}

pub fn validate_payment_request(detail: &PaymentRequestDetail) -> ValidationResult {
    validate_required("End-to-end ID", &detail.end_to_end_id)?;
    validate_required("Debtor agent ID", &detail.debtor_agent_id)?;
    validate_country(&detail.debtor_country)?;
    validate_country(&detail.debtor_agent_country)?;
    validate_amount(&detail.requested_amount, &detail.debtor_country)?;
    validate_currency(&detail.requested_amount_currency, &detail.debtor_country)?;
    validate_alias(
        &detail.debtor_alias,
        Some(detail.debtor_alias_type),
        &detail.debtor_country,
    )?;
    validate_name_format(
        &detail.debtor_first_name,
        &detail.debtor_last_name,
        &detail.debtor_country,
    )
}

pub fn validate_initiate(request: &InitiateRequest, today: NaiveDate) -> ValidationResult {
    validate_required("Request message ID", &request.request_message_id)?;
    if request.payment_requests.is_empty() {
        return Err(BusinessRuleViolation::new(
            ErrorCode::MissingField,
            "Payment request details are required",
        ));
    }

    validate_creditor(&request.creditor, request.use_case)?;
    validate_due_date(request.due_date, today)?;

    for detail in &request.payment_requests {
        validate_payment_request(detail)?;
    }
    Ok(())
}

pub fn validate_confirm(request: &ConfirmRequest) -> ValidationResult {
    validate_required("Request message ID", &request.request_message_id)?;
    validate_required("End-to-end ID", &request.end_to_end_id)?;

    if let Some(amount) = &request.accepted_amount {
        validate_minimum_amount(amount)?;
        match request.accepted_amount_currency.as_deref() {
            Some(currency) if is_iso_currency(currency) => {}
            Some(currency) => {
                return Err(BusinessRuleViolation::new(
                    ErrorCode::InvalidCurrency,
                    format!("Invalid currency code: {}", currency),
                ))
            }
            None => {
                return Err(BusinessRuleViolation::new(
                    ErrorCode::MissingField,
                    "Accepted amount currency is required with an accepted amount",
                ))
            }
        }
    }
    Ok(())
}

/// The cancellation reason itself is a closed enum, so only the message id is checked.
pub fn validate_cancel(request: &CancelRequest) -> ValidationResult {
    validate_required("Request message ID", &request.request_message_id)
}

pub fn validate_amend(request: &AmendRequest, today: NaiveDate) -> ValidationResult {
    validate_required("Request message ID", &request.request_message_id)?;
    validate_due_date(request.due_date, today)?;
    if let Some(amount) = &request.requested_amount {
        validate_minimum_amount(amount)?;
    }
    Ok(())
}

pub fn validate_refund(request: &RefundRequest) -> ValidationResult {
    validate_required("Request message ID", &request.request_message_id)?;
    if request.payment_requests.is_empty() {
        return Err(BusinessRuleViolation::new(
            ErrorCode::MissingField,
            "Payment request details are required",
        ));
    }
    for line in &request.payment_requests {
        validate_required("End-to-end ID", &line.end_to_end_id)?;
        validate_minimum_amount(&line.requested_amount)?;
    }
    Ok(())
}

pub fn validate_tag(request: &TagRequest) -> ValidationResult {
    validate_required("Tagged transaction ID", &request.tagged_transaction.transaction_id)?;

    let event = &request.message_event;
    if event.creditor_ack_message.is_none() && event.creditor_ack_emoji.is_none() {
        return Err(BusinessRuleViolation::new(
            ErrorCode::MissingField,
            "Acknowledgement message or emoji is required",
        ));
    }
    if let Some(message) = &event.creditor_ack_message {
        validate_max_len("Acknowledgement message", message, NAME_MAX_LEN)?;
    }
    Ok(())
}
