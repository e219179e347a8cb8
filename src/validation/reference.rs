//! Static reference data consulted by the business rules.

use bigdecimal::BigDecimal;

pub const SUPPORTED_COUNTRIES: &[&str] = &["UA", "US", "GB", "DE", "FR", "PL"];

/// Countries whose last name must be a single initial.
pub const INITIAL_ONLY_LAST_NAME_COUNTRIES: &[&str] = &["UA", "BY", "KZ"];

pub const SUPPORTED_MCCS: &[&str] = &["1234", "5411", "5812", "7995", "6011", "4899"];

pub const TAX_ID_REQUIRED_COUNTRIES: &[&str] = &["UA", "DE"];

pub const NAME_MAX_LEN: usize = 140;

pub const MAX_DUE_DATE_DAYS: i64 = 90;

pub fn country_currency(country: &str) -> Option<&'static str> {
    match country {
        "UA" => Some("UAH"),
        "US" => Some("USD"),
        "GB" => Some("GBP"),
        "DE" | "FR" => Some("EUR"),
        _ => None,
    }
}

pub fn country_limit(country: &str) -> Option<BigDecimal> {
    let limit: i64 = match country {
        "UA" => 50_000,
        "US" => 10_000,
        "GB" => 8_500,
        "DE" => 10_000,
        _ => return None,
    };
    Some(BigDecimal::from(limit))
}

/// Smallest amount accepted anywhere: 0.01.
pub fn minimum_amount() -> BigDecimal {
    BigDecimal::new(1i64.into(), 2)
}

/// Active ISO 4217 alphabetic codes.
pub const ISO_4217_CODES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD", "CAD",
    "CDF", "CHF", "CLP", "CNY", "COP", "CRC", "CUP", "CVE", "CZK", "DJF", "DKK", "DOP", "DZD",
    "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP", "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ",
    "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS", "INR", "IQD", "IRR", "ISK", "JMD", "JOD",
    "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW", "KWD", "KYD", "KZT", "LAK", "LBP", "LKR",
    "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD", "MMK", "MNT", "MOP", "MRU", "MUR", "MVR",
    "MWK", "MXN", "MYR", "MZN", "NAD", "NGN", "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN",
    "PGK", "PHP", "PKR", "PLN", "PYG", "QAR", "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR",
    "SDG", "SEK", "SGD", "SHP", "SLE", "SOS", "SRD", "SSP", "STN", "SVC", "SYP", "SZL", "THB",
    "TJS", "TMT", "TND", "TOP", "TRY", "TTD", "TWD", "TZS", "UAH", "UGX", "USD", "UYU", "UZS",
    "VES", "VND", "VUV", "WST", "XAF", "XCD", "XOF", "XPF", "YER", "ZAR", "ZMW", "ZWL",
];

pub fn is_iso_currency(code: &str) -> bool {
    ISO_4217_CODES.contains(&code)
}
