//! Currency metadata: decimal digits and rounding tolerance per currency code.

use crate::core::errors::SplitifydError;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;

/// Precision rule for one currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CurrencyRule {
    pub code: &'static str,
    pub decimal_digits: u32,
}

/// Largest amount accepted anywhere, in minor units of the amount's currency.
pub const MAX_AMOUNT_MINOR_UNITS: i128 = 1_000_000_000_000_000;

const ZERO_DECIMAL: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "ISK", "JPY", "KMF", "KRW", "PYG", "RWF", "UGX", "UYI", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

const ONE_DECIMAL: &[&str] = &["MGA", "MRU"];

const TWO_DECIMAL: &[&str] = &[
    "AED", "ARS", "AUD", "BDT", "BGN", "BRL", "CAD", "CHF", "CNY", "COP", "CZK", "DKK", "EGP", "EUR",
    "GBP", "GHS", "HKD", "HUF", "IDR", "ILS", "INR", "KES", "MAD", "MXN", "MYR", "NGN", "NOK", "NZD",
    "PEN", "PHP", "PKR", "PLN", "QAR", "RON", "RUB", "SAR", "SEK", "SGD", "THB", "TRY", "TWD", "UAH",
    "USD", "ZAR",
];

const THREE_DECIMAL: &[&str] = &["BHD", "IQD", "JOD", "KWD", "LYD", "OMR", "TND"];

static CURRENCY_TABLE: Lazy<HashMap<&'static str, CurrencyRule>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for (codes, decimal_digits) in [
        (ZERO_DECIMAL, 0),
        (ONE_DECIMAL, 1),
        (TWO_DECIMAL, 2),
        (THREE_DECIMAL, 3),
    ] {
        for &code in codes {
            table.insert(code, CurrencyRule { code, decimal_digits });
        }
    }
    table
});

/// Looks up the rule for `code`, ignoring case and surrounding whitespace.
pub fn get_currency_rule(code: &str) -> Result<CurrencyRule, SplitifydError> {
    let normalized = code.trim().to_ascii_uppercase();
    CURRENCY_TABLE
        .get(normalized.as_str())
        .copied()
        .ok_or_else(|| SplitifydError::InvalidCurrency(code.to_string()))
}

pub fn rounding_tolerance(code: &str) -> Result<Decimal, SplitifydError> {
    get_currency_rule(code).map(|rule| rule.rounding_tolerance())
}

impl CurrencyRule {
    /// Smallest representable amount, e.g. 0.01 for USD and 1 for JPY.
    pub fn minimum_unit(&self) -> Decimal {
        Decimal::new(1, self.decimal_digits)
    }

    /// Largest accepted gap between a split total and the expense amount.
    ///
    /// One minimum unit, compared inclusively. Amounts are always whole multiples of
    /// the minimum unit once precision is checked, so this is the tightest band that
    /// still absorbs the remainder of an uneven division.
    pub fn rounding_tolerance(&self) -> Decimal {
        self.minimum_unit()
    }

    /// Tolerance for percentage totals, mirrored from the amount tolerance.
    pub fn percentage_tolerance(&self) -> Decimal {
        self.minimum_unit()
    }

    /// Converts `amount` into whole minor units. `None` if it has too many decimals
    /// or does not fit once scaled.
    pub fn to_minor_units(&self, amount: Decimal) -> Option<i128> {
        let scaled = amount.checked_mul(Decimal::from(10_i64.pow(self.decimal_digits)))?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.trunc().to_i128()
    }

    pub fn from_minor_units(&self, units: i128) -> Decimal {
        Decimal::from_i128_with_scale(units, self.decimal_digits)
    }

    pub fn max_amount(&self) -> Decimal {
        self.from_minor_units(MAX_AMOUNT_MINOR_UNITS)
    }

    /// Rejects amounts beyond [`MAX_AMOUNT_MINOR_UNITS`] and amounts that carry more
    /// decimal places than this currency allows.
    pub fn check_precision(&self, amount: Decimal) -> Result<i128, SplitifydError> {
        if amount.abs() > self.max_amount() {
            return Err(SplitifydError::InvalidAmount(format!(
                "Amount must not exceed {} {}",
                self.max_amount(),
                self.code
            )));
        }
        self.to_minor_units(amount).ok_or_else(|| {
            let message = if self.decimal_digits == 0 {
                format!("Amount must be a whole number for {}", self.code)
            } else {
                format!(
                    "Amount must have at most {} decimal places for {}",
                    self.decimal_digits, self.code
                )
            };
            SplitifydError::PrecisionError(message)
        })
    }
}
