use crate::core::currency::{CurrencyRule, get_currency_rule};
use crate::core::errors::{FieldError, SplitifydError};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedSettlement {
    pub amount: Decimal,
    pub currency: CurrencyRule,
    pub payer_id: String,
    pub payee_id: String,
}

pub fn validate_settlement(
    amount: Decimal,
    currency: &str,
    payer_id: &str,
    payee_id: &str,
) -> Result<ValidatedSettlement, SplitifydError> {
    let rule = get_currency_rule(currency)?;

    if amount <= Decimal::ZERO {
        return Err(SplitifydError::InvalidAmount(
            "Settlement amount must be greater than 0".to_string(),
        ));
    }
    rule.check_precision(amount)?;

    for (field, value) in [("payerId", payer_id), ("payeeId", payee_id)] {
        if value.trim().is_empty() {
            return Err(SplitifydError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("Invalid {}", field),
                    description: format!("{} cannot be empty", field),
                },
            ));
        }
    }
    if payer_id == payee_id {
        return Err(SplitifydError::SelfSettlement);
    }

    Ok(ValidatedSettlement {
        amount,
        currency: rule,
        payer_id: payer_id.to_string(),
        payee_id: payee_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn valid_settlement_is_accepted() {
        let settlement = validate_settlement(dec!(25.50), "usd", "u2", "u1").unwrap();
        assert_eq!(settlement.currency.code, "USD");
        assert_eq!(settlement.amount, dec!(25.50));
    }

    #[test]
    fn self_settlement_is_rejected() {
        assert_eq!(
            validate_settlement(dec!(10), "USD", "u1", "u1"),
            Err(SplitifydError::SelfSettlement)
        );
    }

    #[test]
    fn amount_rules_follow_currency() {
        assert!(matches!(
            validate_settlement(dec!(0), "USD", "u1", "u2"),
            Err(SplitifydError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_settlement(dec!(10.5), "JPY", "u1", "u2"),
            Err(SplitifydError::PrecisionError(_))
        ));
        assert!(validate_settlement(dec!(10.125), "KWD", "u1", "u2").is_ok());
        assert!(matches!(
            validate_settlement(dec!(10), "ABC", "u1", "u2"),
            Err(SplitifydError::InvalidCurrency(_))
        ));
    }

    #[test]
    fn oversized_settlement_is_rejected() {
        assert!(matches!(
            validate_settlement(Decimal::MAX, "USD", "u1", "u2"),
            Err(SplitifydError::InvalidAmount(_))
        ));
        assert!(validate_settlement(dec!(10000000000000.00), "USD", "u1", "u2").is_ok());
        assert!(matches!(
            validate_settlement(dec!(10000000000000.01), "USD", "u1", "u2"),
            Err(SplitifydError::InvalidAmount(_))
        ));
    }

    #[test]
    fn blank_party_is_rejected() {
        assert!(matches!(
            validate_settlement(dec!(10), "USD", " ", "u2"),
            Err(SplitifydError::InvalidInput(field, _)) if field == "payerId"
        ));
    }
}
