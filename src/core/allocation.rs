//! Equal split generation using the largest remainder method.
//!
//! The leftover minor units of an uneven division go to the first participants
//! in order, so the shares always sum exactly to the total.

use crate::core::currency::get_currency_rule;
use crate::core::errors::SplitifydError;
use crate::core::models::expense::ExpenseSplit;
use rust_decimal::Decimal;

/// Builds one split per participant for an equal expense.
///
/// ```
/// use rust_decimal_macros::dec;
/// use splitifyd::core::allocation::equal_splits;
///
/// let splits = equal_splits(dec!(100), "USD", &["a".to_string(), "b".to_string(), "c".to_string()]).unwrap();
/// let amounts: Vec<_> = splits.iter().map(|s| s.amount).collect();
/// assert_eq!(amounts, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
/// ```
pub fn equal_splits(
    amount: Decimal,
    currency: &str,
    participants: &[String],
) -> Result<Vec<ExpenseSplit>, SplitifydError> {
    let rule = get_currency_rule(currency)?;
    if participants.is_empty() {
        return Err(SplitifydError::InvalidSplits(
            "at least one participant is required".to_string(),
        ));
    }
    if amount <= Decimal::ZERO {
        return Err(SplitifydError::InvalidAmount(
            "Amount must be greater than 0".to_string(),
        ));
    }
    let total_units = rule.check_precision(amount)?;

    let count = participants.len() as i128;
    let base = total_units / count;
    let extra = (total_units - base * count) as usize;

    Ok(participants
        .iter()
        .enumerate()
        .map(|(i, user_id)| {
            let units = if i < extra { base + 1 } else { base };
            ExpenseSplit::new(user_id.clone(), rule.from_minor_units(units))
        })
        .collect())
}
