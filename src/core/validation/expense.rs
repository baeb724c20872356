use crate::core::currency::{CurrencyRule, get_currency_rule};
use crate::core::errors::SplitifydError;
use crate::core::models::expense::{ExpenseDraft, ExpenseSplit, SplitType};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// An expense payload that passed every rule. Amounts are kept exactly as supplied.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedExpense {
    pub amount: Decimal,
    pub currency: CurrencyRule,
    pub split_type: SplitType,
    pub participants: Vec<String>,
    pub splits: Vec<ExpenseSplit>,
}

pub fn validate_expense_draft(draft: &ExpenseDraft) -> Result<ValidatedExpense, SplitifydError> {
    validate_expense(
        draft.amount,
        &draft.currency,
        draft.split_type,
        &draft.participants,
        &draft.splits,
    )
}

/// Checks an expense amount and its splits against the currency's precision rules.
///
/// Fails on the first violated rule. Split totals may differ from `amount` by at
/// most one minimum currency unit, boundary included.
pub fn validate_expense(
    amount: Decimal,
    currency: &str,
    split_type: SplitType,
    participants: &[String],
    splits: &[ExpenseSplit],
) -> Result<ValidatedExpense, SplitifydError> {
    let rule = get_currency_rule(currency)?;

    if amount <= Decimal::ZERO {
        return Err(SplitifydError::InvalidAmount(
            "Amount must be greater than 0".to_string(),
        ));
    }
    let total_units = rule.check_precision(amount)?;

    if participants.is_empty() {
        return Err(SplitifydError::InvalidSplits(
            "at least one participant is required".to_string(),
        ));
    }
    let mut participant_set = HashSet::with_capacity(participants.len());
    for participant in participants {
        if !participant_set.insert(participant.as_str()) {
            return Err(SplitifydError::DuplicateParticipant(participant.clone()));
        }
    }

    let mut split_users = HashSet::with_capacity(splits.len());
    for split in splits {
        if !split_users.insert(split.user_id.as_str()) {
            return Err(SplitifydError::DuplicateSplitUser(split.user_id.clone()));
        }
        if !participant_set.contains(split.user_id.as_str()) {
            return Err(SplitifydError::InvalidSplitUser(split.user_id.clone()));
        }
    }
    // No duplicates and every split user is a participant, so equal length means equal sets.
    if splits.len() != participants.len() {
        return Err(SplitifydError::InvalidSplits(
            "splits required for all participants".to_string(),
        ));
    }

    let mut split_units = Vec::with_capacity(splits.len());
    for split in splits {
        if split.amount <= Decimal::ZERO {
            return Err(SplitifydError::InvalidSplitAmount(split.user_id.clone()));
        }
        split_units.push(rule.check_precision(split.amount)?);
    }

    match split_type {
        SplitType::Equal => check_equal_shares(&rule, total_units, splits, &split_units)?,
        SplitType::Exact => {}
        SplitType::Percentage => check_percentages(&rule, splits)?,
    }

    let split_total: i128 = split_units.iter().sum();
    if (split_total - total_units).abs() > 1 {
        return Err(SplitifydError::InvalidSplitTotal {
            expected: amount,
            actual: rule.from_minor_units(split_total),
        });
    }

    Ok(ValidatedExpense {
        amount,
        currency: rule,
        split_type,
        participants: participants.to_vec(),
        splits: splits.to_vec(),
    })
}

// Each share must sit within one minimum unit of total / n, i.e. |share * n - total| <= n.
fn check_equal_shares(
    rule: &CurrencyRule,
    total_units: i128,
    splits: &[ExpenseSplit],
    split_units: &[i128],
) -> Result<(), SplitifydError> {
    let count = split_units.len() as i128;
    for (split, units) in splits.iter().zip(split_units) {
        if (units * count - total_units).abs() > count {
            return Err(SplitifydError::InvalidSplits(format!(
                "equal split for {} is {} but the fair share is {} {}",
                split.user_id,
                split.amount,
                (rule.from_minor_units(total_units) / Decimal::from(count as i64)).round_dp(rule.decimal_digits),
                rule.code
            )));
        }
    }
    Ok(())
}

fn check_percentages(rule: &CurrencyRule, splits: &[ExpenseSplit]) -> Result<(), SplitifydError> {
    let hundred = Decimal::ONE_HUNDRED;
    let mut total = Decimal::ZERO;
    for split in splits {
        match split.percentage {
            Some(p) if p > Decimal::ZERO && p <= hundred => total += p,
            other => {
                return Err(SplitifydError::InvalidPercentage {
                    user_id: split.user_id.clone(),
                    percentage: other,
                });
            }
        }
    }
    if (total - hundred).abs() > rule.percentage_tolerance() {
        return Err(SplitifydError::InvalidPercentageTotal(total));
    }
    Ok(())
}
