//! Property tests for the expense and settlement validators.

use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::core::currency::get_currency_rule;
use crate::core::errors::SplitifydError;
use crate::core::models::expense::{ExpenseSplit, SplitType};
use crate::core::validation::{validate_expense, validate_settlement};

fn currency_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("JPY"), Just("MGA"), Just("USD"), Just("EUR"), Just("BHD"), Just("KWD")]
}

fn participants(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("user-{i}")).collect()
}

/// Splits the total into `count` shares and nudges the last one by `drift` units.
fn shares(total_units: i64, count: usize, drift: i64) -> Vec<i64> {
    let base = total_units / count as i64;
    let mut out = vec![base; count];
    out[0] += total_units - base * count as i64;
    let last = count - 1;
    out[last] += drift;
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Accepted exact splits always sum to the amount within one minimum unit,
    /// and their users are exactly the participants.
    #[test]
    fn prop_accepted_exact_split_respects_invariants(
        currency in currency_strategy(),
        total_units in 10i64..10_000_000i64,
        count in 1usize..6,
        drift in -3i64..=3,
    ) {
        let rule = get_currency_rule(currency).unwrap();
        let amount = Decimal::new(total_units, rule.decimal_digits);
        let users = participants(count);
        let splits: Vec<ExpenseSplit> = users
            .iter()
            .zip(shares(total_units, count, drift))
            .map(|(u, units)| ExpenseSplit::new(u.clone(), Decimal::new(units, rule.decimal_digits)))
            .collect();

        let result = validate_expense(amount, currency, SplitType::Exact, &users, &splits);
        let split_sum: Decimal = splits.iter().map(|s| s.amount).sum();

        match result {
            Ok(validated) => {
                prop_assert!((split_sum - amount).abs() <= rule.rounding_tolerance());
                let participant_set: HashSet<_> = validated.participants.iter().collect();
                let split_set: HashSet<_> = validated.splits.iter().map(|s| &s.user_id).collect();
                prop_assert_eq!(participant_set, split_set);
            }
            Err(SplitifydError::InvalidSplitTotal { .. }) => {
                prop_assert!(drift.abs() > 1);
            }
            // A large negative drift can push a tiny share to zero or below.
            Err(SplitifydError::InvalidSplitAmount(_)) => {
                prop_assert!(drift < 0);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Accepted percentage splits always total 100 within the currency tolerance.
    #[test]
    fn prop_accepted_percentages_total_hundred(
        currency in currency_strategy(),
        count in 1usize..5,
        drift in -3i64..=3,
    ) {
        let rule = get_currency_rule(currency).unwrap();
        let users = participants(count);
        let total_units = 1_000_000i64;
        let amount = Decimal::new(total_units, rule.decimal_digits);
        let amount_shares = shares(total_units, count, 0);
        // Percentages carried at two decimals, the last one nudged by `drift` hundredths.
        let pct_shares = shares(10_000, count, drift);

        let splits: Vec<ExpenseSplit> = users
            .iter()
            .zip(amount_shares.iter().zip(pct_shares.iter()))
            .map(|(u, (a, p))| {
                ExpenseSplit::with_percentage(
                    u.clone(),
                    Decimal::new(*a, rule.decimal_digits),
                    Decimal::new(*p, 2),
                )
            })
            .collect();

        if let Ok(validated) = validate_expense(amount, currency, SplitType::Percentage, &users, &splits) {
            let total: Decimal = validated.splits.iter().filter_map(|s| s.percentage).sum();
            prop_assert!((total - Decimal::ONE_HUNDRED).abs() <= rule.percentage_tolerance());
        }
    }

    /// Validation has no hidden state: the same input always yields the same outcome.
    #[test]
    fn prop_validation_is_idempotent(
        total_units in 1i64..1_000_000i64,
        first_units in 1i64..1_000_000i64,
    ) {
        let users = participants(2);
        let amount = Decimal::new(total_units, 2);
        let splits = vec![
            ExpenseSplit::new("user-0", Decimal::new(first_units, 2)),
            ExpenseSplit::new("user-1", Decimal::new((total_units - first_units).max(1), 2)),
        ];
        let first = validate_expense(amount, "USD", SplitType::Exact, &users, &splits);
        let second = validate_expense(amount, "USD", SplitType::Exact, &users, &splits);
        prop_assert_eq!(first, second);
    }

    /// Settlement amounts finer than the currency allows are always rejected.
    #[test]
    fn prop_settlement_precision_matches_currency(
        currency in currency_strategy(),
        units in 1i64..1_000_000i64,
    ) {
        let rule = get_currency_rule(currency).unwrap();
        let exact = Decimal::new(units, rule.decimal_digits);
        prop_assert!(validate_settlement(exact, currency, "a", "b").is_ok());

        let too_fine = Decimal::new(units * 10 + 1, rule.decimal_digits + 1);
        prop_assert!(
            matches!(
                validate_settlement(too_fine, currency, "a", "b"),
                Err(SplitifydError::PrecisionError(_))
            ),
            "expected precision error"
        );
    }
}
