//! Group balances, recomputed from the expense and settlement ledger on every read.

use crate::core::errors::SplitifydError;
use crate::core::models::{expense::Expense, settlement::Settlement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// currency -> user -> net amount. Positive means the group owes the user.
pub type BalancesByCurrency = BTreeMap<String, BTreeMap<String, Decimal>>;

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedDebt {
    pub from: String,
    pub to: String,
    #[schema(value_type = String, example = "12.50")]
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupBalances {
    pub group_id: String,
    #[schema(value_type = Object)]
    pub balances_by_currency: BalancesByCurrency,
    pub simplified_debts: Vec<SimplifiedDebt>,
}

/// Nets every non-deleted expense and settlement, independently per currency.
///
/// Fails instead of wrapping when a running balance leaves the `Decimal` range.
pub fn compute_balances(
    expenses: &[Expense],
    settlements: &[Settlement],
) -> Result<BalancesByCurrency, SplitifydError> {
    let mut balances = BalancesByCurrency::new();

    for expense in expenses.iter().filter(|e| !e.is_deleted()) {
        let ledger = balances.entry(expense.currency.clone()).or_default();
        adjust(ledger, &expense.paid_by, expense.amount)?;
        for split in &expense.splits {
            adjust(ledger, &split.user_id, -split.amount)?;
        }
    }

    for settlement in settlements.iter().filter(|s| !s.is_deleted()) {
        let ledger = balances.entry(settlement.currency.clone()).or_default();
        adjust(ledger, &settlement.payer_id, settlement.amount)?;
        adjust(ledger, &settlement.payee_id, -settlement.amount)?;
    }

    Ok(balances)
}

fn adjust(ledger: &mut BTreeMap<String, Decimal>, user_id: &str, delta: Decimal) -> Result<(), SplitifydError> {
    let balance = ledger.entry(user_id.to_string()).or_insert(Decimal::ZERO);
    *balance = balance.checked_add(delta).ok_or_else(|| {
        SplitifydError::InvalidAmount(format!("balance of {} is out of the supported range", user_id))
    })?;
    Ok(())
}

pub fn has_outstanding_balance(balances: &BalancesByCurrency, user_id: &str) -> bool {
    balances
        .values()
        .any(|ledger| ledger.get(user_id).is_some_and(|amount| !amount.is_zero()))
}

/// Reduces net balances to a short list of transfers, largest creditor against
/// largest debtor, one currency at a time.
pub fn simplify_debts(balances: &BalancesByCurrency) -> Vec<SimplifiedDebt> {
    let mut debts = Vec::new();

    for (currency, ledger) in balances {
        let mut creditors: Vec<(String, Decimal)> = ledger
            .iter()
            .filter(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(id, amount)| (id.clone(), *amount))
            .collect();
        let mut debtors: Vec<(String, Decimal)> = ledger
            .iter()
            .filter(|(_, amount)| **amount < Decimal::ZERO)
            .map(|(id, amount)| (id.clone(), -*amount))
            .collect();

        while !creditors.is_empty() && !debtors.is_empty() {
            creditors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            debtors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

            let amount = creditors[0].1.min(debtors[0].1);
            debts.push(SimplifiedDebt {
                from: debtors[0].0.clone(),
                to: creditors[0].0.clone(),
                amount,
                currency: currency.clone(),
            });

            creditors[0].1 -= amount;
            debtors[0].1 -= amount;
            if creditors[0].1.is_zero() {
                creditors.remove(0);
            }
            if debtors[0].1.is_zero() {
                debtors.remove(0);
            }
        }
    }

    debts
}
