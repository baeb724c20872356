//! Payload validation for expenses and settlements.
//!
//! Every check works on integer minor units of the expense currency, so the
//! tolerance comparisons below are exact.

pub mod expense;
pub mod settlement;

#[cfg(test)]
mod props;

pub use expense::{ValidatedExpense, validate_expense, validate_expense_draft};
pub use settlement::{ValidatedSettlement, validate_settlement};
