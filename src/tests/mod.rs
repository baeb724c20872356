mod api_tests;
mod membership_tests;

use crate::core::models::{
    expense::{ExpenseDraft, ExpenseSplit, SplitType},
    group::Group,
    settlement::SettlementDraft,
};
use crate::core::services::SplitifydService;
use crate::infrastructure::cache::in_memory::InMemoryCache;
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::storage::in_memory::InMemoryStorage;
use rust_decimal::Decimal;

pub const TEST_SECRET: &str = "test-secret";

pub type TestService = SplitifydService<InMemoryLogging, InMemoryStorage, InMemoryCache>;

pub fn create_test_service() -> TestService {
    let storage = InMemoryStorage::new();
    let logging = InMemoryLogging::new();
    let cache = InMemoryCache::new();
    SplitifydService::new(storage, logging, cache, TEST_SECRET)
}

/// An open group administered by `admin` with every other user active.
pub async fn open_group(service: &TestService, admin: &str, members: &[&str]) -> Group {
    let group = service.create_group(admin, "Weekend trip").await.unwrap();
    for member in members {
        service.add_member(admin, &group.id, member).await.unwrap();
    }
    service.get_group(admin, &group.id).await.unwrap()
}

pub fn users(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

pub fn exact_draft(paid_by: &str, amount: Decimal, currency: &str, splits: &[(&str, Decimal)]) -> ExpenseDraft {
    ExpenseDraft {
        description: "Groceries".to_string(),
        paid_by: paid_by.to_string(),
        amount,
        currency: currency.to_string(),
        split_type: SplitType::Exact,
        participants: splits.iter().map(|(u, _)| u.to_string()).collect(),
        splits: splits.iter().map(|(u, a)| ExpenseSplit::new(*u, *a)).collect(),
    }
}

pub fn equal_draft(paid_by: &str, amount: Decimal, currency: &str, participants: &[&str]) -> ExpenseDraft {
    ExpenseDraft {
        description: "Dinner".to_string(),
        paid_by: paid_by.to_string(),
        amount,
        currency: currency.to_string(),
        split_type: SplitType::Equal,
        participants: users(participants),
        splits: Vec::new(),
    }
}

pub fn settlement_draft(payer: &str, payee: &str, amount: Decimal, currency: &str) -> SettlementDraft {
    SettlementDraft {
        payer_id: payer.to_string(),
        payee_id: payee.to_string(),
        amount,
        currency: currency.to_string(),
        note: None,
    }
}
