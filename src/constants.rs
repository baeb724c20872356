//! Action names recorded in the application log, and list defaults.

pub const GROUP_CREATED: &str = "GROUP_CREATED";
pub const MEMBER_ADDED: &str = "MEMBER_ADDED";
pub const MEMBER_APPROVED: &str = "MEMBER_APPROVED";
pub const MEMBER_REMOVED: &str = "MEMBER_REMOVED";
pub const SECURITY_PRESET_APPLIED: &str = "SECURITY_PRESET_APPLIED";
pub const PERMISSIONS_UPDATED: &str = "PERMISSIONS_UPDATED";
pub const MEMBER_ROLE_CHANGED: &str = "MEMBER_ROLE_CHANGED";
pub const EXPENSE_CREATED: &str = "EXPENSE_CREATED";
pub const EXPENSE_UPDATED: &str = "EXPENSE_UPDATED";
pub const EXPENSE_DELETED: &str = "EXPENSE_DELETED";
pub const SETTLEMENT_CREATED: &str = "SETTLEMENT_CREATED";
pub const SETTLEMENT_UPDATED: &str = "SETTLEMENT_UPDATED";
pub const SETTLEMENT_DELETED: &str = "SETTLEMENT_DELETED";
pub const COMMENT_ADDED: &str = "COMMENT_ADDED";

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 5;

pub const MAX_GROUP_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 200;
pub const MAX_COMMENT_LENGTH: usize = 500;
pub const MAX_NOTE_LENGTH: usize = 500;
pub const MAX_USER_ID_LENGTH: usize = 128;
