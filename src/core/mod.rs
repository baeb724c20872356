pub mod allocation;
pub mod balances;
pub mod currency;
pub mod errors;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod services;
pub mod validation;
