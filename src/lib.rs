pub mod api;
pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod infrastructure;

pub use crate::core::errors::SplitifydError;
pub use crate::core::services::SplitifydService;

#[cfg(test)]
mod tests;
