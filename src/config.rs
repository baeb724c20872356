use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_TRANSACTION_ATTEMPTS, MAX_PAGE_SIZE};
use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;

pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub jwt_secret: String,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub transaction_max_attempts: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("jwt_secret", &"<redacted>")
            .field("default_page_size", &self.default_page_size)
            .field("max_page_size", &self.max_page_size)
            .field("transaction_max_attempts", &self.transaction_max_attempts)
            .finish()
    }
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    fn from_env() -> Self {
        dotenv().ok();

        let max_page_size = parsed_or("MAX_PAGE_SIZE", MAX_PAGE_SIZE).max(1);
        Self {
            port: parsed_or("PORT", 3000),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()),
            default_page_size: parsed_or("DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, max_page_size),
            max_page_size,
            transaction_max_attempts: parsed_or("TRANSACTION_MAX_ATTEMPTS", DEFAULT_TRANSACTION_ATTEMPTS).max(1),
        }
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);
