// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

/// Codeport Core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Recipient for review-queue notifications to the listing team
    pub admin_email: String,
    /// Maximum requests returned per listing page
    pub list_page_size: i64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CODEPORT_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `CODEPORT_ADMIN_EMAIL`: review-queue recipient (default: listings@syncmyorders.io)
    /// - `CODEPORT_LIST_PAGE_SIZE`: max requests per listing page (default: 50)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("CODEPORT_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("CODEPORT_DATABASE_URL"))?;

        let admin_email = std::env::var("CODEPORT_ADMIN_EMAIL")
            .unwrap_or_else(|_| "listings@syncmyorders.io".to_string());

        let list_page_size: i64 = std::env::var("CODEPORT_LIST_PAGE_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CODEPORT_LIST_PAGE_SIZE", "must be a positive integer")
            })?;

        if list_page_size <= 0 {
            return Err(ConfigError::Invalid(
                "CODEPORT_LIST_PAGE_SIZE",
                "must be a positive integer",
            ));
        }

        Ok(Self {
            database_url,
            admin_email,
            list_page_size,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("CODEPORT_DATABASE_URL", "postgres://localhost/test");
        guard.remove("CODEPORT_ADMIN_EMAIL");
        guard.remove("CODEPORT_LIST_PAGE_SIZE");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://localhost/test");
        assert_eq!(config.admin_email, "listings@syncmyorders.io");
        assert_eq!(config.list_page_size, 50);
    }

    #[test]
    fn test_config_from_env_with_custom_values() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("CODEPORT_DATABASE_URL", "sqlite:test.db");
        guard.set("CODEPORT_ADMIN_EMAIL", "review@example.com");
        guard.set("CODEPORT_LIST_PAGE_SIZE", "25");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite:test.db");
        assert_eq!(config.admin_email, "review@example.com");
        assert_eq!(config.list_page_size, 25);
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("CODEPORT_DATABASE_URL");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CODEPORT_DATABASE_URL")));
    }

    #[test]
    fn test_config_rejects_non_positive_page_size() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("CODEPORT_DATABASE_URL", "sqlite:test.db");
        guard.set("CODEPORT_LIST_PAGE_SIZE", "0");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_, _)));
    }
}
