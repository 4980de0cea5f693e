// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Codeport Publisher configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL (shared with codeport-core)
    pub database_url: String,
    /// Base URL of the origin network gateway
    pub origin_api: String,
    /// Base URL of the target network gateway
    pub target_api: String,
    /// Address publications are signed with
    pub signer_address: String,
    /// Gas price attached to every publication
    pub gas_price: String,
    /// How often to poll for due publication jobs
    pub poll_interval: Duration,
    /// Maximum jobs claimed per poll
    pub batch_size: i64,
    /// Jobs processed concurrently within one poll
    pub concurrency: usize,
    /// Per-artifact publication timeout
    pub publish_timeout: Duration,
    /// Base delay for the exponential retry backoff
    pub retry_base_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CODEPORT_PUBLISHER_DATABASE_URL` (falls back to `CODEPORT_DATABASE_URL`)
    /// - `CODEPORT_ORIGIN_API`: origin gateway base URL
    /// - `CODEPORT_TARGET_API`: target gateway base URL
    /// - `CODEPORT_SIGNER_ADDRESS`: publication signing address
    ///
    /// Optional (with defaults):
    /// - `CODEPORT_GAS_PRICE`: publication gas price (default: 0.025usmo)
    /// - `CODEPORT_PUBLISH_POLL_SECS`: poll interval in seconds (default: 5)
    /// - `CODEPORT_PUBLISH_BATCH`: jobs claimed per poll (default: 10)
    /// - `CODEPORT_PUBLISH_CONCURRENCY`: jobs processed in parallel (default: 4)
    /// - `CODEPORT_PUBLISH_TIMEOUT_SECS`: per-artifact timeout (default: 30)
    /// - `CODEPORT_PUBLISH_RETRY_BASE_SECS`: backoff base delay (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("CODEPORT_PUBLISHER_DATABASE_URL")
            .or_else(|_| std::env::var("CODEPORT_DATABASE_URL"))
            .map_err(|_| ConfigError::Missing("CODEPORT_DATABASE_URL"))?;

        let origin_api = std::env::var("CODEPORT_ORIGIN_API")
            .map_err(|_| ConfigError::Missing("CODEPORT_ORIGIN_API"))?;
        let target_api = std::env::var("CODEPORT_TARGET_API")
            .map_err(|_| ConfigError::Missing("CODEPORT_TARGET_API"))?;
        let signer_address = std::env::var("CODEPORT_SIGNER_ADDRESS")
            .map_err(|_| ConfigError::Missing("CODEPORT_SIGNER_ADDRESS"))?;

        let gas_price =
            std::env::var("CODEPORT_GAS_PRICE").unwrap_or_else(|_| "0.025usmo".to_string());

        let poll_secs = parse_env("CODEPORT_PUBLISH_POLL_SECS", 5u64)?;
        let batch_size = parse_env("CODEPORT_PUBLISH_BATCH", 10i64)?;
        let concurrency = parse_env("CODEPORT_PUBLISH_CONCURRENCY", 4usize)?;
        let timeout_secs = parse_env("CODEPORT_PUBLISH_TIMEOUT_SECS", 30u64)?;
        let retry_base_secs = parse_env("CODEPORT_PUBLISH_RETRY_BASE_SECS", 30u64)?;

        Ok(Self {
            database_url,
            origin_api,
            target_api,
            signer_address,
            gas_price,
            poll_interval: Duration::from_secs(poll_secs),
            batch_size,
            concurrency,
            publish_timeout: Duration::from_secs(timeout_secs),
            retry_base_delay: Duration::from_secs(retry_base_secs),
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(key, "must be a valid number")),
        Err(_) => Ok(default),
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
