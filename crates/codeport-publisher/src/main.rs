// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Codeport Publisher - Artifact Publication Worker
//!
//! A background service responsible for:
//! - Polling the publication job queue shared with codeport-core
//! - Mirroring confirmed artifacts from the origin to the target network
//! - Retrying transient failures with exponential backoff
//! - Resolving store-artifact requests to approved or error

use std::sync::Arc;

use tracing::{info, warn};

use codeport_core::notify::TracingNotifier;
use codeport_core::persistence::PostgresPersistence;
use codeport_publisher::config::Config;
use codeport_publisher::network::{HttpOriginReader, HttpTargetPublisher, StaticSigningProvider};
use codeport_publisher::worker::{PublicationWorker, PublicationWorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codeport_publisher=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        origin_api = %config.origin_api,
        target_api = %config.target_api,
        signer = %config.signer_address,
        "Starting Codeport Publisher"
    );

    // Connect to database and run migrations
    let persistence = Arc::new(PostgresPersistence::connect(&config.database_url).await?);
    info!("Connected to database");

    let origin = Arc::new(HttpOriginReader::new(config.origin_api.clone()));
    let target = Arc::new(HttpTargetPublisher::new(config.target_api.clone()));
    let signer = Arc::new(StaticSigningProvider::new(config.signer_address.clone()));
    let notifier = Arc::new(TracingNotifier);

    let worker = PublicationWorker::new(
        persistence,
        origin,
        target,
        signer,
        notifier,
        PublicationWorkerConfig::from_config(&config),
    );
    let shutdown = worker.shutdown_handle();
    let handle = tokio::spawn(worker.run());

    info!("Publication worker ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown.notify_one();
    handle.await?;

    info!("Codeport Publisher shut down");

    Ok(())
}
