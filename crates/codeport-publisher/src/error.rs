// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for codeport-publisher.

use thiserror::Error;

use crate::network::{OriginError, PublishError};

/// Publisher errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core persistence operation failed.
    #[error("Core error: {0}")]
    Core(#[from] codeport_core::error::CoreError),

    /// A job references an artifact that no longer exists.
    #[error("Artifact not found: {0}")]
    ArtifactMissing(i64),

    /// The fetched payload does not match the claimed content hash.
    #[error("Content hash mismatch for artifact {artifact_id}")]
    HashMismatch {
        /// The artifact whose payload failed verification.
        artifact_id: i64,
    },

    /// Reading the artifact payload from the origin network failed.
    #[error("Origin error: {0}")]
    Origin(#[from] OriginError),

    /// Publishing to the target network failed.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// A publication attempt exceeded the configured timeout.
    #[error("Publication timed out for artifact {artifact_id}")]
    Timeout {
        /// The artifact whose publication timed out.
        artifact_id: i64,
    },
}

impl Error {
    /// Whether retrying this job can ever succeed.
    ///
    /// Permanent failures skip the remaining attempts and fail the job
    /// immediately; everything else is retried with backoff until the
    /// attempt budget runs out.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::ArtifactMissing(_) => true,
            Self::HashMismatch { .. } => true,
            Self::Origin(OriginError::NotFound(_)) => true,
            Self::Publish(PublishError::SimulationFailed(_)) => true,
            _ => false,
        }
    }
}

/// Result type using publisher Error.
pub type Result<T> = std::result::Result<T, Error>;
