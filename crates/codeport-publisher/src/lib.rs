// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Codeport Publisher - Artifact Publication Worker
//!
//! Background worker that resolves confirmed store-artifact requests. It
//! polls the shared publication job queue, reads each artifact's payload
//! from the origin network, verifies it against the claimed content hash,
//! publishes it to the target network, and records the assigned identifier.
//!
//! Failed attempts go back to the queue with exponential backoff; a retried
//! job skips artifacts that are already mirrored, so every artifact is
//! published at most once. When the attempt budget runs out (or the failure
//! is permanent) the job fails and the owning request moves to `error`.
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types with permanent/transient classification
//! - [`network`]: Origin reader, target publisher and signing seams
//! - [`worker`]: The polling publication worker

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types with permanent/transient classification.
pub mod error;

/// Network seams: origin reader, target publisher, signing provider.
pub mod network;

/// The polling publication worker.
pub mod worker;
