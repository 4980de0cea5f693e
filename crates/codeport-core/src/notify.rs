// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound notification seam.
//!
//! Review decisions and publication progress are reported to requesters
//! through a [`Notifier`]. Delivery is best-effort everywhere: the workflow
//! logs failures and keeps going, so a mail outage never blocks a review.

use async_trait::async_trait;

use crate::error::CoreError;

/// Delivery channel for review and publication notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message to `recipient`.
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), CoreError>;
}

/// Notifier that emits structured log events instead of delivering mail.
///
/// Default wiring for deployments without an outbound mail relay and for
/// tests that only assert on workflow state.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, recipient: &str, subject: &str, body: &str) -> Result<(), CoreError> {
        tracing::info!(recipient, subject, body, "notification");
        Ok(())
    }
}
