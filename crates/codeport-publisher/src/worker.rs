// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Publication worker.
//!
//! Polls the publication job queue and mirrors confirmed artifacts to the
//! target network. Each job publishes its artifacts in submission order;
//! already-mirrored artifacts are skipped, so a retried job resumes where
//! the failed attempt stopped instead of publishing twice.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use codeport_core::model::RequestStatus;
use codeport_core::notify::Notifier;
use codeport_core::persistence::{Persistence, PublicationJobRecord};

use crate::error::{Error, Result};
use crate::network::{OriginReader, SigningProvider, TargetPublisher};

/// Publication worker configuration.
#[derive(Debug, Clone)]
pub struct PublicationWorkerConfig {
    /// How often to poll for due jobs
    pub poll_interval: Duration,
    /// Maximum jobs claimed per poll
    pub batch_size: i64,
    /// Jobs processed concurrently within one poll
    pub concurrency: usize,
    /// Per-artifact publication timeout
    pub publish_timeout: Duration,
    /// Base delay for the exponential retry backoff
    pub retry_base_delay: Duration,
    /// Gas price attached to every publication
    pub gas_price: String,
}

impl Default for PublicationWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            concurrency: 4,
            publish_timeout: Duration::from_secs(30),
            retry_base_delay: Duration::from_secs(30),
            gas_price: "0.025usmo".to_string(),
        }
    }
}

impl PublicationWorkerConfig {
    /// Build the worker configuration from loaded service configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            batch_size: config.batch_size,
            concurrency: config.concurrency,
            publish_timeout: config.publish_timeout,
            retry_base_delay: config.retry_base_delay,
            gas_price: config.gas_price.clone(),
        }
    }
}

/// How a claimed job ended this attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every artifact is mirrored; the request is approved.
    Completed {
        /// The finished job.
        job_id: i64,
        /// The resolved request.
        request_id: i64,
    },
    /// A transient failure; the job returns to the queue with backoff.
    Retrying {
        /// The rescheduled job.
        job_id: i64,
        /// The attempt that just failed.
        attempt: i32,
        /// Delay before the job is due again.
        delay: Duration,
    },
    /// The job failed terminally; the request is in error.
    Failed {
        /// The failed job.
        job_id: i64,
        /// The request left in error.
        request_id: i64,
        /// The failure from the last attempt.
        error: String,
    },
}

/// Publication worker that runs as a background task.
pub struct PublicationWorker {
    persistence: Arc<dyn Persistence>,
    origin: Arc<dyn OriginReader>,
    target: Arc<dyn TargetPublisher>,
    signer: Arc<dyn SigningProvider>,
    notifier: Arc<dyn Notifier>,
    config: PublicationWorkerConfig,
    shutdown: Arc<Notify>,
    outcomes: Option<mpsc::UnboundedSender<JobOutcome>>,
}

impl PublicationWorker {
    /// Create a new publication worker.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        origin: Arc<dyn OriginReader>,
        target: Arc<dyn TargetPublisher>,
        signer: Arc<dyn SigningProvider>,
        notifier: Arc<dyn Notifier>,
        config: PublicationWorkerConfig,
    ) -> Self {
        Self {
            persistence,
            origin,
            target,
            signer,
            notifier,
            config,
            shutdown: Arc::new(Notify::new()),
            outcomes: None,
        }
    }

    /// Report every job outcome on the given channel.
    pub fn with_outcomes(mut self, sender: mpsc::UnboundedSender<JobOutcome>) -> Self {
        self.outcomes = Some(sender);
        self
    }

    /// Get a handle to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the publication worker loop.
    pub async fn run(self) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            "Publication worker started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Publication worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Failed to process publication jobs");
                    }
                }
            }
        }
    }

    /// Claim and process one batch of due jobs. Returns the number claimed.
    pub async fn run_once(&self) -> Result<usize> {
        let jobs = self
            .persistence
            .claim_due_publication_jobs(self.config.batch_size)
            .await?;
        let claimed = jobs.len();

        if claimed > 0 {
            debug!(claimed, "claimed publication jobs");
        }

        futures::stream::iter(jobs)
            .for_each_concurrent(self.config.concurrency, |job| async move {
                self.process_job(job).await;
            })
            .await;

        Ok(claimed)
    }

    async fn process_job(&self, job: PublicationJobRecord) {
        match self.run_job(&job).await {
            Ok(()) => {
                if let Err(e) = self.persistence.complete_publication_job(job.id).await {
                    error!(job_id = job.id, error = %e, "failed to complete job");
                    return;
                }
                if let Err(e) = self
                    .persistence
                    .set_request_status(job.request_id, RequestStatus::Approved.as_str())
                    .await
                {
                    error!(job_id = job.id, error = %e, "failed to approve request");
                    return;
                }
                info!(job_id = job.id, request_id = job.request_id, "publication completed");
                self.emit(JobOutcome::Completed {
                    job_id: job.id,
                    request_id: job.request_id,
                });
            }
            Err(e) if e.is_permanent() || job.attempt >= job.max_attempts => {
                warn!(
                    job_id = job.id,
                    request_id = job.request_id,
                    attempt = job.attempt,
                    error = %e,
                    "publication failed terminally"
                );
                if let Err(db) = self.persistence.fail_publication_job(job.id, &e.to_string()).await
                {
                    error!(job_id = job.id, error = %db, "failed to mark job failed");
                }
                if let Err(db) = self
                    .persistence
                    .set_request_status(job.request_id, RequestStatus::Error.as_str())
                    .await
                {
                    error!(job_id = job.id, error = %db, "failed to mark request errored");
                }
                self.emit(JobOutcome::Failed {
                    job_id: job.id,
                    request_id: job.request_id,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                let delay = backoff_delay(self.config.retry_base_delay, job.attempt);
                warn!(
                    job_id = job.id,
                    attempt = job.attempt,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "publication attempt failed, rescheduling"
                );
                if let Err(db) = self
                    .persistence
                    .reschedule_publication_job(job.id, delay.as_secs() as i64, &e.to_string())
                    .await
                {
                    error!(job_id = job.id, error = %db, "failed to reschedule job");
                }
                self.emit(JobOutcome::Retrying {
                    job_id: job.id,
                    attempt: job.attempt,
                    delay,
                });
            }
        }
    }

    /// Publish every artifact named by the job, in order.
    async fn run_job(&self, job: &PublicationJobRecord) -> Result<()> {
        let artifact_ids: Vec<i64> = serde_json::from_str(&job.artifact_ids)?;
        let signer = self.signer.signing_address();

        for artifact_id in artifact_ids {
            let artifact = self
                .persistence
                .find_artifact(artifact_id)
                .await?
                .ok_or(Error::ArtifactMissing(artifact_id))?;

            if artifact.mirrored_id.is_some() {
                debug!(artifact_id, "already mirrored, skipping");
                continue;
            }

            let payload = self.origin.fetch_artifact_payload(artifact_id).await?;
            if sha256_hex(&payload) != artifact.content_hash {
                return Err(Error::HashMismatch { artifact_id });
            }

            let mirrored_id = tokio::time::timeout(
                self.config.publish_timeout,
                self.target.publish(&signer, &payload, &self.config.gas_price),
            )
            .await
            .map_err(|_| Error::Timeout { artifact_id })??;

            if !self
                .persistence
                .set_artifact_mirrored(artifact_id, mirrored_id)
                .await?
            {
                // Raced with another worker; their id stands.
                warn!(artifact_id, mirrored_id, "mirror id already recorded");
                continue;
            }

            info!(artifact_id, mirrored_id, "artifact published");

            if let Err(e) = self
                .notifier
                .notify(
                    &job.recipient,
                    "Artifact published",
                    &format!(
                        "Artifact '{}' is now available on the target network as '{}'.",
                        artifact_id, mirrored_id
                    ),
                )
                .await
            {
                warn!(artifact_id, error = %e, "notification failed");
            }
        }

        Ok(())
    }

    fn emit(&self, outcome: JobOutcome) {
        if let Some(sender) = &self.outcomes {
            let _ = sender.send(outcome);
        }
    }
}

/// Hex-encoded sha256 of a payload, the form stored in `content_hash`.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Exponential backoff: base doubles with each failed attempt.
fn backoff_delay(base: Duration, attempt: i32) -> Duration {
    let exponent = attempt.saturating_sub(1).max(0) as u32;
    base * 2u32.saturating_pow(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let base = Duration::from_secs(30);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(60));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(120));
    }

    #[test]
    fn test_sha256_hex_is_lowercase_hex() {
        let hash = sha256_hex(b"wasm-blob");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // Same input, same hash.
        assert_eq!(hash, sha256_hex(b"wasm-blob"));
    }
}
