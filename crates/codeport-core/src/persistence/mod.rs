// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for codeport-core.
//!
//! This module defines the persistence abstraction and backend
//! implementations. Review transitions that touch more than one table
//! (approve/reject) are single trait methods so each backend can wrap them
//! in one transaction scoped to the request/project pair.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;

/// Account record from the persistence layer.
///
/// Accounts are owned by the account service; this core only reads them.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRecord {
    /// Unique identifier for the account.
    pub id: i64,
    /// Contact email, used for review notifications.
    pub email: String,
    /// Current status (waiting, activated).
    pub status: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Project listing record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRecord {
    /// Unique identifier for the project.
    pub id: i64,
    /// Owning account.
    pub account_id: i64,
    /// Listing name.
    pub name: String,
    /// Public contact email shown on the listing.
    pub email: String,
    /// Long-form description.
    pub description: String,
    /// Additional documentation links.
    pub other_documentation: Option<String>,
    /// Release state (released, coming_soon).
    pub active_status: String,
    /// Project website.
    pub website: Option<String>,
    /// Logo or banner URL.
    pub image_link: Option<String>,
    /// Whitepaper link.
    pub whitepaper: Option<String>,
    /// GitHub link.
    pub github: Option<String>,
    /// Telegram link.
    pub telegram: Option<String>,
    /// Discord link.
    pub discord: Option<String>,
    /// Twitter link.
    pub twitter: Option<String>,
    /// JSON-encoded category list (at most 4 entries).
    pub categories: String,
    /// Review status (submitted, approved, rejected).
    pub status: String,
    /// When the project was created.
    pub created_at: DateTime<Utc>,
    /// When the project was last mutated by a confirmed request.
    pub updated_at: DateTime<Utc>,
}

/// Field values for materializing a project on create confirmation.
#[derive(Debug, Clone)]
pub struct NewProjectRecord {
    /// Owning account.
    pub account_id: i64,
    /// Listing name.
    pub name: String,
    /// Public contact email.
    pub email: String,
    /// Long-form description.
    pub description: String,
    /// Additional documentation links.
    pub other_documentation: Option<String>,
    /// Release state string.
    pub active_status: String,
    /// Project website.
    pub website: Option<String>,
    /// Logo or banner URL.
    pub image_link: Option<String>,
    /// Whitepaper link.
    pub whitepaper: Option<String>,
    /// GitHub link.
    pub github: Option<String>,
    /// Telegram link.
    pub telegram: Option<String>,
    /// Discord link.
    pub discord: Option<String>,
    /// Twitter link.
    pub twitter: Option<String>,
    /// JSON-encoded category list.
    pub categories: String,
}

/// Code artifact record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtifactRecord {
    /// Unique identifier for the artifact.
    pub id: i64,
    /// Account that claimed ownership of the artifact.
    pub owner_account_id: i64,
    /// Address that created the artifact on the origin network.
    pub creator: String,
    /// Hex-encoded sha256 of the payload.
    pub content_hash: String,
    /// Raw artifact payload.
    pub payload: Vec<u8>,
    /// Identifier on the target network once mirrored. Set at most once.
    pub mirrored_id: Option<i64>,
    /// When the artifact was claimed.
    pub created_at: DateTime<Utc>,
}

/// Review request record from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestRecord {
    /// Unique identifier for the request.
    pub id: i64,
    /// Requesting account.
    pub account_id: i64,
    /// Request type (create_project, update_project, delete_project, store_artifact).
    pub request_type: String,
    /// Target project, absent for store_artifact and unmaterialized creates.
    pub target_project_id: Option<i64>,
    /// JSON-encoded payload snapshot (see `model::RequestPayload`).
    pub payload: String,
    /// Current status (submitted, processing, approved, rejected, error).
    pub status: String,
    /// Rejection reason, when rejected.
    pub reason: Option<String>,
    /// When the request was submitted.
    pub created_at: DateTime<Utc>,
    /// When the request last changed status.
    pub updated_at: DateTime<Utc>,
}

/// Publication job queue entry from the persistence layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublicationJobRecord {
    /// Database primary key.
    pub id: i64,
    /// The store-artifact request this job resolves.
    pub request_id: i64,
    /// JSON-encoded artifact ID list, published in order.
    pub artifact_ids: String,
    /// Recipient for per-artifact success notifications.
    pub recipient: String,
    /// Queue status (queued, running, completed, failed).
    pub status: String,
    /// Attempt number, incremented on claim.
    pub attempt: i32,
    /// Maximum attempts before the job fails terminally.
    pub max_attempts: i32,
    /// Earliest time the job may be claimed (retry backoff target).
    pub next_attempt_at: DateTime<Utc>,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Persistence interface used by the workflow engine and the publication
/// worker.
#[async_trait]
pub trait Persistence: Send + Sync {
    // ========================================================================
    // Accounts (read-mostly; insert is a provisioning hook for the account
    // service and tests — the workflow never creates accounts)
    // ========================================================================

    /// Look up an account by ID.
    async fn find_account(&self, account_id: i64) -> Result<Option<AccountRecord>, CoreError>;

    /// Insert an account row. Provisioning hook; not called by the workflow.
    async fn insert_account(&self, email: &str, status: &str) -> Result<i64, CoreError>;

    // ========================================================================
    // Projects
    // ========================================================================

    /// Look up a project by ID.
    async fn find_project(&self, project_id: i64) -> Result<Option<ProjectRecord>, CoreError>;

    /// Set a project's review status.
    async fn update_project_status(
        &self,
        project_id: i64,
        status: &str,
    ) -> Result<(), CoreError>;

    /// List a project's linked artifact IDs in link order.
    async fn list_project_artifacts(&self, project_id: i64) -> Result<Vec<i64>, CoreError>;

    // ========================================================================
    // Artifacts
    // ========================================================================

    /// Look up a single artifact by ID.
    async fn find_artifact(&self, artifact_id: i64) -> Result<Option<ArtifactRecord>, CoreError>;

    /// Resolve a set of artifact IDs. Missing IDs are simply absent from
    /// the result; callers diff against the input to report them.
    async fn find_artifacts(&self, artifact_ids: &[i64]) -> Result<Vec<ArtifactRecord>, CoreError>;

    /// Insert an artifact row. Provisioning hook for the claim service and
    /// tests; the workflow never creates artifacts.
    async fn insert_artifact(
        &self,
        owner_account_id: i64,
        creator: &str,
        content_hash: &str,
        payload: &[u8],
    ) -> Result<i64, CoreError>;

    /// Record the target-network identifier for a mirrored artifact.
    ///
    /// Write-once: returns `false` without modifying the row when
    /// `mirrored_id` is already set, which is what makes job retries
    /// idempotent per artifact.
    async fn set_artifact_mirrored(
        &self,
        artifact_id: i64,
        mirrored_id: i64,
    ) -> Result<bool, CoreError>;

    // ========================================================================
    // Requests
    // ========================================================================

    /// Persist a new request in `submitted` status. Returns the request ID.
    async fn insert_request(
        &self,
        account_id: i64,
        request_type: &str,
        target_project_id: Option<i64>,
        payload_json: &str,
    ) -> Result<i64, CoreError>;

    /// Look up a request by ID.
    async fn find_request(&self, request_id: i64) -> Result<Option<RequestRecord>, CoreError>;

    /// List requests, optionally filtered to one account, newest first.
    async fn list_requests(
        &self,
        account_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestRecord>, CoreError>;

    /// Claim a request for review: transition `submitted` → `processing`
    /// only if the current status is `submitted`.
    ///
    /// Returns `true` if this caller won the claim. Two concurrent review
    /// actions on the same request see exactly one `true`.
    async fn begin_review(&self, request_id: i64) -> Result<bool, CoreError>;

    /// Set a request's status unconditionally (worker terminal states).
    async fn set_request_status(&self, request_id: i64, status: &str) -> Result<(), CoreError>;

    // ========================================================================
    // Review transitions (each runs in a single transaction)
    // ========================================================================

    /// Apply a confirmed create: materialize the project as `approved`,
    /// insert artifact links in order, and mark the request `approved`.
    /// Returns the new project ID.
    async fn approve_create_request(
        &self,
        request_id: i64,
        project: &NewProjectRecord,
        artifact_ids: &[i64],
    ) -> Result<i64, CoreError>;

    /// Apply a confirmed update: write the patched project row back as
    /// `approved`, replace the full artifact link set when one is given,
    /// and mark the request `approved`.
    async fn approve_update_request(
        &self,
        request_id: i64,
        project: &ProjectRecord,
        artifact_ids: Option<&[i64]>,
    ) -> Result<(), CoreError>;

    /// Apply a confirmed delete: remove the project (links cascade) and
    /// mark the request `approved`.
    async fn approve_delete_request(
        &self,
        request_id: i64,
        project_id: i64,
    ) -> Result<(), CoreError>;

    /// Apply a rejection: mark the request `rejected` with the reason and,
    /// when a target project exists, mark it `rejected` too.
    async fn reject_request(
        &self,
        request_id: i64,
        target_project_id: Option<i64>,
        reason: &str,
    ) -> Result<(), CoreError>;

    // ========================================================================
    // Publication job queue
    // ========================================================================

    /// Enqueue a publication job for a confirmed store-artifact request.
    async fn enqueue_publication_job(
        &self,
        request_id: i64,
        artifact_ids_json: &str,
        recipient: &str,
        max_attempts: i32,
    ) -> Result<i64, CoreError>;

    /// Claim up to `limit` due jobs: queued jobs whose `next_attempt_at`
    /// has passed move to `running` with `attempt` incremented, and are
    /// returned. Concurrent workers never claim the same job twice.
    async fn claim_due_publication_jobs(
        &self,
        limit: i64,
    ) -> Result<Vec<PublicationJobRecord>, CoreError>;

    /// Mark a claimed job completed.
    async fn complete_publication_job(&self, job_id: i64) -> Result<(), CoreError>;

    /// Return a claimed job to the queue with a retry delay and record the
    /// error from this attempt.
    async fn reschedule_publication_job(
        &self,
        job_id: i64,
        delay_secs: i64,
        error: &str,
    ) -> Result<(), CoreError>;

    /// Mark a claimed job terminally failed.
    async fn fail_publication_job(&self, job_id: i64, error: &str) -> Result<(), CoreError>;

    // ========================================================================
    // Health
    // ========================================================================

    /// Check database connectivity.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}
