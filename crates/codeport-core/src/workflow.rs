// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Review request workflow engine.
//!
//! All listing changes flow through here: submissions validate input and
//! persist a request snapshot, review actions claim the request and apply
//! or discard the proposed change. The claim is a conditional status
//! transition in the database, so two reviewers acting on the same request
//! concurrently resolve to exactly one winner.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::model::{
    AccountStatus, ActiveStatus, Category, MAX_PROJECT_CATEGORIES, ProjectPatch, ProjectStatus,
    RequestPayload, RequestStatus, RequestType, categories_to_json,
};
use crate::notify::Notifier;
use crate::persistence::{AccountRecord, NewProjectRecord, Persistence, RequestRecord};

/// Publication attempts before a store-artifact request fails terminally.
pub const DEFAULT_MAX_PUBLISH_ATTEMPTS: i32 = 3;

/// Listing page cap used when the workflow is built without a [`Config`].
pub const DEFAULT_LIST_PAGE_SIZE: i64 = 50;

/// A proposal to list a new project.
#[derive(Debug, Clone, Default)]
pub struct CreateProjectSubmission {
    /// Requesting account.
    pub account_id: i64,
    /// Descriptive fields; `name`, `email` and `description` are required.
    pub fields: ProjectPatch,
    /// Categories for the listing, at most [`MAX_PROJECT_CATEGORIES`].
    pub categories: Vec<Category>,
    /// Artifacts to link to the listing.
    pub artifact_ids: Vec<i64>,
}

/// A proposal to change an existing project.
#[derive(Debug, Clone, Default)]
pub struct UpdateProjectSubmission {
    /// Requesting account.
    pub account_id: i64,
    /// Project to change.
    pub project_id: i64,
    /// Sparse field patch; absent fields keep their live values.
    pub fields: ProjectPatch,
    /// Replacement category set, when the submission changes it.
    pub categories: Option<Vec<Category>>,
    /// Replacement artifact link set, when the submission changes it.
    pub artifact_ids: Option<Vec<i64>>,
}

/// What a confirmation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// A create request materialized this project.
    ProjectCreated {
        /// The new project's ID.
        project_id: i64,
    },
    /// An update request was applied to this project.
    ProjectUpdated {
        /// The patched project's ID.
        project_id: i64,
    },
    /// A delete request removed this project.
    ProjectDeleted {
        /// The removed project's ID.
        project_id: i64,
    },
    /// A store-artifact request was handed to the publication worker; the
    /// request resolves asynchronously.
    PublicationQueued {
        /// The queued job's ID.
        job_id: i64,
    },
}

/// A request together with its decoded payload snapshot.
#[derive(Debug, Clone)]
pub struct RequestDetails {
    /// The stored request row.
    pub request: RequestRecord,
    /// The proposed change.
    pub payload: RequestPayload,
}

/// The review request workflow engine.
///
/// Stateless besides its handles; cheap to clone and share.
#[derive(Clone)]
pub struct RequestWorkflow {
    persistence: Arc<dyn Persistence>,
    notifier: Arc<dyn Notifier>,
    admin_email: String,
    list_page_size: i64,
}

impl RequestWorkflow {
    /// Create a workflow engine over the given persistence and notifier.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        notifier: Arc<dyn Notifier>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            persistence,
            notifier,
            admin_email: admin_email.into(),
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }

    /// Create a workflow engine from loaded configuration.
    pub fn from_config(
        persistence: Arc<dyn Persistence>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            persistence,
            notifier,
            admin_email: config.admin_email.clone(),
            list_page_size: config.list_page_size,
        }
    }

    // ------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------

    /// Submit a create-project request.
    ///
    /// The listing only comes into existence when a reviewer confirms; until
    /// then the proposal lives entirely in the request payload.
    pub async fn submit_create(&self, submission: CreateProjectSubmission) -> Result<i64> {
        require_present("name", submission.fields.name.as_deref())?;
        require_present("email", submission.fields.email.as_deref())?;
        require_present("description", submission.fields.description.as_deref())?;
        check_category_count(&submission.categories)?;

        let account = self.require_active_account(submission.account_id).await?;
        self.require_artifacts_exist(&submission.artifact_ids)
            .await?;

        let payload = RequestPayload {
            contact_email: account.email.clone(),
            fields: submission.fields,
            categories: Some(submission.categories),
            artifact_ids: Some(submission.artifact_ids),
        };

        let request_id = self
            .persistence
            .insert_request(
                submission.account_id,
                RequestType::CreateProject.as_str(),
                None,
                &payload.to_json()?,
            )
            .await?;

        tracing::info!(request_id, account_id = submission.account_id, "create request submitted");

        self.notify_best_effort(
            &account.email,
            "Project listing request received",
            &format!(
                "Your project listing request '{}' was received and is awaiting review.",
                request_id
            ),
        )
        .await;
        self.notify_best_effort(
            &self.admin_email,
            "New project listing request",
            &format!("Request '{}' is awaiting review.", request_id),
        )
        .await;

        Ok(request_id)
    }

    /// Submit an update-project request and lock the project for review.
    pub async fn submit_update(&self, submission: UpdateProjectSubmission) -> Result<i64> {
        if let Some(categories) = &submission.categories {
            check_category_count(categories)?;
        }

        let account = self.require_active_account(submission.account_id).await?;
        let project = self.require_reviewable_project(submission.project_id).await?;

        if let Some(ids) = &submission.artifact_ids {
            self.require_artifacts_owned(submission.account_id, ids)
                .await?;
        }

        let payload = RequestPayload {
            contact_email: account.email,
            fields: submission.fields,
            categories: submission.categories,
            artifact_ids: submission.artifact_ids,
        };

        let request_id = self
            .persistence
            .insert_request(
                submission.account_id,
                RequestType::UpdateProject.as_str(),
                Some(project.id),
                &payload.to_json()?,
            )
            .await?;

        self.persistence
            .update_project_status(project.id, ProjectStatus::Submitted.as_str())
            .await?;

        tracing::info!(request_id, project_id = project.id, "update request submitted");

        Ok(request_id)
    }

    /// Submit a delete-project request and lock the project for review.
    pub async fn submit_delete(&self, account_id: i64, project_id: i64) -> Result<i64> {
        let account = self.require_active_account(account_id).await?;
        let project = self.require_reviewable_project(project_id).await?;

        let payload = RequestPayload {
            contact_email: account.email,
            ..Default::default()
        };

        let request_id = self
            .persistence
            .insert_request(
                account_id,
                RequestType::DeleteProject.as_str(),
                Some(project.id),
                &payload.to_json()?,
            )
            .await?;

        self.persistence
            .update_project_status(project.id, ProjectStatus::Submitted.as_str())
            .await?;

        tracing::info!(request_id, project_id, "delete request submitted");

        Ok(request_id)
    }

    /// Submit a request to mirror claimed artifacts to the target network.
    ///
    /// `contact_email` overrides the account email as the recipient for
    /// per-artifact publication notices.
    pub async fn submit_store_artifacts(
        &self,
        account_id: i64,
        contact_email: Option<String>,
        artifact_ids: Vec<i64>,
    ) -> Result<i64> {
        let account = self.require_active_account(account_id).await?;

        if artifact_ids.is_empty() {
            return Err(CoreError::NoArtifactsSpecified);
        }
        self.require_artifacts_owned(account_id, &artifact_ids)
            .await?;

        let payload = RequestPayload {
            contact_email: contact_email.unwrap_or(account.email),
            artifact_ids: Some(artifact_ids),
            ..Default::default()
        };

        let request_id = self
            .persistence
            .insert_request(
                account_id,
                RequestType::StoreArtifact.as_str(),
                None,
                &payload.to_json()?,
            )
            .await?;

        tracing::info!(request_id, account_id, "store-artifact request submitted");

        Ok(request_id)
    }

    // ------------------------------------------------------------------
    // Review actions
    // ------------------------------------------------------------------

    /// Confirm a request: claim it and apply the proposed change.
    ///
    /// Store-artifact requests are handed to the publication worker and stay
    /// in `processing` until it resolves them; every other type resolves
    /// here.
    pub async fn confirm(&self, request_id: i64) -> Result<ConfirmOutcome> {
        let details = self.claim(request_id).await?;

        match self.apply_confirmed(&details).await {
            Ok(outcome) => {
                tracing::info!(request_id, ?outcome, "request confirmed");
                Ok(outcome)
            }
            Err(e) => {
                // Release the claim so the reviewer can retry or reject.
                self.release_claim(request_id).await;
                Err(e)
            }
        }
    }

    /// Reject a request: claim it and discard the proposed change.
    ///
    /// The target project, when one exists, is marked rejected so its owner
    /// can see the outcome and resubmit.
    pub async fn reject(&self, request_id: i64, reason: &str) -> Result<()> {
        let details = self.claim(request_id).await?;

        // A confirmed delete may have raced us; a rejection of a change to a
        // project that no longer exists is reported, not applied.
        if let Some(project_id) = details.request.target_project_id
            && RequestType::from_db(&details.request.request_type)? != RequestType::StoreArtifact
            && self.persistence.find_project(project_id).await?.is_none()
        {
            self.release_claim(request_id).await;
            return Err(CoreError::ProjectNotFound { project_id });
        }

        self.persistence
            .reject_request(request_id, details.request.target_project_id, reason)
            .await?;

        tracing::info!(request_id, reason, "request rejected");

        self.notify_best_effort(
            &details.payload.contact_email,
            "Project listing request rejected",
            &format!("Your request '{}' was rejected: {}", request_id, reason),
        )
        .await;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// List requests, optionally for one account, newest first.
    ///
    /// `limit` is capped at the configured page size.
    pub async fn list_requests(
        &self,
        account_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestRecord>> {
        let limit = limit.min(self.list_page_size);
        self.persistence.list_requests(account_id, limit, offset).await
    }

    /// Fetch a request with its decoded payload.
    pub async fn request_details(&self, request_id: i64) -> Result<RequestDetails> {
        let request = self
            .persistence
            .find_request(request_id)
            .await?
            .ok_or(CoreError::RequestNotFound { request_id })?;
        let payload = RequestPayload::from_json(&request.payload)?;
        Ok(RequestDetails { request, payload })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Claim a request for review, disambiguating a lost claim into
    /// not-found versus already-processed.
    async fn claim(&self, request_id: i64) -> Result<RequestDetails> {
        if !self.persistence.begin_review(request_id).await? {
            return match self.persistence.find_request(request_id).await? {
                None => Err(CoreError::RequestNotFound { request_id }),
                Some(r) => Err(CoreError::RequestAlreadyProcessed {
                    request_id,
                    status: r.status,
                }),
            };
        }
        self.request_details(request_id).await
    }

    async fn apply_confirmed(&self, details: &RequestDetails) -> Result<ConfirmOutcome> {
        let request = &details.request;
        let payload = &details.payload;

        match RequestType::from_db(&request.request_type)? {
            RequestType::CreateProject => {
                let record = build_new_project(request.account_id, payload)?;
                // Only artifacts that still resolve get linked; stale IDs in
                // the snapshot are dropped silently.
                let requested = payload.artifact_ids.clone().unwrap_or_default();
                let resolved: Vec<i64> = self
                    .persistence
                    .find_artifacts(&requested)
                    .await?
                    .iter()
                    .map(|a| a.id)
                    .collect();
                let linked: Vec<i64> = requested
                    .into_iter()
                    .filter(|id| resolved.contains(id))
                    .collect();

                let project_id = self
                    .persistence
                    .approve_create_request(request.id, &record, &linked)
                    .await?;

                self.notify_approved(&payload.contact_email, request.id).await;
                Ok(ConfirmOutcome::ProjectCreated { project_id })
            }
            RequestType::UpdateProject => {
                let project_id = request.target_project_id.ok_or_else(|| {
                    CoreError::Database {
                        operation: "confirm".to_string(),
                        details: format!("update request '{}' has no target project", request.id),
                    }
                })?;
                let mut project = self
                    .persistence
                    .find_project(project_id)
                    .await?
                    .ok_or(CoreError::ProjectNotFound { project_id })?;

                payload.fields.apply_to(&mut project);
                if let Some(categories) = &payload.categories {
                    project.categories = categories_to_json(categories)?;
                }

                self.persistence
                    .approve_update_request(request.id, &project, payload.artifact_ids.as_deref())
                    .await?;

                self.notify_approved(&payload.contact_email, request.id).await;
                Ok(ConfirmOutcome::ProjectUpdated { project_id })
            }
            RequestType::DeleteProject => {
                let project_id = request.target_project_id.ok_or_else(|| {
                    CoreError::Database {
                        operation: "confirm".to_string(),
                        details: format!("delete request '{}' has no target project", request.id),
                    }
                })?;
                self.persistence
                    .find_project(project_id)
                    .await?
                    .ok_or(CoreError::ProjectNotFound { project_id })?;

                self.persistence
                    .approve_delete_request(request.id, project_id)
                    .await?;

                self.notify_approved(&payload.contact_email, request.id).await;
                Ok(ConfirmOutcome::ProjectDeleted { project_id })
            }
            RequestType::StoreArtifact => {
                let artifact_ids = payload.artifact_ids.clone().unwrap_or_default();
                if artifact_ids.is_empty() {
                    return Err(CoreError::NoArtifactsSpecified);
                }
                let job_id = self
                    .persistence
                    .enqueue_publication_job(
                        request.id,
                        &serde_json::to_string(&artifact_ids)?,
                        &payload.contact_email,
                        DEFAULT_MAX_PUBLISH_ATTEMPTS,
                    )
                    .await?;

                tracing::info!(request_id = request.id, job_id, "publication job queued");
                Ok(ConfirmOutcome::PublicationQueued { job_id })
            }
        }
    }

    /// Return a claimed request to `submitted` so the reviewer can retry.
    async fn release_claim(&self, request_id: i64) {
        if let Err(e) = self
            .persistence
            .set_request_status(request_id, RequestStatus::Submitted.as_str())
            .await
        {
            tracing::warn!(request_id, error = %e, "failed to release claim");
        }
    }

    async fn require_active_account(&self, account_id: i64) -> Result<AccountRecord> {
        let account = self
            .persistence
            .find_account(account_id)
            .await?
            .ok_or(CoreError::AccountNotFound { account_id })?;
        if AccountStatus::from_db(&account.status)? != AccountStatus::Activated {
            return Err(CoreError::AccountNotActivated { account_id });
        }
        Ok(account)
    }

    /// Load a project that may take a new review request: it must exist and
    /// must not already be locked by a pending one.
    async fn require_reviewable_project(
        &self,
        project_id: i64,
    ) -> Result<crate::persistence::ProjectRecord> {
        let project = self
            .persistence
            .find_project(project_id)
            .await?
            .ok_or(CoreError::ProjectNotFound { project_id })?;
        if project.status == ProjectStatus::Submitted.as_str() {
            return Err(CoreError::ProjectNotApproved { project_id });
        }
        Ok(project)
    }

    /// Resolve the given IDs, failing with the sorted missing set when any
    /// do not exist. Existence is always reported before ownership.
    async fn require_artifacts_exist(
        &self,
        artifact_ids: &[i64],
    ) -> Result<Vec<crate::persistence::ArtifactRecord>> {
        let found = self.persistence.find_artifacts(artifact_ids).await?;
        if found.len() != artifact_ids.len() {
            let mut missing_ids: Vec<i64> = artifact_ids
                .iter()
                .filter(|id| !found.iter().any(|a| a.id == **id))
                .copied()
                .collect();
            missing_ids.sort_unstable();
            missing_ids.dedup();
            if !missing_ids.is_empty() {
                return Err(CoreError::UnknownArtifacts { missing_ids });
            }
        }
        Ok(found)
    }

    /// Resolve the given IDs and require the requester to own every one.
    async fn require_artifacts_owned(
        &self,
        account_id: i64,
        artifact_ids: &[i64],
    ) -> Result<Vec<crate::persistence::ArtifactRecord>> {
        let artifacts = self.require_artifacts_exist(artifact_ids).await?;
        let not_owned: Vec<i64> = artifacts
            .iter()
            .filter(|a| a.owner_account_id != account_id)
            .map(|a| a.id)
            .collect();
        if !not_owned.is_empty() {
            return Err(CoreError::ArtifactsNotOwned {
                artifact_ids: not_owned,
            });
        }
        Ok(artifacts)
    }

    async fn notify_approved(&self, recipient: &str, request_id: i64) {
        self.notify_best_effort(
            recipient,
            "Project listing request approved",
            &format!("Your request '{}' has been approved.", request_id),
        )
        .await;
    }

    async fn notify_best_effort(&self, recipient: &str, subject: &str, body: &str) {
        if let Err(e) = self.notifier.notify(recipient, subject, body).await {
            tracing::warn!(recipient, subject, error = %e, "notification failed");
        }
    }
}

fn require_present(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(CoreError::Validation {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        }),
    }
}

fn check_category_count(categories: &[Category]) -> Result<()> {
    if categories.len() > MAX_PROJECT_CATEGORIES {
        return Err(CoreError::TooManyCategories {
            count: categories.len(),
        });
    }
    Ok(())
}

fn build_new_project(account_id: i64, payload: &RequestPayload) -> Result<NewProjectRecord> {
    let fields = &payload.fields;
    let required = |field: &str, value: &Option<String>| -> Result<String> {
        value.clone().ok_or_else(|| CoreError::Validation {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        })
    };

    Ok(NewProjectRecord {
        account_id,
        name: required("name", &fields.name)?,
        email: required("email", &fields.email)?,
        description: required("description", &fields.description)?,
        other_documentation: fields.other_documentation.clone(),
        active_status: fields
            .active_status
            .unwrap_or(ActiveStatus::ComingSoon)
            .as_str()
            .to_string(),
        website: fields.website.clone(),
        image_link: fields.image_link.clone(),
        whitepaper: fields.whitepaper.clone(),
        github: fields.github.clone(),
        telegram: fields.telegram.clone(),
        discord: fields.discord.clone(),
        twitter: fields.twitter.clone(),
        categories: categories_to_json(payload.categories.as_deref().unwrap_or(&[]))?,
    })
}
