// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain model for codeport-core.
//!
//! Statuses and categories are closed enums; the database stores their
//! string forms and [`from_db`] converts back at the domain seam. A request's
//! proposed change travels as a [`RequestPayload`] snapshot that never
//! aliases the live project row, which is what makes review safe while the
//! project keeps changing underneath.
//!
//! [`from_db`]: ProjectStatus::from_db

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::persistence::ProjectRecord;

/// Maximum number of categories a project may carry.
pub const MAX_PROJECT_CATEGORIES: usize = 4;

fn decode_error(kind: &str, value: &str) -> CoreError {
    CoreError::Database {
        operation: "decode".to_string(),
        details: format!("unknown {} '{}'", kind, value),
    }
}

/// Account lifecycle status (owned by the account service; read-only here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Signed up, email not verified yet.
    Waiting,
    /// Verified and allowed to submit requests.
    Activated,
}

impl AccountStatus {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Activated => "activated",
        }
    }

    /// Parse the database string form.
    pub fn from_db(value: &str) -> Result<Self, CoreError> {
        match value {
            "waiting" => Ok(Self::Waiting),
            "activated" => Ok(Self::Activated),
            other => Err(decode_error("account status", other)),
        }
    }
}

/// Project listing review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// A change is pending review; the listing is locked for further edits.
    Submitted,
    /// Listed and editable.
    Approved,
    /// The latest change was rejected by a reviewer.
    Rejected,
}

impl ProjectStatus {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the database string form.
    pub fn from_db(value: &str) -> Result<Self, CoreError> {
        match value {
            "submitted" => Ok(Self::Submitted),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(decode_error("project status", other)),
        }
    }
}

/// Request lifecycle status.
///
/// ```text
///                 ┌───────────┐
///                 │ SUBMITTED │
///                 └─────┬─────┘
///                       │ confirm / reject claims the request
///                       ▼
///                 ┌────────────┐
///        ┌────────│ PROCESSING │────────┐
///        │        └─────┬──────┘        │
///   approve             │ reject        │ publication failed
///        ▼              ▼               ▼
///  ┌──────────┐   ┌──────────┐     ┌───────┐
///  │ APPROVED │   │ REJECTED │     │ ERROR │
///  └──────────┘   └──────────┘     └───────┘
/// ```
///
/// Store-artifact requests stay in `Processing` until the publication
/// worker resolves them; every other type is resolved synchronously by the
/// review action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created by a submission, awaiting review.
    Submitted,
    /// Claimed by a review action (or awaiting the publication worker).
    Processing,
    /// Confirmed and applied.
    Approved,
    /// Rejected by a reviewer.
    Rejected,
    /// Publication failed terminally.
    Error,
}

impl RequestStatus {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }

    /// Parse the database string form.
    pub fn from_db(value: &str) -> Result<Self, CoreError> {
        match value {
            "submitted" => Ok(Self::Submitted),
            "processing" => Ok(Self::Processing),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "error" => Ok(Self::Error),
            other => Err(decode_error("request status", other)),
        }
    }
}

/// The kind of change a request proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// List a new project (materialized on confirmation).
    CreateProject,
    /// Patch an existing project.
    UpdateProject,
    /// Remove a project and its artifact links.
    DeleteProject,
    /// Mirror artifacts to the target network.
    StoreArtifact,
}

impl RequestType {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateProject => "create_project",
            Self::UpdateProject => "update_project",
            Self::DeleteProject => "delete_project",
            Self::StoreArtifact => "store_artifact",
        }
    }

    /// Parse the database string form.
    pub fn from_db(value: &str) -> Result<Self, CoreError> {
        match value {
            "create_project" => Ok(Self::CreateProject),
            "update_project" => Ok(Self::UpdateProject),
            "delete_project" => Ok(Self::DeleteProject),
            "store_artifact" => Ok(Self::StoreArtifact),
            other => Err(decode_error("request type", other)),
        }
    }
}

/// Release state shown on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveStatus {
    /// Live on the network.
    Released,
    /// Announced but not launched.
    ComingSoon,
}

impl ActiveStatus {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Released => "released",
            Self::ComingSoon => "coming_soon",
        }
    }
}

/// Publication job queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for a worker (or rescheduled after a transient failure).
    Queued,
    /// Claimed by a worker.
    Running,
    /// All artifacts mirrored.
    Completed,
    /// Attempts exhausted.
    Failed,
}

impl JobStatus {
    /// String form stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Marketplace category assigned to a listing.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Marketplace,
    Collectible,
    Game,
    Sports,
    Analytics,
    Fashion,
    Avatar,
    Wallets,
    #[serde(rename = "DeFi")]
    DeFi,
    Exchange,
    #[serde(rename = "Fungible Token")]
    FungibleToken,
    Galleries,
    Art,
    Tools,
    Music,
    #[serde(rename = "Mobile App")]
    MobileApp,
    #[serde(rename = "3D World")]
    ThreeDWorld,
    #[serde(rename = "DAO")]
    Dao,
    #[serde(rename = "NFT Collection")]
    NftCollection,
}

/// Sparse patch of a project's descriptive fields.
///
/// Absent fields leave the live value untouched on confirmation. For a
/// create request this doubles as the field set, with `name`, `email` and
/// `description` required at submission time.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_status: Option<ActiveStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitepaper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl ProjectPatch {
    /// Apply the present fields onto a live project row. Absent fields
    /// retain their current values.
    pub fn apply_to(&self, project: &mut ProjectRecord) {
        if let Some(v) = &self.name {
            project.name = v.clone();
        }
        if let Some(v) = &self.email {
            project.email = v.clone();
        }
        if let Some(v) = &self.description {
            project.description = v.clone();
        }
        if let Some(v) = &self.other_documentation {
            project.other_documentation = Some(v.clone());
        }
        if let Some(v) = &self.active_status {
            project.active_status = v.as_str().to_string();
        }
        if let Some(v) = &self.website {
            project.website = Some(v.clone());
        }
        if let Some(v) = &self.image_link {
            project.image_link = Some(v.clone());
        }
        if let Some(v) = &self.whitepaper {
            project.whitepaper = Some(v.clone());
        }
        if let Some(v) = &self.github {
            project.github = Some(v.clone());
        }
        if let Some(v) = &self.telegram {
            project.telegram = Some(v.clone());
        }
        if let Some(v) = &self.discord {
            project.discord = Some(v.clone());
        }
        if let Some(v) = &self.twitter {
            project.twitter = Some(v.clone());
        }
    }
}

/// The snapshot of a proposed change, persisted as the request's payload.
///
/// Owned exclusively by the request: field values are copied at submission
/// time, never read back from the live project during review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    /// Where review outcome notifications go.
    pub contact_email: String,
    /// Proposed descriptive fields.
    #[serde(default)]
    pub fields: ProjectPatch,
    /// Proposed category set, when the submission changes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    /// Proposed artifact link set (full replacement), or the artifacts to
    /// mirror for a store request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ids: Option<Vec<i64>>,
}

impl RequestPayload {
    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from storage.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Serialize a category list for the projects table's JSON column.
pub fn categories_to_json(categories: &[Category]) -> Result<String, CoreError> {
    Ok(serde_json::to_string(categories)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_project() -> ProjectRecord {
        ProjectRecord {
            id: 1,
            account_id: 42,
            name: "Portal".to_string(),
            email: "team@portal.example".to_string(),
            description: "A marketplace".to_string(),
            other_documentation: None,
            active_status: "coming_soon".to_string(),
            website: Some("https://portal.example".to_string()),
            image_link: None,
            whitepaper: None,
            github: None,
            telegram: None,
            discord: None,
            twitter: None,
            categories: "[\"DAO\"]".to_string(),
            status: "approved".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RequestStatus::Submitted,
            RequestStatus::Processing,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Error,
        ] {
            assert_eq!(RequestStatus::from_db(status.as_str()).unwrap(), status);
        }
        assert!(RequestStatus::from_db("bogus").is_err());
    }

    #[test]
    fn test_sparse_patch_leaves_absent_fields() {
        let mut project = sample_project();
        let patch = ProjectPatch {
            website: Some("https://new.example".to_string()),
            ..Default::default()
        };

        patch.apply_to(&mut project);

        assert_eq!(project.website.as_deref(), Some("https://new.example"));
        assert_eq!(project.name, "Portal");
        assert_eq!(project.description, "A marketplace");
        assert_eq!(project.categories, "[\"DAO\"]");
    }

    #[test]
    fn test_payload_round_trip() {
        let payload = RequestPayload {
            contact_email: "owner@example.com".to_string(),
            fields: ProjectPatch {
                name: Some("Portal".to_string()),
                ..Default::default()
            },
            categories: Some(vec![Category::Dao, Category::DeFi]),
            artifact_ids: Some(vec![19, 20]),
        };

        let json = payload.to_json().unwrap();
        let parsed = RequestPayload::from_json(&json).unwrap();
        assert_eq!(parsed, payload);
        // Category names are the marketplace's display strings.
        assert!(json.contains("\"DAO\""));
        assert!(json.contains("\"DeFi\""));
    }
}
