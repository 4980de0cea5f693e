// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for codeport-core.
//!
//! Every workflow operation returns a [`CoreError`] carrying a stable error
//! code and a human-readable message; nothing is thrown past the workflow
//! boundary. The codes are the review API's public contract.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur during request processing.
///
/// Where both an existence and an ownership violation hold for the same
/// artifact set, existence is always reported first (`UnknownArtifacts`
/// before `ArtifactsNotOwned`).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CoreError {
    /// Input validation failed.
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Account was not found.
    AccountNotFound {
        /// The account ID that was not found.
        account_id: i64,
    },

    /// Account exists but has not been activated.
    AccountNotActivated {
        /// The account ID.
        account_id: i64,
    },

    /// A project submission carries more categories than allowed.
    TooManyCategories {
        /// Number of categories in the submission.
        count: usize,
    },

    /// One or more referenced artifacts do not exist.
    UnknownArtifacts {
        /// The artifact IDs that failed to resolve.
        missing_ids: Vec<i64>,
    },

    /// Project was not found.
    ProjectNotFound {
        /// The project ID that was not found.
        project_id: i64,
    },

    /// Project is locked for review (a change is already pending).
    ProjectNotApproved {
        /// The project ID.
        project_id: i64,
    },

    /// Request was not found.
    RequestNotFound {
        /// The request ID that was not found.
        request_id: i64,
    },

    /// One or more referenced artifacts are not owned by the requester.
    ArtifactsNotOwned {
        /// The offending artifact IDs.
        artifact_ids: Vec<i64>,
    },

    /// A store-artifact submission named no artifacts.
    NoArtifactsSpecified,

    /// Request has already been claimed or resolved by another review action.
    RequestAlreadyProcessed {
        /// The request ID.
        request_id: i64,
        /// The status the request was found in.
        status: String,
    },

    /// Database operation failed.
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the stable error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "E400",
            Self::AccountNotFound { .. } => "E004",
            Self::AccountNotActivated { .. } => "E005",
            Self::TooManyCategories { .. } => "E010",
            Self::UnknownArtifacts { .. } => "E013",
            Self::ProjectNotFound { .. } => "E014",
            Self::ProjectNotApproved { .. } => "E015",
            Self::RequestNotFound { .. } => "E018",
            Self::ArtifactsNotOwned { .. } => "E019",
            Self::NoArtifactsSpecified => "E020",
            Self::RequestAlreadyProcessed { .. } => "E021",
            Self::Database { .. } => "E500",
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::AccountNotFound { account_id } => {
                write!(f, "Account '{}' doesn't exist", account_id)
            }
            Self::AccountNotActivated { account_id } => {
                write!(f, "Account '{}' hasn't been activated", account_id)
            }
            Self::TooManyCategories { count } => {
                write!(
                    f,
                    "Project categories exceed the maximum number (got {}, max 4)",
                    count
                )
            }
            Self::UnknownArtifacts { missing_ids } => {
                write!(f, "Artifacts {:?} don't exist", missing_ids)
            }
            Self::ProjectNotFound { project_id } => {
                write!(f, "Project '{}' doesn't exist", project_id)
            }
            Self::ProjectNotApproved { project_id } => {
                write!(
                    f,
                    "Project '{}' already has a change pending review",
                    project_id
                )
            }
            Self::RequestNotFound { request_id } => {
                write!(f, "Request '{}' doesn't exist", request_id)
            }
            Self::ArtifactsNotOwned { artifact_ids } => {
                write!(
                    f,
                    "Artifacts {:?} are not owned by the requester",
                    artifact_ids
                )
            }
            Self::NoArtifactsSpecified => {
                write!(f, "No artifacts specified in the store request")
            }
            Self::RequestAlreadyProcessed { request_id, status } => {
                write!(
                    f,
                    "Request '{}' has already been processed (status '{}')",
                    request_id, status
                )
            }
            Self::Database { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Database {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let test_cases = vec![
            (
                CoreError::Validation {
                    field: "name".to_string(),
                    message: "must not be empty".to_string(),
                },
                "E400",
            ),
            (CoreError::AccountNotFound { account_id: 7 }, "E004"),
            (CoreError::AccountNotActivated { account_id: 7 }, "E005"),
            (CoreError::TooManyCategories { count: 5 }, "E010"),
            (
                CoreError::UnknownArtifacts {
                    missing_ids: vec![19, 20],
                },
                "E013",
            ),
            (CoreError::ProjectNotFound { project_id: 3 }, "E014"),
            (CoreError::ProjectNotApproved { project_id: 3 }, "E015"),
            (CoreError::RequestNotFound { request_id: 12 }, "E018"),
            (
                CoreError::ArtifactsNotOwned {
                    artifact_ids: vec![19],
                },
                "E019",
            ),
            (CoreError::NoArtifactsSpecified, "E020"),
            (
                CoreError::RequestAlreadyProcessed {
                    request_id: 12,
                    status: "approved".to_string(),
                },
                "E021",
            ),
            (
                CoreError::Database {
                    operation: "insert".to_string(),
                    details: "connection refused".to_string(),
                },
                "E500",
            ),
        ];

        for (error, expected_code) in test_cases {
            assert_eq!(
                error.error_code(),
                expected_code,
                "Error {:?} should have code {}",
                error,
                expected_code
            );
            assert!(!error.to_string().is_empty(), "Message should not be empty");
        }
    }

    #[test]
    fn test_display_messages() {
        let err = CoreError::ProjectNotFound { project_id: 42 };
        assert_eq!(err.to_string(), "Project '42' doesn't exist");

        let err = CoreError::TooManyCategories { count: 6 };
        assert_eq!(
            err.to_string(),
            "Project categories exceed the maximum number (got 6, max 4)"
        );

        let err = CoreError::RequestAlreadyProcessed {
            request_id: 9,
            status: "rejected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Request '9' has already been processed (status 'rejected')"
        );

        let err = CoreError::UnknownArtifacts {
            missing_ids: vec![19, 20],
        };
        assert_eq!(err.to_string(), "Artifacts [19, 20] don't exist");
    }
}
