// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;
use crate::model::JobStatus;

use super::{
    AccountRecord, ArtifactRecord, NewProjectRecord, Persistence, ProjectRecord,
    PublicationJobRecord, RequestRecord,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

const JOB_COLUMNS: &str = "id, request_id, artifact_ids, recipient, status, attempt, \
                           max_attempts, next_attempt_at, last_error, created_at, finished_at";

const REQUEST_COLUMNS: &str =
    "id, account_id, request_type, target_project_id, payload, status, reason, \
     created_at, updated_at";

const PROJECT_COLUMNS: &str =
    "id, account_id, name, email, description, other_documentation, active_status, \
     website, image_link, whitepaper, github, telegram, discord, twitter, \
     categories, status, created_at, updated_at";

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Wrap an existing pool and run all migrations on it.
    pub async fn from_pool_with_migrations(pool: SqlitePool) -> Result<Self, CoreError> {
        MIGRATOR.run(&pool).await.map_err(|e| CoreError::Database {
            operation: "migrate".to_string(),
            details: format!("Failed to run migrations: {}", e),
        })?;
        Ok(Self { pool })
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates parent directories and the database file if needed, connects
    /// with sensible defaults, and runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let path_str = path.to_string_lossy();
        let url = format!("sqlite:{}?mode=rwc", path_str);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        MIGRATOR.run(&pool).await.map_err(|e| CoreError::Database {
            operation: "migrate".to_string(),
            details: format!("Failed to run migrations: {}", e),
        })?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn find_account(&self, account_id: i64) -> Result<Option<AccountRecord>, CoreError> {
        let record = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, status, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_account(&self, email: &str, status: &str) -> Result<i64, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (email, status)
            VALUES (?, ?)
            "#,
        )
        .bind(email)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_project(&self, project_id: i64) -> Result<Option<ProjectRecord>, CoreError> {
        let record = sqlx::query_as::<_, ProjectRecord>(&format!(
            "SELECT {} FROM projects WHERE id = ?",
            PROJECT_COLUMNS
        ))
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_project_status(&self, project_id: i64, status: &str) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::ProjectNotFound { project_id });
        }

        Ok(())
    }

    async fn list_project_artifacts(&self, project_id: i64) -> Result<Vec<i64>, CoreError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT artifact_id
            FROM project_artifacts
            WHERE project_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn find_artifact(&self, artifact_id: i64) -> Result<Option<ArtifactRecord>, CoreError> {
        let record = sqlx::query_as::<_, ArtifactRecord>(
            r#"
            SELECT id, owner_account_id, creator, content_hash, payload, mirrored_id, created_at
            FROM artifacts
            WHERE id = ?
            "#,
        )
        .bind(artifact_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_artifacts(&self, artifact_ids: &[i64]) -> Result<Vec<ArtifactRecord>, CoreError> {
        if artifact_ids.is_empty() {
            return Ok(Vec::new());
        }

        // IN lists cannot be bound as a single parameter; the placeholder
        // string is built from the slice length only.
        let placeholders = vec!["?"; artifact_ids.len()].join(", ");
        let query = format!(
            "SELECT id, owner_account_id, creator, content_hash, payload, mirrored_id, created_at \
             FROM artifacts WHERE id IN ({}) ORDER BY id ASC",
            placeholders
        );

        let mut q = sqlx::query_as::<_, ArtifactRecord>(&query);
        for id in artifact_ids {
            q = q.bind(id);
        }

        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn insert_artifact(
        &self,
        owner_account_id: i64,
        creator: &str,
        content_hash: &str,
        payload: &[u8],
    ) -> Result<i64, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO artifacts (owner_account_id, creator, content_hash, payload)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(owner_account_id)
        .bind(creator)
        .bind(content_hash)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn set_artifact_mirrored(
        &self,
        artifact_id: i64,
        mirrored_id: i64,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE artifacts
            SET mirrored_id = ?
            WHERE id = ? AND mirrored_id IS NULL
            "#,
        )
        .bind(mirrored_id)
        .bind(artifact_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_request(
        &self,
        account_id: i64,
        request_type: &str,
        target_project_id: Option<i64>,
        payload_json: &str,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO requests (account_id, request_type, target_project_id, payload, status)
            VALUES (?, ?, ?, ?, 'submitted')
            "#,
        )
        .bind(account_id)
        .bind(request_type)
        .bind(target_project_id)
        .bind(payload_json)
        .execute(&self.pool)
        .await
        .map_err(|e| match (&e, target_project_id) {
            // The partial unique index rejects a second active request for
            // the same project; the losing submission sees the lock.
            (sqlx::Error::Database(db), Some(project_id)) if db.is_unique_violation() => {
                CoreError::ProjectNotApproved { project_id }
            }
            _ => e.into(),
        })?;

        Ok(result.last_insert_rowid())
    }

    async fn find_request(&self, request_id: i64) -> Result<Option<RequestRecord>, CoreError> {
        let record = sqlx::query_as::<_, RequestRecord>(&format!(
            "SELECT {} FROM requests WHERE id = ?",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_requests(
        &self,
        account_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestRecord>, CoreError> {
        let records = sqlx::query_as::<_, RequestRecord>(&format!(
            r#"
            SELECT {}
            FROM requests
            WHERE (?1 IS NULL OR account_id = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
            REQUEST_COLUMNS
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn begin_review(&self, request_id: i64) -> Result<bool, CoreError> {
        // Conditional transition; rows_affected decides the claim.
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET status = 'processing', updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND status = 'submitted'
            "#,
        )
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_request_status(&self, request_id: i64, status: &str) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE requests
            SET status = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(request_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::RequestNotFound { request_id });
        }

        Ok(())
    }

    async fn approve_create_request(
        &self,
        request_id: i64,
        project: &NewProjectRecord,
        artifact_ids: &[i64],
    ) -> Result<i64, CoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO projects (
                account_id, name, email, description, other_documentation,
                active_status, website, image_link, whitepaper, github,
                telegram, discord, twitter, categories, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'approved')
            "#,
        )
        .bind(project.account_id)
        .bind(&project.name)
        .bind(&project.email)
        .bind(&project.description)
        .bind(&project.other_documentation)
        .bind(&project.active_status)
        .bind(&project.website)
        .bind(&project.image_link)
        .bind(&project.whitepaper)
        .bind(&project.github)
        .bind(&project.telegram)
        .bind(&project.discord)
        .bind(&project.twitter)
        .bind(&project.categories)
        .execute(&mut *tx)
        .await?;

        let project_id = result.last_insert_rowid();

        for (position, artifact_id) in artifact_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO project_artifacts (project_id, artifact_id, position)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(project_id)
            .bind(artifact_id)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        // Creates record their project only once it exists.
        sqlx::query(
            r#"
            UPDATE requests
            SET status = 'approved', target_project_id = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(project_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(project_id)
    }

    async fn approve_update_request(
        &self,
        request_id: i64,
        project: &ProjectRecord,
        artifact_ids: Option<&[i64]>,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE projects
            SET name = ?, email = ?, description = ?, other_documentation = ?,
                active_status = ?, website = ?, image_link = ?, whitepaper = ?,
                github = ?, telegram = ?, discord = ?, twitter = ?,
                categories = ?, status = 'approved', updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(&project.name)
        .bind(&project.email)
        .bind(&project.description)
        .bind(&project.other_documentation)
        .bind(&project.active_status)
        .bind(&project.website)
        .bind(&project.image_link)
        .bind(&project.whitepaper)
        .bind(&project.github)
        .bind(&project.telegram)
        .bind(&project.discord)
        .bind(&project.twitter)
        .bind(&project.categories)
        .bind(project.id)
        .execute(&mut *tx)
        .await?;

        if let Some(ids) = artifact_ids {
            sqlx::query("DELETE FROM project_artifacts WHERE project_id = ?")
                .bind(project.id)
                .execute(&mut *tx)
                .await?;

            for (position, artifact_id) in ids.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO project_artifacts (project_id, artifact_id, position)
                    VALUES (?, ?, ?)
                    "#,
                )
                .bind(project.id)
                .bind(artifact_id)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            r#"
            UPDATE requests
            SET status = 'approved', updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn approve_delete_request(
        &self,
        request_id: i64,
        project_id: i64,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE requests
            SET status = 'approved', updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn reject_request(
        &self,
        request_id: i64,
        target_project_id: Option<i64>,
        reason: &str,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE requests
            SET status = 'rejected', reason = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

        if let Some(project_id) = target_project_id {
            sqlx::query(
                r#"
                UPDATE projects
                SET status = 'rejected', updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
            )
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn enqueue_publication_job(
        &self,
        request_id: i64,
        artifact_ids_json: &str,
        recipient: &str,
        max_attempts: i32,
    ) -> Result<i64, CoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO publication_jobs (request_id, artifact_ids, recipient, max_attempts)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(request_id)
        .bind(artifact_ids_json)
        .bind(recipient)
        .bind(max_attempts)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn claim_due_publication_jobs(
        &self,
        limit: i64,
    ) -> Result<Vec<PublicationJobRecord>, CoreError> {
        let records = sqlx::query_as::<_, PublicationJobRecord>(&format!(
            r#"
            UPDATE publication_jobs
            SET status = ?, attempt = attempt + 1
            WHERE id IN (
                SELECT id FROM publication_jobs
                WHERE status = ?
                  AND next_attempt_at <= datetime('now')
                ORDER BY next_attempt_at ASC
                LIMIT ?
            )
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(JobStatus::Running.as_str())
        .bind(JobStatus::Queued.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn complete_publication_job(&self, job_id: i64) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE publication_jobs
            SET status = ?, finished_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(JobStatus::Completed.as_str())
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reschedule_publication_job(
        &self,
        job_id: i64,
        delay_secs: i64,
        error: &str,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE publication_jobs
            SET status = ?,
                next_attempt_at = datetime('now', '+' || ? || ' seconds'),
                last_error = ?
            WHERE id = ?
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(delay_secs)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail_publication_job(&self, job_id: i64, error: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            UPDATE publication_jobs
            SET status = ?, last_error = ?, finished_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an in-memory SQLite pool for testing.
    ///
    /// One connection only; each connection to `:memory:` is its own
    /// database.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        MIGRATOR.run(&pool).await.expect("Failed to run migrations");

        pool
    }

    async fn seed_account(p: &SqlitePersistence) -> i64 {
        p.insert_account("team@example.com", "activated")
            .await
            .expect("Failed to insert account")
    }

    fn new_project(account_id: i64) -> NewProjectRecord {
        NewProjectRecord {
            account_id,
            name: "Orbital".to_string(),
            email: "team@example.com".to_string(),
            description: "A launch tracker".to_string(),
            other_documentation: None,
            active_status: "coming_soon".to_string(),
            website: Some("https://orbital.example".to_string()),
            image_link: None,
            whitepaper: None,
            github: None,
            telegram: None,
            discord: None,
            twitter: None,
            categories: r#"["Gaming"]"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_from_path_creates_database_and_migrates() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("codeport.db");

        let p = SqlitePersistence::from_path(&path)
            .await
            .expect("Failed to initialize database");

        assert!(path.exists());
        assert!(p.health_check_db().await.unwrap());

        let account_id = p
            .insert_account("team@example.com", "activated")
            .await
            .unwrap();
        assert!(p.find_account(account_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_and_find_request() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;

        let request_id = p
            .insert_request(account_id, "create_project", None, "{}")
            .await
            .expect("Failed to insert request");

        let request = p
            .find_request(request_id)
            .await
            .expect("Failed to find request")
            .expect("Request should exist");

        assert_eq!(request.account_id, account_id);
        assert_eq!(request.request_type, "create_project");
        assert_eq!(request.status, "submitted");
        assert!(request.target_project_id.is_none());
    }

    #[tokio::test]
    async fn test_racing_requests_surface_the_project_lock() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;

        let create = p
            .insert_request(account_id, "create_project", None, "{}")
            .await
            .unwrap();
        p.begin_review(create).await.unwrap();
        let project_id = p
            .approve_create_request(create, &new_project(account_id), &[])
            .await
            .unwrap();

        let first = p
            .insert_request(account_id, "update_project", Some(project_id), "{}")
            .await
            .unwrap();

        // Two submissions racing past the status check resolve at the
        // index: the loser sees the project lock, not a raw database error.
        let err = p
            .insert_request(account_id, "delete_project", Some(project_id), "{}")
            .await
            .unwrap_err();
        match err {
            CoreError::ProjectNotApproved { project_id: locked } => {
                assert_eq!(locked, project_id);
            }
            other => panic!("unexpected error {:?}", other),
        }

        // A resolved request frees the project for the next one.
        p.begin_review(first).await.unwrap();
        p.reject_request(first, Some(project_id), "Duplicate")
            .await
            .unwrap();
        p.insert_request(account_id, "delete_project", Some(project_id), "{}")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_review_claims_only_once() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let request_id = p
            .insert_request(account_id, "store_artifact", None, "{}")
            .await
            .unwrap();

        assert!(p.begin_review(request_id).await.unwrap());
        assert!(!p.begin_review(request_id).await.unwrap());

        let request = p.find_request(request_id).await.unwrap().unwrap();
        assert_eq!(request.status, "processing");
    }

    #[tokio::test]
    async fn test_begin_review_missing_request() {
        let p = SqlitePersistence::new(test_pool().await);
        assert!(!p.begin_review(9999).await.unwrap());
    }

    #[tokio::test]
    async fn test_approve_create_materializes_project_and_links() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let a1 = p
            .insert_artifact(account_id, "origin1creator", "ab12", b"wasm-a")
            .await
            .unwrap();
        let a2 = p
            .insert_artifact(account_id, "origin1creator", "cd34", b"wasm-b")
            .await
            .unwrap();

        let request_id = p
            .insert_request(account_id, "create_project", None, "{}")
            .await
            .unwrap();
        assert!(p.begin_review(request_id).await.unwrap());

        let project_id = p
            .approve_create_request(request_id, &new_project(account_id), &[a2, a1])
            .await
            .expect("Failed to approve create");

        let project = p.find_project(project_id).await.unwrap().unwrap();
        assert_eq!(project.status, "approved");
        assert_eq!(project.name, "Orbital");

        // Links keep submission order.
        let linked = p.list_project_artifacts(project_id).await.unwrap();
        assert_eq!(linked, vec![a2, a1]);

        let request = p.find_request(request_id).await.unwrap().unwrap();
        assert_eq!(request.status, "approved");
        assert_eq!(request.target_project_id, Some(project_id));
    }

    #[tokio::test]
    async fn test_approve_update_replaces_links_only_when_given() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let a1 = p
            .insert_artifact(account_id, "creator", "ab", b"x")
            .await
            .unwrap();
        let a2 = p
            .insert_artifact(account_id, "creator", "cd", b"y")
            .await
            .unwrap();

        let create = p
            .insert_request(account_id, "create_project", None, "{}")
            .await
            .unwrap();
        p.begin_review(create).await.unwrap();
        let project_id = p
            .approve_create_request(create, &new_project(account_id), &[a1])
            .await
            .unwrap();

        let mut project = p.find_project(project_id).await.unwrap().unwrap();
        project.description = "Updated description".to_string();

        let update = p
            .insert_request(account_id, "update_project", Some(project_id), "{}")
            .await
            .unwrap();
        p.begin_review(update).await.unwrap();

        // Without an artifact set the links stay untouched.
        p.approve_update_request(update, &project, None)
            .await
            .unwrap();
        assert_eq!(p.list_project_artifacts(project_id).await.unwrap(), vec![
            a1
        ]);

        let update2 = p
            .insert_request(account_id, "update_project", Some(project_id), "{}")
            .await
            .unwrap();
        p.begin_review(update2).await.unwrap();
        p.approve_update_request(update2, &project, Some(&[a2]))
            .await
            .unwrap();
        assert_eq!(p.list_project_artifacts(project_id).await.unwrap(), vec![
            a2
        ]);

        let stored = p.find_project(project_id).await.unwrap().unwrap();
        assert_eq!(stored.description, "Updated description");
    }

    #[tokio::test]
    async fn test_approve_delete_cascades_links() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let a1 = p
            .insert_artifact(account_id, "creator", "ab", b"x")
            .await
            .unwrap();

        let create = p
            .insert_request(account_id, "create_project", None, "{}")
            .await
            .unwrap();
        p.begin_review(create).await.unwrap();
        let project_id = p
            .approve_create_request(create, &new_project(account_id), &[a1])
            .await
            .unwrap();

        let delete = p
            .insert_request(account_id, "delete_project", Some(project_id), "{}")
            .await
            .unwrap();
        p.begin_review(delete).await.unwrap();
        p.approve_delete_request(delete, project_id).await.unwrap();

        assert!(p.find_project(project_id).await.unwrap().is_none());
        assert!(
            p.list_project_artifacts(project_id)
                .await
                .unwrap()
                .is_empty()
        );

        let request = p.find_request(delete).await.unwrap().unwrap();
        assert_eq!(request.status, "approved");
    }

    #[tokio::test]
    async fn test_reject_marks_request_and_project() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;

        let create = p
            .insert_request(account_id, "create_project", None, "{}")
            .await
            .unwrap();
        p.begin_review(create).await.unwrap();
        let project_id = p
            .approve_create_request(create, &new_project(account_id), &[])
            .await
            .unwrap();

        let update = p
            .insert_request(account_id, "update_project", Some(project_id), "{}")
            .await
            .unwrap();
        p.begin_review(update).await.unwrap();
        p.reject_request(update, Some(project_id), "Broken links")
            .await
            .unwrap();

        let request = p.find_request(update).await.unwrap().unwrap();
        assert_eq!(request.status, "rejected");
        assert_eq!(request.reason.as_deref(), Some("Broken links"));

        let project = p.find_project(project_id).await.unwrap().unwrap();
        assert_eq!(project.status, "rejected");
    }

    #[tokio::test]
    async fn test_set_artifact_mirrored_is_write_once() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let artifact_id = p
            .insert_artifact(account_id, "creator", "ab", b"x")
            .await
            .unwrap();

        assert!(p.set_artifact_mirrored(artifact_id, 77).await.unwrap());
        assert!(!p.set_artifact_mirrored(artifact_id, 78).await.unwrap());

        let artifact = p.find_artifact(artifact_id).await.unwrap().unwrap();
        assert_eq!(artifact.mirrored_id, Some(77));
    }

    #[tokio::test]
    async fn test_find_artifacts_skips_missing_ids() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let a1 = p
            .insert_artifact(account_id, "creator", "ab", b"x")
            .await
            .unwrap();

        let found = p.find_artifacts(&[a1, 9999]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a1);

        assert!(p.find_artifacts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_due_jobs_marks_running_and_increments_attempt() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let request_id = p
            .insert_request(account_id, "store_artifact", None, "{}")
            .await
            .unwrap();
        let job_id = p
            .enqueue_publication_job(request_id, "[1,2]", "team@example.com", 3)
            .await
            .unwrap();

        let claimed = p.claim_due_publication_jobs(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, job_id);
        assert_eq!(claimed[0].status, "running");
        assert_eq!(claimed[0].attempt, 1);

        // A running job is not claimable again.
        assert!(p.claim_due_publication_jobs(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rescheduled_job_is_not_due_until_delay_passes() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let request_id = p
            .insert_request(account_id, "store_artifact", None, "{}")
            .await
            .unwrap();
        let job_id = p
            .enqueue_publication_job(request_id, "[1]", "team@example.com", 3)
            .await
            .unwrap();

        p.claim_due_publication_jobs(10).await.unwrap();
        p.reschedule_publication_job(job_id, 3600, "timeout")
            .await
            .unwrap();

        assert!(p.claim_due_publication_jobs(10).await.unwrap().is_empty());

        // Zero delay makes the job immediately claimable again.
        p.reschedule_publication_job(job_id, 0, "timeout")
            .await
            .unwrap();
        let claimed = p.claim_due_publication_jobs(10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempt, 2);
        assert_eq!(claimed[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_terminal_job_states() {
        let p = SqlitePersistence::new(test_pool().await);
        let account_id = seed_account(&p).await;
        let request_id = p
            .insert_request(account_id, "store_artifact", None, "{}")
            .await
            .unwrap();

        let done = p
            .enqueue_publication_job(request_id, "[1]", "a@example.com", 3)
            .await
            .unwrap();
        let broken = p
            .enqueue_publication_job(request_id, "[2]", "a@example.com", 3)
            .await
            .unwrap();

        p.claim_due_publication_jobs(10).await.unwrap();
        p.complete_publication_job(done).await.unwrap();
        p.fail_publication_job(broken, "out of gas").await.unwrap();

        assert!(p.claim_due_publication_jobs(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_requests_filters_and_paginates() {
        let p = SqlitePersistence::new(test_pool().await);
        let first = seed_account(&p).await;
        let second = p
            .insert_account("other@example.com", "activated")
            .await
            .unwrap();

        for _ in 0..3 {
            p.insert_request(first, "create_project", None, "{}")
                .await
                .unwrap();
        }
        p.insert_request(second, "store_artifact", None, "{}")
            .await
            .unwrap();

        let all = p.list_requests(None, 10, 0).await.unwrap();
        assert_eq!(all.len(), 4);

        let mine = p.list_requests(Some(first), 10, 0).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.iter().all(|r| r.account_id == first));

        let page = p.list_requests(None, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
    }
}
