// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence implementation.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::CoreError;
use crate::model::JobStatus;

use super::{
    AccountRecord, ArtifactRecord, NewProjectRecord, Persistence, ProjectRecord,
    PublicationJobRecord, RequestRecord,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

const JOB_COLUMNS: &str = "id, request_id, artifact_ids, recipient, status, attempt, \
                           max_attempts, next_attempt_at, last_error, created_at, finished_at";

const REQUEST_COLUMNS: &str =
    "id, account_id, request_type, target_project_id, payload, status, reason, \
     created_at, updated_at";

const PROJECT_COLUMNS: &str =
    "id, account_id, name, email, description, other_documentation, active_status, \
     website, image_link, whitepaper, github, telegram, discord, twitter, \
     categories, status, created_at, updated_at";

/// PostgreSQL-backed persistence provider.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new PostgreSQL persistence provider from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to PostgreSQL and run all migrations.
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to PostgreSQL: {}", e),
            })?;

        MIGRATOR.run(&pool).await.map_err(|e| CoreError::Database {
            operation: "migrate".to_string(),
            details: format!("Failed to run migrations: {}", e),
        })?;

        Ok(Self { pool })
    }

    /// Access the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn find_account(&self, account_id: i64) -> Result<Option<AccountRecord>, CoreError> {
        let record = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, status, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_account(&self, email: &str, status: &str) -> Result<i64, CoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO accounts (email, status)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_project(&self, project_id: i64) -> Result<Option<ProjectRecord>, CoreError> {
        let record = sqlx::query_as::<_, ProjectRecord>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
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
            SET status = $1, updated_at = NOW()
            WHERE id = $2
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
            WHERE project_id = $1
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
            WHERE id = $1
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

        let records = sqlx::query_as::<_, ArtifactRecord>(
            r#"
            SELECT id, owner_account_id, creator, content_hash, payload, mirrored_id, created_at
            FROM artifacts
            WHERE id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(artifact_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_artifact(
        &self,
        owner_account_id: i64,
        creator: &str,
        content_hash: &str,
        payload: &[u8],
    ) -> Result<i64, CoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO artifacts (owner_account_id, creator, content_hash, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(owner_account_id)
        .bind(creator)
        .bind(content_hash)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn set_artifact_mirrored(
        &self,
        artifact_id: i64,
        mirrored_id: i64,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE artifacts
            SET mirrored_id = $1
            WHERE id = $2 AND mirrored_id IS NULL
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
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO requests (account_id, request_type, target_project_id, payload, status)
            VALUES ($1, $2, $3, $4, 'submitted')
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(request_type)
        .bind(target_project_id)
        .bind(payload_json)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match (&e, target_project_id) {
            // The partial unique index rejects a second active request for
            // the same project; the losing submission sees the lock.
            (sqlx::Error::Database(db), Some(project_id)) if db.is_unique_violation() => {
                CoreError::ProjectNotApproved { project_id }
            }
            _ => e.into(),
        })?;

        Ok(id)
    }

    async fn find_request(&self, request_id: i64) -> Result<Option<RequestRecord>, CoreError> {
        let record = sqlx::query_as::<_, RequestRecord>(&format!(
            "SELECT {} FROM requests WHERE id = $1",
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
            WHERE ($1::BIGINT IS NULL OR account_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
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
            SET status = 'processing', updated_at = NOW()
            WHERE id = $1 AND status = 'submitted'
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
            SET status = $1, updated_at = NOW()
            WHERE id = $2
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

        let (project_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO projects (
                account_id, name, email, description, other_documentation,
                active_status, website, image_link, whitepaper, github,
                telegram, discord, twitter, categories, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'approved')
            RETURNING id
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
        .fetch_one(&mut *tx)
        .await?;

        for (position, artifact_id) in artifact_ids.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO project_artifacts (project_id, artifact_id, position)
                VALUES ($1, $2, $3)
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
            SET status = 'approved', target_project_id = $1, updated_at = NOW()
            WHERE id = $2
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
            SET name = $1, email = $2, description = $3, other_documentation = $4,
                active_status = $5, website = $6, image_link = $7, whitepaper = $8,
                github = $9, telegram = $10, discord = $11, twitter = $12,
                categories = $13, status = 'approved', updated_at = NOW()
            WHERE id = $14
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
            sqlx::query("DELETE FROM project_artifacts WHERE project_id = $1")
                .bind(project.id)
                .execute(&mut *tx)
                .await?;

            for (position, artifact_id) in ids.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO project_artifacts (project_id, artifact_id, position)
                    VALUES ($1, $2, $3)
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
            SET status = 'approved', updated_at = NOW()
            WHERE id = $1
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

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE requests
            SET status = 'approved', updated_at = NOW()
            WHERE id = $1
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
            SET status = 'rejected', reason = $1, updated_at = NOW()
            WHERE id = $2
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
                SET status = 'rejected', updated_at = NOW()
                WHERE id = $1
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
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO publication_jobs (request_id, artifact_ids, recipient, max_attempts)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(request_id)
        .bind(artifact_ids_json)
        .bind(recipient)
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn claim_due_publication_jobs(
        &self,
        limit: i64,
    ) -> Result<Vec<PublicationJobRecord>, CoreError> {
        // SKIP LOCKED keeps concurrent workers from claiming the same job.
        let records = sqlx::query_as::<_, PublicationJobRecord>(&format!(
            r#"
            UPDATE publication_jobs
            SET status = $1, attempt = attempt + 1
            WHERE id IN (
                SELECT id FROM publication_jobs
                WHERE status = $2
                  AND next_attempt_at <= NOW()
                ORDER BY next_attempt_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
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
            SET status = $1, finished_at = NOW()
            WHERE id = $2
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
            SET status = $1,
                next_attempt_at = NOW() + make_interval(secs => $2::double precision),
                last_error = $3
            WHERE id = $4
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
            SET status = $1, last_error = $2, finished_at = NOW()
            WHERE id = $3
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
