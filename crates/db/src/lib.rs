#[cfg(any(test, feature = "testing"))]
pub mod memory;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use clio_core::{
    config::DbConfig,
    models::{
        Job, JobId, JobStatus, JobUpdate, NewVersion, ReadmeOptions, ReadmeStyle, ReadmeVersion,
        Repository, VersionId,
    },
};
use sqlx::{
    FromRow, Pool, QueryBuilder, Sqlite, SqlitePool, migrate::MigrateDatabase,
    sqlite::SqlitePoolOptions,
};
use time::OffsetDateTime;

/// Persistence for jobs, versions and repository linkage.
///
/// Job creation and deletion belong to the request layer; the pipeline only
/// claims, updates and appends versions.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(
        &self,
        user_id: &str,
        repository_id: u64,
        options: &ReadmeOptions,
    ) -> Result<Job>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Jobs owned by a user, newest first.
    async fn list_jobs_for_user(&self, user_id: &str) -> Result<Vec<Job>>;

    /// Oldest claimable jobs whose backoff has elapsed at `now`.
    async fn list_claimable(&self, limit: usize, now: OffsetDateTime) -> Result<Vec<Job>>;

    /// Atomically move a PENDING or QUEUED job to PROCESSING.
    ///
    /// Returns `None` when the job is missing or another worker got there first.
    async fn claim_job(&self, id: JobId, now: OffsetDateTime) -> Result<Option<Job>>;

    async fn update_job(&self, id: JobId, update: JobUpdate) -> Result<Option<Job>>;

    async fn delete_job(&self, id: JobId) -> Result<bool>;

    async fn create_version(&self, version: NewVersion) -> Result<ReadmeVersion>;

    /// Versions for a job, newest first.
    async fn list_versions(&self, job_id: JobId) -> Result<Vec<ReadmeVersion>>;

    async fn get_repository(&self, id: u64) -> Result<Option<Repository>>;

    async fn upsert_repository(&self, repository: &Repository) -> Result<()>;
}

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DbConfig) -> Result<Self> {
        if !Sqlite::database_exists(&config.url).await.unwrap_or(false) {
            tracing::info!(url = %config.url, "Creating database");
            Sqlite::create_database(&config.url).await.context("Failed to create database")?;
            tracing::info!("Database created");
        }
        let pool = if is_memory_url(&config.url) {
            // Every connection to `:memory:` is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(&config.url)
                .await
        } else {
            SqlitePool::connect(&config.url).await
        }
        .context("Failed to connect to database")?;
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub async fn close(&self) { self.pool.close().await }
}

fn is_memory_url(url: &str) -> bool { url.contains(":memory:") || url.contains("mode=memory") }

#[derive(FromRow)]
struct JobRow {
    id: i64,
    user_id: String,
    repository_id: i64,
    status: String,
    progress: i64,
    style: String,
    include_images: bool,
    include_badges: bool,
    include_toc: bool,
    custom_prompt: Option<String>,
    error_message: Option<String>,
    created_at: OffsetDateTime,
    started_at: Option<OffsetDateTime>,
    completed_at: Option<OffsetDateTime>,
    retry_count: i64,
    next_attempt_at: Option<OffsetDateTime>,
    processing_time_ms: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|_| anyhow!("Invalid status {:?} for job {}", row.status, row.id))?;
        let style = row
            .style
            .parse::<ReadmeStyle>()
            .map_err(|_| anyhow!("Invalid style {:?} for job {}", row.style, row.id))?;
        Ok(Job {
            id: JobId(row.id),
            user_id: row.user_id,
            repository_id: row.repository_id as u64,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            options: ReadmeOptions {
                style,
                include_images: row.include_images,
                include_badges: row.include_badges,
                include_toc: row.include_toc,
                custom_prompt: row.custom_prompt,
            },
            error_message: row.error_message,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            retry_count: row.retry_count.max(0) as u32,
            next_attempt_at: row.next_attempt_at,
            processing_time_ms: row.processing_time_ms.map(|ms| ms.max(0) as u64),
        })
    }
}

#[derive(FromRow)]
struct VersionRow {
    id: i64,
    job_id: i64,
    content: String,
    content_hash: String,
    word_count: i64,
    character_count: i64,
    model_used: Option<String>,
    tokens_used: Option<i64>,
    generation_time_ms: Option<i64>,
    created_at: OffsetDateTime,
}

impl From<VersionRow> for ReadmeVersion {
    fn from(row: VersionRow) -> Self {
        ReadmeVersion {
            id: VersionId(row.id),
            job_id: JobId(row.job_id),
            content: row.content,
            content_hash: row.content_hash,
            word_count: row.word_count as u32,
            character_count: row.character_count as u32,
            model_used: row.model_used,
            tokens_used: row.tokens_used.map(|t| t as u32),
            generation_time_ms: row.generation_time_ms.map(|ms| ms as u64),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct RepositoryRow {
    id: i64,
    full_name: String,
    description: Option<String>,
    language: Option<String>,
    topics: String,
    default_branch: Option<String>,
    installation_id: Option<i64>,
    html_url: Option<String>,
}

impl TryFrom<RepositoryRow> for Repository {
    type Error = anyhow::Error;

    fn try_from(row: RepositoryRow) -> Result<Self> {
        let topics = serde_json::from_str(&row.topics)
            .with_context(|| format!("Invalid topics for repository {}", row.id))?;
        Ok(Repository {
            id: row.id as u64,
            full_name: row.full_name,
            description: row.description,
            language: row.language,
            topics,
            default_branch: row.default_branch,
            installation_id: row.installation_id.map(|id| id as u64),
            html_url: row.html_url,
        })
    }
}

const CLAIMABLE: &str = "status IN ('PENDING', 'QUEUED')";

#[async_trait]
impl JobStore for Database {
    async fn create_job(
        &self,
        user_id: &str,
        repository_id: u64,
        options: &ReadmeOptions,
    ) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO readme_jobs (user_id, repository_id, status, progress, style,
                include_images, include_badges, include_toc, custom_prompt, created_at)
            VALUES (?, ?, 'PENDING', 0, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(repository_id as i64)
        .bind(options.style.as_str())
        .bind(options.include_images)
        .bind(options.include_badges)
        .bind(options.include_toc)
        .bind(options.custom_prompt.as_deref())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert job")?;
        row.try_into()
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM readme_jobs WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(Job::try_from)
            .transpose()
    }

    async fn list_jobs_for_user(&self, user_id: &str) -> Result<Vec<Job>> {
        sqlx::query_as::<_, JobRow>(
            "SELECT * FROM readme_jobs WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Job::try_from)
        .collect()
    }

    async fn list_claimable(&self, limit: usize, now: OffsetDateTime) -> Result<Vec<Job>> {
        let query = format!(
            r#"
            SELECT * FROM readme_jobs
            WHERE {CLAIMABLE}
              AND (next_attempt_at IS NULL OR julianday(next_attempt_at) <= julianday(?))
            ORDER BY created_at, id
            LIMIT ?
            "#
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(now)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn claim_job(&self, id: JobId, now: OffsetDateTime) -> Result<Option<Job>> {
        let query = format!(
            r#"
            UPDATE readme_jobs
            SET status = 'PROCESSING', started_at = ?, completed_at = NULL,
                error_message = NULL, next_attempt_at = NULL
            WHERE id = ? AND {CLAIMABLE}
            RETURNING *
            "#
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(now)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to claim job {id}"))?
            .map(Job::try_from)
            .transpose()
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> Result<Option<Job>> {
        if update.is_empty() {
            return self.get_job(id).await;
        }
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE readme_jobs SET ");
        let mut set = builder.separated(", ");
        if let Some(status) = update.status {
            set.push("status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(progress) = update.progress {
            set.push("progress = ").push_bind_unseparated(progress.min(100) as i64);
        }
        if let Some(error_message) = update.error_message {
            set.push("error_message = ").push_bind_unseparated(error_message);
        }
        if let Some(started_at) = update.started_at {
            set.push("started_at = ").push_bind_unseparated(started_at);
        }
        if let Some(completed_at) = update.completed_at {
            set.push("completed_at = ").push_bind_unseparated(completed_at);
        }
        if let Some(retry_count) = update.retry_count {
            set.push("retry_count = ").push_bind_unseparated(retry_count as i64);
        }
        if let Some(next_attempt_at) = update.next_attempt_at {
            set.push("next_attempt_at = ").push_bind_unseparated(next_attempt_at);
        }
        if let Some(processing_time_ms) = update.processing_time_ms {
            set.push("processing_time_ms = ")
                .push_bind_unseparated(processing_time_ms.map(|ms| ms as i64));
        }
        builder.push(" WHERE id = ").push_bind(id.0).push(" RETURNING *");
        builder
            .build_query_as::<JobRow>()
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to update job {id}"))?
            .map(Job::try_from)
            .transpose()
    }

    async fn delete_job(&self, id: JobId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM readme_versions WHERE job_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        let result =
            sqlx::query("DELETE FROM readme_jobs WHERE id = ?").bind(id.0).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_version(&self, version: NewVersion) -> Result<ReadmeVersion> {
        let metadata = version.metadata();
        let row = sqlx::query_as::<_, VersionRow>(
            r#"
            INSERT INTO readme_versions (job_id, content, content_hash, word_count,
                character_count, model_used, tokens_used, generation_time_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(version.job_id().0)
        .bind(version.content())
        .bind(version.content_hash())
        .bind(version.word_count() as i64)
        .bind(version.character_count() as i64)
        .bind(metadata.model_used.as_deref())
        .bind(metadata.tokens_used.map(|t| t as i64))
        .bind(metadata.generation_time_ms.map(|ms| ms as i64))
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to insert version for job {}", version.job_id()))?;
        Ok(row.into())
    }

    async fn list_versions(&self, job_id: JobId) -> Result<Vec<ReadmeVersion>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM readme_versions WHERE job_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(job_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ReadmeVersion::from).collect())
    }

    async fn get_repository(&self, id: u64) -> Result<Option<Repository>> {
        sqlx::query_as::<_, RepositoryRow>(
            r#"
            SELECT id, full_name, description, language, topics, default_branch,
                installation_id, html_url
            FROM repositories WHERE id = ?
            "#,
        )
        .bind(id as i64)
        .fetch_optional(&self.pool)
        .await?
        .map(Repository::try_from)
        .transpose()
    }

    async fn upsert_repository(&self, repository: &Repository) -> Result<()> {
        let topics = serde_json::to_string(&repository.topics)?;
        sqlx::query(
            r#"
            INSERT INTO repositories (id, full_name, description, language, topics,
                default_branch, installation_id, html_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                description = EXCLUDED.description,
                language = EXCLUDED.language,
                topics = EXCLUDED.topics,
                default_branch = EXCLUDED.default_branch,
                installation_id = EXCLUDED.installation_id,
                html_url = EXCLUDED.html_url,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(repository.id as i64)
        .bind(&repository.full_name)
        .bind(repository.description.as_deref())
        .bind(repository.language.as_deref())
        .bind(topics)
        .bind(repository.default_branch.as_deref())
        .bind(repository.installation_id.map(|id| id as i64))
        .bind(repository.html_url.as_deref())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert repository {}", repository.full_name))?;
        Ok(())
    }
}
