mod error;

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use clio_analysis::Analyzer;
use clio_core::{
    config::WorkerConfig,
    models::{
        GenerationMetadata, Job, JobId, JobStatus, JobUpdate, NewVersion, ReadmeOptions,
        ReadmeVersion, Repository, VersionId,
    },
};
use clio_db::JobStore;
use clio_generator::{Generator, RepositoryData};
pub use error::{JobError, TRANSIENT_MARKERS, has_transient_marker};
use futures_util::future::join_all;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::Instant;

/// Progress checkpoints of a successful attempt.
pub mod progress {
    pub const CLAIMED: u8 = 10;
    pub const ANALYZED: u8 = 30;
    pub const GENERATING: u8 = 50;
    pub const GENERATED: u8 = 70;
    pub const PROCESSED: u8 = 85;
    pub const SAVED: u8 = 90;
    pub const COMPLETED: u8 = 100;
}

/// Result of one attempt at a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobOutcome {
    Completed {
        version_id: VersionId,
    },
    /// Back in `PENDING` until `next_attempt_at`.
    Requeued {
        retry_count: u32,
        #[serde(with = "time::serde::rfc3339")]
        next_attempt_at: OffsetDateTime,
        error: String,
    },
    Failed {
        error: String,
    },
    /// Already in flight here or claimed elsewhere.
    Skipped,
    /// The attempt could not be recorded, e.g. the store was unreachable.
    Errored {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: JobId,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

impl JobReport {
    fn new(job_id: JobId, result: Result<JobOutcome>) -> Self {
        let outcome = result.unwrap_or_else(|err| {
            tracing::error!("Job {} errored: {:?}", job_id, err);
            JobOutcome::Errored { error: format!("{err:#}") }
        });
        Self { job_id, outcome }
    }
}

/// Counts per outcome plus the individual reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub requeued: usize,
    pub skipped: usize,
    pub errored: usize,
    pub results: Vec<JobReport>,
}

impl From<Vec<JobReport>> for BatchSummary {
    fn from(results: Vec<JobReport>) -> Self {
        let mut summary = Self::default();
        for report in &results {
            match report.outcome {
                JobOutcome::Completed { .. } => summary.processed += 1,
                JobOutcome::Requeued { .. } => summary.requeued += 1,
                JobOutcome::Failed { .. } => summary.failed += 1,
                JobOutcome::Skipped => summary.skipped += 1,
                JobOutcome::Errored { .. } => summary.errored += 1,
            }
        }
        summary.results = results;
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeMetadata {
    pub version_id: VersionId,
    pub content_hash: String,
    pub word_count: u32,
    pub character_count: u32,
    pub model_used: Option<String>,
    pub tokens_used: Option<u32>,
    pub generation_time_ms: Option<u64>,
    pub processing_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReadmeResult {
    pub job: Job,
    pub content: String,
    pub metadata: ReadmeMetadata,
}

/// Removes its job id from the in-flight set when dropped.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<JobId>>,
    id: JobId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// Drives jobs through analysis, generation and post-processing.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    analyzer: Analyzer,
    generator: Generator,
    config: WorkerConfig,
    in_flight: Mutex<HashSet<JobId>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        analyzer: Analyzer,
        generator: Generator,
        config: WorkerConfig,
    ) -> Self {
        Self { store, analyzer, generator, config, in_flight: Mutex::new(HashSet::new()) }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> { &self.store }

    pub fn config(&self) -> &WorkerConfig { &self.config }

    /// Number of jobs currently running in this process.
    pub fn in_flight(&self) -> usize { self.lock_in_flight().len() }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashSet<JobId>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, id: JobId) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.lock_in_flight();
        in_flight.insert(id).then(|| InFlightGuard { in_flight: &self.in_flight, id })
    }

    /// Reserve slots for as many jobs as the concurrency ceiling allows.
    fn reserve_batch(&self, jobs: Vec<Job>) -> Vec<(JobId, InFlightGuard<'_>)> {
        let mut in_flight = self.lock_in_flight();
        let mut reserved = Vec::with_capacity(jobs.len());
        for job in jobs {
            if in_flight.len() >= self.config.max_concurrent_jobs {
                break;
            }
            if in_flight.insert(job.id) {
                reserved.push((job.id, InFlightGuard { in_flight: &self.in_flight, id: job.id }));
            }
        }
        reserved
    }

    /// Run a single attempt at `job`.
    pub async fn run_one(&self, job: &Job) -> Result<JobOutcome> {
        let Some(_guard) = self.reserve(job.id) else {
            tracing::debug!("Job {} is already in flight", job.id);
            return Ok(JobOutcome::Skipped);
        };
        self.attempt(job.id).await
    }

    /// Run the oldest claimable jobs concurrently, up to the free slots.
    pub async fn run_batch(&self) -> Result<Vec<JobReport>> {
        let available = self.config.max_concurrent_jobs.saturating_sub(self.in_flight());
        if available == 0 {
            tracing::debug!("No free job slots");
            return Ok(vec![]);
        }
        let limit = available.min(self.config.batch_size);
        let jobs = self
            .store
            .list_claimable(limit, OffsetDateTime::now_utc())
            .await
            .context("Failed to list claimable jobs")?;
        let reserved = self.reserve_batch(jobs);
        if reserved.is_empty() {
            return Ok(vec![]);
        }
        tracing::info!("Running {} jobs", reserved.len());
        let reports = join_all(reserved.into_iter().map(|(id, guard)| async move {
            let result = self.attempt(id).await;
            drop(guard);
            JobReport::new(id, result)
        }))
        .await;
        Ok(reports)
    }

    /// Run a small batch of claimable jobs one after another.
    pub async fn process_queued_batch(&self) -> Result<Vec<JobReport>> {
        let jobs = self
            .store
            .list_claimable(self.config.cron_batch_size, OffsetDateTime::now_utc())
            .await
            .context("Failed to list claimable jobs")?;
        if jobs.is_empty() {
            tracing::debug!("No queued jobs");
            return Ok(vec![]);
        }
        tracing::info!("Processing {} queued jobs", jobs.len());
        let mut reports = Vec::with_capacity(jobs.len());
        for job in &jobs {
            let result = self.run_one(job).await;
            reports.push(JobReport::new(job.id, result));
        }
        Ok(reports)
    }

    /// Link the repository, create a job and run it to completion.
    pub async fn generate_readme(
        &self,
        mut repository: Repository,
        installation_id: u64,
        user_id: &str,
        options: &ReadmeOptions,
    ) -> Result<GeneratedReadmeResult> {
        repository.installation_id = Some(installation_id);
        self.store
            .upsert_repository(&repository)
            .await
            .context("Failed to save repository")?;
        let job = self
            .store
            .create_job(user_id, repository.id, options)
            .await
            .context("Failed to create job")?;
        tracing::info!("Created job {} for {} ({})", job.id, repository.full_name, user_id);
        let version_id = match self.run_one(&job).await? {
            JobOutcome::Completed { version_id } => version_id,
            JobOutcome::Requeued { retry_count, error, .. } => {
                return Err(anyhow!(
                    "Job {} will be retried (attempt {}): {error}",
                    job.id,
                    retry_count + 1
                ));
            }
            JobOutcome::Failed { error } | JobOutcome::Errored { error } => {
                return Err(anyhow!("Job {} failed: {error}", job.id));
            }
            JobOutcome::Skipped => {
                return Err(anyhow!("Job {} was claimed by another worker", job.id));
            }
        };
        let job = self
            .store
            .get_job(job.id)
            .await?
            .with_context(|| format!("Job {} disappeared", job.id))?;
        let version = self
            .store
            .list_versions(job.id)
            .await?
            .into_iter()
            .find(|v| v.id == version_id)
            .with_context(|| format!("Version {version_id} disappeared"))?;
        let metadata = ReadmeMetadata {
            version_id: version.id,
            content_hash: version.content_hash,
            word_count: version.word_count,
            character_count: version.character_count,
            model_used: version.model_used,
            tokens_used: version.tokens_used,
            generation_time_ms: version.generation_time_ms,
            processing_time_ms: job.processing_time_ms,
        };
        Ok(GeneratedReadmeResult { job, content: version.content, metadata })
    }

    /// Append a hand-edited version. Returns the latest version unchanged
    /// when its content is identical, or `None` if the job does not exist.
    pub async fn save_version(
        &self,
        job_id: JobId,
        content: String,
    ) -> Result<Option<ReadmeVersion>> {
        if self.store.get_job(job_id).await?.is_none() {
            return Ok(None);
        }
        let version = NewVersion::new(job_id, content, GenerationMetadata::default());
        let latest = self.store.list_versions(job_id).await?.into_iter().next();
        if let Some(latest) = latest
            && latest.content_hash == version.content_hash()
        {
            tracing::debug!("Version {} of job {} is unchanged", latest.id, job_id);
            return Ok(Some(latest));
        }
        let version =
            self.store.create_version(version).await.context("Failed to save version")?;
        tracing::info!("Saved version {} of job {}", version.id, job_id);
        Ok(Some(version))
    }

    async fn attempt(&self, id: JobId) -> Result<JobOutcome> {
        let started = Instant::now();
        let Some(job) = self
            .store
            .claim_job(id, OffsetDateTime::now_utc())
            .await
            .with_context(|| format!("Failed to claim job {id}"))?
        else {
            tracing::debug!("Job {} was already claimed", id);
            return Ok(JobOutcome::Skipped);
        };
        tracing::info!(job_id = %id, retry_count = job.retry_count, "Processing job");
        let timeout_ms = self.config.job_timeout_ms;
        let prepared = tokio::time::timeout(Duration::from_millis(timeout_ms), self.pipeline(&job))
            .await
            .unwrap_or(Err(JobError::Timeout(timeout_ms)));
        // Only the pipeline races the timer; the version write always runs to completion.
        let saved = match prepared {
            Ok(version) => self.save(&job, version).await,
            Err(err) => Err(err),
        };
        match saved {
            Ok(version) => {
                let processing_time_ms = started.elapsed().as_millis() as u64;
                self.store
                    .update_job(id, JobUpdate {
                        status: Some(JobStatus::Completed),
                        progress: Some(progress::COMPLETED),
                        completed_at: Some(Some(OffsetDateTime::now_utc())),
                        processing_time_ms: Some(Some(processing_time_ms)),
                        ..Default::default()
                    })
                    .await
                    .with_context(|| format!("Failed to complete job {id}"))?;
                tracing::info!(
                    job_id = %id,
                    version_id = %version.id,
                    processing_time_ms,
                    "Completed job"
                );
                Ok(JobOutcome::Completed { version_id: version.id })
            }
            Err(err) => self.fail(&job, err).await,
        }
    }

    /// Analysis, generation and post-processing. Runs under the job timeout.
    async fn pipeline(&self, job: &Job) -> Result<NewVersion, JobError> {
        self.set_progress(job.id, progress::CLAIMED).await?;
        let repository = self
            .store
            .get_repository(job.repository_id)
            .await?
            .ok_or(JobError::MissingRepository(job.repository_id))?;
        let installation_id = repository
            .installation_id
            .ok_or_else(|| JobError::MissingInstallation(repository.full_name.clone()))?;
        if repository.owner_and_name().is_none() {
            return Err(JobError::InvalidRepository(repository.full_name.clone()));
        }

        let analysis = self.analyzer.analyze(&repository, installation_id).await?;
        self.set_progress(job.id, progress::ANALYZED).await?;

        self.set_progress(job.id, progress::GENERATING).await?;
        let data = RepositoryData::new(&repository, &analysis);
        let generated = self.generator.generate(&data, &job.options, None).await?;
        self.set_progress(job.id, progress::GENERATED).await?;

        let content = clio_markdown::process(&generated.content, &analysis);
        self.set_progress(job.id, progress::PROCESSED).await?;

        let metadata = GenerationMetadata {
            model_used: Some(generated.model),
            tokens_used: generated.tokens_used,
            generation_time_ms: Some(generated.generation_time_ms),
        };
        Ok(NewVersion::new(job.id, content, metadata))
    }

    async fn save(&self, job: &Job, version: NewVersion) -> Result<ReadmeVersion, JobError> {
        let version = self.store.create_version(version).await?;
        self.set_progress(job.id, progress::SAVED).await?;
        Ok(version)
    }

    async fn set_progress(&self, id: JobId, progress: u8) -> Result<(), JobError> {
        if self.store.update_job(id, JobUpdate::progress(progress)).await?.is_none() {
            tracing::debug!("Job {} no longer exists", id);
        }
        Ok(())
    }

    /// Requeue a retryable failure within budget, otherwise mark the job failed.
    async fn fail(&self, job: &Job, err: JobError) -> Result<JobOutcome> {
        let error = err.to_string();
        let now = OffsetDateTime::now_utc();
        if err.is_retryable() && job.retry_count < self.config.retry_attempts {
            let retry_count = job.retry_count + 1;
            let delay = Duration::from_millis(
                self.config.retry_delay_ms.saturating_mul(u64::from(retry_count)),
            );
            let next_attempt_at = now + delay;
            tracing::warn!(
                job_id = %job.id,
                retry_count,
                next_attempt_at = %next_attempt_at,
                "Job failed, requeueing: {}",
                error
            );
            self.store
                .update_job(job.id, JobUpdate {
                    status: Some(JobStatus::Pending),
                    progress: Some(0),
                    error_message: Some(None),
                    retry_count: Some(retry_count),
                    next_attempt_at: Some(Some(next_attempt_at)),
                    ..Default::default()
                })
                .await
                .with_context(|| format!("Failed to requeue job {}", job.id))?;
            Ok(JobOutcome::Requeued { retry_count, next_attempt_at, error })
        } else {
            tracing::error!(
                job_id = %job.id,
                retry_count = job.retry_count,
                "Job failed: {}",
                error
            );
            self.store
                .update_job(job.id, JobUpdate {
                    status: Some(JobStatus::Failed),
                    error_message: Some(Some(error.clone())),
                    completed_at: Some(Some(now)),
                    ..Default::default()
                })
                .await
                .with_context(|| format!("Failed to mark job {} failed", job.id))?;
            Ok(JobOutcome::Failed { error })
        }
    }
}
