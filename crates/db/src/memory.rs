use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use clio_core::models::{
    Job, JobId, JobStatus, JobUpdate, NewVersion, ReadmeOptions, ReadmeVersion, Repository,
    VersionId,
};
use time::OffsetDateTime;

use crate::JobStore;

/// A status/progress pair observed after a write.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
}

#[derive(Default)]
struct State {
    jobs: BTreeMap<JobId, Job>,
    versions: Vec<ReadmeVersion>,
    repositories: HashMap<u64, Repository>,
    next_job_id: i64,
    next_version_id: i64,
    history: Vec<JobSnapshot>,
    fail_writes: bool,
}

/// Process-local store with the same claim semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Every job write so far, in order.
    pub fn history(&self) -> Vec<JobSnapshot> {
        self.lock().map(|s| s.history.clone()).unwrap_or_default()
    }

    /// Progress values recorded for one job, in order.
    pub fn progress_of(&self, id: JobId) -> Vec<u8> {
        self.history().into_iter().filter(|s| s.id == id).map(|s| s.progress).collect()
    }

    /// Make subsequent job updates and version writes fail.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.lock() {
            state.fail_writes = fail;
        }
    }

    /// Insert a job as-is, replacing any with the same id.
    pub fn insert_job(&self, job: Job) -> Result<()> {
        let mut state = self.lock()?;
        state.next_job_id = state.next_job_id.max(job.id.0);
        state.jobs.insert(job.id, job);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| anyhow!("Memory store poisoned"))
    }
}

impl State {
    fn record(&mut self, job: &Job) {
        self.history.push(JobSnapshot { id: job.id, status: job.status, progress: job.progress });
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("Store is read-only"));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(
        &self,
        user_id: &str,
        repository_id: u64,
        options: &ReadmeOptions,
    ) -> Result<Job> {
        let mut state = self.lock()?;
        state.next_job_id += 1;
        let job = Job {
            id: JobId(state.next_job_id),
            user_id: user_id.to_string(),
            repository_id,
            status: JobStatus::Pending,
            progress: 0,
            options: options.clone(),
            error_message: None,
            created_at: OffsetDateTime::now_utc(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            next_attempt_at: None,
            processing_time_ms: None,
        };
        state.jobs.insert(job.id, job.clone());
        state.record(&job);
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn list_jobs_for_user(&self, user_id: &str) -> Result<Vec<Job>> {
        let state = self.lock()?;
        let mut jobs: Vec<_> =
            state.jobs.values().filter(|j| j.user_id == user_id).cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn list_claimable(&self, limit: usize, now: OffsetDateTime) -> Result<Vec<Job>> {
        let state = self.lock()?;
        let mut jobs: Vec<_> = state
            .jobs
            .values()
            .filter(|j| j.status.is_claimable() && j.next_attempt_at.is_none_or(|at| at <= now))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn claim_job(&self, id: JobId, now: OffsetDateTime) -> Result<Option<Job>> {
        let mut state = self.lock()?;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if !job.status.is_claimable() {
            return Ok(None);
        }
        job.status = JobStatus::Processing;
        job.started_at = Some(now);
        job.completed_at = None;
        job.error_message = None;
        job.next_attempt_at = None;
        let job = job.clone();
        state.record(&job);
        Ok(Some(job))
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> Result<Option<Job>> {
        let mut state = self.lock()?;
        state.check_writable()?;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(job);
        let job = job.clone();
        state.record(&job);
        Ok(Some(job))
    }

    async fn delete_job(&self, id: JobId) -> Result<bool> {
        let mut state = self.lock()?;
        state.versions.retain(|v| v.job_id != id);
        Ok(state.jobs.remove(&id).is_some())
    }

    async fn create_version(&self, version: NewVersion) -> Result<ReadmeVersion> {
        let mut state = self.lock()?;
        state.check_writable()?;
        if !state.jobs.contains_key(&version.job_id()) {
            return Err(anyhow!("Job {} does not exist", version.job_id()));
        }
        state.next_version_id += 1;
        let version =
            version.into_version(VersionId(state.next_version_id), OffsetDateTime::now_utc());
        state.versions.push(version.clone());
        Ok(version)
    }

    async fn list_versions(&self, job_id: JobId) -> Result<Vec<ReadmeVersion>> {
        let state = self.lock()?;
        Ok(state.versions.iter().rev().filter(|v| v.job_id == job_id).cloned().collect())
    }

    async fn get_repository(&self, id: u64) -> Result<Option<Repository>> {
        Ok(self.lock()?.repositories.get(&id).cloned())
    }

    async fn upsert_repository(&self, repository: &Repository) -> Result<()> {
        self.lock()?.repositories.insert(repository.id, repository.clone());
        Ok(())
    }
}
