#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use clio_analysis::Analyzer;
use clio_core::{
    config::WorkerConfig,
    models::{Job, JobId, JobUpdate, NewVersion, ReadmeOptions, ReadmeVersion, Repository},
};
use clio_db::{JobStore, memory::MemoryStore};
use clio_generator::{GenerationError, Generator, TextCompletion, TextModel};
use clio_github::{FileContent, RepositorySource, SourceError, TreeItem, TreeItemKind};
use clio_jobs::Orchestrator;
use time::OffsetDateTime;

pub const README: &str = "# App\n\nA small tool.\n\n## Usage\n\nRun it.\n\n## Usage\n\nAgain.\n";

/// Serves a fixed set of files for every repository.
pub struct FakeSource {
    files: HashMap<String, String>,
}

impl FakeSource {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self { files: files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect() }
    }

    pub fn rust_project() -> Self {
        Self::new(&[
            ("Cargo.toml", "[package]\nname = \"app\"\n"),
            ("src/main.rs", "fn main() {}\n"),
            ("tests/cli.rs", "#[test]\nfn runs() {}\n"),
        ])
    }
}

#[async_trait]
impl RepositorySource for FakeSource {
    async fn get_tree(
        &self,
        _installation_id: u64,
        _owner: &str,
        _repo: &str,
        _branch: &str,
    ) -> Result<Vec<TreeItem>, SourceError> {
        let mut paths: Vec<_> = self.files.keys().cloned().collect();
        paths.sort();
        Ok(paths
            .into_iter()
            .map(|path| TreeItem { path, kind: TreeItemKind::Blob, size: Some(16) })
            .collect())
    }

    async fn get_file_content(
        &self,
        _installation_id: u64,
        _owner: &str,
        _repo: &str,
        path: &str,
    ) -> Result<Option<FileContent>, SourceError> {
        Ok(self
            .files
            .get(path)
            .map(|content| FileContent { content: content.clone(), encoding: "utf-8".into() }))
    }
}

/// Returns the same response for every call, optionally after a delay.
pub struct FakeModel {
    response: Result<String, GenerationError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeModel {
    pub fn reply(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn fail(err: GenerationError) -> Self { Self { response: Err(err), ..Self::reply("") } }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

    /// Highest number of overlapping calls observed.
    pub fn max_active(&self) -> usize { self.max_active.load(Ordering::SeqCst) }
}

#[async_trait]
impl TextModel for FakeModel {
    async fn generate_text(
        &self,
        _prompt: &str,
        _model: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<TextCompletion, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.response.clone().map(|text| TextCompletion {
            text,
            tokens_used: Some(321),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Delegates to a [`MemoryStore`] but takes `delay` to write each version.
pub struct SlowVersions {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl JobStore for SlowVersions {
    async fn create_job(
        &self,
        user_id: &str,
        repository_id: u64,
        options: &ReadmeOptions,
    ) -> anyhow::Result<Job> {
        self.inner.create_job(user_id, repository_id, options).await
    }

    async fn get_job(&self, id: JobId) -> anyhow::Result<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Job>> {
        self.inner.list_jobs_for_user(user_id).await
    }

    async fn list_claimable(
        &self,
        limit: usize,
        now: OffsetDateTime,
    ) -> anyhow::Result<Vec<Job>> {
        self.inner.list_claimable(limit, now).await
    }

    async fn claim_job(&self, id: JobId, now: OffsetDateTime) -> anyhow::Result<Option<Job>> {
        self.inner.claim_job(id, now).await
    }

    async fn update_job(&self, id: JobId, update: JobUpdate) -> anyhow::Result<Option<Job>> {
        self.inner.update_job(id, update).await
    }

    async fn delete_job(&self, id: JobId) -> anyhow::Result<bool> {
        self.inner.delete_job(id).await
    }

    async fn create_version(&self, version: NewVersion) -> anyhow::Result<ReadmeVersion> {
        let version = self.inner.create_version(version).await;
        tokio::time::sleep(self.delay).await;
        version
    }

    async fn list_versions(&self, job_id: JobId) -> anyhow::Result<Vec<ReadmeVersion>> {
        self.inner.list_versions(job_id).await
    }

    async fn get_repository(&self, id: u64) -> anyhow::Result<Option<Repository>> {
        self.inner.get_repository(id).await
    }

    async fn upsert_repository(&self, repository: &Repository) -> anyhow::Result<()> {
        self.inner.upsert_repository(repository).await
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub model: Arc<FakeModel>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(model: FakeModel, config: WorkerConfig) -> Self {
        Self::with_source(FakeSource::rust_project(), model, config)
    }

    pub fn with_source(source: FakeSource, model: FakeModel, config: WorkerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(model);
        let orchestrator = Orchestrator::new(
            store.clone(),
            Analyzer::new(Arc::new(source)),
            Generator::new(model.clone(), "gpt-4o"),
            config,
        );
        Self { store, model, orchestrator }
    }

    /// Version writes take `delay` to return, after the row is stored.
    pub fn with_version_delay(model: FakeModel, config: WorkerConfig, delay: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(model);
        let orchestrator = Orchestrator::new(
            Arc::new(SlowVersions { inner: store.clone(), delay }),
            Analyzer::new(Arc::new(FakeSource::rust_project())),
            Generator::new(model.clone(), "gpt-4o"),
            config,
        );
        Self { store, model, orchestrator }
    }

    /// Link `repository` and create a pending job for it.
    pub async fn enqueue(&self, repository: Repository) -> Job {
        self.store.upsert_repository(&repository).await.unwrap();
        self.store.create_job("user-1", repository.id, &ReadmeOptions::default()).await.unwrap()
    }

    pub async fn job(&self, job: &Job) -> Job { self.store.get_job(job.id).await.unwrap().unwrap() }
}

pub fn repository(id: u64) -> Repository {
    Repository {
        id,
        full_name: format!("acme/app-{id}"),
        installation_id: Some(99),
        ..Default::default()
    }
}

pub fn config() -> WorkerConfig { WorkerConfig { retry_delay_ms: 0, ..Default::default() } }
