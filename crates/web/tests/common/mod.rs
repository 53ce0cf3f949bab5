#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request, response::Response};
use clio_analysis::Analyzer;
use clio_core::{
    config::{Config, WorkerConfig},
    models::{Job, ReadmeOptions, Repository},
};
use clio_db::{JobStore, memory::MemoryStore};
use clio_generator::{GenerationError, Generator, TextCompletion, TextModel};
use clio_github::{FileContent, RepositorySource, SourceError, TreeItem, TreeItemKind};
use clio_jobs::Orchestrator;
use clio_web::{AppState, app};
use http_body_util::BodyExt;

pub const SECRET: &str = "s3cret";

pub const README: &str = "# App\n\nA small tool.\n\n## Usage\n\nRun it.\n";

struct RustProject;

#[async_trait]
impl RepositorySource for RustProject {
    async fn get_tree(
        &self,
        _installation_id: u64,
        _owner: &str,
        _repo: &str,
        _branch: &str,
    ) -> Result<Vec<TreeItem>, SourceError> {
        Ok(["Cargo.toml", "src/main.rs"]
            .into_iter()
            .map(|path| TreeItem {
                path: path.to_string(),
                kind: TreeItemKind::Blob,
                size: Some(16),
            })
            .collect())
    }

    async fn get_file_content(
        &self,
        _installation_id: u64,
        _owner: &str,
        _repo: &str,
        path: &str,
    ) -> Result<Option<FileContent>, SourceError> {
        let content = match path {
            "Cargo.toml" => "[package]\nname = \"app\"\n",
            "src/main.rs" => "fn main() {}\n",
            _ => return Ok(None),
        };
        Ok(Some(FileContent { content: content.to_string(), encoding: "utf-8".into() }))
    }
}

pub struct FakeModel(pub Result<String, GenerationError>);

#[async_trait]
impl TextModel for FakeModel {
    async fn generate_text(
        &self,
        _prompt: &str,
        _model: &str,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<TextCompletion, GenerationError> {
        self.0.clone().map(|text| TextCompletion {
            text,
            tokens_used: Some(100),
            finish_reason: Some("stop".to_string()),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new(secret: Option<&str>) -> Self {
        Self::with_model(secret, FakeModel(Ok(README.to_string())))
    }

    pub fn with_model(secret: Option<&str>, model: FakeModel) -> Self {
        let config = config(secret);
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            Analyzer::new(Arc::new(RustProject)),
            Generator::new(Arc::new(model), "gpt-4o"),
            config.worker.clone(),
        ));
        let router = app(AppState { config: Arc::new(config), orchestrator });
        Self { router, store }
    }

    /// Link a repository and create a pending job for it.
    pub async fn enqueue(&self, repository_id: u64, user_id: &str) -> Job {
        self.store.upsert_repository(&repository(repository_id)).await.unwrap();
        self.store.create_job(user_id, repository_id, &ReadmeOptions::default()).await.unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn config(secret: Option<&str>) -> Config {
    let mut yaml = String::from(concat!(
        "server:\n  port: 0\n",
        "db:\n  url: \"sqlite::memory:\"\n",
        "github: {}\n",
        "openai:\n  api_key: test\n",
    ));
    if let Some(secret) = secret {
        yaml.push_str(&format!("cron:\n  secret: {secret}\n"));
    }
    let mut config: Config = serde_yaml::from_str(&yaml).unwrap();
    config.worker = WorkerConfig { retry_delay_ms: 0, enabled: false, ..Default::default() };
    config
}

pub fn repository(id: u64) -> Repository {
    Repository {
        id,
        full_name: format!("acme/app-{id}"),
        installation_id: Some(42),
        ..Default::default()
    }
}

pub fn get(uri: &str) -> Request<Body> { Request::get(uri).body(Body::empty()).unwrap() }

pub fn authorized(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {SECRET}"));
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
