mod error;

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use clio_core::config::GitHubConfig;
pub use error::SourceError;
use http::StatusCode;
use octocrab::{GitHubError, Octocrab, models::InstallationId};
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeItemKind {
    Blob,
    Tree,
    Commit,
    #[serde(other)]
    Other,
}

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct TreeItem {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: TreeItemKind,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeItem {
    pub fn is_file(&self) -> bool { self.kind == TreeItemKind::Blob }
}

/// Raw file payload as returned by the contents API.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FileContent {
    pub content: String,
    pub encoding: String,
}

impl FileContent {
    /// Decode to text. Binary payloads are rejected.
    pub fn decode(&self) -> Result<String, SourceError> {
        let text = match self.encoding.as_str() {
            "base64" => {
                let cleaned: String =
                    self.content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                let bytes =
                    STANDARD.decode(cleaned).map_err(|e| SourceError::Decode(e.to_string()))?;
                String::from_utf8(bytes)
                    .map_err(|_| SourceError::Decode("content is not UTF-8".to_string()))?
            }
            "" | "utf-8" | "utf8" => self.content.clone(),
            other => return Err(SourceError::Decode(format!("unsupported encoding {other}"))),
        };
        if text.contains('\0') {
            return Err(SourceError::Decode("binary content".to_string()));
        }
        Ok(text)
    }
}

/// Read access to repository trees and files, scoped by installation.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn get_tree(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<TreeItem>, SourceError>;

    /// Returns `None` for paths that are not regular files.
    async fn get_file_content(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<FileContent>, SourceError>;
}

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
    pub installations: Option<Arc<Mutex<Installations>>>,
}

pub struct Installations {
    pub app_client: Octocrab,
    pub clients: HashMap<InstallationId, Octocrab>,
}

impl Installations {
    pub fn client_for_installation(&mut self, installation_id: InstallationId) -> Result<Octocrab> {
        match self.clients.entry(installation_id) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let client = self
                    .app_client
                    .installation(installation_id)
                    .context("Failed to create installation client")?;
                tracing::debug!("Created client for installation {}", installation_id);
                Ok(entry.insert(client).clone())
            }
        }
    }
}

#[derive(serde::Serialize)]
struct TreeParams {
    recursive: u8,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

impl GitHub {
    pub async fn new(config: &GitHubConfig) -> Result<Arc<Self>> {
        let mut builder = Octocrab::builder();
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        if config.token.is_some() {
            let profile = client.current().user().await.context("Failed to fetch current user")?;
            tracing::info!("Logged in as {}", profile.login);
        }

        let installations = if let Some(app_config) = &config.app {
            let app_client = Octocrab::builder()
                .app(
                    app_config.id.into(),
                    jsonwebtoken::EncodingKey::from_rsa_pem(app_config.private_key.as_bytes())?,
                )
                .build()
                .context("Failed to create GitHub app client")?;
            tracing::info!("Using GitHub app {}", app_config.id);
            Some(Arc::new(Mutex::new(Installations { app_client, clients: HashMap::new() })))
        } else {
            None
        };
        Ok(Arc::new(Self { client, installations }))
    }

    /// Installation-scoped client, or the default client when no app is configured.
    pub async fn client_for(&self, installation_id: u64) -> Result<Octocrab, SourceError> {
        if let Some(installations) = &self.installations {
            let mut installations = installations.lock().await;
            return installations
                .client_for_installation(InstallationId(installation_id))
                .map_err(|e| SourceError::Forbidden(format!("{e:#}")));
        }
        Ok(self.client.clone())
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(
        err,
        octocrab::Error::GitHub { source, .. }
            if matches!(**source, GitHubError { status_code: StatusCode::NOT_FOUND, .. })
    )
}

#[async_trait]
impl RepositorySource for GitHub {
    async fn get_tree(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<TreeItem>, SourceError> {
        let client = self.client_for(installation_id).await?;
        let response: TreeResponse = client
            .get(
                format!("/repos/{owner}/{repo}/git/trees/{branch}"),
                Some(&TreeParams { recursive: 1 }),
            )
            .await?;
        if response.truncated {
            tracing::warn!("Tree for {}/{}@{} was truncated", owner, repo, branch);
        }
        Ok(response.tree)
    }

    async fn get_file_content(
        &self,
        installation_id: u64,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<FileContent>, SourceError> {
        let client = self.client_for(installation_id).await?;
        let items = match client.repos(owner, repo).get_content().path(path).send().await {
            Ok(items) => items.items,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // Directories come back as a listing
        let [item] = items.as_slice() else {
            return Ok(None);
        };
        if item.r#type != "file" {
            return Ok(None);
        }
        Ok(item.content.as_ref().map(|content| FileContent {
            content: content.clone(),
            encoding: item.encoding.clone().unwrap_or_default(),
        }))
    }
}
