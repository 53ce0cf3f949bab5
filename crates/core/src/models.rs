use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::util::{ContentStats, content_stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(pub i64);

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn variants() -> &'static [Self] {
        &[Self::Pending, Self::Queued, Self::Processing, Self::Completed, Self::Failed]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether a job in this state may be picked up by a sweep.
    pub fn is_claimable(&self) -> bool { matches!(self, Self::Pending | Self::Queued) }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Completed | Self::Failed) }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "QUEUED" => Ok(Self::Queued),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadmeStyle {
    #[default]
    Professional,
    Casual,
    Minimal,
    Detailed,
}

impl ReadmeStyle {
    pub const fn variants() -> &'static [Self] {
        &[Self::Professional, Self::Casual, Self::Minimal, Self::Detailed]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Minimal => "minimal",
            Self::Detailed => "detailed",
        }
    }
}

impl FromStr for ReadmeStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "professional" => Ok(Self::Professional),
            "casual" => Ok(Self::Casual),
            "minimal" => Ok(Self::Minimal),
            "detailed" => Ok(Self::Detailed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ReadmeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Generation options captured when the job is created.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadmeOptions {
    pub style: ReadmeStyle,
    pub include_images: bool,
    pub include_badges: bool,
    pub include_toc: bool,
    pub custom_prompt: Option<String>,
}

impl Default for ReadmeOptions {
    fn default() -> Self {
        Self {
            style: ReadmeStyle::Professional,
            include_images: false,
            include_badges: true,
            include_toc: true,
            custom_prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub user_id: String,
    pub repository_id: u64,
    pub status: JobStatus,
    pub progress: u8,
    pub options: ReadmeOptions,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub retry_count: u32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_attempt_at: Option<OffsetDateTime>,
    pub processing_time_ms: Option<u64>,
}

/// Partial update of the pipeline-owned job fields.
///
/// `None` leaves a field untouched. Nullable columns use a nested `Option` so
/// they can be cleared with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub error_message: Option<Option<String>>,
    pub started_at: Option<Option<OffsetDateTime>>,
    pub completed_at: Option<Option<OffsetDateTime>>,
    pub retry_count: Option<u32>,
    pub next_attempt_at: Option<Option<OffsetDateTime>>,
    pub processing_time_ms: Option<Option<u64>>,
}

impl JobUpdate {
    pub fn progress(progress: u8) -> Self {
        Self { progress: Some(progress), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool { *self == Self::default() }

    /// Apply the update to an in-memory job.
    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(error_message) = &self.error_message {
            job.error_message = error_message.clone();
        }
        if let Some(started_at) = self.started_at {
            job.started_at = started_at;
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = completed_at;
        }
        if let Some(retry_count) = self.retry_count {
            job.retry_count = retry_count;
        }
        if let Some(next_attempt_at) = self.next_attempt_at {
            job.next_attempt_at = next_attempt_at;
        }
        if let Some(processing_time_ms) = self.processing_time_ms {
            job.processing_time_ms = processing_time_ms;
        }
    }
}

/// A repository linked through a GitHub App installation.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Repository {
    pub id: u64,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub default_branch: Option<String>,
    pub installation_id: Option<u64>,
    pub html_url: Option<String>,
}

impl Repository {
    /// Split `owner/name`. Returns `None` unless there are exactly two non-empty segments.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        let (owner, name) = self.full_name.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some((owner, name))
    }

    pub fn name(&self) -> &str {
        self.owner_and_name().map(|(_, name)| name).unwrap_or(&self.full_name)
    }

    pub fn default_branch(&self) -> &str { self.default_branch.as_deref().unwrap_or("main") }

    pub fn url(&self) -> String {
        self.html_url.clone().unwrap_or_else(|| format!("https://github.com/{}", self.full_name))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadmeVersion {
    pub id: VersionId,
    pub job_id: JobId,
    pub content: String,
    pub content_hash: String,
    pub word_count: u32,
    pub character_count: u32,
    pub model_used: Option<String>,
    pub tokens_used: Option<u32>,
    pub generation_time_ms: Option<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Model metadata attached to a version.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub model_used: Option<String>,
    pub tokens_used: Option<u32>,
    pub generation_time_ms: Option<u64>,
}

/// A version about to be written.
///
/// Hash and counts are derived from the content here and cannot be supplied
/// by callers.
#[derive(Debug, Clone)]
pub struct NewVersion {
    job_id: JobId,
    content: String,
    stats: ContentStats,
    metadata: GenerationMetadata,
}

impl NewVersion {
    pub fn new(job_id: JobId, content: String, metadata: GenerationMetadata) -> Self {
        let stats = content_stats(&content);
        Self { job_id, content, stats, metadata }
    }

    pub fn job_id(&self) -> JobId { self.job_id }

    pub fn content(&self) -> &str { &self.content }

    pub fn content_hash(&self) -> &str { &self.stats.hash }

    pub fn word_count(&self) -> u32 { self.stats.word_count }

    pub fn character_count(&self) -> u32 { self.stats.character_count }

    pub fn metadata(&self) -> &GenerationMetadata { &self.metadata }

    /// Materialize with store-assigned identity.
    pub fn into_version(self, id: VersionId, created_at: OffsetDateTime) -> ReadmeVersion {
        ReadmeVersion {
            id,
            job_id: self.job_id,
            content: self.content,
            content_hash: self.stats.hash,
            word_count: self.stats.word_count,
            character_count: self.stats.character_count,
            model_used: self.metadata.model_used,
            tokens_used: self.metadata.tokens_used,
            generation_time_ms: self.metadata.generation_time_ms,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub path: String,
    pub size: Option<u64>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructureNode {
    File(FileDescriptor),
    Directory(BTreeMap<String, StructureNode>),
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    pub path: String,
    pub content: String,
    pub language: Option<String>,
    pub importance: Importance,
}

/// Fields extracted from a `package.json` manifest.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub scripts: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageInfo {
    /// All dependency names, runtime first.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().chain(self.dev_dependencies.keys()).map(String::as_str)
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }
}

/// Derived repository summary. Computed per job run, never persisted.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryAnalysis {
    pub full_name: String,
    pub structure: BTreeMap<String, StructureNode>,
    pub key_files: Vec<KeyFile>,
    pub package_info: Option<PackageInfo>,
    pub readme_exists: bool,
    pub has_tests: bool,
    pub has_docs: bool,
    pub has_docker: bool,
    pub has_ci: bool,
    pub has_license: bool,
    pub has_contributing: bool,
    pub has_changelog: bool,
    pub primary_language: Option<String>,
    pub framework: Option<String>,
    pub build_tool: Option<String>,
    pub test_framework: Option<String>,
    pub package_manager: Option<String>,
}

impl RepositoryAnalysis {
    pub fn key_file_paths(&self) -> impl Iterator<Item = &str> {
        self.key_files.iter().map(|f| f.path.as_str())
    }

    pub fn name(&self) -> &str {
        self.full_name.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.full_name)
    }
}
