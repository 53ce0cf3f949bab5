use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub github: GitHubConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub cron: Option<CronConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubConfig {
    /// Personal token used when no app installation applies.
    pub token: Option<String>,
    pub app: Option<GitHubAppConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitHubAppConfig {
    pub id: u64,
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String { "gpt-4o".to_string() }

/// Shared secret expected on the cron endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CronConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Ceiling on jobs in flight for the loop driver.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Upper bound on jobs selected by one loop iteration.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Jobs processed (sequentially) by one cron tick.
    #[serde(default = "default_cron_batch_size")]
    pub cron_batch_size: usize,
    #[serde(default = "default_job_timeout_ms")]
    pub job_timeout_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base backoff; the delay before attempt `n` is `retry_delay_ms * n`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_poll_schedule")]
    pub poll_schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            batch_size: default_batch_size(),
            cron_batch_size: default_cron_batch_size(),
            job_timeout_ms: default_job_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            poll_schedule: default_poll_schedule(),
            enabled: default_enabled(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize { 3 }

fn default_batch_size() -> usize { 10 }

fn default_cron_batch_size() -> usize { 3 }

fn default_job_timeout_ms() -> u64 { 5 * 60 * 1000 }

fn default_retry_attempts() -> u32 { 3 }

fn default_retry_delay_ms() -> u64 { 5000 }

fn default_poll_schedule() -> String { "every 30 seconds".to_string() }

fn default_enabled() -> bool { true }
