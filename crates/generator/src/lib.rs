mod openai;
pub mod prompt;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use clio_core::models::{ReadmeOptions, Repository, RepositoryAnalysis};
pub use openai::OpenAiModel;
use serde::Serialize;
use thiserror::Error;

/// Upper bound on output tokens for every generation.
pub const MAX_TOKENS: u32 = 4000;
/// Sampling temperature for every generation.
pub const TEMPERATURE: f32 = 0.7;

/// Model failure. `temporary` marks failures worth retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GenerationError {
    pub message: String,
    pub temporary: bool,
}

impl GenerationError {
    pub fn temporary(message: impl Into<String>) -> Self {
        Self { message: message.into(), temporary: true }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { message: message.into(), temporary: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextCompletion {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<String>,
}

/// A hosted text generation model.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TextCompletion, GenerationError>;
}

/// Inputs to the prompt template.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryData<'a> {
    pub repository: &'a Repository,
    pub analysis: &'a RepositoryAnalysis,
}

impl<'a> RepositoryData<'a> {
    pub fn new(repository: &'a Repository, analysis: &'a RepositoryAnalysis) -> Self {
        Self { repository, analysis }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReadme {
    pub content: String,
    pub model: String,
    pub tokens_used: Option<u32>,
    pub generation_time_ms: u64,
    pub finish_reason: Option<String>,
}

#[derive(Clone)]
pub struct Generator {
    model: Arc<dyn TextModel>,
    default_model: String,
}

impl Generator {
    pub fn new(model: Arc<dyn TextModel>, default_model: impl Into<String>) -> Self {
        Self { model, default_model: default_model.into() }
    }

    pub fn default_model(&self) -> &str { &self.default_model }

    pub async fn generate(
        &self,
        data: &RepositoryData<'_>,
        options: &ReadmeOptions,
        model_override: Option<&str>,
    ) -> Result<GeneratedReadme, GenerationError> {
        let model = model_override.unwrap_or(&self.default_model);
        let prompt = prompt::build_prompt(data, options);
        let start = Instant::now();
        let completion =
            self.model.generate_text(&prompt, model, MAX_TOKENS, TEMPERATURE).await?;
        let generation_time_ms = start.elapsed().as_millis() as u64;
        if completion.text.trim().is_empty() {
            return Err(GenerationError::fatal(format!("Model {model} returned empty content")));
        }
        tracing::info!(
            "Generated README for {} with {} in {}ms ({} tokens)",
            data.repository.full_name,
            model,
            generation_time_ms,
            completion.tokens_used.map_or_else(|| "unknown".to_string(), |t| t.to_string())
        );
        Ok(GeneratedReadme {
            content: completion.text,
            model: model.to_string(),
            tokens_used: completion.tokens_used,
            generation_time_ms,
            finish_reason: completion.finish_reason,
        })
    }
}
