use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use clio_core::config::OpenAiConfig;

use crate::{GenerationError, TextCompletion, TextModel};

const SYSTEM_PROMPT: &str = "You are an expert technical writer who writes clear, accurate \
                             README files for software projects.";

/// Chat completions backed [`TextModel`].
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
}

impl OpenAiModel {
    pub fn new(config: &OpenAiConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(config.api_key.clone());
        if let Some(api_base) = &config.api_base {
            openai_config = openai_config.with_api_base(api_base.clone());
        }
        Self { client: Client::with_config(openai_config) }
    }
}

/// Whether an API error reported by the service is transient.
fn is_temporary_api_error(kind: Option<&str>, code: Option<&str>, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    [kind, code].into_iter().flatten().any(|value| {
        matches!(
            value,
            "rate_limit_exceeded" | "server_error" | "service_unavailable" | "overloaded"
        )
    }) || message.contains("rate limit")
        || message.contains("overloaded")
        || message.contains("try again")
}

fn classify(err: OpenAIError) -> GenerationError {
    match err {
        OpenAIError::Reqwest(e) => GenerationError::temporary(format!("Network error: {e}")),
        OpenAIError::ApiError(api) => {
            let temporary =
                is_temporary_api_error(api.r#type.as_deref(), api.code.as_deref(), &api.message);
            GenerationError { message: format!("Model API error: {}", api.message), temporary }
        }
        err => GenerationError::fatal(err.to_string()),
    }
}

#[async_trait]
impl TextModel for OpenAiModel {
    async fn generate_text(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<TextCompletion, GenerationError> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(classify)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(classify)?
                .into(),
        ];
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .max_completion_tokens(max_tokens)
            .temperature(temperature)
            .messages(messages)
            .build()
            .map_err(classify)?;
        let response = self.client.chat().create(request).await.map_err(classify)?;
        let tokens_used = response.usage.as_ref().map(|usage| usage.total_tokens);
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::fatal("Model returned no choices"))?;
        let finish_reason = choice.finish_reason.and_then(|reason| {
            serde_json::to_value(reason).ok().and_then(|v| v.as_str().map(str::to_string))
        });
        Ok(TextCompletion {
            text: choice.message.content.unwrap_or_default(),
            tokens_used,
            finish_reason,
        })
    }
}
