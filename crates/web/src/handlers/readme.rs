use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use clio_core::{
    AppError,
    config::Config,
    models::{ReadmeOptions, Repository},
};
use clio_jobs::{GeneratedReadmeResult, Orchestrator};
use serde::Deserialize;

use super::authorize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    repository: Repository,
    installation_id: u64,
    user_id: String,
    #[serde(default)]
    options: ReadmeOptions,
}

pub async fn generate(
    State(config): State<Arc<Config>>,
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GeneratedReadmeResult>, AppError> {
    authorize(&config, &headers)?;
    if request.repository.owner_and_name().is_none() || request.user_id.trim().is_empty() {
        return Err(AppError::Status(StatusCode::BAD_REQUEST));
    }
    let result = orchestrator
        .generate_readme(
            request.repository,
            request.installation_id,
            &request.user_id,
            &request.options,
        )
        .await?;
    Ok(Json(result))
}
