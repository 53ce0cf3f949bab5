use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use clio_core::{
    AppError,
    models::{Job, JobId, ReadmeVersion},
};
use clio_jobs::Orchestrator;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct JobResponse {
    job: Job,
    versions: Vec<ReadmeVersion>,
}

pub async fn get_job(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<i64>,
) -> Result<Json<JobResponse>, AppError> {
    let store = orchestrator.store();
    let Some(job) = store.get_job(JobId(id)).await? else {
        return Err(AppError::Status(StatusCode::NOT_FOUND));
    };
    let versions = store.list_versions(job.id).await?;
    Ok(Json(JobResponse { job, versions }))
}

pub async fn list_jobs(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(orchestrator.store().list_jobs_for_user(&user_id).await?))
}

pub async fn delete_job(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if orchestrator.store().delete_job(JobId(id)).await? {
        tracing::info!("Deleted job {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Status(StatusCode::NOT_FOUND))
    }
}

#[derive(Deserialize)]
pub struct SaveVersionRequest {
    content: String,
}

pub async fn save_version(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(id): Path<i64>,
    Json(request): Json<SaveVersionRequest>,
) -> Result<Json<ReadmeVersion>, AppError> {
    if request.content.trim().is_empty() {
        return Err(AppError::Status(StatusCode::BAD_REQUEST));
    }
    match orchestrator.save_version(JobId(id), request.content).await? {
        Some(version) => Ok(Json(version)),
        None => Err(AppError::Status(StatusCode::NOT_FOUND)),
    }
}
