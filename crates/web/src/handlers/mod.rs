use axum::{
    Router,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use clio_core::{AppError, config::Config};

use crate::AppState;

mod jobs;
mod readme;
mod tick;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/cron/process-jobs", get(tick::process_jobs).post(tick::process_jobs))
        .route("/api/readme/generate", post(readme::generate))
        .route("/api/jobs/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/api/jobs/{id}/versions", post(jobs::save_version))
        .route("/api/users/{user_id}/jobs", get(jobs::list_jobs))
}

async fn health() -> StatusCode { StatusCode::OK }

/// Require `Authorization: Bearer <cron.secret>`.
/// Without a configured secret every request is rejected.
fn authorize(config: &Config, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(secret) = config.cron.as_ref().map(|c| c.secret.as_str()).filter(|s| !s.is_empty())
    else {
        tracing::warn!("Rejecting privileged request: no cron secret configured");
        return Err(AppError::Status(StatusCode::UNAUTHORIZED));
    };
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) if token == secret => Ok(()),
        _ => Err(AppError::Status(StatusCode::UNAUTHORIZED)),
    }
}
