use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap};
use clio_core::{AppError, config::Config};
use clio_jobs::{BatchSummary, Orchestrator};

use super::authorize;

/// One stateless tick over the oldest claimable jobs.
pub async fn process_jobs(
    State(config): State<Arc<Config>>,
    State(orchestrator): State<Arc<Orchestrator>>,
    headers: HeaderMap,
) -> Result<Json<BatchSummary>, AppError> {
    authorize(&config, &headers)?;
    let reports = orchestrator.process_queued_batch().await?;
    let summary = BatchSummary::from(reports);
    if !summary.results.is_empty() {
        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            requeued = summary.requeued,
            "Cron tick processed {} jobs",
            summary.results.len()
        );
    }
    Ok(Json(summary))
}
