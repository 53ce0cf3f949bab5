use anyhow::Result;
use clio_jobs::BatchSummary;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::AppState;

pub type Scheduler = JobScheduler;

/// Start the loop driver: one `run_batch` per scheduled tick.
pub async fn create(state: AppState) -> Result<Scheduler> {
    let sched = JobScheduler::new().await?;

    let worker = &state.config.worker;
    if worker.enabled {
        tracing::info!(
            "Job worker: {} ({} concurrent jobs)",
            worker.poll_schedule,
            worker.max_concurrent_jobs
        );
        let orchestrator = state.orchestrator.clone();
        sched
            .add(Job::new_async(worker.poll_schedule.as_str(), move |_uuid, _l| {
                let orchestrator = orchestrator.clone();
                Box::pin(async move {
                    match orchestrator.run_batch().await {
                        Ok(reports) if reports.is_empty() => {}
                        Ok(reports) => {
                            let summary = BatchSummary::from(reports);
                            tracing::info!(
                                "Job batch: {} completed, {} requeued, {} failed, {} skipped, {} \
                                 errored",
                                summary.processed,
                                summary.requeued,
                                summary.failed,
                                summary.skipped,
                                summary.errored
                            );
                        }
                        Err(e) => tracing::error!("Failed to run job batch: {:?}", e),
                    }
                })
            })?)
            .await?;
    } else {
        tracing::info!("Job worker: Disabled");
    }

    sched.start().await?;
    Ok(sched)
}
