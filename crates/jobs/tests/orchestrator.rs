mod common;

use std::time::Duration;

use clio_core::{
    config::WorkerConfig,
    models::{JobStatus, ReadmeOptions, Repository},
};
use clio_db::JobStore;
use clio_generator::GenerationError;
use clio_jobs::{BatchSummary, JobOutcome};
use common::{FakeModel, Harness, README, config, repository};
use time::OffsetDateTime;

#[tokio::test]
async fn test_successful_run() {
    let h = Harness::new(FakeModel::reply(README), config());
    let job = h.enqueue(repository(1)).await;

    let outcome = h.orchestrator.run_one(&job).await.unwrap();
    let JobOutcome::Completed { version_id } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };

    let job = h.job(&job).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert!(job.processing_time_ms.is_some());
    assert_eq!(job.error_message, None);
    assert_eq!(h.store.progress_of(job.id), vec![0, 0, 10, 30, 50, 70, 85, 90, 100]);

    let versions = h.store.list_versions(job.id).await.unwrap();
    assert_eq!(versions.len(), 1);
    let version = &versions[0];
    assert_eq!(version.id, version_id);
    assert_eq!(version.content.matches("## Usage").count(), 1);
    assert!(version.content.contains("## Installation"));
    assert!(version.content.contains("cargo build"));
    assert_eq!(version.word_count as usize, version.content.split_whitespace().count());
    assert_eq!(version.character_count as usize, version.content.chars().count());
    assert_eq!(version.model_used.as_deref(), Some("gpt-4o"));
    assert_eq!(version.tokens_used, Some(321));
}

#[tokio::test]
async fn test_progress_only_reaches_100_on_completion() {
    let h = Harness::new(FakeModel::fail(GenerationError::fatal("bad request")), config());
    let job = h.enqueue(repository(1)).await;
    h.orchestrator.run_one(&job).await.unwrap();

    let progress = h.store.progress_of(job.id);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!(!progress.contains(&100));
    assert_eq!(h.job(&job).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_retry_budget() {
    let h = Harness::new(
        FakeModel::fail(GenerationError::temporary("network error: connection reset")),
        config(),
    );
    let job = h.enqueue(repository(1)).await;

    for attempt in 1..=3 {
        let reports = h.orchestrator.process_queued_batch().await.unwrap();
        assert_eq!(reports.len(), 1);
        let JobOutcome::Requeued { retry_count, .. } = reports[0].outcome else {
            panic!("unexpected outcome {:?}", reports[0].outcome);
        };
        assert_eq!(retry_count, attempt);
        let current = h.job(&job).await;
        assert_eq!(current.status, JobStatus::Pending);
        assert_eq!(current.progress, 0);
        assert_eq!(current.error_message, None);
    }

    let reports = h.orchestrator.process_queued_batch().await.unwrap();
    assert!(matches!(reports[0].outcome, JobOutcome::Failed { .. }));
    let job = h.job(&job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 3);
    assert!(job.error_message.unwrap().contains("connection reset"));
    assert!(job.completed_at.is_some());
    assert_eq!(h.model.calls(), 4);

    assert!(h.orchestrator.process_queued_batch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_retryable_failure() {
    let h = Harness::new(FakeModel::fail(GenerationError::fatal("invalid api key")), config());
    let job = h.enqueue(repository(1)).await;

    let outcome = h.orchestrator.run_one(&job).await.unwrap();
    assert!(matches!(outcome, JobOutcome::Failed { .. }));
    let job = h.job(&job).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 0);
    assert_eq!(job.error_message.as_deref(), Some("README generation failed: invalid api key"));
    assert_eq!(h.model.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_requeues() {
    let model = FakeModel::reply(README).with_delay(Duration::from_millis(50));
    let h = Harness::new(model, WorkerConfig { job_timeout_ms: 1, ..config() });
    let job = h.enqueue(repository(1)).await;

    let outcome = h.orchestrator.run_one(&job).await.unwrap();
    let JobOutcome::Requeued { retry_count, error, .. } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert_eq!(retry_count, 1);
    assert!(error.contains("timed out"));
    let job = h.job(&job).await;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);
    assert!(h.store.list_versions(job.id).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_version_write_still_completes() {
    let h = Harness::with_version_delay(
        FakeModel::reply(README),
        WorkerConfig { job_timeout_ms: 50, ..config() },
        Duration::from_millis(200),
    );
    let job = h.enqueue(repository(1)).await;

    let outcome = h.orchestrator.run_one(&job).await.unwrap();
    assert!(matches!(outcome, JobOutcome::Completed { .. }), "unexpected outcome {outcome:?}");
    let job = h.job(&job).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 0);
    assert_eq!(h.store.list_versions(job.id).await.unwrap().len(), 1);

    // Nothing left for the next tick to pick up and write a second version.
    assert!(h.orchestrator.process_queued_batch().await.unwrap().is_empty());
    assert_eq!(h.store.list_versions(job.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_linkage_fails_immediately() {
    let h = Harness::new(FakeModel::reply(README), config());

    let unlinked =
        h.store.create_job("user-1", 404, &ReadmeOptions::default()).await.unwrap();
    let no_installation =
        h.enqueue(Repository { installation_id: None, ..repository(2) }).await;
    let malformed =
        h.enqueue(Repository { full_name: "no-owner".to_string(), ..repository(3) }).await;

    for job in [&unlinked, &no_installation, &malformed] {
        let outcome = h.orchestrator.run_one(job).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed { .. }), "{outcome:?}");
        let job = h.job(job).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);
    }
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn test_claimed_job_is_skipped() {
    let h = Harness::new(FakeModel::reply(README), config());
    let job = h.enqueue(repository(1)).await;
    h.store.claim_job(job.id, OffsetDateTime::now_utc()).await.unwrap().unwrap();

    assert_eq!(h.orchestrator.run_one(&job).await.unwrap(), JobOutcome::Skipped);
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_same_job_runs_once() {
    let model = FakeModel::reply(README).with_delay(Duration::from_millis(10));
    let h = Harness::new(model, config());
    let job = h.enqueue(repository(1)).await;

    let (a, b) = tokio::join!(h.orchestrator.run_one(&job), h.orchestrator.run_one(&job));
    let mut outcomes = [a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, JobOutcome::Skipped));
    assert!(matches!(outcomes[0], JobOutcome::Completed { .. }));
    assert_eq!(outcomes[1], JobOutcome::Skipped);
    assert_eq!(h.model.calls(), 1);
    assert_eq!(h.store.list_versions(job.id).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_batch_respects_ceiling() {
    let model = FakeModel::reply(README).with_delay(Duration::from_millis(10));
    let h = Harness::new(model, WorkerConfig { max_concurrent_jobs: 2, ..config() });
    for id in 1..=5 {
        h.enqueue(repository(id)).await;
    }

    let (first, second) = tokio::join!(h.orchestrator.run_batch(), h.orchestrator.run_batch());
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.len() + second.len(), 2);
    assert!(h.model.max_active() <= 2);
    assert_eq!(h.orchestrator.in_flight(), 0);

    let summary = BatchSummary::from(first.into_iter().chain(second).collect::<Vec<_>>());
    assert_eq!(summary.processed, 2);

    while !h.orchestrator.run_batch().await.unwrap().is_empty() {}
    let jobs = h.store.list_jobs_for_user("user-1").await.unwrap();
    assert!(jobs.iter().all(|job| job.status == JobStatus::Completed));
    assert!(h.model.max_active() <= 2);
}

#[tokio::test]
async fn test_run_batch_oldest_first() {
    let h = Harness::new(FakeModel::reply(README), WorkerConfig { batch_size: 1, ..config() });
    let oldest = h.enqueue(repository(1)).await;
    h.enqueue(repository(2)).await;

    let reports = h.orchestrator.run_batch().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].job_id, oldest.id);
}

#[tokio::test]
async fn test_empty_tick() {
    let h = Harness::new(FakeModel::reply(README), config());
    assert!(h.orchestrator.process_queued_batch().await.unwrap().is_empty());
    assert!(h.orchestrator.run_batch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tick_is_bounded() {
    let h = Harness::new(FakeModel::reply(README), config());
    for id in 1..=5 {
        h.enqueue(repository(id)).await;
    }
    let reports = h.orchestrator.process_queued_batch().await.unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(h.orchestrator.process_queued_batch().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_backoff_delays_reclaim() {
    let h = Harness::new(
        FakeModel::fail(GenerationError::temporary("rate limit reached")),
        WorkerConfig { retry_delay_ms: 60_000, ..config() },
    );
    let job = h.enqueue(repository(1)).await;

    let reports = h.orchestrator.process_queued_batch().await.unwrap();
    let JobOutcome::Requeued { next_attempt_at, .. } = reports[0].outcome else {
        panic!("unexpected outcome {:?}", reports[0].outcome);
    };
    assert!(next_attempt_at > OffsetDateTime::now_utc() + Duration::from_secs(30));
    assert_eq!(h.job(&job).await.next_attempt_at, Some(next_attempt_at));
    assert!(h.orchestrator.process_queued_batch().await.unwrap().is_empty());
    assert_eq!(h.model.calls(), 1);
}

#[tokio::test]
async fn test_store_failure_is_reported() {
    let h = Harness::new(FakeModel::reply(README), config());
    let job = h.enqueue(repository(1)).await;
    h.store.fail_writes(true);

    let reports = h.orchestrator.run_batch().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].job_id, job.id);
    assert!(matches!(reports[0].outcome, JobOutcome::Errored { .. }));
    assert_eq!(h.orchestrator.in_flight(), 0);
}

#[tokio::test]
async fn test_generate_readme() {
    let h = Harness::new(FakeModel::reply(README), config());
    let repository = Repository { installation_id: None, ..repository(7) };

    let result = h
        .orchestrator
        .generate_readme(repository, 55, "user-9", &ReadmeOptions::default())
        .await
        .unwrap();
    assert_eq!(result.job.status, JobStatus::Completed);
    assert_eq!(result.job.user_id, "user-9");
    assert!(result.content.starts_with("# App\n"));
    assert_eq!(result.metadata.model_used.as_deref(), Some("gpt-4o"));
    assert_eq!(result.metadata.word_count as usize, result.content.split_whitespace().count());
    let linked = h.store.get_repository(7).await.unwrap().unwrap();
    assert_eq!(linked.installation_id, Some(55));
}

#[tokio::test]
async fn test_generate_readme_failure() {
    let h = Harness::new(FakeModel::fail(GenerationError::fatal("content policy")), config());
    let err = h
        .orchestrator
        .generate_readme(repository(7), 55, "user-9", &ReadmeOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("content policy"));
}

#[tokio::test]
async fn test_save_version_dedup() {
    let h = Harness::new(FakeModel::reply(README), config());
    let job = h.enqueue(repository(1)).await;

    let first = h.orchestrator.save_version(job.id, "# Edited\n".to_string()).await.unwrap();
    let first = first.unwrap();
    let again = h.orchestrator.save_version(job.id, "# Edited\n".to_string()).await.unwrap();
    assert_eq!(again.map(|v| v.id), Some(first.id));
    let changed = h.orchestrator.save_version(job.id, "# Edited twice\n".to_string()).await;
    assert_ne!(changed.unwrap().unwrap().id, first.id);
    assert_eq!(h.store.list_versions(job.id).await.unwrap().len(), 2);
    assert_eq!(first.model_used, None);

    let missing = h.orchestrator.save_version(clio_core::models::JobId(999), "x".to_string());
    assert!(missing.await.unwrap().is_none());
}
