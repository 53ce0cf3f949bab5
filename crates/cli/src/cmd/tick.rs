use std::path::Path;

use anyhow::Result;
use argp::FromArgs;
use clio_jobs::BatchSummary;

use crate::util::{load_config, open_database, orchestrator};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Process one batch of queued jobs and print a JSON summary.
#[argp(subcommand, name = "tick")]
pub struct Args {}

pub async fn run(config: &Path, _args: Args) -> Result<()> {
    let config = load_config(config)?;
    let db = open_database(&config).await?;
    let orchestrator = orchestrator(&config, db.clone()).await?;
    let summary = BatchSummary::from(orchestrator.process_queued_batch().await?);
    tracing::info!(
        "Tick finished: {} completed, {} requeued, {} failed",
        summary.processed,
        summary.requeued,
        summary.failed
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    db.close().await;
    Ok(())
}
