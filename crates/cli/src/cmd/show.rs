use std::path::Path;

use anyhow::{Result, bail};
use argp::FromArgs;
use clio_core::models::JobId;
use clio_db::JobStore;

use crate::util::{load_config, open_database};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Print a job and its README versions as JSON.
#[argp(subcommand, name = "show")]
pub struct Args {
    #[argp(positional)]
    /// job id
    job_id: i64,
}

pub async fn run(config: &Path, args: Args) -> Result<()> {
    let config = load_config(config)?;
    let db = open_database(&config).await?;
    let Some(job) = db.get_job(JobId(args.job_id)).await? else {
        db.close().await;
        bail!("Job {} not found", args.job_id);
    };
    let versions = db.list_versions(job.id).await?;
    let output = serde_json::json!({ "job": job, "versions": versions });
    println!("{}", serde_json::to_string_pretty(&output)?);
    db.close().await;
    Ok(())
}
