use std::path::Path;

use anyhow::{Context, Result};
use argp::FromArgs;
use clio_core::models::{ReadmeOptions, ReadmeStyle, Repository};
use clio_db::JobStore;

use crate::util::{full_name, load_config, open_database, readme_style};

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// Link a repository and create a pending README job for it.
#[argp(subcommand, name = "enqueue")]
pub struct Args {
    #[argp(option, short = 'u')]
    /// user the job belongs to
    user: String,
    #[argp(option, short = 'r', from_str_fn(full_name))]
    /// repository full name (owner/name)
    repo: String,
    #[argp(option)]
    /// GitHub repository id
    repo_id: u64,
    #[argp(option, short = 'i')]
    /// GitHub App installation id
    installation: u64,
    #[argp(option, short = 's', from_str_fn(readme_style))]
    /// professional, casual, minimal or detailed
    style: Option<ReadmeStyle>,
    #[argp(switch)]
    /// include badges
    badges: bool,
    #[argp(switch)]
    /// include a table of contents
    toc: bool,
    #[argp(switch)]
    /// include images
    images: bool,
    #[argp(option, short = 'p')]
    /// extra instructions for the model
    prompt: Option<String>,
}

pub async fn run(config: &Path, args: Args) -> Result<()> {
    let config = load_config(config)?;
    let db = open_database(&config).await?;
    let repository = Repository {
        id: args.repo_id,
        full_name: args.repo,
        installation_id: Some(args.installation),
        ..Default::default()
    };
    let options = ReadmeOptions {
        style: args.style.unwrap_or_default(),
        include_images: args.images,
        include_badges: args.badges,
        include_toc: args.toc,
        custom_prompt: args.prompt.filter(|p| !p.trim().is_empty()),
    };
    db.upsert_repository(&repository).await.context("Failed to save repository")?;
    let job = db
        .create_job(&args.user, repository.id, &options)
        .await
        .context("Failed to create job")?;
    tracing::info!("Queued job {} for {}", job.id, repository.full_name);
    println!("{}", serde_json::to_string_pretty(&job)?);
    db.close().await;
    Ok(())
}
