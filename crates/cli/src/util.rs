use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use anyhow::{Context, Result};
use clio_analysis::Analyzer;
use clio_core::{config::Config, models::ReadmeStyle};
use clio_db::Database;
use clio_generator::{Generator, OpenAiModel};
use clio_github::GitHub;
use clio_jobs::Orchestrator;

pub fn load_config(path: &Path) -> Result<Config> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open config file '{}'", path.display()))?;
    serde_yaml::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub async fn open_database(config: &Config) -> Result<Database> {
    Database::new(&config.db).await.context("Failed to open database")
}

/// Wire the orchestrator the same way the server does.
pub async fn orchestrator(config: &Config, db: Database) -> Result<Orchestrator> {
    let github = GitHub::new(&config.github).await.context("Failed to create GitHub client")?;
    let model = Arc::new(OpenAiModel::new(&config.openai));
    Ok(Orchestrator::new(
        Arc::new(db),
        Analyzer::new(github),
        Generator::new(model, config.openai.model.clone()),
        config.worker.clone(),
    ))
}

// For argp::FromArgs
pub fn readme_style(value: &str) -> Result<ReadmeStyle, String> {
    value.parse().map_err(|_| {
        format!("unknown style '{value}' (expected professional, casual, minimal or detailed)")
    })
}

// For argp::FromArgs
pub fn full_name(value: &str) -> Result<String, String> {
    match value.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(value.to_string())
        }
        _ => Err(format!("expected owner/name, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readme_style() {
        assert_eq!(readme_style("casual"), Ok(ReadmeStyle::Casual));
        assert!(readme_style("loud").is_err());
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name("acme/app").as_deref(), Ok("acme/app"));
        assert!(full_name("acme").is_err());
        assert!(full_name("acme/").is_err());
        assert!(full_name("a/b/c").is_err());
    }
}
