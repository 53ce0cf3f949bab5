use std::{
    fs::File,
    io::BufReader,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use clio_analysis::Analyzer;
use clio_core::config::Config;
use clio_db::Database;
use clio_generator::{Generator, OpenAiModel};
use clio_github::GitHub;
use clio_jobs::Orchestrator;
use clio_web::{AppState, app, cron};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config: Arc<Config> = {
        let file = BufReader::new(File::open("config.yml").expect("Failed to open config file"));
        serde_yaml::from_reader(file).expect("Failed to parse config file")
    };
    let db = Database::new(&config.db).await.expect("Failed to open database");
    let github = GitHub::new(&config.github).await.expect("Failed to create GitHub client");
    let model = Arc::new(OpenAiModel::new(&config.openai));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(db.clone()),
        Analyzer::new(github),
        Generator::new(model, config.openai.model.clone()),
        config.worker.clone(),
    ));
    let state = AppState { config: config.clone(), orchestrator };

    // Start the loop driver
    let mut scheduler = cron::create(state.clone()).await.expect("Failed to create scheduler");

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    tracing::info!("Web server: Listening on {}", addr);
    let listener = TcpListener::bind(addr).await.expect("bind error");
    let router = app(state).into_make_service_with_connect_info::<SocketAddr>();

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error");
    if let Err(e) = result {
        tracing::error!("{e:?}");
    }
    tracing::info!("Web server stopped");

    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Failed to shut down scheduler: {e}");
    }
    db.close().await;
    tracing::info!("Shut down gracefully");
}

async fn shutdown_signal() {
    if let Err(e) = wait_for_signal().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await
    }
}
