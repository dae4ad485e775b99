use anyhow::{bail, Context, Result};
use clap::Parser;
use devwatch::cli::{Cli, Commands};
use devwatch::config::AppConfig;
use devwatch::services::{self, ApiState, HealthServer};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

mod main_runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;

    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("config: {}", e);
        }
        bail!("invalid configuration ({} error(s))", errors.len());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            main_runtime::init_logging(&config.logging);
            run_mode(&config).await
        }
        Commands::Check => {
            main_runtime::init_logging_simple();
            check_mode(&config).await
        }
    }
}

async fn run_mode(config: &AppConfig) -> Result<()> {
    let supervisor = main_runtime::build_supervisor(config);
    if supervisor.families().is_empty() {
        warn!("No device families configured; health API will report zero devices");
    }

    let state = Arc::new(
        ApiState::new(Arc::clone(supervisor.registry())).with_supervisor(Arc::clone(&supervisor)),
    );
    let server = HealthServer::new(state, config.health_port());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server
            .run(async {
                let _ = stop_rx.await;
            })
            .await
        {
            error!("Health server error: {}", e);
        }
    });

    supervisor.start().await;

    main_runtime::shutdown_signal().await;
    info!("Received shutdown signal");

    supervisor.stop().await;
    let _ = stop_tx.send(());
    if let Err(e) = server_handle.await {
        error!("Health server task failed: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn check_mode(config: &AppConfig) -> Result<()> {
    let supervisor = main_runtime::build_supervisor(config);

    for (family, outcome) in supervisor.poll_once().await {
        info!("{}: {:?}", family, outcome);
    }

    let report =
        services::health_report(supervisor.registry(), Some(supervisor.stats().await)).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
