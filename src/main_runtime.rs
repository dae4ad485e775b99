use devwatch::adapters::TcpProbe;
use devwatch::config::{AppConfig, LoggingConfig};
use devwatch::supervisor::{
    alert_line_layer, is_alert_event, AlertStore, DeviceRegistry, ProbeAdapter, Supervisor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::error;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::{EnvFilter, Layer};

/// Construct the alert store, registry and supervisor once, wired together
pub fn build_supervisor(config: &AppConfig) -> Arc<Supervisor> {
    let alerts = Arc::new(AlertStore::new(config.alert_store_config()));
    let registry = Arc::new(DeviceRegistry::new(config.registry_config(), alerts));

    let connect_timeout = Duration::from_secs(config.supervisor.probe_timeout_secs);
    let adapters: Vec<Arc<dyn ProbeAdapter>> = config
        .families
        .iter()
        .map(|family| Arc::new(TcpProbe::new(family, connect_timeout)) as Arc<dyn ProbeAdapter>)
        .collect();

    Arc::new(Supervisor::new(
        config.supervisor_config(),
        registry,
        adapters,
    ))
}

pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if logging.level.is_empty() {
            "info"
        } else {
            logging.level.as_str()
        };
        EnvFilter::new(format!("{},devwatch=debug", level))
    });

    // Alert messages go to their own JSON-line sink, not the general layers
    let general = || filter_fn(|meta| !is_alert_event(meta));

    // File logging only when DEVWATCH_LOG_DIR is set and writable.
    //
    // `tracing_appender::rolling::daily` panics if it can't create the
    // initial log file, so preflight writability.
    let file_layer = match std::env::var("DEVWATCH_LOG_DIR") {
        Ok(log_dir) if std::fs::create_dir_all(&log_dir).is_ok() => {
            let test_path = std::path::Path::new(&log_dir).join(".devwatch_write_test");
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&test_path)
            {
                Ok(_) => {
                    let _ = std::fs::remove_file(&test_path);

                    let file_appender = tracing_appender::rolling::daily(&log_dir, "devwatch.log");
                    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                    // Keep the guard alive for the lifetime of the process
                    Box::leak(Box::new(guard));

                    Some(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(non_blocking.clone())
                            .with_ansi(false)
                            .with_target(true)
                            .with_filter(general())
                            .and_then(alert_line_layer(non_blocking)),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "Warning: Could not write to log directory {} ({}), file logging disabled",
                        log_dir, e
                    );
                    None
                }
            }
        }
        Ok(log_dir) => {
            eprintln!(
                "Warning: Could not create log directory {}, file logging disabled",
                log_dir
            );
            None
        }
        Err(_) => None,
    };

    // Console layer, JSON lines when requested (Loki ingestion)
    let (json_layer, text_layer) = if logging.json {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .with_filter(general()),
            ),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_filter(general()),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .with(alert_line_layer(std::io::stdout))
        .init();
}

pub fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
