//! Supervisor loop
//!
//! On every tick, probes all device families in parallel. Each family runs
//! in its own task with a bounded timeout, so a slow, failing or panicking
//! family never affects its siblings or the next tick.

use super::probe::{Availability, ProbeAdapter};
use super::registry::DeviceRegistry;
use crate::domain::{DeviceReport, FailureReason};
use crate::error::DevwatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Configuration for the supervisor loop
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Interval between probe cycles (default: 60s)
    pub poll_interval: Duration,
    /// Timeout for client acquisition and for the probe itself (default: 5s)
    pub probe_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of one family's task within a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyOutcome {
    /// Probe ran; this many device reports were applied
    Probed { devices: usize },
    /// Client unavailable; reported through the synthetic family device
    Unavailable,
    /// Acquisition or probe timed out; reported through the synthetic family device
    TimedOut,
    /// Unexpected error or panic; nothing was applied this tick
    Failed(String),
}

/// Counters describing supervisor activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollerStats {
    pub ticks: u64,
    pub last_tick_started: Option<DateTime<Utc>>,
    pub last_tick_duration_ms: u64,
    /// Families skipped because of unexpected errors, since start
    pub family_errors: u64,
}

#[derive(Clone)]
struct Poller {
    config: SupervisorConfig,
    registry: Arc<DeviceRegistry>,
    adapters: Arc<Vec<Arc<dyn ProbeAdapter>>>,
    stats: Arc<RwLock<PollerStats>>,
}

impl Poller {
    async fn run_cycle(&self) -> Vec<(String, FamilyOutcome)> {
        let started_at = Utc::now();
        let clock = Instant::now();

        let handles: Vec<JoinHandle<FamilyOutcome>> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let registry = Arc::clone(&self.registry);
                let probe_timeout = self.config.probe_timeout;
                tokio::spawn(async move { check_family(adapter, registry, probe_timeout).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut errors = 0;
        for (adapter, result) in self.adapters.iter().zip(results) {
            let family = adapter.family().to_string();
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Probe task for {} aborted: {}", family, e);
                    FamilyOutcome::Failed(e.to_string())
                }
            };
            if matches!(outcome, FamilyOutcome::Failed(_)) {
                errors += 1;
            }
            outcomes.push((family, outcome));
        }

        let elapsed_ms = clock.elapsed().as_millis() as u64;
        {
            let mut stats = self.stats.write().await;
            stats.ticks += 1;
            stats.last_tick_started = Some(started_at);
            stats.last_tick_duration_ms = elapsed_ms;
            stats.family_errors += errors;
        }

        debug!(
            "Probe cycle finished: {} families, {} errors, {}ms",
            outcomes.len(),
            errors,
            elapsed_ms
        );
        outcomes
    }
}

/// Run one family: capability check, acquisition, probe, registry updates
async fn check_family(
    adapter: Arc<dyn ProbeAdapter>,
    registry: Arc<DeviceRegistry>,
    probe_timeout: Duration,
) -> FamilyOutcome {
    let family = adapter.family().to_string();
    let timeout_secs = probe_timeout.as_secs();

    if let Availability::Unavailable(reason) = adapter.availability() {
        let err = DevwatchError::FamilyUnavailable {
            family: family.clone(),
            reason,
        };
        debug!("{}", err);
        registry
            .update(DeviceReport::family_failure(
                &family,
                FailureReason::FamilyUnavailable,
                &err.to_string(),
            ))
            .await;
        return FamilyOutcome::Unavailable;
    }

    match timeout(probe_timeout, adapter.acquire()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            let err = DevwatchError::FamilyUnavailable {
                family: family.clone(),
                reason: e.to_string(),
            };
            warn!("{}", err);
            registry
                .update(DeviceReport::family_failure(
                    &family,
                    FailureReason::FamilyUnavailable,
                    &err.to_string(),
                ))
                .await;
            return FamilyOutcome::Unavailable;
        }
        Err(_) => {
            warn!("Acquiring {} client timed out after {}s", family, timeout_secs);
            registry
                .update(DeviceReport::family_failure(
                    &family,
                    FailureReason::Timeout,
                    &format!("Client acquisition timed out after {}s", timeout_secs),
                ))
                .await;
            return FamilyOutcome::TimedOut;
        }
    }

    let reports = match timeout(probe_timeout, adapter.probe()).await {
        Ok(Ok(reports)) => reports,
        Ok(Err(e)) if !e.is_timeout() => {
            error!("Probe for {} failed: {}", family, e);
            return FamilyOutcome::Failed(e.to_string());
        }
        Ok(Err(_)) | Err(_) => {
            let err = DevwatchError::ProbeTimeout {
                family: family.clone(),
                timeout_secs,
            };
            warn!("{}", err);
            registry
                .update(DeviceReport::family_failure(
                    &family,
                    FailureReason::Timeout,
                    &err.to_string(),
                ))
                .await;
            return FamilyOutcome::TimedOut;
        }
    };

    let synthetic_id = DeviceReport::family_device_id(&family);
    let synthetic_offline = registry
        .get(&synthetic_id)
        .await
        .is_some_and(|device| !device.connected);
    if synthetic_offline {
        registry
            .update(DeviceReport::family_recovered(&family))
            .await;
    }

    let devices = reports.len();
    for report in reports {
        registry.update(report).await;
    }

    FamilyOutcome::Probed { devices }
}

/// Periodic, fault-isolated probing of all device families
pub struct Supervisor {
    poller: Poller,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Create a supervisor over the given adapters
    pub fn new(
        config: SupervisorConfig,
        registry: Arc<DeviceRegistry>,
        adapters: Vec<Arc<dyn ProbeAdapter>>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            poller: Poller {
                config,
                registry,
                adapters: Arc::new(adapters),
                stats: Arc::new(RwLock::new(PollerStats::default())),
            },
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.poller.registry
    }

    /// Names of the supervised families
    pub fn families(&self) -> Vec<String> {
        self.poller
            .adapters
            .iter()
            .map(|a| a.family().to_string())
            .collect()
    }

    pub async fn stats(&self) -> PollerStats {
        self.poller.stats.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run a single probe cycle immediately
    pub async fn poll_once(&self) -> Vec<(String, FamilyOutcome)> {
        self.poller.run_cycle().await
    }

    /// Start the background loop. No-op if already running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            info!("Supervisor already running");
            return;
        }

        self.shutdown_tx.send_replace(false);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let poller = self.poller.clone();

        info!(
            "Supervisor started: {} families, interval {}s, timeout {}s",
            poller.adapters.len(),
            poller.config.poll_interval.as_secs(),
            poller.config.probe_timeout.as_secs()
        );

        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(poller.config.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }
                if *shutdown_rx.borrow() {
                    break;
                }
                // Stop requests during a cycle take effect after it completes
                poller.run_cycle().await;
            }

            info!("Supervisor stopped");
        }));
    }

    /// Signal the loop to stop and wait for the in-flight cycle to finish
    pub async fn stop(&self) {
        let handle = self.task.lock().await.take();
        let Some(handle) = handle else {
            debug!("Supervisor not running");
            return;
        };

        self.shutdown_tx.send_replace(true);
        if let Err(e) = handle.await {
            error!("Supervisor task ended abnormally: {}", e);
        }
    }
}
