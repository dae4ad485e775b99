//! Device Health Registry
//!
//! One health record per device, created on the first probe result. Each
//! update runs the connectivity state machine and emits at most one
//! message into the alert store:
//!
//! - first seen connected: INFO "Discovered"
//! - online (or first seen) to offline: WARNING "Offline"
//! - offline for exactly `alarm_threshold` consecutive probes: ALARM "CRITICAL"
//! - offline to online: INFO "Reconnected"

use super::alert_store::AlertStore;
use crate::domain::{
    Category, DeviceHealth, DeviceReport, DeviceType, Details, FailureReason, Message, Severity,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Configuration for the registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Consecutive failures that escalate to an alarm (default: 3)
    pub alarm_threshold: u32,
    /// Supervisor poll interval, used to report offline duration (default: 60s)
    pub poll_interval: Duration,
    /// Family probe timeout, quoted in timeout descriptions (default: 5s)
    pub probe_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            alarm_threshold: 3,
            poll_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of applying one report to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First report for this device, connected
    Discovered,
    /// Was online (or unseen), now failing
    WentOffline,
    /// Still failing, below or past the alarm threshold
    StillOffline,
    /// Failure count just reached the alarm threshold
    Escalated,
    /// Was offline, now connected
    Reconnected { previous_failures: u32 },
    /// Connected before and after
    StillOnline,
}

/// Online/offline counts for one device type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub online: usize,
    pub offline: usize,
}

/// Aggregate health snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total_devices: usize,
    pub online: usize,
    pub offline: usize,
    pub health_percentage: f64,
    pub by_type: BTreeMap<DeviceType, TypeCounts>,
    pub devices: Vec<DeviceHealth>,
}

/// `online / total * 100`, one decimal, 0 when empty
pub fn health_percentage(online: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (online as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Reclassify transport-level results before the state machine sees them.
///
/// A device that answers but reports `exclusive_lock = true` (a camera held
/// by another local application) is treated as not connected.
pub fn classify(mut report: DeviceReport) -> DeviceReport {
    let locked = report
        .details
        .get("exclusive_lock")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    if report.connected && locked {
        report.connected = false;
        report.reason = Some(FailureReason::InUseByOtherApp);
        report
            .error
            .get_or_insert_with(|| "Device is in use by another application".to_string());
        report
            .details
            .insert("in_use_by_other_app".to_string(), json!(true));
    }

    if !report.connected {
        let reason = *report.reason.get_or_insert(FailureReason::Unreachable);
        report
            .error
            .get_or_insert_with(|| "Device not responding".to_string());
        report
            .details
            .insert("failure_reason".to_string(), json!(reason.as_str()));
    }

    report
}

/// Apply a connectivity result to an existing record
fn apply(
    record: &mut DeviceHealth,
    connected: bool,
    error: Option<String>,
    now: DateTime<Utc>,
    alarm_threshold: u32,
) -> Transition {
    record.last_check = now;

    if connected {
        let previous_failures = record.consecutive_failures;
        let was_connected = record.connected;
        record.connected = true;
        record.consecutive_failures = 0;
        record.last_success = Some(now);
        record.last_error = None;

        if was_connected {
            Transition::StillOnline
        } else {
            Transition::Reconnected { previous_failures }
        }
    } else {
        let was_connected = record.connected;
        record.connected = false;
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        record.last_error = error;

        if record.consecutive_failures == alarm_threshold {
            Transition::Escalated
        } else if was_connected {
            Transition::WentOffline
        } else {
            Transition::StillOffline
        }
    }
}

/// Device health records plus the transition logic that feeds the alert store
pub struct DeviceRegistry {
    config: RegistryConfig,
    devices: RwLock<HashMap<String, DeviceHealth>>,
    alerts: Arc<AlertStore>,
}

impl DeviceRegistry {
    /// Create a new registry writing into `alerts`
    pub fn new(config: RegistryConfig, alerts: Arc<AlertStore>) -> Self {
        let alarm_threshold = config.alarm_threshold.max(1);
        Self {
            config: RegistryConfig {
                alarm_threshold,
                ..config
            },
            devices: RwLock::new(HashMap::new()),
            alerts,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(alerts: Arc<AlertStore>) -> Self {
        Self::new(RegistryConfig::default(), alerts)
    }

    pub fn alerts(&self) -> &Arc<AlertStore> {
        &self.alerts
    }

    pub fn alarm_threshold(&self) -> u32 {
        self.config.alarm_threshold
    }

    /// Apply one probe result. Returns the message emitted, if any.
    pub async fn update(&self, report: DeviceReport) -> Option<Message> {
        let report = classify(report);
        let now = Utc::now();

        let (transition, record) = {
            let mut devices = self.devices.write().await;
            match devices.get_mut(&report.device_id) {
                Some(record) => {
                    record.device_type = report.device_type;
                    record.display_name = report.display_name.clone();
                    record.details = report.details.clone();
                    let transition = apply(
                        record,
                        report.connected,
                        report.error.clone(),
                        now,
                        self.config.alarm_threshold,
                    );
                    (transition, record.clone())
                }
                None => {
                    let record = DeviceHealth {
                        device_id: report.device_id.clone(),
                        device_type: report.device_type,
                        display_name: report.display_name.clone(),
                        connected: report.connected,
                        last_check: now,
                        last_success: report.connected.then_some(now),
                        consecutive_failures: if report.connected { 0 } else { 1 },
                        last_error: if report.connected {
                            None
                        } else {
                            report.error.clone()
                        },
                        details: report.details.clone(),
                    };
                    let transition = if report.connected {
                        Transition::Discovered
                    } else if self.config.alarm_threshold == 1 {
                        Transition::Escalated
                    } else {
                        Transition::WentOffline
                    };
                    devices.insert(record.device_id.clone(), record.clone());
                    (transition, record)
                }
            }
        };

        debug!(
            "Device {} update: connected={} failures={} -> {:?}",
            record.device_id, record.connected, record.consecutive_failures, transition
        );

        self.emit(transition, &record, report.reason).await
    }

    async fn emit(
        &self,
        transition: Transition,
        record: &DeviceHealth,
        reason: Option<FailureReason>,
    ) -> Option<Message> {
        let name = &record.display_name;
        let error = record.last_error.clone().unwrap_or_default();
        let category = if record.device_type == DeviceType::System {
            Category::SystemEvent
        } else {
            Category::DeviceConnection
        };

        let mut details = Details::new();
        details.insert("device_type".to_string(), json!(record.device_type));

        let (severity, title, description) = match transition {
            Transition::StillOnline | Transition::StillOffline => return None,
            Transition::Discovered => {
                info!("Discovered {} device {}", record.device_type, record.device_id);
                (
                    Severity::Info,
                    format!("{} Discovered", name),
                    format!("New {} device detected: {}", record.device_type, name),
                )
            }
            Transition::WentOffline => {
                let reason = reason.unwrap_or(FailureReason::Unreachable);
                details.insert("error".to_string(), json!(error));
                details.insert("failure_reason".to_string(), json!(reason.as_str()));
                details.insert(
                    "consecutive_failures".to_string(),
                    json!(record.consecutive_failures),
                );
                if reason == FailureReason::InUseByOtherApp {
                    details.insert("in_use_by_other_app".to_string(), json!(true));
                }
                let description = match reason {
                    FailureReason::InUseByOtherApp => format!(
                        "{} is reachable but in use by another application. Close the other application to restore monitoring.",
                        name
                    ),
                    FailureReason::Timeout => format!(
                        "{} did not respond within {}s: {}",
                        name,
                        self.config.probe_timeout.as_secs(),
                        error
                    ),
                    FailureReason::FamilyUnavailable => {
                        format!("{} cannot be checked: {}", name, error)
                    }
                    FailureReason::Unreachable => {
                        format!("{} is not responding: {}", name, error)
                    }
                };
                (Severity::Warning, format!("{} Offline", name), description)
            }
            Transition::Escalated => {
                let offline_secs =
                    self.config.poll_interval.as_secs() * record.consecutive_failures as u64;
                details.insert("error".to_string(), json!(error));
                details.insert("error_count".to_string(), json!(record.consecutive_failures));
                details.insert("offline_duration_secs".to_string(), json!(offline_secs));
                warn!(
                    "Device {} reached {} consecutive failures",
                    record.device_id, record.consecutive_failures
                );
                (
                    Severity::Alarm,
                    format!("{} CRITICAL", name),
                    format!(
                        "{} has been offline for {} ({} consecutive failures). Last error: {}",
                        name,
                        format_duration(offline_secs),
                        record.consecutive_failures,
                        error
                    ),
                )
            }
            Transition::Reconnected { previous_failures } => {
                details.insert("previous_failures".to_string(), json!(previous_failures));
                (
                    Severity::Info,
                    format!("{} Reconnected", name),
                    format!(
                        "{} is back online after {} failed check(s)",
                        name, previous_failures
                    ),
                )
            }
        };

        Some(
            self.alerts
                .add(
                    severity,
                    category,
                    &record.device_id,
                    &title,
                    &description,
                    details,
                )
                .await,
        )
    }

    /// Read-only aggregate snapshot
    pub async fn summary(&self) -> HealthSummary {
        let devices = self.snapshot().await;
        let total = devices.len();
        let online = devices.iter().filter(|d| d.connected).count();

        let mut by_type: BTreeMap<DeviceType, TypeCounts> = BTreeMap::new();
        for device in &devices {
            let counts = by_type.entry(device.device_type).or_default();
            if device.connected {
                counts.online += 1;
            } else {
                counts.offline += 1;
            }
        }

        HealthSummary {
            total_devices: total,
            online,
            offline: total - online,
            health_percentage: health_percentage(online, total),
            by_type,
            devices,
        }
    }

    /// Devices currently not connected
    pub async fn offline(&self) -> Vec<DeviceHealth> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|d| !d.connected)
            .collect()
    }

    /// Health record for a single device
    pub async fn get(&self, device_id: &str) -> Option<DeviceHealth> {
        self.devices.read().await.get(device_id).cloned()
    }

    /// All records, ordered by device id
    pub async fn snapshot(&self) -> Vec<DeviceHealth> {
        let devices = self.devices.read().await;
        let mut all: Vec<DeviceHealth> = devices.values().cloned().collect();
        all.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        all
    }
}

fn format_duration(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{} min", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
