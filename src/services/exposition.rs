//! Exposition of supervisor state
//!
//! Read-only renderers over registry and alert store snapshots:
//! a JSON health report, Loki-style log lines and Prometheus text.

use crate::domain::MessageFilter;
use crate::supervisor::{AlertStore, DeviceRegistry, HealthSummary, MetricsSnapshot, PollerStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Overall status derived from device and alarm state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All devices online
    Healthy,
    /// Some devices offline, no open alarms
    Degraded,
    /// At least one unacknowledged alarm
    Unhealthy,
}

impl HealthStatus {
    pub fn from_state(summary: &HealthSummary, metrics: &MetricsSnapshot) -> Self {
        if metrics.unacknowledged_alarms > 0 {
            HealthStatus::Unhealthy
        } else if summary.offline > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Numeric gauge value (1=healthy, 0=degraded, -1=unhealthy)
    pub fn gauge(&self) -> i8 {
        match self {
            HealthStatus::Healthy => 1,
            HealthStatus::Degraded => 0,
            HealthStatus::Unhealthy => -1,
        }
    }
}

/// JSON health report for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub devices: HealthSummary,
    pub alerts: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<PollerStats>,
}

/// Build the health report from current snapshots
pub async fn health_report(registry: &DeviceRegistry, stats: Option<PollerStats>) -> HealthReport {
    let devices = registry.summary().await;
    let alerts = registry.alerts().metrics().await;
    HealthReport {
        status: HealthStatus::from_state(&devices, &alerts),
        timestamp: Utc::now(),
        devices,
        alerts,
        supervisor: stats,
    }
}

/// Newline-delimited Loki lines for matching messages, oldest first
pub async fn loki_lines(store: &AlertStore, filter: &MessageFilter) -> String {
    let mut messages = store.query(filter).await;
    messages.reverse();

    let mut out = String::new();
    for message in &messages {
        out.push_str(&message.log_line());
        out.push('\n');
    }
    out
}

/// Escape a Prometheus label value
fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Full Prometheus payload: alert metrics, device gauges, supervisor counters
pub async fn prometheus_text(registry: &DeviceRegistry, stats: Option<&PollerStats>) -> String {
    let summary = registry.summary().await;
    let metrics = registry.alerts().metrics().await;
    let status = HealthStatus::from_state(&summary, &metrics);

    let mut out = metrics.to_prometheus();

    let _ = write!(
        out,
        r#"
# HELP devwatch_up Health status (1=healthy, 0=degraded, -1=unhealthy)
# TYPE devwatch_up gauge
devwatch_up {}

# HELP devwatch_devices Known devices by connectivity state
# TYPE devwatch_devices gauge
devwatch_devices{{state="online"}} {}
devwatch_devices{{state="offline"}} {}

# HELP devwatch_device_health_percentage Share of devices online
# TYPE devwatch_device_health_percentage gauge
devwatch_device_health_percentage {}
"#,
        status.gauge(),
        summary.online,
        summary.offline,
        summary.health_percentage,
    );

    if !summary.devices.is_empty() {
        out.push_str(
            "\n# HELP devwatch_device_up Device connectivity (1=online, 0=offline)\n# TYPE devwatch_device_up gauge\n",
        );
        for device in &summary.devices {
            let _ = writeln!(
                out,
                "devwatch_device_up{{device_id=\"{}\",device_type=\"{}\"}} {}",
                escape_label(&device.device_id),
                device.device_type,
                u8::from(device.connected)
            );
        }

        out.push_str(
            "\n# HELP devwatch_device_consecutive_failures Current consecutive probe failures\n# TYPE devwatch_device_consecutive_failures gauge\n",
        );
        for device in &summary.devices {
            let _ = writeln!(
                out,
                "devwatch_device_consecutive_failures{{device_id=\"{}\",device_type=\"{}\"}} {}",
                escape_label(&device.device_id),
                device.device_type,
                device.consecutive_failures
            );
        }
    }

    if let Some(stats) = stats {
        let _ = write!(
            out,
            r#"
# HELP devwatch_supervisor_ticks_total Probe cycles completed
# TYPE devwatch_supervisor_ticks_total counter
devwatch_supervisor_ticks_total {}

# HELP devwatch_supervisor_family_errors_total Family probes skipped after unexpected errors
# TYPE devwatch_supervisor_family_errors_total counter
devwatch_supervisor_family_errors_total {}

# HELP devwatch_supervisor_last_tick_duration_ms Duration of the last probe cycle
# TYPE devwatch_supervisor_last_tick_duration_ms gauge
devwatch_supervisor_last_tick_duration_ms {}
"#,
            stats.ticks, stats.family_errors, stats.last_tick_duration_ms,
        );
    }

    out
}
