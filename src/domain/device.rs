use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open diagnostic map carried by device reports and messages
pub type Details = serde_json::Map<String, serde_json::Value>;

/// Device family / type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Camera,
    Plug,
    Light,
    Bridge,
    Weather,
    Doorbell,
    /// Synthetic entries standing in for a whole family
    System,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Camera => "camera",
            DeviceType::Plug => "plug",
            DeviceType::Light => "light",
            DeviceType::Bridge => "bridge",
            DeviceType::Weather => "weather",
            DeviceType::Doorbell => "doorbell",
            DeviceType::System => "system",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a device is considered not connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Transport-level failure reported by the probe
    Unreachable,
    /// Reachable, but exclusively held by another local application
    InUseByOtherApp,
    /// The family probe did not answer within its timeout
    Timeout,
    /// The family's client could not be constructed
    FamilyUnavailable,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Unreachable => "unreachable",
            FailureReason::InUseByOtherApp => "in_use_by_other_app",
            FailureReason::Timeout => "timeout",
            FailureReason::FamilyUnavailable => "family_unavailable",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One device's result from a family probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceReport {
    pub device_id: String,
    pub device_type: DeviceType,
    pub display_name: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Details,
    /// Set by the supervisor for synthetic failures; probes usually leave it empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl DeviceReport {
    /// A reachable device
    pub fn online(device_id: &str, device_type: DeviceType, display_name: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            device_type,
            display_name: display_name.to_string(),
            connected: true,
            error: None,
            details: Details::new(),
            reason: None,
        }
    }

    /// An unreachable device
    pub fn offline(
        device_id: &str,
        device_type: DeviceType,
        display_name: &str,
        error: &str,
    ) -> Self {
        Self {
            connected: false,
            error: Some(error.to_string()),
            ..Self::online(device_id, device_type, display_name)
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_reason(mut self, reason: FailureReason) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Id of the synthetic device that represents a whole family
    pub fn family_device_id(family: &str) -> String {
        format!("system_{}", family)
    }

    /// Synthetic report for a family that could not be probed at all
    pub fn family_failure(family: &str, reason: FailureReason, error: &str) -> Self {
        Self::offline(
            &Self::family_device_id(family),
            DeviceType::System,
            &format!("{} integration", family),
            error,
        )
        .with_reason(reason)
        .with_detail("family", family)
    }

    /// Synthetic report for a family that probed successfully again
    pub fn family_recovered(family: &str) -> Self {
        Self::online(
            &Self::family_device_id(family),
            DeviceType::System,
            &format!("{} integration", family),
        )
        .with_detail("family", family)
    }
}

/// Health record for one monitored device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceHealth {
    pub device_id: String,
    pub device_type: DeviceType,
    pub display_name: String,
    pub connected: bool,
    pub last_check: DateTime<Utc>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub details: Details,
}
