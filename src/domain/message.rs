use super::device::Details;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "warning", alias = "WARN", alias = "warn")]
    Warning,
    #[serde(alias = "alarm")]
    Alarm,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Alarm => "ALARM",
        }
    }

    /// Log level name for log pipelines
    pub fn log_level(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Alarm => "error",
        }
    }

    /// Prometheus label value
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Alarm => "alarm",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ALARM" => Ok(Severity::Alarm),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Message category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DeviceConnection,
    DeviceStatus,
    SensorReading,
    EnergyAlert,
    SecurityEvent,
    SystemEvent,
    MediaEvent,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DeviceConnection => "device_connection",
            Category::DeviceStatus => "device_status",
            Category::SensorReading => "sensor_reading",
            Category::EnergyAlert => "energy_alert",
            Category::SecurityEvent => "security_event",
            Category::SystemEvent => "system_event",
            Category::MediaEvent => "media_event",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device_connection" => Ok(Category::DeviceConnection),
            "device_status" => Ok(Category::DeviceStatus),
            "sensor_reading" => Ok(Category::SensorReading),
            "energy_alert" => Ok(Category::EnergyAlert),
            "security_event" => Ok(Category::SecurityEvent),
            "system_event" => Ok(Category::SystemEvent),
            "media_event" => Ok(Category::MediaEvent),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Alert / event message
///
/// Immutable once created except for the acknowledgement fields.
/// `ack_timestamp` is `Some` exactly when `acknowledged` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub category: Category,
    pub source: String,
    pub title: String,
    pub description: String,
    pub details: Details,
    pub acknowledged: bool,
    pub ack_timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Mark acknowledged. Returns false if it already was.
    pub(crate) fn acknowledge(&mut self, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.ack_timestamp = Some(at);
        true
    }

    /// Single-line JSON record for log pipelines (Loki)
    pub fn log_line(&self) -> String {
        json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "level": self.severity.log_level(),
            "category": self.category.as_str(),
            "source": self.source,
            "message": format!("{}: {}", self.title, self.description),
            "message_id": self.id,
            "acknowledged": self.acknowledged,
            "details": self.details,
            "labels": {
                "app": "devwatch",
                "severity": self.severity.label(),
                "category": self.category.as_str(),
                "source": self.source,
            },
        })
        .to_string()
    }
}

/// Filter for message queries. `None` fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFilter {
    pub severity: Option<Severity>,
    pub category: Option<Category>,
    pub source: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub acknowledged: Option<bool>,
    pub limit: Option<usize>,
}

impl MessageFilter {
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = Some(acknowledged);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, message: &Message) -> bool {
        if let Some(severity) = self.severity {
            if message.severity != severity {
                return false;
            }
        }
        if let Some(category) = self.category {
            if message.category != category {
                return false;
            }
        }
        if let Some(ref source) = self.source {
            if &message.source != source {
                return false;
            }
        }
        if let Some(since) = self.since {
            if message.timestamp < since {
                return false;
            }
        }
        if let Some(acknowledged) = self.acknowledged {
            if message.acknowledged != acknowledged {
                return false;
            }
        }
        true
    }
}
