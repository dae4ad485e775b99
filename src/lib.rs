pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod supervisor;

pub use config::AppConfig;
pub use domain::{
    Category, DeviceHealth, DeviceReport, DeviceType, Details, FailureReason, Message,
    MessageFilter, Severity,
};
pub use error::{DevwatchError, Result};
pub use services::{HealthReport, HealthServer, HealthStatus};
pub use supervisor::{
    AlertStore, AlertStoreConfig, Availability, DeviceRegistry, FamilyOutcome, HealthSummary,
    MetricsSnapshot, ProbeAdapter, RegistryConfig, Supervisor, SupervisorConfig,
};
