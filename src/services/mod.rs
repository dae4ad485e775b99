pub mod exposition;
pub mod health;

pub use exposition::{health_report, loki_lines, prometheus_text, HealthReport, HealthStatus};
pub use health::{router, ApiState, HealthServer};
