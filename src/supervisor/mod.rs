//! Device supervision
//!
//! - Alert store: bounded buffer of severity-tagged messages
//! - Alert log: one JSON line per new message on the `devwatch::alerts` target
//! - Registry: per-device health records and the online/offline state machine
//! - Probe: the adapter contract each device family implements
//! - Poller: the periodic, fault-isolated probe loop

pub mod alert_log;
pub mod alert_store;
pub mod poller;
pub mod probe;
pub mod registry;

pub use alert_log::{alert_line_layer, is_alert_event, ALERT_TARGET};
pub use alert_store::{AlertStore, AlertStoreConfig, MetricsSnapshot, SeverityCounts};
pub use poller::{FamilyOutcome, PollerStats, Supervisor, SupervisorConfig};
pub use probe::{Availability, ProbeAdapter};
pub use registry::{DeviceRegistry, HealthSummary, RegistryConfig, Transition, TypeCounts};
