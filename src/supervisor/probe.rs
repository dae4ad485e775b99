//! Probe adapter contract
//!
//! One adapter per device family. The supervisor never knows how an
//! adapter reaches its devices; it only consumes the reports.

use crate::domain::DeviceReport;
use crate::error::Result;
use async_trait::async_trait;

/// Whether an adapter's client could be constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// The client cannot run at all (missing library, bad configuration)
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Checks every device of one family
#[async_trait]
pub trait ProbeAdapter: Send + Sync {
    /// Family name, e.g. "camera"
    fn family(&self) -> &str;

    /// Capability check, decided when the adapter is constructed
    fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Obtain the client handle the probe needs. Called before every probe
    /// under the supervisor's timeout; an error reports the family unavailable.
    async fn acquire(&self) -> Result<()> {
        Ok(())
    }

    /// Probe all devices of the family
    async fn probe(&self) -> Result<Vec<DeviceReport>>;
}
