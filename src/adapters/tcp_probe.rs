//! TCP reachability probe
//!
//! Generic adapter for any device family whose devices expose a TCP port
//! (RTSP cameras, plug HTTP APIs, bridges). A device counts as connected
//! when a connection can be opened within the timeout.

use crate::config::FamilyConfig;
use crate::domain::{DeviceReport, DeviceType};
use crate::error::{DevwatchError, Result};
use crate::supervisor::{Availability, ProbeAdapter};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Target {
    id: String,
    name: String,
    addr: SocketAddr,
}

/// Probe adapter that checks TCP reachability of each configured device
pub struct TcpProbe {
    family: String,
    device_type: DeviceType,
    targets: Vec<Target>,
    availability: Availability,
    connect_timeout: Duration,
}

impl TcpProbe {
    /// Build from family configuration.
    ///
    /// Addresses must be `ip:port` literals. If any cannot be parsed the
    /// adapter is constructed as unavailable.
    pub fn new(config: &FamilyConfig, connect_timeout: Duration) -> Self {
        let mut targets = Vec::with_capacity(config.targets.len());
        let mut invalid = Vec::new();

        for target in &config.targets {
            match target.address.parse::<SocketAddr>() {
                Ok(addr) => targets.push(Target {
                    id: target.id.clone(),
                    name: target.name.clone(),
                    addr,
                }),
                Err(_) => invalid.push(format!("{} ({})", target.id, target.address)),
            }
        }

        let availability = if invalid.is_empty() {
            Availability::Available
        } else {
            let err = DevwatchError::InvalidTarget(invalid.join(", "));
            warn!("Family {}: {}", config.family, err);
            Availability::Unavailable(err.to_string())
        };

        Self {
            family: config.family.clone(),
            device_type: config.device_type,
            targets,
            availability,
            connect_timeout,
        }
    }

    async fn check(&self, target: &Target) -> DeviceReport {
        let started = Instant::now();
        let result = tokio::time::timeout(self.connect_timeout, TcpStream::connect(target.addr)).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let report = match result {
            Ok(Ok(_stream)) => DeviceReport::online(&target.id, self.device_type, &target.name)
                .with_detail("latency_ms", latency_ms),
            Ok(Err(e)) => DeviceReport::offline(
                &target.id,
                self.device_type,
                &target.name,
                &format!("connection failed: {}", e),
            ),
            Err(_) => DeviceReport::offline(
                &target.id,
                self.device_type,
                &target.name,
                &format!(
                    "connection timed out after {}ms",
                    self.connect_timeout.as_millis()
                ),
            ),
        };

        debug!(
            "TCP probe {} {} -> connected={}",
            target.id, target.addr, report.connected
        );
        report.with_detail("address", target.addr.to_string())
    }
}

#[async_trait]
impl ProbeAdapter for TcpProbe {
    fn family(&self) -> &str {
        &self.family
    }

    fn availability(&self) -> Availability {
        self.availability.clone()
    }

    async fn probe(&self) -> Result<Vec<DeviceReport>> {
        let checks = self.targets.iter().map(|target| self.check(target));
        Ok(futures::future::join_all(checks).await)
    }
}
