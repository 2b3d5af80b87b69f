//! Downstream device registry
//!
//! Tracks every device heard from, over serial status lines or network announces, and
//! decides which ones are part of the routing table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::models::RegistrySettings;

mod discovery;
pub use discovery::*;

mod link;
pub use link::*;

mod record;
pub use record::*;

/// What an observation changed in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    New,
    /// A stale device came back
    Readmitted,
    Refreshed,
}

/// Result of a staleness sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Devices removed from the routing table by this sweep
    pub stale: Vec<String>,
    /// Devices dropped from the registry
    pub forgotten: Vec<String>,
    /// Most recent traffic from any known device
    pub last_activity: Option<Instant>,
}

#[derive(Clone)]
pub struct Registry(Arc<RwLock<RegistryData>>);

struct RegistryData {
    records: HashMap<String, DeviceRecord>,
    stale_timeout: Duration,
    forget_timeout: Duration,
}

impl Registry {
    pub fn new(settings: &RegistrySettings) -> Self {
        Self(Arc::new(RwLock::new(RegistryData {
            records: HashMap::new(),
            stale_timeout: settings.stale_timeout(),
            forget_timeout: settings.forget_timeout(),
        })))
    }

    /// Record traffic from a device, creating its record if needed
    pub async fn observe(
        &self,
        address: DeviceAddress,
        announcement: Announcement,
        now: Instant,
    ) -> Observation {
        let mut data = self.0.write().await;

        if let Some(record) = data.records.get_mut(&announcement.id) {
            let readmitted = !record.active;

            record.touch(now);
            record.address = address;
            record.firmware = announcement.firmware;
            if announcement.version.is_some() {
                record.version = announcement.version;
            }

            if readmitted {
                info!(id = %record.id, address = %record.address, "device is back");
                Observation::Readmitted
            } else {
                Observation::Refreshed
            }
        } else {
            let record = DeviceRecord::new(address, announcement, now);
            info!(id = %record.id, address = %record.address, firmware = %record.firmware, "discovered device");
            data.records.insert(record.id.clone(), record);
            Observation::New
        }
    }

    /// Refresh a known device without changing its description
    pub async fn heartbeat(&self, id: &str, now: Instant) -> Option<Observation> {
        let mut data = self.0.write().await;
        let record = data.records.get_mut(id)?;
        let readmitted = !record.active;
        record.touch(now);

        Some(if readmitted {
            Observation::Readmitted
        } else {
            Observation::Refreshed
        })
    }

    pub async fn set_version(&self, id: &str, version: String) {
        if let Some(record) = self.0.write().await.records.get_mut(id) {
            record.version = Some(version);
        }
    }

    /// Deactivate stale devices and forget old ones
    pub async fn sweep(&self, now: Instant) -> SweepReport {
        let mut data = self.0.write().await;
        let stale_timeout = data.stale_timeout;
        let forget_timeout = data.forget_timeout;
        let mut report = SweepReport::default();

        data.records.retain(|id, record| {
            let age = record.age(now);

            if age > forget_timeout {
                info!(id = %id, "forgetting device");
                report.forgotten.push(id.clone());
                return false;
            }

            if record.active && age > stale_timeout {
                warn!(id = %id, age = ?age, "device went stale");
                record.active = false;
                report.stale.push(id.clone());
            }

            true
        });

        report.last_activity = data.records.values().map(|record| record.last_seen).max();
        report
    }

    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<_> = self.0.read().await.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Whether the device with this id or network address is routed
    ///
    /// `address` may carry a port, as satellite addresses do. Returns `None` for devices
    /// which never announced themselves.
    pub async fn is_active(&self, address: &str) -> Option<bool> {
        let host = host_of(address);

        self.0
            .read()
            .await
            .records
            .values()
            .find(|record| {
                record.id == address
                    || matches!(&record.address, DeviceAddress::Network(known) if known == address || known == host)
            })
            .map(|record| record.active)
    }

    /// Firmware of the most recently seen active device
    pub async fn primary_firmware(&self) -> Option<Firmware> {
        self.0
            .read()
            .await
            .records
            .values()
            .filter(|record| record.active)
            .max_by_key(|record| record.last_seen)
            .map(|record| record.firmware)
    }
}

/// Host part of a `host:port` address
fn host_of(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => {
            host.trim_start_matches('[').trim_end_matches(']')
        }
        _ => address,
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").finish()
    }
}
