use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parse_display::Display;
use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumString, IntoStaticStr};

/// Where a device can be reached
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize)]
pub enum DeviceAddress {
    #[display("serial:{0}")]
    Serial(String),
    #[display("net:{0}")]
    Network(String),
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Firmware {
    /// Firmware parsing the chunked JSON stream
    Full,
    /// Firmware without JSON support, fed with raw messages
    Light,
}

impl Default for Firmware {
    fn default() -> Self {
        Self::Full
    }
}

/// Device advertisement, from a network announce or a serial status line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Announcement {
    /// Device identity: MAC address or serial port name
    #[serde(alias = "mac", alias = "MAC")]
    pub id: String,
    #[serde(default, alias = "ip")]
    pub address: Option<String>,
    #[serde(default)]
    pub firmware: Firmware,
    #[serde(default, alias = "ver")]
    pub version: Option<String>,
}

/// Known downstream device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    pub id: String,
    pub address: DeviceAddress,
    pub firmware: Firmware,
    pub version: Option<String>,
    /// Monotonic time of the last inbound traffic
    #[serde(skip)]
    pub last_seen: Instant,
    pub last_seen_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    /// Whether the device is part of the routing table
    pub active: bool,
}

impl DeviceRecord {
    pub fn new(address: DeviceAddress, announcement: Announcement, now: Instant) -> Self {
        let wall = Utc::now();

        Self {
            id: announcement.id,
            address,
            firmware: announcement.firmware,
            version: announcement.version,
            last_seen: now,
            last_seen_at: wall,
            first_seen_at: wall,
            active: true,
        }
    }

    /// Record inbound traffic, `last_seen` never moves backwards
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }

        self.last_seen_at = Utc::now();
        self.active = true;
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_announcement() {
        let announcement: Announcement = serde_json::from_str(
            r#"{"mac":"AA:BB:CC:00:11:22","ip":"192.168.1.50","firmware":"light","ver":"5.1.0"}"#,
        )
        .unwrap();

        assert_eq!(announcement.id, "AA:BB:CC:00:11:22");
        assert_eq!(announcement.address.as_deref(), Some("192.168.1.50"));
        assert_eq!(announcement.firmware, Firmware::Light);
        assert_eq!(announcement.version.as_deref(), Some("5.1.0"));

        let minimal: Announcement = serde_json::from_str(r#"{"id":"desk"}"#).unwrap();
        assert_eq!(minimal.firmware, Firmware::Full);
    }

    #[test]
    fn last_seen_is_monotonic() {
        let now = Instant::now();
        let mut record = DeviceRecord::new(
            DeviceAddress::Serial("/dev/ttyUSB0".to_owned()),
            Announcement {
                id: "/dev/ttyUSB0".to_owned(),
                address: None,
                firmware: Firmware::Full,
                version: None,
            },
            now + Duration::from_secs(5),
        );

        record.touch(now);
        assert_eq!(record.last_seen, now + Duration::from_secs(5));
        assert_eq!(record.age(now), Duration::from_secs(0));
        assert_eq!(record.address.to_string(), "serial:/dev/ttyUSB0");
        assert_eq!("LIGHT".parse::<Firmware>().ok(), Some(Firmware::Light));
    }
}
