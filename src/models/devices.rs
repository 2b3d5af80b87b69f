use std::time::Duration;

use derive_more::From;
use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use validator::Validate;

use super::default_false;

/// Serial port name that triggers port enumeration
pub const AUTO_PORT: &str = "AUTO";

fn default_serial_port() -> String {
    AUTO_PORT.to_owned()
}

fn default_baud_rate() -> u32 {
    500_000
}

fn default_connect_timeout_ms() -> u32 {
    2000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Serial {
    /// Port name, or `AUTO` to pick one of the available ports
    #[serde(default = "default_serial_port")]
    #[validate(length(min = 1))]
    pub port: String,
    /// Port names preferred when `port` is `AUTO`
    #[serde(default)]
    pub known_ports: Vec<String>,
    #[serde(default = "default_baud_rate")]
    #[validate(range(min = 9600))]
    pub baud_rate: u32,
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u32,
}

impl Serial {
    pub fn is_auto(&self) -> bool {
        self.port.eq_ignore_ascii_case(AUTO_PORT)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms as _)
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            known_ports: Vec::new(),
            baud_rate: default_baud_rate(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_base_topic() -> String {
    "lights/lumistream".to_owned()
}

fn default_keep_alive_secs() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Mqtt {
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Client identifier, defaults to one derived from the host name
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_base_topic")]
    #[validate(length(min = 1))]
    pub base_topic: String,
    #[serde(default = "default_keep_alive_secs")]
    #[validate(range(min = 5))]
    pub keep_alive_secs: u32,
}

impl Mqtt {
    pub fn topic(&self, leaf: &str) -> String {
        format!("{}/{}", self.base_topic.trim_end_matches('/'), leaf)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Udp {
    /// Target device, as `host:port`
    #[validate(length(min = 1))]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Tcp {
    #[validate(length(min = 1))]
    pub address: String,
    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u32,
}

impl Tcp {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms as _)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DummyDeviceMode {
    Text,
    Ansi,
}

impl Default for DummyDeviceMode {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Dummy {
    #[serde(default)]
    pub mode: DummyDeviceMode,
}

/// Downstream transport used by the consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr, From)]
#[serde(rename_all = "lowercase", tag = "type")]
#[strum(serialize_all = "lowercase")]
pub enum Transport {
    Serial(Serial),
    Mqtt(Mqtt),
    Udp(Udp),
    Tcp(Tcp),
    Dummy(Dummy),
}

impl Default for Transport {
    fn default() -> Self {
        Self::Serial(Serial::default())
    }
}

impl Validate for Transport {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Transport::Serial(device) => device.validate(),
            Transport::Mqtt(device) => device.validate(),
            Transport::Udp(device) => device.validate(),
            Transport::Tcp(device) => device.validate(),
            Transport::Dummy(device) => device.validate(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamEncoding {
    /// Chunked `{"lednum", "part", "stream"}` objects
    Json,
    /// Single comma-separated message for light firmwares
    Raw,
    /// Raw for light firmwares, JSON otherwise
    Auto,
}

impl Default for StreamEncoding {
    fn default() -> Self {
        Self::Json
    }
}

/// Screen area driven by a satellite
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SatelliteZone {
    Top,
    TopLeft,
    TopCenter,
    TopRight,
    Left,
    Right,
    Bottom,
    BottomLeft,
    BottomCenter,
    BottomRight,
    Entire,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Satellite {
    /// Satellite address, as `host:port`
    #[validate(length(min = 1))]
    pub address: String,
    pub zone: SatelliteZone,
    /// LED count of the satellite strip, defaults to the size of its zone
    #[serde(default)]
    #[validate(range(min = 1))]
    pub led_count: Option<u32>,
    #[serde(default = "default_false")]
    pub reverse: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Network {
    pub encoding: StreamEncoding,
    #[validate(nested)]
    pub satellites: Vec<Satellite>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mqtt_topics() {
        let mqtt: Mqtt = toml::from_str(
            r#"
            host = "broker.local"
            base_topic = "lights/desk/"
            "#,
        )
        .unwrap();

        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.topic("stream"), "lights/desk/stream");
    }

    #[test]
    fn transport_tag() {
        let transport: Transport = toml::from_str(
            r#"
            type = "udp"
            address = "10.0.0.2:4210"
            "#,
        )
        .unwrap();

        assert_eq!(<&'static str>::from(&transport), "udp");
        assert!(transport.validate().is_ok());

        let transport: Transport = Dummy::default().into();
        assert_eq!(<&'static str>::from(&transport), "dummy");
    }
}
