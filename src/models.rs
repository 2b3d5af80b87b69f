use std::path::Path;
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

mod capture;
pub use capture::*;

mod devices;
pub use devices::*;

mod layout;
pub use layout::*;

pub use crate::color::{Color, ColorOrder};

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ColorSettings {
    #[validate(range(min = 0.1, max = 5.0))]
    pub gamma: f32,
    pub brightness: u8,
    #[validate(range(min = 10, max = 120))]
    pub white_temperature: u32,
    pub color_order: ColorOrder,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            gamma: crate::color::DEFAULT_GAMMA,
            brightness: 255,
            white_temperature: 65,
            color_order: ColorOrder::Rgb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct PowerSaving {
    pub enable: bool,
    /// Maximum per-channel difference for two frames to be considered identical
    pub tolerance: u8,
    /// Number of identical frames after which forwarding is suppressed
    #[validate(range(min = 1))]
    pub frames: u32,
}

impl Default for PowerSaving {
    fn default() -> Self {
        Self {
            enable: false,
            tolerance: 2,
            frames: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
#[validate(schema(
    function = "validate_timeouts",
    message = "timeouts must increase from stale to lost to forget"
))]
pub struct RegistrySettings {
    #[validate(range(min = 1))]
    pub stale_timeout_secs: u32,
    #[validate(range(min = 1))]
    pub lost_timeout_secs: u32,
    #[validate(range(min = 1))]
    pub forget_timeout_secs: u32,
    #[validate(range(min = 1))]
    pub reconnect_interval_secs: u32,
    #[validate(range(min = 10))]
    pub sweep_interval_ms: u32,
    #[serde(default = "default_true")]
    pub restart_on_lost: bool,
}

impl RegistrySettings {
    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs as _)
    }

    pub fn lost_timeout(&self) -> Duration {
        Duration::from_secs(self.lost_timeout_secs as _)
    }

    pub fn forget_timeout(&self) -> Duration {
        Duration::from_secs(self.forget_timeout_secs as _)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs as _)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms as _)
    }
}

fn validate_timeouts(settings: &RegistrySettings) -> Result<(), validator::ValidationError> {
    if settings.stale_timeout_secs >= settings.lost_timeout_secs
        || settings.lost_timeout_secs >= settings.forget_timeout_secs
    {
        return Err(validator::ValidationError::new("timeout_order"));
    }

    Ok(())
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            stale_timeout_secs: 15,
            lost_timeout_secs: 180,
            forget_timeout_secs: 600,
            reconnect_interval_secs: 10,
            sweep_interval_ms: 1000,
            restart_on_lost: true,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    #[validate(nested)]
    pub capture: Capture,
    #[validate(nested)]
    pub leds: LedLayout,
    #[validate(nested)]
    pub color: ColorSettings,
    #[validate(nested)]
    pub transport: Transport,
    #[validate(nested)]
    pub network: Network,
    #[validate(nested)]
    pub power_saving: PowerSaving,
    #[validate(nested)]
    pub registry: RegistrySettings,
}

impl Config {
    /// Read and validate a configuration file
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let full = std::fs::read_to_string(path)?;
        Self::from_toml(&full)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Total number of LEDs driven by this configuration
    pub fn led_count(&self) -> usize {
        self.leds.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_config() {
        let config = Config::from_toml(
            r#"
            [capture]
            method = "x11"
            screen_width = 2560
            screen_height = 1440
            framerate = 60

            [leds]
            top = 20
            left = 10
            right = 10
            bottom_row = 20
            group_by = 2
            aspect_ratio = "letterbox"

            [transport]
            type = "serial"
            port = "AUTO"
            baud_rate = 115200

            [network]
            encoding = "raw"

            [[network.satellites]]
            address = "192.168.1.20:4210"
            zone = "top_left"
            led_count = 12
            "#,
        )
        .expect("failed to parse config");

        assert_eq!(config.capture.method, CaptureMethod::X11);
        assert_eq!(config.capture.framerate, 60);
        assert_eq!(config.leds.group_by, 2);
        assert_eq!(config.leds.aspect_ratio, AspectRatio::Letterbox);
        assert_eq!(config.led_count(), 60);
        assert_eq!(config.network.encoding, StreamEncoding::Raw);
        assert_eq!(config.network.satellites[0].zone, SatelliteZone::TopLeft);

        match config.transport {
            Transport::Serial(serial) => {
                assert!(serial.is_auto());
                assert_eq!(serial.baud_rate, 115200);
            }
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn rejects_empty_layout() {
        let result = Config::from_toml(
            r#"
            [leds]
            top = 0
            left = 0
            right = 0
            bottom_row = 0
            "#,
        );

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_out_of_range_gamma() {
        let result = Config::from_toml(
            r#"
            [color]
            gamma = 9.0
            "#,
        );

        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn dump_and_reload() {
        let config = Config::default();
        let dumped = config.to_string().expect("failed to serialize config");
        let reloaded = Config::from_toml(&dumped).expect("failed to reload config");
        assert_eq!(config, reloaded);
    }

    #[test]
    fn registry_timeouts_are_ordered() {
        assert!(RegistrySettings::default().validate().is_ok());

        let lost_before_stale = Config::from_toml(
            r#"
            [registry]
            stale_timeout_secs = 30
            lost_timeout_secs = 20
            "#,
        );
        assert!(matches!(lost_before_stale, Err(ConfigError::Validation(_))));

        let forget_before_lost = Config::from_toml(
            r#"
            [registry]
            lost_timeout_secs = 700
            "#,
        );
        assert!(matches!(forget_before_lost, Err(ConfigError::Validation(_))));
    }
}
