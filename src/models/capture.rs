use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use validator::Validate;

use super::default_false;

/// Screen capture backend
///
/// The backends themselves live outside of this crate, the method only decides how the
/// producers are scheduled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptureMethod {
    /// Windows desktop duplication
    Dxgi,
    Gstreamer,
    X11,
    Pipewire,
    AvFoundation,
    /// Plain CPU copies, e.g. still images and test patterns
    Cpu,
}

impl CaptureMethod {
    /// Number of producers spawned per configured CPU thread
    pub fn executor_multiplier(&self) -> u32 {
        match self {
            CaptureMethod::Dxgi | CaptureMethod::Pipewire => 1,
            CaptureMethod::Gstreamer | CaptureMethod::AvFoundation => 2,
            CaptureMethod::X11 | CaptureMethod::Cpu => 3,
        }
    }

    /// Accelerated methods deliver frames on their own cadence and run as a single producer
    pub fn is_event_driven(&self) -> bool {
        matches!(self, CaptureMethod::Dxgi | CaptureMethod::Pipewire)
    }
}

impl Default for CaptureMethod {
    fn default() -> Self {
        Self::Cpu
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Capture {
    pub method: CaptureMethod,
    #[validate(range(min = 16))]
    pub screen_width: u32,
    #[validate(range(min = 16))]
    pub screen_height: u32,
    /// Target capture rate of every producer, in Hz
    #[validate(range(min = 1, max = 144))]
    pub framerate: u32,
    /// Number of CPU threads dedicated to capture
    #[validate(range(min = 1, max = 64))]
    pub threads: u32,
    /// Frames buffered between producers and the consumer
    #[validate(range(min = 1, max = 8))]
    pub slot_capacity: u32,
    /// Side of the sampling grid used for every LED
    #[validate(range(min = 1, max = 32))]
    pub sample_grid: u32,
    /// Distance to the sample area edges skipped by the sampler, in pixels
    pub skip_margin: u32,
    #[serde(default = "default_false")]
    pub autostart: bool,
}

impl Capture {
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.framerate.max(1) as u64)
    }

    /// Number of producer tasks to run for this configuration
    pub fn producer_count(&self) -> usize {
        if self.method.is_event_driven() {
            1
        } else {
            (self.threads * self.method.executor_multiplier()) as usize
        }
    }
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            method: CaptureMethod::default(),
            screen_width: 1920,
            screen_height: 1080,
            framerate: 30,
            threads: 1,
            slot_capacity: 1,
            sample_grid: 6,
            skip_margin: 10,
            autostart: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_count() {
        let mut capture = Capture {
            threads: 2,
            ..Default::default()
        };

        capture.method = CaptureMethod::Cpu;
        assert_eq!(capture.producer_count(), 6);

        capture.method = CaptureMethod::Gstreamer;
        assert_eq!(capture.producer_count(), 4);

        capture.method = CaptureMethod::Dxgi;
        assert_eq!(capture.producer_count(), 1);
    }

    #[test]
    fn frame_period() {
        let capture = Capture {
            framerate: 50,
            ..Default::default()
        };

        assert_eq!(capture.frame_period(), Duration::from_millis(20));
    }

    #[test]
    fn canonical_names() {
        assert_eq!(CaptureMethod::AvFoundation.to_string(), "av_foundation");
        assert_eq!("dxgi".parse::<CaptureMethod>().ok(), Some(CaptureMethod::Dxgi));
    }
}
