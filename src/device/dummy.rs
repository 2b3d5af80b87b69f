use std::fmt::Write;

use async_trait::async_trait;

use super::{ConnectOutcome, DeviceError, DeviceImpl, LightState};
use crate::color::Color;
use crate::models;

/// Logs frames instead of sending them anywhere
pub struct DummyDevice {
    mode: models::DummyDeviceMode,
    ansi_buf: String,
}

impl DummyDevice {
    pub fn new(config: &models::Dummy) -> Self {
        Self {
            mode: config.mode,
            ansi_buf: String::new(),
        }
    }

    fn render_ansi(&mut self, led_data: &[Color]) -> Result<&str, DeviceError> {
        self.ansi_buf.clear();

        for led in led_data {
            write!(
                &mut self.ansi_buf,
                "\x1B[38;2;{red};{green};{blue}m█",
                red = led.red,
                green = led.green,
                blue = led.blue
            )?;
        }

        write!(&mut self.ansi_buf, "\x1B[0m")?;
        Ok(&self.ansi_buf)
    }
}

#[async_trait]
impl DeviceImpl for DummyDevice {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError> {
        Ok(ConnectOutcome::Connected)
    }

    async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError> {
        match self.mode {
            models::DummyDeviceMode::Text => {
                for (i, led) in led_data.iter().enumerate() {
                    info!(
                        led = %format_args!("{:3}", i),
                        red = %format_args!("{:3}", led.red),
                        green = %format_args!("{:3}", led.green),
                        blue = %format_args!("{:3}", led.blue),
                    );
                }
            }
            models::DummyDeviceMode::Ansi => {
                let line = self.render_ansi(led_data)?;
                info!("{}", line);
            }
        }

        Ok(())
    }

    async fn set_state(&mut self, state: &LightState) -> Result<(), DeviceError> {
        info!(state = ?state.state, brightness = state.brightness, effect = %state.effect, "light state");
        Ok(())
    }

    async fn disconnect(&mut self) {}
}
