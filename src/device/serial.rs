use std::time::Instant;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, WriteHalf};
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{FramedRead, FramedWrite};

use super::{
    ConnectOutcome, DeviceContext, DeviceError, DeviceImpl, DeviceStatus, LightState, PowerState,
};
use crate::codec::{FirmwareLine, SerialCodec};
use crate::color::{Color, BLACK};
use crate::models;
use crate::registry::{enumerate_ports, select_port, Announcement, DeviceAddress, Firmware};

/// Serial link to an Adalight-style controller
pub struct SerialDevice {
    config: models::Serial,
    codec: SerialCodec,
    ctx: DeviceContext,
    name: String,
    port: Option<Port>,
}

/// Open port: framed writer and heartbeat reader task
struct Port {
    name: String,
    writer: FramedWrite<WriteHalf<SerialStream>, SerialCodec>,
    reader: JoinHandle<()>,
}

impl Drop for Port {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl SerialDevice {
    pub fn new(config: models::Serial, color: &models::ColorSettings, ctx: DeviceContext) -> Self {
        Self {
            name: format!("serial({})", config.port),
            codec: SerialCodec::from_settings(color),
            config,
            ctx,
            port: None,
        }
    }

    fn port_name(&self) -> Result<String, DeviceError> {
        if self.config.is_auto() {
            // Ports come and go, enumerate them on every attempt
            let available = enumerate_ports();
            debug!(ports = ?available, "enumerated serial ports");
            select_port(&available, &self.config.known_ports).ok_or(DeviceError::NoSerialPort)
        } else {
            Ok(self.config.port.clone())
        }
    }

    /// Record inbound traffic from the firmware on `port`
    ///
    /// The record is only created here, a port that never talks back is not tracked.
    async fn observe(ctx: &DeviceContext, port: &str, firmware: Option<Firmware>) {
        let now = Instant::now();

        let firmware = match firmware {
            Some(firmware) => firmware,
            None if ctx.registry.heartbeat(port, now).await.is_some() => return,
            // First status line of a firmware which does not announce itself
            None => Firmware::Full,
        };

        ctx.registry
            .observe(
                DeviceAddress::Serial(port.to_owned()),
                Announcement {
                    id: port.to_owned(),
                    address: None,
                    firmware,
                    version: None,
                },
                now,
            )
            .await;
    }

    async fn read_status<R>(ctx: DeviceContext, port: String, read: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = FramedRead::new(read, SerialCodec::default());

        let reason = loop {
            match lines.next().await {
                Some(Ok(Some(FirmwareLine { key, value }))) => {
                    trace!(port = %port, key = %key, value = %value, "firmware status");

                    match key.as_str() {
                        "firmware" => {
                            let firmware = value.parse().unwrap_or(Firmware::Full);
                            Self::observe(&ctx, &port, Some(firmware)).await;
                        }
                        "ver" | "version" => {
                            Self::observe(&ctx, &port, None).await;
                            ctx.registry.set_version(&port, value).await;
                        }
                        _ => Self::observe(&ctx, &port, None).await,
                    }
                }
                Some(Ok(None)) => Self::observe(&ctx, &port, None).await,
                Some(Err(error)) => break format!("read error: {}", error),
                None => break "port closed".to_owned(),
            }
        };

        ctx.status_tx
            .send(DeviceStatus::Disconnected(reason))
            .await
            .ok();
    }
}

#[async_trait]
impl DeviceImpl for SerialDevice {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(port = %self.config.port))]
    async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError> {
        self.port = None;

        let name = self.port_name()?;
        let stream = tokio_serial::new(&name, self.config.baud_rate)
            .timeout(self.config.connect_timeout())
            .open_native_async()?;

        let (read, write) = tokio::io::split(stream);

        let reader = tokio::spawn(Self::read_status(self.ctx.clone(), name.clone(), read));

        info!(port = %name, baud_rate = self.config.baud_rate, "opened serial port");

        let mut port = Port {
            name,
            writer: FramedWrite::new(write, self.codec.clone()),
            reader,
        };

        // Start from a blank strip, this also lets the firmware sync on the header
        let black = vec![BLACK; self.ctx.led_count.max(1)];
        port.writer.send(&black[..]).await?;

        self.name = format!("serial({})", port.name);
        self.port = Some(port);

        Ok(ConnectOutcome::Connected)
    }

    async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError> {
        let port = self.port.as_mut().ok_or(DeviceError::NotConnected)?;
        port.writer.send(led_data).await?;
        Ok(())
    }

    async fn set_state(&mut self, state: &LightState) -> Result<(), DeviceError> {
        // Serial firmwares have no state channel, brightness is applied in software
        self.codec.set_brightness(state.brightness);

        if let Some(port) = &mut self.port {
            port.writer.encoder_mut().set_brightness(state.brightness);

            if state.state == PowerState::Off {
                let black = vec![BLACK; self.ctx.led_count.max(1)];
                port.writer.send(&black[..]).await?;
            }
        }

        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(port) = self.port.take() {
            info!(port = %port.name, "closing serial port");
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::models::RegistrySettings;
    use crate::registry::Registry;

    fn context() -> (DeviceContext, mpsc::Receiver<DeviceStatus>) {
        let (status_tx, status_rx) = mpsc::channel(8);
        let (command_tx, _) = mpsc::channel(8);

        (
            DeviceContext {
                registry: Registry::new(&RegistrySettings::default()),
                status_tx,
                command_tx,
                config: RegistrySettings::default(),
                led_count: 10,
            },
            status_rx,
        )
    }

    #[tokio::test]
    async fn status_lines_survive_boot_noise() {
        let (ctx, mut status_rx) = context();
        let registry = ctx.registry.clone();

        let input: &[u8] = b"\xff\xfe\nfirmware:light\nver:1.2\n";
        SerialDevice::read_status(ctx, "/dev/ttyUSB0".to_owned(), input).await;

        let record = registry.snapshot().await.remove(0);
        assert_eq!(record.firmware, Firmware::Light);
        assert_eq!(record.version.as_deref(), Some("1.2"));
        assert_eq!(
            record.address,
            DeviceAddress::Serial("/dev/ttyUSB0".to_owned())
        );

        assert_eq!(
            status_rx.recv().await,
            Some(DeviceStatus::Disconnected("port closed".to_owned()))
        );
    }

    #[tokio::test]
    async fn silent_ports_are_not_tracked() {
        let (ctx, _status_rx) = context();
        let registry = ctx.registry.clone();

        let input: &[u8] = b"";
        SerialDevice::read_status(ctx, "/dev/ttyACM0".to_owned(), input).await;
        assert!(registry.snapshot().await.is_empty());

        // Any line registers a firmware which does not announce itself
        let (ctx, _status_rx) = context();
        let registry = ctx.registry.clone();

        let input: &[u8] = b"Ada\n";
        SerialDevice::read_status(ctx, "/dev/ttyACM0".to_owned(), input).await;
        let records = registry.snapshot().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].firmware, Firmware::Full);
    }
}
