//! LED controller transports
//!
//! Every transport implements [DeviceImpl]. The [Device] wrapper owns the link state
//! machine and drives reconnections from the consumer loop, so the transport handle is
//! never replaced while a write is in progress.

use std::time::Instant;

use async_trait::async_trait;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::codec::{SatelliteMap, StreamEncoder, StreamError};
use crate::color::Color;
use crate::geometry::apply_orientation;
use crate::models::{self, Config, Orientation};
use crate::pipeline::FpsSnapshot;
use crate::registry::{Link, LinkState, Registry};

mod dummy;
mod mqtt;
mod network;
mod serial;

pub use network::SatelliteSender;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("no serial port available")]
    NoSerialPort,
    #[error("timed out connecting to {0}")]
    Timeout(String),
    #[error("cannot resolve {0}")]
    Resolve(String),
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("stream encoding error: {0}")]
    Stream(#[from] StreamError),
    #[error("lines codec error: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),
    #[error("format error: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("device is not connected")]
    NotConnected,
}

/// Outcome of a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// The transport confirms the connection later through [DeviceStatus]
    Pending,
}

/// Asynchronous transport notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Connected,
    Disconnected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

/// Light state pushed to the controller on connection and on changes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightState {
    pub state: PowerState,
    pub effect: String,
    pub brightness: u8,
    #[serde(rename = "whitetemp")]
    pub white_temperature: u32,
    #[serde(skip)]
    pub gamma: f32,
}

impl LightState {
    pub const STREAM_EFFECT: &'static str = "stream";
    pub const SOLID_EFFECT: &'static str = "solid";

    pub fn from_settings(color: &models::ColorSettings) -> Self {
        Self {
            state: PowerState::On,
            effect: Self::STREAM_EFFECT.to_owned(),
            brightness: color.brightness,
            white_temperature: color.white_temperature,
            gamma: color.gamma,
        }
    }
}

/// Commands received from the controller side
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemoteCommand {
    Start,
    Stop,
    Toggle,
    Off,
    Brightness { value: u8 },
    Solid { color: [u8; 3] },
    Screensaver { active: bool },
}

/// Shared endpoints handed to transports
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub registry: Registry,
    pub status_tx: mpsc::Sender<DeviceStatus>,
    pub command_tx: mpsc::Sender<RemoteCommand>,
    pub config: models::RegistrySettings,
    pub led_count: usize,
}

#[async_trait]
pub trait DeviceImpl: Send {
    fn name(&self) -> &str;

    /// Open the transport
    async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError>;

    /// Send a frame, in physical strip order
    ///
    /// The [Device] wrapper only forwards frames with the configured LED count.
    async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError>;

    /// Push the light state (power, brightness, gamma) to the controller
    async fn set_state(&mut self, state: &LightState) -> Result<(), DeviceError>;

    async fn publish_telemetry(&mut self, _fps: &FpsSnapshot) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Close the transport, a later call to [DeviceImpl::connect] must reopen it
    async fn disconnect(&mut self);
}

pub struct Device {
    inner: Box<dyn DeviceImpl>,
    link: Link,
    status_rx: mpsc::Receiver<DeviceStatus>,
    state: LightState,
    led_count: usize,
    orientation: Orientation,
    start_offset: i32,
    satellites: Option<(SatelliteSender, SatelliteMap)>,
    notified_error: bool,
    oriented: Vec<Color>,
}

impl Device {
    fn build_inner(
        transport: &models::Transport,
        color: &models::ColorSettings,
        network: &models::Network,
        ctx: DeviceContext,
    ) -> Result<Box<dyn DeviceImpl>, DeviceError> {
        let encoder = StreamEncoder::new(network.encoding, color.brightness);

        Ok(match transport {
            models::Transport::Serial(serial) => {
                Box::new(serial::SerialDevice::new(serial.clone(), color, ctx))
            }
            models::Transport::Mqtt(mqtt) => {
                Box::new(mqtt::MqttDevice::new(mqtt.clone(), encoder, ctx))
            }
            models::Transport::Udp(udp) => {
                Box::new(network::UdpDevice::new(udp.clone(), encoder, ctx))
            }
            models::Transport::Tcp(tcp) => {
                Box::new(network::TcpDevice::new(tcp.clone(), encoder, ctx))
            }
            models::Transport::Dummy(dummy) => Box::new(dummy::DummyDevice::new(dummy)),
        })
    }

    #[instrument(skip(config, registry, command_tx))]
    pub async fn new(
        config: &Config,
        registry: Registry,
        command_tx: mpsc::Sender<RemoteCommand>,
    ) -> Result<Self, DeviceError> {
        let (status_tx, status_rx) = mpsc::channel(8);
        let ctx = DeviceContext {
            registry,
            status_tx,
            command_tx,
            config: config.registry.clone(),
            led_count: config.led_count(),
        };

        let inner = Self::build_inner(&config.transport, &config.color, &config.network, ctx)?;

        let satellites = if config.network.satellites.is_empty() {
            None
        } else {
            Some((
                SatelliteSender::new(StreamEncoder::new(
                    config.network.encoding,
                    config.color.brightness,
                )),
                SatelliteMap::default(),
            ))
        };

        let transport: &'static str = (&config.transport).into();
        info!(
            transport,
            leds = config.led_count(),
            satellites = config.network.satellites.len(),
            "created device"
        );

        Ok(Self::with_impl(inner, status_rx, config, satellites))
    }

    pub(crate) fn with_impl(
        inner: Box<dyn DeviceImpl>,
        status_rx: mpsc::Receiver<DeviceStatus>,
        config: &Config,
        satellites: Option<(SatelliteSender, SatelliteMap)>,
    ) -> Self {
        Self {
            inner,
            link: Link::new(&config.registry),
            status_rx,
            state: LightState::from_settings(&config.color),
            led_count: config.led_count(),
            orientation: config.leds.orientation,
            start_offset: config.leds.start_offset,
            satellites,
            notified_error: false,
            oriented: Vec::with_capacity(config.led_count()),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn light_state(&self) -> &LightState {
        &self.state
    }

    /// Update the satellite ranges from the active LED matrix
    pub fn set_satellite_map(&mut self, map: SatelliteMap) {
        if let Some((_, current)) = &mut self.satellites {
            *current = map;
        }
    }

    pub fn has_satellites(&self) -> bool {
        self.satellites.is_some()
    }

    /// Skip satellites the registry considers stale
    ///
    /// Satellites which never announced themselves are always routed.
    pub async fn refresh_routing(&mut self, registry: &Registry) {
        if let Some((sender, map)) = &mut self.satellites {
            for slice in map.slices() {
                let address = &slice.satellite.address;
                let routed = registry.is_active(address).await != Some(false);
                sender.set_routed(address, routed);
            }
        }
    }

    /// Apply new color settings without reopening the transport
    pub async fn set_color(&mut self, color: &models::ColorSettings) -> Result<(), DeviceError> {
        let mut state = self.state.clone();
        state.brightness = color.brightness;
        state.white_temperature = color.white_temperature;
        state.gamma = color.gamma;
        self.set_state(state).await
    }

    fn report_error(&mut self, error: &DeviceError, context: &'static str) {
        if !self.notified_error {
            self.notified_error = true;
            warn!(device = %self.inner.name(), error = %error, "{}", context);
        } else {
            debug!(device = %self.inner.name(), error = %error, "{}", context);
        }
    }

    async fn on_connected(&mut self) {
        let first = self.link.connected();
        self.notified_error = false;

        info!(device = %self.inner.name(), first, "device connected");

        if first || self.state.state == PowerState::On {
            let state = self.state.clone();
            if let Err(error) = self.inner.set_state(&state).await {
                self.report_error(&error, "failed to push the initial state");
            }
        }
    }

    /// Reconnection tick: reopen disconnected transports and poke stale ones
    #[instrument(skip(self), fields(device = %self.inner.name(), state = %self.link.state()))]
    pub async fn supervise(&mut self) -> Option<LinkState> {
        if !self.link.needs_reconnect() {
            return None;
        }

        let previous = self.link.state();

        if previous == LinkState::Stale {
            // Soft reconnect: wake up the controllers with the current state
            let transition = self.link.connecting();
            let state = self.state.clone();
            if let Err(error) = self.inner.set_state(&state).await {
                self.report_error(&error, "soft reconnect failed");
            }

            return transition;
        }

        if previous == LinkState::Lost {
            self.inner.disconnect().await;
            self.link.disconnected();
        }

        self.link.connecting();

        match self.inner.connect().await {
            Ok(ConnectOutcome::Connected) => self.on_connected().await,
            Ok(ConnectOutcome::Pending) => {}
            Err(error) => {
                self.report_error(&error, "connection failed, retrying later");
                debug!(retries = self.link.retries(), "scheduling reconnection");
                self.link.disconnected();
            }
        }

        Some(self.link.state()).filter(|state| *state != previous)
    }

    /// Wait for the next transport notification
    pub async fn next_status(&mut self) -> DeviceStatus {
        match self.status_rx.recv().await {
            Some(status) => status,
            None => futures::future::pending().await,
        }
    }

    pub async fn handle_status(&mut self, status: DeviceStatus) -> Option<LinkState> {
        let previous = self.link.state();

        match status {
            DeviceStatus::Connected => self.on_connected().await,
            DeviceStatus::Disconnected(reason) => {
                if previous != LinkState::Disconnected {
                    warn!(device = %self.inner.name(), reason = %reason, "device disconnected");
                }

                self.link.disconnected();
            }
        }

        Some(self.link.state()).filter(|state| *state != previous)
    }

    /// Update the link health from the registry
    pub fn evaluate(
        &mut self,
        now: Instant,
        last_activity: Option<Instant>,
        capturing: bool,
    ) -> Option<LinkState> {
        self.link.evaluate(now, last_activity, capturing)
    }

    /// Send a frame in traversal order to the device and its satellites
    pub async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError> {
        if led_data.len() != self.led_count {
            trace!(
                expected = self.led_count,
                actual = led_data.len(),
                "dropping frame with mismatched LED count"
            );
            return Ok(());
        }

        if let Some((sender, map)) = &mut self.satellites {
            if let Err(error) = sender.send(map, led_data).await {
                debug!(error = %error, "failed to send satellite frames");
            }
        }

        // Stale devices are out of the routing table until they are heard from again
        if !self.link.is_connected() {
            trace!(state = %self.link.state(), "device not routed, skipping frame");
            return Ok(());
        }

        self.oriented.clear();
        self.oriented.extend_from_slice(led_data);
        apply_orientation(&mut self.oriented, self.orientation, self.start_offset);

        let oriented = std::mem::take(&mut self.oriented);
        let result = self.inner.write(&oriented).await;
        self.oriented = oriented;

        if let Err(error) = result {
            self.report_error(&error, "write failed, closing transport");
            self.inner.disconnect().await;
            self.link.disconnected();
            return Err(error);
        }

        Ok(())
    }

    pub async fn set_state(&mut self, state: LightState) -> Result<(), DeviceError> {
        self.state = state;

        if let Some((sender, _)) = &mut self.satellites {
            sender.set_brightness(self.state.brightness);
        }

        if self.link.is_connected() {
            let state = self.state.clone();
            self.inner.set_state(&state).await?;
        }

        Ok(())
    }

    pub async fn publish_telemetry(&mut self, fps: &FpsSnapshot) {
        if self.link.is_connected() {
            if let Err(error) = self.inner.publish_telemetry(fps).await {
                debug!(error = %error, "failed to publish telemetry");
            }
        }
    }

    /// Turn the LEDs off and close the transport
    #[instrument(skip(self), fields(device = %self.inner.name()))]
    pub async fn shutdown(&mut self) {
        if self.link.is_connected() {
            let mut state = self.state.clone();
            state.state = PowerState::Off;

            if let Err(error) = self.inner.set_state(&state).await {
                debug!(error = %error, "failed to turn the device off");
            }
        }

        self.inner.disconnect().await;
        self.link.disconnected();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.inner.name())
            .field("link", &self.link.state())
            .finish()
    }
}
