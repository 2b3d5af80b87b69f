use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use super::{
    ConnectOutcome, DeviceContext, DeviceError, DeviceImpl, DeviceStatus, LightState, PowerState,
};
use crate::codec::{SatelliteMap, StreamEncoder};
use crate::color::{Color, BLACK};
use crate::models;
use crate::registry::{Announcement, DeviceAddress, Firmware, Observation};

/// Longest announce line accepted from a controller
const MAX_LINE_LENGTH: usize = 1024;

/// Largest datagram read from a controller
const MAX_DATAGRAM: usize = 1500;

async fn resolve(address: &str) -> Result<SocketAddr, DeviceError> {
    lookup_host(address)
        .await?
        .next()
        .ok_or_else(|| DeviceError::Resolve(address.to_owned()))
}

fn unspecified(target: &SocketAddr) -> SocketAddr {
    if target.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    }
}

/// Feed an inbound controller message to the registry
///
/// Announces register the device, anything else counts as a heartbeat for the last
/// announced identity.
async fn on_message(
    ctx: &DeviceContext,
    peer: SocketAddr,
    message: &[u8],
    known_id: &mut Option<String>,
) -> Option<Observation> {
    let now = Instant::now();

    match serde_json::from_slice::<Announcement>(message) {
        Ok(announcement) => {
            let address = DeviceAddress::Network(
                announcement
                    .address
                    .clone()
                    .unwrap_or_else(|| peer.ip().to_string()),
            );

            *known_id = Some(announcement.id.clone());
            Some(ctx.registry.observe(address, announcement, now).await)
        }
        Err(error) => {
            trace!(peer = %peer, error = %error, "not an announce");

            match known_id {
                Some(id) => ctx.registry.heartbeat(id, now).await,
                None => None,
            }
        }
    }
}

async fn light_firmware(ctx: &DeviceContext) -> bool {
    ctx.registry.primary_firmware().await == Some(Firmware::Light)
}

/// Stream messages sent as UDP datagrams
pub struct UdpDevice {
    config: models::Udp,
    encoder: StreamEncoder,
    ctx: DeviceContext,
    name: String,
    socket: Option<(Arc<UdpSocket>, JoinHandle<()>)>,
}

impl UdpDevice {
    pub fn new(config: models::Udp, encoder: StreamEncoder, ctx: DeviceContext) -> Self {
        Self {
            name: format!("udp({})", config.address),
            config,
            encoder,
            ctx,
            socket: None,
        }
    }

    async fn receive(ctx: DeviceContext, socket: Arc<UdpSocket>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut known_id = None;

        loop {
            match socket.recv_from(&mut buf).await {
                Ok((read, peer)) => {
                    on_message(&ctx, peer, &buf[..read], &mut known_id).await;
                }
                Err(error) => {
                    // ICMP port unreachable shows up here on some platforms
                    debug!(error = %error, "receive failed");
                    ctx.status_tx
                        .send(DeviceStatus::Disconnected(error.to_string()))
                        .await
                        .ok();
                    break;
                }
            }
        }
    }

    fn socket(&self) -> Result<&UdpSocket, DeviceError> {
        self.socket
            .as_ref()
            .map(|(socket, _)| socket.as_ref())
            .ok_or(DeviceError::NotConnected)
    }

    async fn send_all(&self, messages: Vec<String>) -> Result<(), DeviceError> {
        let socket = self.socket()?;

        for message in messages {
            socket.send(message.as_bytes()).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl DeviceImpl for UdpDevice {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(address = %self.config.address))]
    async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError> {
        self.disconnect().await;

        let target = resolve(&self.config.address).await?;
        let socket = UdpSocket::bind(unspecified(&target)).await?;
        socket.connect(target).await?;

        let socket = Arc::new(socket);
        let receiver = tokio::spawn(Self::receive(self.ctx.clone(), socket.clone()));
        self.socket = Some((socket, receiver));

        info!(target = %target, "bound UDP socket");
        Ok(ConnectOutcome::Connected)
    }

    async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError> {
        let messages = self
            .encoder
            .encode(led_data, light_firmware(&self.ctx).await)?;

        self.send_all(messages).await
    }

    async fn set_state(&mut self, state: &LightState) -> Result<(), DeviceError> {
        self.encoder.set_brightness(state.brightness);

        if state.state == PowerState::Off {
            let black = vec![BLACK; self.ctx.led_count.max(1)];
            let messages = self.encoder.encode(&black, light_firmware(&self.ctx).await)?;
            self.send_all(messages).await?;
        }

        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some((_, receiver)) = self.socket.take() {
            receiver.abort();
        }
    }
}

/// Newline-delimited stream messages over a TCP connection
pub struct TcpDevice {
    config: models::Tcp,
    encoder: StreamEncoder,
    ctx: DeviceContext,
    name: String,
    connection: Option<Connection>,
}

struct Connection {
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl TcpDevice {
    pub fn new(config: models::Tcp, encoder: StreamEncoder, ctx: DeviceContext) -> Self {
        Self {
            name: format!("tcp({})", config.address),
            config,
            encoder,
            ctx,
            connection: None,
        }
    }

    async fn read_lines(ctx: DeviceContext, peer: SocketAddr, read: OwnedReadHalf) {
        let mut lines = FramedRead::new(read, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let mut known_id = None;

        let reason = loop {
            match lines.next().await {
                Some(Ok(line)) => {
                    on_message(&ctx, peer, line.as_bytes(), &mut known_id).await;
                }
                Some(Err(error)) => break error.to_string(),
                None => break "connection closed".to_owned(),
            }
        };

        ctx.status_tx
            .send(DeviceStatus::Disconnected(reason))
            .await
            .ok();
    }

    async fn send_all(&mut self, messages: Vec<String>) -> Result<(), DeviceError> {
        let connection = self.connection.as_mut().ok_or(DeviceError::NotConnected)?;

        for message in messages {
            connection.writer.feed(message).await?;
        }

        SinkExt::<String>::flush(&mut connection.writer).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceImpl for TcpDevice {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(address = %self.config.address))]
    async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError> {
        self.connection = None;

        let target = resolve(&self.config.address).await?;
        let stream = tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(target))
            .await
            .map_err(|_| DeviceError::Timeout(self.config.address.clone()))??;
        stream.set_nodelay(true)?;

        let (read, write) = stream.into_split();
        let reader = tokio::spawn(Self::read_lines(self.ctx.clone(), target, read));

        self.connection = Some(Connection {
            writer: FramedWrite::new(write, LinesCodec::new()),
            reader,
        });

        info!(target = %target, "connected");
        Ok(ConnectOutcome::Connected)
    }

    async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError> {
        let messages = self
            .encoder
            .encode(led_data, light_firmware(&self.ctx).await)?;

        self.send_all(messages).await
    }

    async fn set_state(&mut self, state: &LightState) -> Result<(), DeviceError> {
        self.encoder.set_brightness(state.brightness);

        if state.state == PowerState::Off {
            let black = vec![BLACK; self.ctx.led_count.max(1)];
            let messages = self.encoder.encode(&black, light_firmware(&self.ctx).await)?;
            self.send_all(messages).await?;
        }

        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            info!(address = %self.config.address, "closed connection");
        }
    }
}

/// Fire-and-forget UDP sender for satellite strips
pub struct SatelliteSender {
    encoder: StreamEncoder,
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    resolved: HashMap<String, SocketAddr>,
    /// Satellites out of the routing table
    stale: HashSet<String>,
}

impl SatelliteSender {
    pub fn new(encoder: StreamEncoder) -> Self {
        Self {
            encoder,
            v4: None,
            v6: None,
            resolved: HashMap::new(),
            stale: HashSet::new(),
        }
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.encoder.set_brightness(brightness);
    }

    /// Add or remove a satellite from the routing table
    pub fn set_routed(&mut self, address: &str, routed: bool) {
        if routed {
            if self.stale.remove(address) {
                info!(address = %address, "satellite is back");
            }
        } else if self.stale.insert(address.to_owned()) {
            warn!(address = %address, "satellite went stale, not sending frames");
        }
    }

    async fn socket_for(&mut self, target: &SocketAddr) -> Result<&UdpSocket, DeviceError> {
        let slot = if target.is_ipv4() {
            &mut self.v4
        } else {
            &mut self.v6
        };

        if slot.is_none() {
            *slot = Some(UdpSocket::bind(unspecified(target)).await?);
        }

        slot.as_ref().ok_or(DeviceError::NotConnected)
    }

    async fn target(&mut self, address: &str) -> Result<SocketAddr, DeviceError> {
        if let Some(target) = self.resolved.get(address) {
            return Ok(*target);
        }

        let target = resolve(address).await?;
        self.resolved.insert(address.to_owned(), target);
        Ok(target)
    }

    /// Send every satellite its part of the frame
    ///
    /// All routed satellites are attempted, the first error is returned.
    pub async fn send(&mut self, map: &SatelliteMap, colors: &[Color]) -> Result<(), DeviceError> {
        let mut result = Ok(());

        for (satellite, sub_frame) in map.split(colors) {
            if self.stale.contains(&satellite.address) {
                continue;
            }

            let sent = async {
                let target = self.target(&satellite.address).await?;
                let messages = self.encoder.encode(&sub_frame, false)?;
                let socket = self.socket_for(&target).await?;

                for message in messages {
                    socket.send_to(message.as_bytes(), target).await?;
                }

                Ok::<_, DeviceError>(())
            }
            .await;

            if let Err(error) = sent {
                // Addresses may change, resolve again next time
                self.resolved.remove(&satellite.address);

                if result.is_ok() {
                    result = Err(error);
                }
            }
        }

        result
    }
}
