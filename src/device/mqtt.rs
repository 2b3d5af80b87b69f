use std::time::{Duration, Instant};

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, Packet, QoS};
use serde_json::json;
use tokio::task::JoinHandle;

use super::{
    ConnectOutcome, DeviceContext, DeviceError, DeviceImpl, DeviceStatus, LightState,
    RemoteCommand,
};
use crate::codec::StreamEncoder;
use crate::color::Color;
use crate::models;
use crate::pipeline::FpsSnapshot;
use crate::registry::{Announcement, DeviceAddress, Firmware};

/// Leaf topics under the configured base topic
pub const STREAM_TOPIC: &str = "stream";
pub const SET_TOPIC: &str = "set";
pub const GAMMA_TOPIC: &str = "gamma";
pub const FPS_TOPIC: &str = "fps";
pub const DEVICE_TOPIC: &str = "device";
pub const CMD_TOPIC: &str = "cmd";

/// Pending requests buffered by the MQTT client
const REQUEST_CAPACITY: usize = 64;

struct Topics {
    stream: String,
    set: String,
    gamma: String,
    fps: String,
    device: String,
    cmd: String,
}

impl From<&models::Mqtt> for Topics {
    fn from(config: &models::Mqtt) -> Self {
        Self {
            stream: config.topic(STREAM_TOPIC),
            set: config.topic(SET_TOPIC),
            gamma: config.topic(GAMMA_TOPIC),
            fps: config.topic(FPS_TOPIC),
            device: config.topic(DEVICE_TOPIC),
            cmd: config.topic(CMD_TOPIC),
        }
    }
}

/// JSON stream published to a broker
pub struct MqttDevice {
    config: models::Mqtt,
    topics: Topics,
    encoder: StreamEncoder,
    ctx: DeviceContext,
    name: String,
    client: Option<AsyncClient>,
    eventloop: Option<JoinHandle<()>>,
}

impl MqttDevice {
    pub fn new(config: models::Mqtt, encoder: StreamEncoder, ctx: DeviceContext) -> Self {
        Self {
            name: format!("mqtt({}:{})", config.host, config.port),
            topics: Topics::from(&config),
            config,
            encoder,
            ctx,
            client: None,
            eventloop: None,
        }
    }

    fn client_id(&self) -> String {
        self.config.client_id.clone().unwrap_or_else(|| {
            let host = hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .unwrap_or_else(|| "localhost".to_owned());

            format!("lumistream-{}", host)
        })
    }

    fn client(&self) -> Result<&AsyncClient, DeviceError> {
        self.client.as_ref().ok_or(DeviceError::NotConnected)
    }

    async fn on_publish(ctx: &DeviceContext, device_topic: &str, topic: &str, payload: &[u8]) {
        if topic == device_topic {
            match serde_json::from_slice::<Announcement>(payload) {
                Ok(announcement) => {
                    let address = DeviceAddress::Network(
                        announcement
                            .address
                            .clone()
                            .unwrap_or_else(|| announcement.id.clone()),
                    );

                    ctx.registry
                        .observe(address, announcement, Instant::now())
                        .await;
                }
                Err(error) => {
                    debug!(error = %error, "invalid device announce");
                }
            }
        } else {
            match serde_json::from_slice::<RemoteCommand>(payload) {
                Ok(command) => {
                    debug!(command = ?command, "remote command");
                    ctx.command_tx.send(command).await.ok();
                }
                Err(error) => {
                    debug!(error = %error, "invalid remote command");
                }
            }
        }
    }

    /// Drive the client connection, retrying forever every `reconnect_interval`
    async fn run_eventloop(
        mut eventloop: EventLoop,
        client: AsyncClient,
        ctx: DeviceContext,
        subscriptions: [String; 2],
    ) {
        let retry = ctx.config.reconnect_interval();
        let mut connected = false;

        loop {
            match eventloop.poll().await {
                Ok(rumqttc::Event::Incoming(Packet::ConnAck(_))) => {
                    for topic in &subscriptions {
                        if let Err(error) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                            warn!(topic = %topic, error = %error, "failed to subscribe");
                        }
                    }

                    connected = true;
                    ctx.status_tx.send(DeviceStatus::Connected).await.ok();
                }
                Ok(rumqttc::Event::Incoming(Packet::Publish(publish))) => {
                    Self::on_publish(&ctx, &subscriptions[0], &publish.topic, &publish.payload)
                        .await;
                }
                Ok(_) => {}
                Err(error) => {
                    if connected {
                        connected = false;
                        ctx.status_tx
                            .send(DeviceStatus::Disconnected(error.to_string()))
                            .await
                            .ok();
                    } else {
                        debug!(error = %error, "broker unreachable");
                    }

                    tokio::time::sleep(retry).await;
                }
            }
        }
    }
}

#[async_trait]
impl DeviceImpl for MqttDevice {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port))]
    async fn connect(&mut self) -> Result<ConnectOutcome, DeviceError> {
        if let Some(eventloop) = &self.eventloop {
            if !eventloop.is_finished() {
                // The event loop keeps retrying on its own
                return Ok(ConnectOutcome::Pending);
            }
        }

        let mut options = MqttOptions::new(self.client_id(), &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs as _));

        if let Some(username) = &self.config.username {
            options.set_credentials(
                username.as_str(),
                self.config.password.as_deref().unwrap_or_default(),
            );
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        self.eventloop = Some(tokio::spawn(Self::run_eventloop(
            eventloop,
            client.clone(),
            self.ctx.clone(),
            [self.topics.device.clone(), self.topics.cmd.clone()],
        )));
        self.client = Some(client);

        info!("connecting to broker");
        Ok(ConnectOutcome::Pending)
    }

    async fn write(&mut self, led_data: &[Color]) -> Result<(), DeviceError> {
        let light = self.ctx.registry.primary_firmware().await == Some(Firmware::Light);
        let messages = self.encoder.encode(led_data, light)?;
        let client = self.client()?;

        for message in messages {
            // Never block the consumer on a slow broker
            client.try_publish(self.topics.stream.as_str(), QoS::AtMostOnce, false, message)?;
        }

        Ok(())
    }

    async fn set_state(&mut self, state: &LightState) -> Result<(), DeviceError> {
        self.encoder.set_brightness(state.brightness);
        let client = self.client()?;

        client
            .publish(
                self.topics.set.as_str(),
                QoS::AtLeastOnce,
                false,
                serde_json::to_vec(state).map_err(crate::codec::StreamError::from)?,
            )
            .await?;

        client
            .publish(
                self.topics.gamma.as_str(),
                QoS::AtLeastOnce,
                false,
                json!({ "gamma": state.gamma }).to_string(),
            )
            .await?;

        Ok(())
    }

    async fn publish_telemetry(&mut self, fps: &FpsSnapshot) -> Result<(), DeviceError> {
        self.client()?.try_publish(
            self.topics.fps.as_str(),
            QoS::AtMostOnce,
            false,
            serde_json::to_vec(fps).map_err(crate::codec::StreamError::from)?,
        )?;

        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.try_disconnect().ok();
        }

        if let Some(eventloop) = self.eventloop.take() {
            eventloop.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics() {
        let config: models::Mqtt = toml::from_str(
            r#"
            host = "localhost"
            base_topic = "lights/glow"
            "#,
        )
        .unwrap();

        let topics = Topics::from(&config);
        assert_eq!(topics.stream, "lights/glow/stream");
        assert_eq!(topics.set, "lights/glow/set");
        assert_eq!(topics.gamma, "lights/glow/gamma");
        assert_eq!(topics.fps, "lights/glow/fps");
        assert_eq!(topics.device, "lights/glow/device");
        assert_eq!(topics.cmd, "lights/glow/cmd");
    }
}
