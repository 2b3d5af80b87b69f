use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{ColorFrame, FrameSlot, PipelineError, FPS_WINDOW};
use crate::codec::SatelliteMap;
use crate::color::{Color, BLACK};
use crate::device::{Device, LightState, PowerState, RemoteCommand};
use crate::filters::PowerFilter;
use crate::geometry::{GeometryCache, ScreenSize, ToLedMatrix};
use crate::models::{AspectRatio, Config, ConfigError};
use crate::registry::LinkState;
use crate::session::{Event, Session};

/// Requests from [super::PipelineHandle] to the consumer
#[derive(Debug)]
pub(crate) enum Control {
    Solid(Color, oneshot::Sender<()>),
    TurnOff(oneshot::Sender<()>),
    Screensaver(bool),
    Reload(Box<Config>, oneshot::Sender<Result<(), PipelineError>>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Break,
}

/// Single task owning the device: dequeues frames, filters and dispatches them, and
/// supervises the link
pub(crate) struct Consumer {
    pub session: Session,
    pub slot: Arc<FrameSlot>,
    pub device: Device,
    pub filter: PowerFilter,
    pub control_rx: mpsc::Receiver<Control>,
    pub command_rx: mpsc::Receiver<RemoteCommand>,
    pub command_tx: mpsc::Sender<RemoteCommand>,
    pub link_tx: watch::Sender<LinkState>,
    pub shutdown_tx: watch::Sender<bool>,
    pub producers: Vec<JoinHandle<()>>,
    pub known_devices: HashSet<String>,
    pub geometry: GeometryCache,
    pub satellite_key: Option<(ScreenSize, AspectRatio)>,
}

impl Consumer {
    async fn on_link_state(&mut self, state: LinkState) {
        info!(device = %self.device.name(), state = %state, "link state changed");

        self.link_tx.send_replace(state);
        self.session.emit(Event::LinkStateChanged(state));

        match state {
            LinkState::Connected => {
                // Resend the next frame even if the content did not change
                self.filter.reset();
            }
            LinkState::Lost => {
                error!(device = %self.device.name(), "device lost, stopping capture");
                self.session.stop();
                self.session.emit(Event::RestartRequested);
            }
            _ => {}
        }
    }

    fn update_satellites(&mut self, config: &Config, frame: &ColorFrame) {
        let key = (frame.screen, frame.aspect_ratio);
        if !self.device.has_satellites() || self.satellite_key == Some(key) {
            return;
        }

        match self.geometry.get(&config.leds, frame.screen) {
            Ok(matrices) => {
                self.device.set_satellite_map(SatelliteMap::new(
                    &config.network.satellites,
                    matrices.get(frame.aspect_ratio),
                ));
                self.satellite_key = Some(key);
            }
            Err(error) => {
                warn!(error = %error, "cannot compute satellite ranges");
            }
        }
    }

    async fn on_frame(&mut self, frame: ColorFrame) {
        self.session.fps().consumed();

        if !self.session.is_running() {
            trace!(producer = frame.producer, "discarding frame received after stop");
            return;
        }

        if frame.leds.len() != self.device.led_count() {
            trace!(
                expected = self.device.led_count(),
                actual = frame.leds.len(),
                "dropping frame with mismatched LED count"
            );
            return;
        }

        let config = self.session.config().await;
        self.update_satellites(&config, &frame);
        self.resume_streaming().await;

        trace!(
            producer = frame.producer,
            latency = ?frame.captured_at.elapsed(),
            "dispatching frame"
        );

        if let Some(leds) = self.filter.filter(frame.leds) {
            // ok: write errors are reported and handled by the device itself
            self.device.write(&leds).await.ok();
        }
    }

    async fn write_static(&mut self, color: Color, effect: &str) {
        let mut state = self.device.light_state().clone();
        state.state = if color == BLACK {
            PowerState::Off
        } else {
            PowerState::On
        };
        state.effect = effect.to_owned();

        if let Err(error) = self.device.set_state(state).await {
            warn!(error = %error, "failed to update the light state");
        }

        let leds = vec![color; self.device.led_count()];
        self.device.write(&leds).await.ok();
        self.filter.reset();
    }

    async fn set_brightness(&mut self, brightness: u8) {
        let mut state = self.device.light_state().clone();
        state.brightness = brightness;

        if let Err(error) = self.device.set_state(state).await {
            warn!(error = %error, "failed to update the brightness");
        }
    }

    async fn resume_streaming(&mut self) {
        let state = self.device.light_state();
        if state.state == PowerState::On && state.effect == LightState::STREAM_EFFECT {
            return;
        }

        let mut state = state.clone();
        state.state = PowerState::On;
        state.effect = LightState::STREAM_EFFECT.to_owned();

        if let Err(error) = self.device.set_state(state).await {
            warn!(error = %error, "failed to resume streaming");
        }
    }

    #[instrument(skip(self, config))]
    async fn reload(&mut self, config: Config) -> Result<(), PipelineError> {
        use validator::Validate;

        config.validate().map_err(ConfigError::from)?;
        config.leds.to_matrices(ScreenSize::new(
            config.capture.screen_width,
            config.capture.screen_height,
        ))?;

        let current = self.session.config().await;
        let rebuild = current.transport != config.transport
            || current.network != config.network
            || current.leds != config.leds
            || current.registry != config.registry
            || current.color.color_order != config.color.color_order;

        if rebuild {
            // Release the transport first, the new one may open the same port
            self.device.shutdown().await;
            let created = Device::new(
                &config,
                self.session.registry().clone(),
                self.command_tx.clone(),
            )
            .await;

            self.device = match created {
                Ok(device) => device,
                Err(error) => {
                    // The old device reconnects on the next supervision tick
                    let state = self.device.link_state();
                    self.on_link_state(state).await;
                    return Err(error.into());
                }
            };

            let state = self.device.link_state();
            self.on_link_state(state).await;
            info!(device = %self.device.name(), "replaced device");
        } else if current.color != config.color {
            if let Err(error) = self.device.set_color(&config.color).await {
                warn!(error = %error, "failed to apply the color settings");
            }
        }

        self.filter = PowerFilter::new(config.power_saving.clone());
        self.geometry.invalidate();
        self.satellite_key = None;

        if current.capture.threads != config.capture.threads
            || current.capture.method != config.capture.method
        {
            warn!("capture thread changes take effect after a restart");
        }

        self.session.set_config(config).await;
        self.session.emit(Event::ConfigReloaded);
        Ok(())
    }

    async fn on_control(&mut self, control: Control) -> Flow {
        // ok: the handle shouldn't care if the requester went away
        match control {
            Control::Solid(color, tx) => {
                self.session.stop();
                self.write_static(color, LightState::SOLID_EFFECT).await;
                tx.send(()).ok();
            }
            Control::TurnOff(tx) => {
                self.session.stop();
                self.write_static(BLACK, LightState::SOLID_EFFECT).await;
                tx.send(()).ok();
            }
            Control::Screensaver(active) => {
                self.filter.set_screensaver(active);
            }
            Control::Reload(config, tx) => {
                let result = self.reload(*config).await;
                if let Err(error) = &result {
                    warn!(error = %error, "rejected configuration");
                }

                tx.send(result).ok();
            }
            Control::Shutdown(tx) => {
                self.shutdown().await;
                tx.send(()).ok();
                return Flow::Break;
            }
        }

        Flow::Continue
    }

    async fn on_command(&mut self, command: RemoteCommand) {
        debug!(command = ?command, "handling remote command");

        match command {
            RemoteCommand::Start => {
                self.session.start();
            }
            RemoteCommand::Stop => {
                self.session.stop();
            }
            RemoteCommand::Toggle => {
                if self.session.is_running() {
                    self.session.stop();
                } else {
                    self.session.start();
                }
            }
            RemoteCommand::Off => {
                self.session.stop();
                self.write_static(BLACK, LightState::SOLID_EFFECT).await;
            }
            RemoteCommand::Brightness { value } => self.set_brightness(value).await,
            RemoteCommand::Solid { color: [r, g, b] } => {
                self.session.stop();
                self.write_static(Color::new(r, g, b), LightState::SOLID_EFFECT)
                    .await;
            }
            RemoteCommand::Screensaver { active } => self.filter.set_screensaver(active),
        }
    }

    async fn sweep(&mut self) {
        let now = Instant::now();
        let report = self.session.registry().sweep(now).await;

        for id in report.stale {
            self.session.emit(Event::DeviceStale { id });
        }

        for id in report.forgotten {
            self.known_devices.remove(&id);
            self.session.emit(Event::DeviceForgotten { id });
        }

        for record in self.session.registry().snapshot().await {
            if self.known_devices.insert(record.id.clone()) {
                self.session.emit(Event::DeviceDiscovered { id: record.id });
            }
        }

        self.device.refresh_routing(self.session.registry()).await;

        if let Some(state) =
            self.device
                .evaluate(now, report.last_activity, self.session.is_running())
        {
            self.on_link_state(state).await;
        }
    }

    async fn shutdown(&mut self) {
        info!("shutting down pipeline");

        self.session.stop();
        self.shutdown_tx.send_replace(true);
        self.slot.close();

        for producer in self.producers.drain(..) {
            if let Err(error) = producer.await {
                warn!(error = %error, "producer task failed");
            }
        }

        self.filter.set_shutdown(true);
        self.device.shutdown().await;
        self.link_tx.send_replace(self.device.link_state());
    }

    pub async fn run(mut self) {
        let config = self.session.config().await;

        let mut reconnect = interval(config.registry.reconnect_interval());
        reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sweep = interval(config.registry.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut telemetry = interval(FPS_WINDOW);
        telemetry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_roll = Instant::now();

        loop {
            tokio::select! {
                frame = self.slot.take() => {
                    match frame {
                        Some(frame) => self.on_frame(frame).await,
                        None => {
                            // The slot only closes on shutdown
                            self.shutdown().await;
                            break;
                        }
                    }
                },
                control = self.control_rx.recv() => {
                    trace!(control = ?control, "control msg");

                    match control {
                        Some(control) => {
                            if self.on_control(control).await == Flow::Break {
                                break;
                            }
                        }
                        None => {
                            // Every handle was dropped
                            self.shutdown().await;
                            break;
                        }
                    }
                },
                Some(command) = self.command_rx.recv() => {
                    self.on_command(command).await;
                },
                status = self.device.next_status() => {
                    if let Some(state) = self.device.handle_status(status).await {
                        self.on_link_state(state).await;
                    }
                },
                _ = reconnect.tick() => {
                    if let Some(state) = self.device.supervise().await {
                        self.on_link_state(state).await;
                    }
                },
                _ = sweep.tick() => {
                    self.sweep().await;
                },
                _ = telemetry.tick() => {
                    let now = Instant::now();
                    let fps = self.session.fps().roll(now - last_roll);
                    last_roll = now;

                    if self.session.is_running() {
                        debug!(producing = fps.producer, consuming = fps.consumer, "fps");
                    }

                    self.session.emit(Event::Fps(fps));
                    self.device.publish_telemetry(&fps).await;
                },
            }
        }

        debug!("consumer stopped");
    }
}
