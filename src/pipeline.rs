//! Capture pipeline
//!
//! Producers grab frames, sample them and publish the resulting [ColorFrame] to a
//! [FrameSlot]. A single consumer owns the device, filters the frames and writes them out.
//! Producers and the consumer only share the slot and the running flag of the [Session].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::capture::{CaptureError, FrameSource};
use crate::color::Color;
use crate::device::{Device, DeviceError, RemoteCommand};
use crate::filters::PowerFilter;
use crate::geometry::{GeometryCache, GeometryError, ScreenSize, ToLedMatrix};
use crate::models::{AspectRatio, ConfigError};
use crate::session::Session;

mod consumer;
use consumer::*;

mod fps;
pub use fps::*;

mod handle;
pub use handle::*;

mod producer;
use producer::*;

mod slot;
pub use slot::*;

/// Pending remote commands
const COMMAND_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("the pipeline is no longer running")]
    Closed,
}

/// Sampled LED colors of one captured frame, in traversal order
#[derive(Debug, Clone)]
pub struct ColorFrame {
    pub leds: Vec<Color>,
    pub aspect_ratio: AspectRatio,
    /// Size of the captured image
    pub screen: ScreenSize,
    pub captured_at: Instant,
    /// Index of the producer which captured the frame
    pub producer: usize,
}

pub struct Pipeline;

impl Pipeline {
    /// Validate the geometry, create the device and spawn the pipeline tasks
    #[instrument(skip(session, source), fields(source = %source.name()))]
    pub async fn spawn(
        session: Session,
        source: Arc<dyn FrameSource>,
    ) -> Result<PipelineHandle, PipelineError> {
        let config = session.config().await;

        // Degenerate layouts are rejected before anything starts
        config.leds.to_matrices(ScreenSize::new(
            config.capture.screen_width,
            config.capture.screen_height,
        ))?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let device = Device::new(&config, session.registry().clone(), command_tx.clone()).await?;

        Ok(Self::spawn_with_device(
            session, source, device, command_tx, command_rx,
        )
        .await)
    }

    pub(crate) async fn spawn_with_device(
        session: Session,
        source: Arc<dyn FrameSource>,
        device: Device,
        command_tx: mpsc::Sender<RemoteCommand>,
        command_rx: mpsc::Receiver<RemoteCommand>,
    ) -> PipelineHandle {
        let config = session.config().await;
        let slot = Arc::new(FrameSlot::new(config.capture.slot_capacity as usize));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (link_tx, link_rx) = watch::channel(device.link_state());
        let (control_tx, control_rx) = mpsc::channel(4);

        let count = config.capture.producer_count();
        let method: &'static str = config.capture.method.into();
        info!(producers = count, method, "spawning pipeline");

        let producers = (0..count)
            .map(|id| {
                tokio::spawn(
                    Producer {
                        id,
                        count,
                        session: session.clone(),
                        source: source.clone(),
                        slot: slot.clone(),
                        shutdown: shutdown_rx.clone(),
                    }
                    .run(),
                )
            })
            .collect();

        let consumer = Consumer {
            session: session.clone(),
            slot,
            device,
            filter: PowerFilter::new(config.power_saving.clone()),
            control_rx,
            command_rx,
            command_tx,
            link_tx,
            shutdown_tx,
            producers,
            known_devices: HashSet::new(),
            geometry: GeometryCache::new(),
            satellite_key: None,
        };

        tokio::spawn(consumer.run());

        PipelineHandle {
            session,
            control_tx,
            link_rx,
        }
    }
}
