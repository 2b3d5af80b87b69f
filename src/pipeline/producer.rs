use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::{interval_at, Interval, MissedTickBehavior};

use super::{ColorFrame, FrameSlot, PipelineError};
use crate::capture::{CaptureError, FrameSource};
use crate::geometry::{GeometryCache, ScreenSize};
use crate::image::Sampler;
use crate::models::Config;
use crate::session::Session;

/// Capture task: grab, sample, publish
pub(crate) struct Producer {
    pub id: usize,
    pub count: usize,
    pub session: Session,
    pub source: Arc<dyn FrameSource>,
    pub slot: Arc<FrameSlot>,
    pub shutdown: watch::Receiver<bool>,
}

impl Producer {
    /// Fixed-rate timer, offset by the producer index so captures are spread over the period
    fn ticker(&self, config: &Config) -> Interval {
        let period = config.capture.frame_period();
        let offset = period * self.id as u32 / self.count.max(1) as u32;

        let mut ticker = interval_at((Instant::now() + offset).into(), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    async fn cycle(
        &self,
        config: &Config,
        sampler: &Sampler,
        cache: &mut GeometryCache,
    ) -> Result<ColorFrame, PipelineError> {
        let image = self.source.grab().await?;
        let captured_at = Instant::now();

        let screen = ScreenSize::new(image.width(), image.height());
        let matrices = cache.get(&config.leds, screen)?;
        let aspect_ratio = config.leds.aspect_ratio;

        Ok(ColorFrame {
            leds: sampler.sample_frame(&image, matrices.get(aspect_ratio)),
            aspect_ratio,
            screen,
            captured_at,
            producer: self.id,
        })
    }

    #[instrument(skip(self), fields(id = self.id, source = %self.source.name()))]
    pub async fn run(mut self) {
        let mut config = self.session.config().await;
        let mut sampler = Sampler::from_settings(&config.capture, &config.color);
        let mut cache = GeometryCache::new();
        let mut ticker = self.ticker(&config);
        let event_driven = config.capture.method.is_event_driven();
        let mut last_error: Option<String> = None;

        debug!(event_driven, "producer started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if !(event_driven && self.session.is_running()) {
                tokio::select! {
                    _ = ticker.tick() => {},
                    changed = self.shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }

                        continue;
                    }
                }
            }

            if !self.session.is_running() {
                continue;
            }

            let current = self.session.config().await;
            if !Arc::ptr_eq(&current, &config) {
                if current.capture.framerate != config.capture.framerate {
                    ticker = self.ticker(&current);
                }

                sampler = Sampler::from_settings(&current.capture, &current.color);
                config = current;
            }

            match self.cycle(&config, &sampler, &mut cache).await {
                Ok(frame) => {
                    last_error = None;

                    // Stopped while capturing: drop the frame
                    if !self.session.is_running() {
                        trace!("discarding frame captured after stop");
                        continue;
                    }

                    self.session.fps().produced();
                    if self.slot.publish(frame) {
                        trace!("overwrote pending frame");
                    }
                }
                Err(PipelineError::Capture(CaptureError::Closed)) => {
                    warn!("frame source closed");
                    break;
                }
                Err(PipelineError::Capture(error)) if error.is_transient() => {
                    trace!(error = %error, "skipping capture cycle");

                    if event_driven {
                        tokio::task::yield_now().await;
                    }
                }
                Err(error) => {
                    let message = error.to_string();

                    if last_error.as_ref() != Some(&message) {
                        warn!(error = %message, "capture failed");
                        last_error = Some(message);
                    }

                    if event_driven {
                        // Do not spin on a persistent failure
                        tokio::time::sleep(config.capture.frame_period().max(Duration::from_millis(10)))
                            .await;
                    }
                }
            }
        }

        debug!("producer stopped");
    }
}
