use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::{Control, FpsSnapshot, PipelineError};
use crate::color::Color;
use crate::models::Config;
use crate::registry::{DeviceRecord, LinkState};
use crate::session::{Event, Session};

/// Host-side control of a running pipeline
#[derive(Clone)]
pub struct PipelineHandle {
    pub(super) session: Session,
    pub(super) control_tx: mpsc::Sender<Control>,
    pub(super) link_rx: watch::Receiver<LinkState>,
}

impl<T> From<mpsc::error::SendError<T>> for PipelineError {
    fn from(_: mpsc::error::SendError<T>) -> Self {
        Self::Closed
    }
}

impl From<oneshot::error::RecvError> for PipelineError {
    fn from(_: oneshot::error::RecvError) -> Self {
        Self::Closed
    }
}

impl PipelineHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Start capturing, returns `false` if capture was already running
    pub fn start(&self) -> bool {
        self.session.start()
    }

    /// Stop capturing, the device keeps its last colors
    pub fn stop(&self) -> bool {
        self.session.stop()
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Producer and consumer rates over the last telemetry window
    pub fn fps(&self) -> FpsSnapshot {
        self.session.fps().rates()
    }

    pub async fn devices(&self) -> Vec<DeviceRecord> {
        self.session.registry().snapshot().await
    }

    pub fn link_state(&self) -> LinkState {
        *self.link_rx.borrow()
    }

    /// Wait for the next link state change
    pub async fn link_changed(&mut self) -> Result<LinkState, PipelineError> {
        self.link_rx
            .changed()
            .await
            .map_err(|_| PipelineError::Closed)?;

        Ok(*self.link_rx.borrow())
    }

    /// Stop capturing and show a single color
    pub async fn push_solid(&self, color: Color) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.control_tx.send(Control::Solid(color, tx)).await?;
        Ok(rx.await?)
    }

    /// Stop capturing and turn the LEDs off
    pub async fn turn_off(&self) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.control_tx.send(Control::TurnOff(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn set_screensaver(&self, active: bool) -> Result<(), PipelineError> {
        Ok(self.control_tx.send(Control::Screensaver(active)).await?)
    }

    /// Apply a new configuration, the current one is kept if it is rejected
    pub async fn reload(&self, config: Config) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(Control::Reload(Box::new(config), tx))
            .await?;
        rx.await?
    }

    /// Stop every task and turn the LEDs off
    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        let (tx, rx) = oneshot::channel();
        self.control_tx.send(Control::Shutdown(tx)).await?;
        Ok(rx.await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.session.subscribe()
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("running", &self.is_running())
            .field("link", &self.link_state())
            .finish()
    }
}
