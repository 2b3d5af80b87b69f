//! Process-wide state shared by the pipeline tasks and the host

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::models::Config;
use crate::pipeline::FpsCounters;
use crate::registry::Registry;

mod event;
pub use event::*;

/// Capacity of the event channel, slow subscribers lag behind
const EVENT_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct Session(Arc<SessionData>);

struct SessionData {
    config: RwLock<Arc<Config>>,
    running: AtomicBool,
    fps: FpsCounters,
    registry: Registry,
    event_tx: broadcast::Sender<Event>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self(Arc::new(SessionData {
            registry: Registry::new(&config.registry),
            config: RwLock::new(Arc::new(config)),
            running: AtomicBool::new(false),
            fps: FpsCounters::default(),
            event_tx,
        }))
    }

    pub async fn config(&self) -> Arc<Config> {
        self.0.config.read().await.clone()
    }

    pub(crate) async fn set_config(&self, config: Config) {
        *self.0.config.write().await = Arc::new(config);
    }

    pub fn is_running(&self) -> bool {
        self.0.running.load(Ordering::SeqCst)
    }

    /// Start capturing, returns `false` if capture was already running
    pub fn start(&self) -> bool {
        let started = !self.0.running.swap(true, Ordering::SeqCst);

        if started {
            info!("capture started");
            self.emit(Event::Started);
        }

        started
    }

    /// Stop capturing, returns `false` if capture was already stopped
    pub fn stop(&self) -> bool {
        let stopped = self.0.running.swap(false, Ordering::SeqCst);

        if stopped {
            info!("capture stopped");
            self.emit(Event::Stopped);
        }

        stopped
    }

    pub fn toggle(&self) -> bool {
        if self.is_running() {
            self.stop();
            false
        } else {
            self.start();
            true
        }
    }

    pub fn fps(&self) -> &FpsCounters {
        &self.0.fps
    }

    pub fn registry(&self) -> &Registry {
        &self.0.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.0.event_tx.subscribe()
    }

    pub fn emit(&self, event: Event) {
        trace!(event = ?event, "emitting event");
        // ok: nobody has to be listening
        self.0.event_tx.send(event).ok();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_stop_events() {
        let session = Session::new(Config::default());
        let mut events = session.subscribe();

        assert!(session.start());
        assert!(!session.start());
        assert!(session.is_running());
        assert!(!session.toggle());
        assert!(!session.stop());

        assert_eq!(events.recv().await.unwrap(), Event::Started);
        assert_eq!(events.recv().await.unwrap(), Event::Stopped);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn replace_config() {
        let session = Session::new(Config::default());
        let before = session.config().await;

        let mut config = Config::default();
        config.capture.framerate = 60;
        session.set_config(config).await;

        let after = session.config().await;
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.capture.framerate, 60);
    }
}
