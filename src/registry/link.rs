use std::time::{Duration, Instant};

use serde_derive::Serialize;
use strum_macros::{Display, IntoStaticStr};

use crate::models::RegistrySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Connected, but no known device was heard from recently
    Stale,
    /// Stale for longer than the lost timeout while capturing
    Lost,
}

/// Connection state machine of the active transport
#[derive(Debug, Clone)]
pub struct Link {
    state: LinkState,
    stale_timeout: Duration,
    lost_timeout: Duration,
    stale_since: Option<Instant>,
    retries: u32,
    connected_once: bool,
}

impl Link {
    pub fn new(settings: &RegistrySettings) -> Self {
        Self {
            state: LinkState::Disconnected,
            stale_timeout: settings.stale_timeout(),
            lost_timeout: settings.lost_timeout(),
            stale_since: None,
            retries: 0,
            connected_once: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Whether the supervisor should try to (re)connect on its next tick
    pub fn needs_reconnect(&self) -> bool {
        matches!(
            self.state,
            LinkState::Disconnected | LinkState::Stale | LinkState::Lost
        )
    }

    fn set(&mut self, state: LinkState) -> Option<LinkState> {
        if self.state == state {
            return None;
        }

        debug!(from = %self.state, to = %state, "link state changed");
        self.state = state;
        Some(state)
    }

    /// Start a connection attempt
    ///
    /// From a stale link this is a soft reconnect: the lost timer keeps running and the
    /// next evaluation decides between connected, stale and lost.
    pub fn connecting(&mut self) -> Option<LinkState> {
        self.retries = self.retries.saturating_add(1);
        self.set(LinkState::Connecting)
    }

    fn soft_reconnecting(&self) -> bool {
        self.state == LinkState::Connecting && self.stale_since.is_some()
    }

    /// Connection established. Returns `true` on the first successful connection.
    pub fn connected(&mut self) -> bool {
        let first = !self.connected_once;
        self.connected_once = true;
        self.retries = 0;

        // Transport events do not prove that a stale device is back
        if self.stale_since.is_none() {
            self.set(LinkState::Connected);
        }

        first
    }

    fn stale_or_lost(&mut self, now: Instant, capturing: bool) -> Option<LinkState> {
        let stale_for = self
            .stale_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();

        if capturing && stale_for > self.lost_timeout {
            self.set(LinkState::Lost)
        } else {
            self.set(LinkState::Stale)
        }
    }

    pub fn disconnected(&mut self) -> Option<LinkState> {
        self.stale_since = None;
        self.set(LinkState::Disconnected)
    }

    /// Update the link health from the most recent device activity
    ///
    /// `last_activity` is `None` when no device is known, in which case the link health
    /// cannot be judged and only connection events change the state.
    pub fn evaluate(
        &mut self,
        now: Instant,
        last_activity: Option<Instant>,
        capturing: bool,
    ) -> Option<LinkState> {
        let last_activity = last_activity?;
        let fresh = now.saturating_duration_since(last_activity) <= self.stale_timeout;

        let soft = self.soft_reconnecting();

        match self.state {
            LinkState::Connected if !fresh => {
                self.stale_since = Some(now);
                self.set(LinkState::Stale)
            }
            LinkState::Stale | LinkState::Lost if fresh => {
                self.stale_since = None;
                self.set(LinkState::Connected)
            }
            LinkState::Connecting if soft && fresh => {
                self.stale_since = None;
                self.set(LinkState::Connected)
            }
            LinkState::Stale => self.stale_or_lost(now, capturing),
            // Unanswered soft reconnect
            LinkState::Connecting if soft => self.stale_or_lost(now, capturing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link::new(&RegistrySettings::default())
    }

    #[test]
    fn connect_cycle() {
        let mut link = link();
        assert!(link.needs_reconnect());

        assert_eq!(link.connecting(), Some(LinkState::Connecting));
        assert_eq!(link.retries(), 1);
        assert!(link.connected());
        assert_eq!(link.retries(), 0);
        assert!(link.is_connected());

        assert_eq!(link.disconnected(), Some(LinkState::Disconnected));
        link.connecting();
        link.connecting();
        assert_eq!(link.retries(), 2);
        assert!(!link.connected());
        assert_eq!(link.retries(), 0);
    }

    #[test]
    fn stale_then_lost() {
        let mut link = link();
        let t0 = Instant::now();
        link.connecting();
        link.connected();

        // No device known yet
        assert_eq!(link.evaluate(t0 + Duration::from_secs(60), None, true), None);

        assert_eq!(link.evaluate(t0 + Duration::from_secs(10), Some(t0), true), None);
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(16), Some(t0), true),
            Some(LinkState::Stale)
        );
        assert!(link.needs_reconnect());

        // Soft reconnect, a transport event alone does not end it
        assert_eq!(link.connecting(), Some(LinkState::Connecting));
        link.connected();
        assert_eq!(link.state(), LinkState::Connecting);
        assert!(!link.needs_reconnect());

        // Unanswered: back to stale, never lost while not capturing
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(400), Some(t0), false),
            Some(LinkState::Stale)
        );
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(400), Some(t0), false),
            None
        );

        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(400), Some(t0), true),
            Some(LinkState::Lost)
        );
    }

    #[test]
    fn readmission() {
        let mut link = link();
        let t0 = Instant::now();
        link.connecting();
        link.connected();

        link.evaluate(t0 + Duration::from_secs(20), Some(t0), true);
        assert_eq!(link.state(), LinkState::Stale);

        let heartbeat = t0 + Duration::from_secs(25);
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(26), Some(heartbeat), true),
            Some(LinkState::Connected)
        );
    }

    #[test]
    fn soft_reconnect_answered() {
        let mut link = link();
        let t0 = Instant::now();
        link.connecting();
        link.connected();

        link.evaluate(t0 + Duration::from_secs(20), Some(t0), true);
        assert_eq!(link.connecting(), Some(LinkState::Connecting));

        let heartbeat = t0 + Duration::from_secs(21);
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(22), Some(heartbeat), true),
            Some(LinkState::Connected)
        );

        // The lost timer restarts on the next outage
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(40), Some(heartbeat), true),
            Some(LinkState::Stale)
        );
        assert_eq!(
            link.evaluate(t0 + Duration::from_secs(100), Some(heartbeat), true),
            None
        );
    }
}
