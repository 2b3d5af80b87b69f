//! Power-saving and blackout filter applied before frames reach the device

use crate::color::{within_tolerance, Color, BLACK};
use crate::models::PowerSaving;

#[derive(Debug, Clone)]
pub struct PowerFilter {
    settings: PowerSaving,
    /// Last frame sent to the device
    previous: Option<Vec<Color>>,
    /// Consecutive frames within tolerance of `previous`
    duplicates: u32,
    screensaver: bool,
    shutdown: bool,
}

impl PowerFilter {
    pub fn new(settings: PowerSaving) -> Self {
        Self {
            settings,
            previous: None,
            duplicates: 0,
            screensaver: false,
            shutdown: false,
        }
    }

    pub fn set_screensaver(&mut self, active: bool) {
        if self.screensaver != active {
            debug!(active, "screensaver state changed");
            self.screensaver = active;
        }
    }

    pub fn set_shutdown(&mut self, active: bool) {
        self.shutdown = active;
    }

    pub fn is_blackout(&self) -> bool {
        self.screensaver || self.shutdown
    }

    pub fn is_suppressing(&self) -> bool {
        self.settings.enable && self.duplicates >= self.settings.frames
    }

    /// Forget the last frame, e.g. after the device reconnected
    pub fn reset(&mut self) {
        self.previous = None;
        self.duplicates = 0;
    }

    fn is_duplicate(&self, frame: &[Color]) -> bool {
        match &self.previous {
            Some(previous) if previous.len() == frame.len() => previous
                .iter()
                .zip(frame.iter())
                .all(|(a, b)| within_tolerance(*a, *b, self.settings.tolerance)),
            _ => false,
        }
    }

    /// Returns the frame to forward, or `None` if it should be dropped
    pub fn filter(&mut self, mut frame: Vec<Color>) -> Option<Vec<Color>> {
        if self.is_blackout() {
            frame.iter_mut().for_each(|c| *c = BLACK);
        }

        if !self.settings.enable {
            return Some(frame);
        }

        if self.is_duplicate(&frame) {
            self.duplicates = self.duplicates.saturating_add(1);

            if self.duplicates == self.settings.frames {
                debug!(frames = self.duplicates, "static content, suppressing frames");
            }

            if self.is_suppressing() {
                return None;
            }
        } else {
            if self.is_suppressing() {
                debug!("content changed, resuming frames");
            }

            self.duplicates = 0;
        }

        self.previous = Some(frame.clone());
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(frames: u32) -> PowerSaving {
        PowerSaving {
            enable: true,
            tolerance: 2,
            frames,
        }
    }

    #[test]
    fn disabled_forwards_everything() {
        let mut filter = PowerFilter::new(PowerSaving::default());
        let frame = vec![Color::new(1, 2, 3); 4];

        for _ in 0..100 {
            assert_eq!(filter.filter(frame.clone()), Some(frame.clone()));
        }
    }

    #[test]
    fn suppresses_static_content() {
        let mut filter = PowerFilter::new(settings(3));
        let frame = vec![Color::new(10, 10, 10); 4];

        // First frame and three duplicates are forwarded, then suppressed
        assert!(filter.filter(frame.clone()).is_some());
        assert!(filter.filter(frame.clone()).is_some());
        assert!(filter.filter(frame.clone()).is_some());
        assert!(filter.filter(frame.clone()).is_none());
        assert!(filter.is_suppressing());

        // Within tolerance still counts as a duplicate
        assert!(filter.filter(vec![Color::new(11, 9, 12); 4]).is_none());

        // Content change resumes forwarding
        assert!(filter.filter(vec![Color::new(50, 10, 10); 4]).is_some());
        assert!(!filter.is_suppressing());
    }

    #[test]
    fn blackout() {
        let mut filter = PowerFilter::new(PowerSaving::default());
        filter.set_screensaver(true);

        assert_eq!(
            filter.filter(vec![Color::new(1, 2, 3); 3]),
            Some(vec![BLACK; 3])
        );

        filter.set_screensaver(false);
        filter.set_shutdown(true);
        assert!(filter.is_blackout());
        assert_eq!(filter.filter(vec![Color::new(9, 9, 9); 2]), Some(vec![BLACK; 2]));
    }
}
