use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use super::ColorFrame;

/// Bounded hand-over between producers and the consumer
///
/// Publishing never blocks: when the slot is full the oldest frame is dropped, so the
/// consumer always sees the most recent capture.
#[derive(Debug)]
pub struct FrameSlot {
    capacity: usize,
    frames: Mutex<VecDeque<ColorFrame>>,
    notify: Notify,
    closed: AtomicBool,
}

impl FrameSlot {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            capacity,
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn frames(&self) -> MutexGuard<'_, VecDeque<ColorFrame>> {
        // Frames are plain data, a panicking holder cannot leave them inconsistent
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a frame, returns `true` if an older frame was overwritten
    pub fn publish(&self, frame: ColorFrame) -> bool {
        if self.is_closed() {
            return false;
        }

        let overwritten = {
            let mut frames = self.frames();
            let overwritten = if frames.len() >= self.capacity {
                frames.pop_front().is_some()
            } else {
                false
            };

            frames.push_back(frame);
            overwritten
        };

        self.notify.notify_one();
        overwritten
    }

    /// Wait for the next frame, `None` once the slot is closed
    pub async fn take(&self) -> Option<ColorFrame> {
        loop {
            let notified = self.notify.notified();

            if let Some(frame) = self.try_take() {
                return Some(frame);
            }

            if self.is_closed() {
                return None;
            }

            notified.await;
        }
    }

    pub fn try_take(&self) -> Option<ColorFrame> {
        self.frames().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::color::Color;
    use crate::geometry::ScreenSize;
    use crate::models::AspectRatio;

    fn frame(producer: usize) -> ColorFrame {
        ColorFrame {
            leds: vec![Color::new(producer as u8, 0, 0)],
            aspect_ratio: AspectRatio::Fullscreen,
            screen: ScreenSize::new(64, 64),
            captured_at: Instant::now(),
            producer,
        }
    }

    #[test]
    fn overwrite_oldest() {
        let slot = FrameSlot::new(1);

        assert!(!slot.publish(frame(1)));
        assert!(slot.publish(frame(2)));
        assert_eq!(slot.len(), 1);
        assert_eq!(slot.try_take().unwrap().producer, 2);
        assert!(slot.is_empty());

        let slot = FrameSlot::new(2);
        slot.publish(frame(1));
        slot.publish(frame(2));
        assert!(slot.publish(frame(3)));
        assert_eq!(slot.try_take().unwrap().producer, 2);
        assert_eq!(slot.try_take().unwrap().producer, 3);
    }

    #[tokio::test]
    async fn take_waits_for_publish() {
        let slot = Arc::new(FrameSlot::new(1));

        let taker = tokio::spawn({
            let slot = slot.clone();
            async move { slot.take().await.map(|frame| frame.producer) }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        slot.publish(frame(7));

        assert_eq!(taker.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn close_wakes_consumer() {
        let slot = Arc::new(FrameSlot::new(1));

        let taker = tokio::spawn({
            let slot = slot.clone();
            async move { slot.take().await.is_none() }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        slot.close();

        assert!(taker.await.unwrap());
        assert!(!slot.publish(frame(1)));
    }
}
