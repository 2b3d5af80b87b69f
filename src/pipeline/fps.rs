use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_derive::Serialize;

/// Interval at which the counters are turned into rates
pub const FPS_WINDOW: Duration = Duration::from_secs(5);

/// Frame counters shared by producers and the consumer
#[derive(Debug, Default)]
pub struct FpsCounters {
    produced: AtomicU64,
    consumed: AtomicU64,
    /// Last computed rates, as `f64` bits
    producer_rate: AtomicU64,
    consumer_rate: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct FpsSnapshot {
    #[serde(rename = "producing")]
    pub producer: f64,
    #[serde(rename = "consuming")]
    pub consumer: f64,
}

impl FpsCounters {
    pub fn produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset the counters and compute the rates over the elapsed window
    pub fn roll(&self, elapsed: Duration) -> FpsSnapshot {
        let secs = elapsed.as_secs_f64().max(f64::EPSILON);
        let snapshot = FpsSnapshot {
            producer: self.produced.swap(0, Ordering::Relaxed) as f64 / secs,
            consumer: self.consumed.swap(0, Ordering::Relaxed) as f64 / secs,
        };

        self.producer_rate
            .store(snapshot.producer.to_bits(), Ordering::Relaxed);
        self.consumer_rate
            .store(snapshot.consumer.to_bits(), Ordering::Relaxed);

        snapshot
    }

    /// Rates computed by the last call to [FpsCounters::roll]
    pub fn rates(&self) -> FpsSnapshot {
        FpsSnapshot {
            producer: f64::from_bits(self.producer_rate.load(Ordering::Relaxed)),
            consumer: f64::from_bits(self.consumer_rate.load(Ordering::Relaxed)),
        }
    }
}
