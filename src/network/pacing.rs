//! Real-time pacing
//!
//! Encoded audio must reach the server no faster than it plays, or the
//! server's buffer overruns and listeners skip ahead. The rate limiter
//! computes absolute deadlines from the total bytes sent so sleep jitter
//! never accumulates.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time source for pacing
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep_until(&self, deadline: Instant);

    async fn sleep(&self, duration: Duration) {
        let deadline = self.now() + duration;
        self.sleep_until(deadline).await;
    }
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
    }
}

/// Virtual clock: sleeping jumps time forward instantly
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: AtomicU64::new(0),
        }
    }

    /// Virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    async fn sleep_until(&self, deadline: Instant) {
        {
            let mut offset = self.offset.lock();
            let target = deadline.saturating_duration_since(self.origin);
            if target > *offset {
                *offset = target;
            }
        }
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        // Still a suspension point, so cancellation can be observed
        tokio::task::yield_now().await;
    }
}

/// Byte-rate limiter producing absolute send deadlines
#[derive(Debug, Clone)]
pub struct RateLimiter {
    bytes_per_sec: f64,
    start: Instant,
    consumed: u64,
}

impl RateLimiter {
    /// A zero `bitrate` is treated as one bit per second
    pub fn new(bitrate: u32, start: Instant) -> Self {
        Self {
            bytes_per_sec: bitrate.max(1) as f64 / 8.0,
            start,
            consumed: 0,
        }
    }

    /// Account for `bytes` more and return when the next write may start
    pub fn consume(&mut self, bytes: usize) -> Instant {
        self.consumed += bytes as u64;
        self.start + Duration::from_secs_f64(self.consumed as f64 / self.bytes_per_sec)
    }

    /// Pause between two full chunks at `bitrate`
    pub fn chunk_interval(bitrate: u32, chunk_size: usize) -> Duration {
        Duration::from_secs_f64(chunk_size as f64 * 8.0 / bitrate.max(1) as f64)
    }
}
