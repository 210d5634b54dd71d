//! Frame timing and per-interval frame statistics.

use std::time::{Duration, Instant};

/// Monotonic timer measuring time since creation and between ticks.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Total elapsed time since creation or the last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time elapsed since the previous call to `tick()`.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame counts accumulated over one reporting interval.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    /// Frames that reached presentation.
    pub presented: u32,
    /// Ticks that produced no frame (stale swapchain, minimised window).
    pub skipped: u32,
    /// Length of the interval.
    pub interval: Duration,
}

impl FrameReport {
    /// Presented frames per second over the interval.
    pub fn fps(&self) -> f32 {
        let secs = self.interval.as_secs_f32();
        if secs > 0.0 {
            self.presented as f32 / secs
        } else {
            0.0
        }
    }
}

/// Counts presented and skipped frames and hands out a report once per interval.
#[derive(Debug)]
pub struct FrameStats {
    timer: Timer,
    interval: Duration,
    presented: u32,
    skipped: u32,
}

impl FrameStats {
    /// Create statistics that report every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: Timer::new(),
            interval,
            presented: 0,
            skipped: 0,
        }
    }

    /// Count one presented frame.
    pub fn record_presented(&mut self) {
        self.presented += 1;
    }

    /// Count one tick that had nothing to render.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Returns the report for the elapsed interval and starts a new one,
    /// or `None` while the interval is still running.
    pub fn take_report(&mut self) -> Option<FrameReport> {
        let elapsed = self.timer.elapsed();
        if elapsed < self.interval {
            return None;
        }

        let report = FrameReport {
            presented: self.presented,
            skipped: self.skipped,
            interval: elapsed,
        };
        self.presented = 0;
        self.skipped = 0;
        self.timer.reset();
        Some(report)
    }
}
