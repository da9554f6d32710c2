//! Synthetic progress - perceived loading progress decoupled from real loading.
//!
//! Real preload time is unpredictable: too fast feels jarring, too slow feels
//! broken. The driver instead runs a timer of random length (chosen once per
//! loading cycle) and maps elapsed time to a percentage and a status message.
//! The host polls [`ProgressDriver::sample`] on its tick; no load signals feed in.

use fastrand::Rng;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Status messages by percent threshold (ascending)
pub const PROGRESS_MESSAGES: &[(u32, &str)] = &[
    (0, "Preparing the tour..."),
    (20, "Loading product footage..."),
    (45, "Buffering transitions..."),
    (70, "Placing hotspots..."),
    (90, "Almost there..."),
    (100, "Ready"),
];

/// Message for a ratio: the last entry whose threshold <= ratio*100.
pub fn message_for(ratio: f32) -> &'static str {
    let percent = ratio.clamp(0.0, 1.0) * 100.0;
    PROGRESS_MESSAGES
        .iter()
        .filter(|(threshold, _)| *threshold as f32 <= percent)
        .last()
        .map(|(_, msg)| *msg)
        .unwrap_or(PROGRESS_MESSAGES[0].1)
}

/// Progress values for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub ratio: f32,
    pub percent: u32,
    pub message: &'static str,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            ratio: 0.0,
            percent: 0,
            message: message_for(0.0),
        }
    }
}

/// One loading cycle's timer
#[derive(Debug, Clone, Copy)]
struct ProgressState {
    started: Instant,
    total: Duration,
    ratio: f32,
}

/// Timer-driven progress.
///
/// `begin()` picks the duration; without it `sample()` stays at zero.
#[derive(Debug, Clone)]
pub struct ProgressDriver {
    min: Duration,
    max: Duration,
    fixed: Option<Duration>,
    rng: Rng,
    state: Option<ProgressState>,
}

impl ProgressDriver {
    /// Random duration in `[min, max]` per cycle (bounds swapped if reversed).
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if max < min { (max, min) } else { (min, max) };
        Self {
            min,
            max,
            fixed: None,
            rng: Rng::new(),
            state: None,
        }
    }

    /// Always use `total` (tests, `--duration-ms`)
    pub fn with_duration(total: Duration) -> Self {
        let mut driver = Self::new(total, total);
        driver.fixed = Some(total);
        driver
    }

    /// Deterministic random durations
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Rng::with_seed(seed);
        self
    }

    fn pick_duration(&mut self) -> Duration {
        if let Some(total) = self.fixed {
            return total;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(self.rng.u64(min..=max))
    }

    /// Start (or restart) a cycle at `now`. Returns the chosen duration.
    pub fn begin(&mut self, now: Instant) -> Duration {
        let total = self.pick_duration();
        self.state = Some(ProgressState {
            started: now,
            total,
            ratio: 0.0,
        });
        log::debug!("Synthetic progress: {} ms", total.as_millis());
        total
    }

    /// Advance to `now` and return the elapsed ratio (0.0..=1.0).
    ///
    /// Never decreases, even if `now` is earlier than a previous sample.
    pub fn sample(&mut self, now: Instant) -> f32 {
        let Some(state) = self.state.as_mut() else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(state.started);
        let ratio = if state.total.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / state.total.as_secs_f32()).min(1.0)
        };
        state.ratio = state.ratio.max(ratio);
        state.ratio
    }

    /// Last sampled ratio
    pub fn ratio(&self) -> f32 {
        self.state.map(|s| s.ratio).unwrap_or(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.ratio() >= 1.0
    }

    /// Duration of the current cycle
    pub fn total(&self) -> Option<Duration> {
        self.state.map(|s| s.total)
    }

    pub fn percent(&self) -> u32 {
        (self.ratio() * 100.0).floor() as u32
    }

    pub fn message(&self) -> &'static str {
        message_for(self.ratio())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            ratio: self.ratio(),
            percent: self.percent(),
            message: self.message(),
        }
    }
}
