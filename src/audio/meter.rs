//! Volume metering.
//!
//! Derives a normalized loudness value from each incoming frame, throttled
//! to at most one emission per 100 ms of wall-clock time so listeners are
//! not flooded at frame cadence.

use crate::defaults;
use std::time::Instant;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// RMS-based volume meter with wall-clock throttling.
pub struct VolumeMeter {
    clock: Box<dyn Clock>,
    last_emit: Option<Instant>,
}

impl VolumeMeter {
    /// Creates a meter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Creates a meter with a custom clock (for deterministic testing).
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            last_emit: None,
        }
    }

    /// Process one frame, returning a normalized loudness in [0, 1] when an
    /// emission is due.
    ///
    /// Empty frames produce nothing; frames arriving within the throttle
    /// interval of the previous emission produce nothing.
    pub fn process(&mut self, samples: &[i16]) -> Option<f32> {
        if samples.is_empty() {
            return None;
        }

        let now = self.clock.now();
        if let Some(last) = self.last_emit
            && now.duration_since(last) < defaults::VOLUME_THROTTLE
        {
            return None;
        }
        self.last_emit = Some(now);

        Some(normalized_level(samples))
    }
}

impl Default for VolumeMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the normalized loudness of one frame.
///
/// RMS over samples scaled to [-1, 1], converted to decibels with a floor
/// against log10(0), clamped to [-60, 0] dB and mapped onto [0, 1].
pub fn normalized_level(samples: &[i16]) -> f32 {
    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();
    let rms = (sum_squares / samples.len() as f64).sqrt() as f32;

    let db = 20.0 * rms.max(defaults::RMS_FLOOR).log10();
    let db = db.clamp(defaults::DB_FLOOR, 0.0);
    (db - defaults::DB_FLOOR) / -defaults::DB_FLOOR
}
