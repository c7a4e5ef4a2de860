//! Default configuration constants for hearken.
//!
//! Shared constants used across the capture pipeline, the volume meter and
//! the session controller, to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Fallback audio sample rate in Hz.
///
/// Used when the input device reports an invalid or zero sample rate.
/// 16kHz is the standard for speech recognition engines.
pub const FALLBACK_SAMPLE_RATE: u32 = 16000;

/// Fallback channel count when the device reports zero channels.
pub const FALLBACK_CHANNELS: u16 = 1;

/// Frame cadence in milliseconds.
///
/// The capture pipeline delivers fixed-size PCM frames at roughly this
/// interval; the frame length is `sample_rate / 10` per channel.
pub const FRAME_MS: u32 = 100;

/// Capacity of the bounded frame queue between the capture callback and the
/// processing worker.
///
/// The real-time callback never blocks: when the queue is full the frame is
/// dropped and counted. 64 frames is ~6.4s of backlog at 100ms cadence,
/// far more than a healthy worker ever accumulates.
pub const FRAME_QUEUE_CAPACITY: usize = 64;

/// Minimum wall-clock interval between volume events.
pub const VOLUME_THROTTLE: Duration = Duration::from_millis(100);

/// RMS floor substituted before the decibel conversion to avoid log10(0).
pub const RMS_FLOOR: f32 = 1e-4;

/// Lower decibel clamp for volume normalization.
pub const DB_FLOOR: f32 = -60.0;

/// Grammar phrase that switches the engine into strict matching mode.
///
/// Passed through to the recognizer untouched; engines treat it as the
/// unknown-word marker.
pub const UNKNOWN_PHRASE: &str = "[unk]";

/// Number of PCM16 samples per channel in one frame at the given rate.
pub fn frame_len(sample_rate: u32) -> usize {
    (sample_rate / 10) as usize
}
