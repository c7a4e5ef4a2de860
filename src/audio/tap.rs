//! Capture tap abstraction.
//!
//! The session controller drives capture through this trait; the real
//! implementation is `CpalCapture`, and tests use `MockCapture`.

use crate::audio::frame::FrameSink;
use crate::defaults;
use crate::error::{HearkenError, Result};
use std::sync::{Arc, Mutex};

/// Input format negotiated once at session start, immutable for the
/// session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl NegotiatedFormat {
    /// Substitute the 16 kHz mono fallback for zero/invalid device values.
    pub fn or_fallback(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: if sample_rate == 0 {
                defaults::FALLBACK_SAMPLE_RATE
            } else {
                sample_rate
            },
            channels: if channels == 0 {
                defaults::FALLBACK_CHANNELS
            } else {
                channels
            },
        }
    }

    /// Samples per frame (per-channel length × channel count).
    pub fn frame_samples(&self) -> usize {
        defaults::frame_len(self.sample_rate) * self.channels as usize
    }
}

impl Default for NegotiatedFormat {
    fn default() -> Self {
        Self {
            sample_rate: defaults::FALLBACK_SAMPLE_RATE,
            channels: defaults::FALLBACK_CHANNELS,
        }
    }
}

/// Trait for microphone capture taps.
///
/// A tap is reusable across sessions: `install` begins delivery into the
/// given sink, `remove` stops it. `remove` is idempotent and must fully
/// quiesce delivery before returning; no frame reaches the sink afterwards.
pub trait CaptureSource: Send {
    /// Negotiate the input format from the live device, falling back to
    /// 16 kHz mono when the device reports invalid values.
    ///
    /// # Errors
    /// Returns `AudioFormat` if no usable format can be constructed.
    fn negotiate(&mut self) -> Result<NegotiatedFormat>;

    /// Install the tap; frames are delivered to `sink` until `remove`.
    ///
    /// # Errors
    /// Returns `AudioCapture` if the stream cannot be built or started, or
    /// `PermissionDenied` where the platform denies microphone access.
    fn install(&mut self, sink: FrameSink) -> Result<()>;

    /// Remove the tap and stop delivery. Idempotent.
    fn remove(&mut self);
}

#[derive(Default)]
struct MockCaptureState {
    format: NegotiatedFormat,
    sink: Option<FrameSink>,
    installs: u64,
    removes: u64,
    fail_negotiate: Option<String>,
    fail_install: Option<HearkenError>,
}

/// Mock capture tap for testing.
///
/// Cloning yields a handle to the same underlying tap, so a test can keep a
/// handle for pushing frames while the controller owns the boxed trait
/// object.
#[derive(Clone, Default)]
pub struct MockCapture {
    state: Arc<Mutex<MockCaptureState>>,
}

impl MockCapture {
    /// Create a mock tap negotiating 16 kHz mono.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the negotiated format.
    pub fn with_format(self, sample_rate: u32, channels: u16) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.format = NegotiatedFormat::or_fallback(sample_rate, channels);
        }
        self
    }

    /// Configure negotiation to fail with `AudioFormat`.
    pub fn with_negotiate_failure(self, message: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.fail_negotiate = Some(message.to_string());
        }
        self
    }

    /// Configure install to fail once with the given error.
    pub fn with_install_failure(self, error: HearkenError) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.fail_install = Some(error);
        }
        self
    }

    /// Push one frame of samples through the installed tap.
    ///
    /// Returns true if the frame was delivered to the sink's queue.
    pub fn push(&self, samples: Vec<i16>) -> bool {
        let sink = self
            .state
            .lock()
            .ok()
            .and_then(|state| state.sink.clone());
        match sink {
            Some(sink) => sink.deliver(samples),
            None => false,
        }
    }

    /// True while a sink is installed.
    pub fn is_installed(&self) -> bool {
        self.state.lock().map(|s| s.sink.is_some()).unwrap_or(false)
    }

    /// Number of install calls seen.
    pub fn install_count(&self) -> u64 {
        self.state.lock().map(|s| s.installs).unwrap_or(0)
    }

    /// Number of remove calls seen.
    pub fn remove_count(&self) -> u64 {
        self.state.lock().map(|s| s.removes).unwrap_or(0)
    }
}

impl CaptureSource for MockCapture {
    fn negotiate(&mut self) -> Result<NegotiatedFormat> {
        let state = self.state.lock().map_err(|_| HearkenError::AudioCapture {
            message: "mock capture poisoned".to_string(),
        })?;
        match &state.fail_negotiate {
            Some(message) => Err(HearkenError::AudioFormat {
                message: message.clone(),
            }),
            None => Ok(state.format),
        }
    }

    fn install(&mut self, sink: FrameSink) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| HearkenError::AudioCapture {
            message: "mock capture poisoned".to_string(),
        })?;
        if let Some(error) = state.fail_install.take() {
            return Err(error);
        }
        state.installs += 1;
        state.sink = Some(sink);
        Ok(())
    }

    fn remove(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.removes += 1;
            state.sink = None;
        }
    }
}
