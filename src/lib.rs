//! hearken - Speech recognition session controller
//!
//! Streams live microphone audio into a speech-recognition engine, manages
//! the session lifecycle (start/stop/pause/resume/timeout), emits partial
//! and final transcription events, and optionally persists the captured
//! audio as a WAV file.

// Library code propagates errors instead of panicking
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod session;

// Seams for capture and recognition backends
pub use audio::{CaptureSource, MockCapture, NegotiatedFormat};
pub use engine::{EngineProvider, MockEngine, MockEngineProvider, ModelHandle, RecognitionEngine};

// Session facade
pub use config::SessionOptions;
pub use session::{SessionEvent, SessionState, SpeechService, Transcript, WordTimestamp};

// Error handling
pub use error::{HearkenError, Result};

#[cfg(feature = "cpal-audio")]
pub use audio::CpalCapture;
#[cfg(feature = "vosk")]
pub use engine::vosk::VoskProvider;
