//! Audio capture, metering and persistence.
//!
//! The capture layer delivers fixed-size PCM16 frames into a bounded queue:
//!
//! ```text
//! ┌──────────┐  frames   ┌───────────┐  bounded   ┌────────────────┐
//! │ mic tap  │──────────▶│ FrameSink │───────────▶│ session worker │
//! └──────────┘           │ (pause    │  FIFO      └────────────────┘
//!                        │  gate)    │
//!                        └───────────┘
//! ```

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod frame;
pub mod meter;
pub mod tap;
pub mod wav;

#[cfg(feature = "cpal-audio")]
pub use capture::CpalCapture;
pub use frame::{AudioFrame, FrameSink};
pub use meter::{Clock, SystemClock, VolumeMeter};
pub use tap::{CaptureSource, MockCapture, NegotiatedFormat};
pub use wav::WavWriter;
