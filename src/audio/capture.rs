//! Microphone capture tap using CPAL (Cross-Platform Audio Library).

use crate::audio::frame::FrameSink;
use crate::audio::tap::{CaptureSource, NegotiatedFormat};
use crate::error::{HearkenError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2
/// (stderr). Safe as long as no other thread is concurrently manipulating
/// fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched from whichever thread currently holds
/// the owning `CpalCapture`, which is itself moved between threads whole.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Accumulates raw callback buffers into fixed-size frames and delivers
/// them to the sink.
struct FrameAssembler {
    sink: FrameSink,
    pending: Vec<i16>,
    frame_samples: usize,
}

impl FrameAssembler {
    fn new(sink: FrameSink, frame_samples: usize) -> Self {
        Self {
            sink,
            pending: Vec::with_capacity(frame_samples),
            frame_samples,
        }
    }

    fn push(&mut self, data: &[i16]) {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            let frame = std::mem::replace(&mut self.pending, rest);
            self.sink.deliver(frame);
        }
    }
}

/// Microphone capture tap backed by a CPAL input stream.
///
/// Negotiates the device's native format (falling back to 16 kHz mono when
/// the device reports invalid values) and delivers ~100 ms PCM16 frames.
/// The stream exists only between `install` and `remove`.
pub struct CpalCapture {
    device: cpal::Device,
    format: Option<NegotiatedFormat>,
    stream: Option<SendableStream>,
}

impl CpalCapture {
    /// Create a capture tap on the default input device.
    ///
    /// # Errors
    /// Returns `AudioCapture` if no input device is available.
    pub fn new() -> Result<Self> {
        Self::with_device(None)
    }

    /// Create a capture tap on a named input device, or the default when
    /// `device_name` is None.
    pub fn with_device(device_name: Option<&str>) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let mut devices = host.input_devices().map_err(|e| HearkenError::AudioCapture {
                    message: format!("Failed to enumerate input devices: {}", e),
                })?;
                devices
                    .find(|d| d.name().is_ok_and(|n| n == name))
                    .ok_or_else(|| HearkenError::AudioCapture {
                        message: format!("Input device not found: {}", name),
                    })
            } else {
                host.default_input_device()
                    .ok_or_else(|| HearkenError::AudioCapture {
                        message: "No default input device".to_string(),
                    })
            }
        })?;

        Ok(Self {
            device,
            format: None,
            stream: None,
        })
    }

    fn build_stream(&self, format: NegotiatedFormat, sink: FrameSink) -> Result<cpal::Stream> {
        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            tracing::warn!("audio stream error: {}", err);
        };

        let mut assembler = FrameAssembler::new(sink.clone(), format.frame_samples());

        // Prefer i16; PipeWire/PulseAudio convert transparently.
        if let Ok(stream) = self.device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                assembler.push(data);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Fall back to f32 for devices that only expose float formats.
        let mut assembler = FrameAssembler::new(sink, format.frame_samples());
        let mut scratch: Vec<i16> = Vec::new();
        self.device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                    assembler.push(&scratch);
                },
                err_callback,
                None,
            )
            .map_err(|e| HearkenError::AudioCapture {
                message: format!("Failed to build input stream: {}", e),
            })
    }
}

impl CaptureSource for CpalCapture {
    fn negotiate(&mut self) -> Result<NegotiatedFormat> {
        let default_config = with_suppressed_stderr(|| self.device.default_input_config())
            .map_err(|e| HearkenError::AudioFormat {
                message: format!("Failed to query default input config: {}", e),
            })?;

        let format =
            NegotiatedFormat::or_fallback(default_config.sample_rate().0, default_config.channels());
        tracing::debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "negotiated input format"
        );
        self.format = Some(format);
        Ok(format)
    }

    fn install(&mut self, sink: FrameSink) -> Result<()> {
        if self.stream.is_some() {
            return Err(HearkenError::AudioCapture {
                message: "capture tap already installed".to_string(),
            });
        }

        let format = match self.format {
            Some(format) => format,
            None => self.negotiate()?,
        };

        let stream = self.build_stream(format, sink)?;
        stream.play().map_err(|e| HearkenError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn remove(&mut self) {
        // Dropping the stream stops CPAL delivery synchronously; the sink
        // clone inside the callback goes with it.
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.0.pause() {
                tracing::debug!("pausing audio stream on remove failed: {}", e);
            }
            drop(stream);
        }
    }
}
