//! Recognition session lifecycle.
//!
//! `SpeechService` is the single ordering authority for session state: every
//! transition happens under one mutex, so no two transitions interleave and
//! at most one session is ever Listening or Paused. The live pipeline itself
//! runs on a dedicated worker thread fed by a bounded frame queue; see
//! [`worker`] for the per-frame path.

pub mod events;
pub mod router;
mod timeout;
mod worker;

pub use events::{EventBus, SessionEvent, Transcript, WordTimestamp};

use crate::audio::frame::FrameSink;
use crate::audio::meter::VolumeMeter;
use crate::audio::tap::CaptureSource;
use crate::audio::wav::WavWriter;
use crate::config::SessionOptions;
use crate::defaults::FRAME_QUEUE_CAPACITY;
use crate::engine::{EngineProvider, ModelHandle};
use crate::error::{HearkenError, Result};
use crate::session::router::ResultRouter;
use crate::session::timeout::TimeoutGuard;
use crate::session::worker::Worker;
use crossbeam_channel::{Receiver, bounded};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Lifecycle state of the recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No model loaded, no session ever started.
    Idle,
    /// Resources being acquired for a new session.
    Starting,
    /// Frames are flowing to the recognizer.
    Listening,
    /// Session alive but frames are dropped before the queue.
    Paused,
    /// Teardown in progress.
    Stopping,
    /// Torn down; a new session may start.
    Stopped,
}

/// Resources belonging to one live session.
///
/// The engine handle, file writer and result slot live inside the worker;
/// this struct holds only what the controller needs to steer the worker from
/// outside: the pause gate, the flush flag, the timer and the join handle.
struct ActiveSession {
    generation: u64,
    gate: Arc<AtomicBool>,
    flush_final: Arc<AtomicBool>,
    timeout: Option<TimeoutGuard>,
    timeout_ms: Option<u64>,
    worker: Option<thread::JoinHandle<()>>,
}

/// Everything the session mutex guards.
struct Slot {
    state: SessionState,
    model: Option<Arc<dyn ModelHandle>>,
    capture: Box<dyn CaptureSource>,
    active: Option<ActiveSession>,
}

struct Inner {
    provider: Arc<dyn EngineProvider>,
    bus: EventBus,
    slot: Mutex<Slot>,
    generation: AtomicU64,
}

/// The speech recognition service.
///
/// Owns the capture tap, the loaded model and at most one live session.
/// All commands are safe to call from any thread; events fan out to every
/// [`subscribe`](SpeechService::subscribe)d receiver in emission order.
pub struct SpeechService {
    inner: Arc<Inner>,
}

impl SpeechService {
    pub fn new(provider: Arc<dyn EngineProvider>, capture: Box<dyn CaptureSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                bus: EventBus::new(),
                slot: Mutex::new(Slot {
                    state: SessionState::Idle,
                    model: None,
                    capture,
                    active: None,
                }),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Build a service on the default system input device.
    #[cfg(feature = "cpal-audio")]
    pub fn with_default_capture(provider: Arc<dyn EngineProvider>) -> Result<Self> {
        let capture = crate::audio::capture::CpalCapture::new()?;
        Ok(Self::new(provider, Box::new(capture)))
    }

    /// Subscribe to session events. Each subscriber gets every event.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.inner.bus.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lock_slot().state
    }

    /// Load a recognition model from disk. The model stays in memory across
    /// sessions until [`unload`](SpeechService::unload).
    pub fn load_model(&self, path: &std::path::Path) -> Result<()> {
        let model = self.inner.provider.load_model(path)?;
        let mut slot = self.inner.lock_slot();
        slot.model = Some(model);
        Ok(())
    }

    /// Tear down any live session and release the model.
    pub fn unload(&self) {
        let mut slot = self.inner.lock_slot();
        Inner::teardown_locked(&mut slot, false);
        slot.model = None;
        slot.state = SessionState::Idle;
    }

    /// Start a recognition session.
    ///
    /// A session already Listening or Paused is torn down first, without
    /// events. Resources are acquired in order: format negotiation,
    /// recognizer creation, file writer (non-fatal), capture tap, worker,
    /// timeout timer.
    ///
    /// # Errors
    /// `NoModelLoaded` and `InvalidGrammar` reject the call synchronously
    /// with no event. Negotiation, recognizer and tap failures reject the
    /// call, emit `Error` and leave the session Stopped with no resource
    /// still held.
    pub fn start(&self, options: SessionOptions) -> Result<()> {
        let inner = &self.inner;
        let mut slot = inner.lock_slot();
        Inner::teardown_locked(&mut slot, false);

        options.validate()?;
        let model = slot.model.clone().ok_or(HearkenError::NoModelLoaded)?;

        slot.state = SessionState::Starting;

        let format = match slot.capture.negotiate() {
            Ok(format) => format,
            Err(e) => return Err(inner.reject_start(&mut slot, e)),
        };

        let engine = match inner.provider.create_engine(
            &model,
            format.sample_rate,
            options.grammar.as_deref(),
        ) {
            Ok(engine) => engine,
            Err(e) => return Err(inner.reject_start(&mut slot, e)),
        };

        // Persistence failure is non-fatal; the session runs without a file.
        let writer = options.audio_file_path.as_ref().and_then(|path| {
            match WavWriter::open(path, format.sample_rate, format.channels) {
                Ok(writer) => Some(writer),
                Err(e) => {
                    tracing::warn!("cannot open audio file {}: {}", path.display(), e);
                    None
                }
            }
        });

        let (tx, rx) = bounded(FRAME_QUEUE_CAPACITY);
        let gate = Arc::new(AtomicBool::new(false));
        if let Err(e) = slot.capture.install(FrameSink::new(tx, Arc::clone(&gate))) {
            drop(engine);
            // No audio was captured; leave no placeholder artifact behind.
            if let Some(writer) = writer {
                writer.discard();
            }
            return Err(inner.reject_start(&mut slot, e));
        }

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let flush_final = Arc::new(AtomicBool::new(false));
        let audio_path = writer.as_ref().map(|w| w.path().to_path_buf());

        let on_fault: Box<dyn FnOnce(String) + Send> = {
            let inner = Arc::clone(&self.inner);
            // The worker cannot tear itself down (teardown joins the
            // worker), so the fault path jumps to a fresh thread.
            Box::new(move |_message| {
                thread::spawn(move || inner.fault(generation));
            })
        };

        let worker = Worker {
            rx,
            engine,
            writer,
            meter: VolumeMeter::new(),
            router: ResultRouter::new(),
            bus: inner.bus.clone(),
            flush_final: Arc::clone(&flush_final),
            on_fault,
        };
        let handle = match thread::Builder::new()
            .name("hearken-session".to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                slot.capture.remove();
                // The writer went down with the unspawned worker; remove the
                // empty artifact by path.
                if let Some(path) = audio_path
                    && let Err(e) = std::fs::remove_file(&path)
                {
                    tracing::debug!("removing {} failed: {}", path.display(), e);
                }
                return Err(inner.reject_start(&mut slot, HearkenError::Io(e)));
            }
        };

        let timeout = options
            .timeout_ms
            .map(|ms| Inner::arm_timeout(inner, generation, ms));

        slot.active = Some(ActiveSession {
            generation,
            gate,
            flush_final,
            timeout,
            timeout_ms: options.timeout_ms,
            worker: Some(handle),
        });
        slot.state = SessionState::Listening;
        Ok(())
    }

    /// Stop the session, flushing any pending final result to listeners.
    /// No-op when no session is live.
    ///
    /// Blocks until the worker has drained in-flight frames and the audio
    /// file, if any, is finalized; on return the file is complete and the
    /// engine handle has been released.
    pub fn stop(&self) {
        let mut slot = self.inner.lock_slot();
        Inner::teardown_locked(&mut slot, true);
    }

    /// Pause frame delivery. Only valid from Listening; no-op otherwise.
    ///
    /// While paused, frames are dropped before the processing queue and the
    /// silence timer is suspended.
    pub fn pause(&self) {
        let mut slot = self.inner.lock_slot();
        if slot.state != SessionState::Listening {
            return;
        }
        if let Some(active) = slot.active.as_mut() {
            active.gate.store(true, Ordering::Release);
            if let Some(mut timer) = active.timeout.take() {
                timer.cancel();
            }
            slot.state = SessionState::Paused;
        }
    }

    /// Resume frame delivery after a pause, re-arming the silence timer.
    ///
    /// Returns true iff a Paused to Listening transition occurred.
    pub fn resume(&self) -> bool {
        let inner = &self.inner;
        let mut slot = inner.lock_slot();
        if slot.state != SessionState::Paused {
            return false;
        }
        let Some(active) = slot.active.as_mut() else {
            return false;
        };
        active.gate.store(false, Ordering::Release);
        if let Some(ms) = active.timeout_ms {
            active.timeout = Some(Inner::arm_timeout(inner, active.generation, ms));
        }
        slot.state = SessionState::Listening;
        true
    }
}

impl Drop for SpeechService {
    fn drop(&mut self) {
        let mut slot = self.inner.lock_slot();
        Inner::teardown_locked(&mut slot, false);
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tear down the live session, if any.
    ///
    /// Strict order: cancel the timer, arm the flush flag, remove the
    /// capture tap (closing the frame queue), then join the worker, which
    /// drains in-flight frames, flushes the pending final result when
    /// requested, finalizes the file writer and releases the engine handle.
    /// Joining guarantees no two sessions' frames ever reach an engine
    /// handle interleaved.
    fn teardown_locked(slot: &mut Slot, flush: bool) {
        let Some(mut active) = slot.active.take() else {
            return;
        };
        slot.state = SessionState::Stopping;

        if let Some(mut timer) = active.timeout.take() {
            timer.cancel();
        }
        active.flush_final.store(flush, Ordering::Release);
        slot.capture.remove();

        if let Some(handle) = active.worker.take()
            && handle.join().is_err()
        {
            tracing::warn!("session worker panicked during teardown");
        }

        slot.state = SessionState::Stopped;
    }

    fn arm_timeout(inner: &Arc<Inner>, generation: u64, ms: u64) -> TimeoutGuard {
        let inner = Arc::clone(inner);
        TimeoutGuard::arm(Duration::from_millis(ms), move || inner.expire(generation))
    }

    /// Timeout expiry. The generation check makes the timer one-shot against
    /// its own session only; a session that already ended, or a newer one,
    /// is left alone.
    fn expire(&self, generation: u64) {
        let mut slot = self.lock_slot();
        let current = slot
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if !current {
            return;
        }
        Self::teardown_locked(&mut slot, false);
        self.bus.emit(SessionEvent::Timeout);
    }

    /// Mid-session engine failure. The worker has already emitted the
    /// `Error` event and exited; this releases the remaining session
    /// resources so the state lands on Stopped, never half torn down.
    fn fault(&self, generation: u64) {
        let mut slot = self.lock_slot();
        let current = slot
            .active
            .as_ref()
            .is_some_and(|active| active.generation == generation);
        if current {
            Self::teardown_locked(&mut slot, false);
        }
    }

    /// Mark a failed start: partially acquired resources are already gone,
    /// the session lands on Stopped. Audio-subsystem and engine-activation
    /// failures additionally surface as an `Error` event.
    fn reject_start(&self, slot: &mut Slot, error: HearkenError) -> HearkenError {
        slot.state = SessionState::Stopped;
        match &error {
            HearkenError::AudioFormat { .. }
            | HearkenError::AudioCapture { .. }
            | HearkenError::Engine { .. }
            | HearkenError::Io(_) => {
                self.bus.emit(SessionEvent::Error {
                    message: error.to_string(),
                });
            }
            _ => {}
        }
        error
    }
}
