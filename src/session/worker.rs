//! The single serialized processing worker.
//!
//! One worker per session consumes the bounded frame queue in FIFO order
//! and fans each frame out to the volume meter, the file writer and the
//! recognition engine. Because the worker is the only consumer, frames
//! reach the engine and the file in exactly their capture order.

use crate::audio::frame::AudioFrame;
use crate::audio::meter::VolumeMeter;
use crate::audio::wav::WavWriter;
use crate::engine::RecognitionEngine;
use crate::session::events::{EventBus, SessionEvent};
use crate::session::router::ResultRouter;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything a session worker owns.
///
/// The engine handle and the file writer are moved in whole: they are
/// mutated only here (and implicitly released here), so no other session's
/// frames can ever interleave on them.
pub(crate) struct Worker {
    pub rx: Receiver<AudioFrame>,
    pub engine: Box<dyn RecognitionEngine>,
    pub writer: Option<WavWriter>,
    pub meter: VolumeMeter,
    pub router: ResultRouter,
    pub bus: EventBus,
    /// Set by teardown when the pending final result should be flushed.
    pub flush_final: Arc<AtomicBool>,
    /// Invoked on a fatal mid-session engine failure; must not block.
    pub on_fault: Box<dyn FnOnce(String) + Send>,
}

impl Worker {
    /// Consume frames until the capture side closes the queue, then run the
    /// teardown tail: flush the pending final result if requested, finalize
    /// the file writer, release the engine handle.
    pub(crate) fn run(mut self) {
        let mut fault: Option<String> = None;

        while let Ok(frame) = self.rx.recv() {
            if let Some(level) = self.meter.process(&frame.samples) {
                self.bus.emit(SessionEvent::VolumeChanged { level });
            }

            self.append_to_file(&frame);

            match self.engine.accept(&frame.samples) {
                Ok(true) => {
                    let raw = self.engine.final_result();
                    self.router.route_final(&raw, &self.bus);
                }
                Ok(false) => {
                    let raw = self.engine.partial_result();
                    self.router.route_partial(&raw, &self.bus);
                }
                Err(e) => {
                    fault = Some(e.to_string());
                    break;
                }
            }
        }

        if fault.is_none()
            && self.flush_final.load(Ordering::Acquire)
            && self.bus.has_listeners()
        {
            let raw = self.engine.final_result();
            self.router.route_final(&raw, &self.bus);
        }

        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.finalize()
        {
            tracing::warn!("finalizing audio file failed: {}", e);
        }

        drop(self.engine);

        if let Some(message) = fault {
            tracing::warn!("session worker faulted: {}", message);
            self.bus.emit(SessionEvent::Error {
                message: message.clone(),
            });
            (self.on_fault)(message);
        }
    }

    /// Append one frame to the audio file.
    ///
    /// Persistence is non-fatal: on failure the writer is finalized
    /// best-effort and dropped, and the session continues without a file.
    fn append_to_file(&mut self, frame: &AudioFrame) {
        if let Some(mut writer) = self.writer.take() {
            match writer.append(&frame.samples) {
                Ok(()) => self.writer = Some(writer),
                Err(e) => {
                    tracing::warn!("audio persistence failed, continuing without file: {}", e);
                    if let Err(e) = writer.finalize() {
                        tracing::debug!("finalize after failed append also failed: {}", e);
                    }
                }
            }
        }
    }
}
