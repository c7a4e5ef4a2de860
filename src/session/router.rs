//! Converts raw engine output into typed events.
//!
//! The engine produces one JSON string per processed frame, either a partial
//! hypothesis or a completed utterance. The router parses it, suppresses
//! redundant partials and dispatches typed events. Undecodable output is a
//! transient decode hiccup, not a session failure: it is dropped with a log
//! line only.

use crate::session::events::{EventBus, SessionEvent, Transcript, WordTimestamp};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawPartial {
    partial: String,
}

#[derive(Debug, Deserialize)]
struct RawFinal {
    text: String,
    #[serde(default)]
    result: Vec<RawWord>,
}

#[derive(Debug, Deserialize)]
struct RawWord {
    word: String,
    start: f32,
    end: f32,
    conf: f32,
}

/// Routes engine output onto the event bus, de-duplicating partial noise.
///
/// Retains only the most recent partial text, and only to support the
/// de-duplication; results are not kept past dispatch. The teardown-time
/// final flush re-queries the engine, which buffers its own pending result.
pub struct ResultRouter {
    last_partial: String,
}

impl ResultRouter {
    pub fn new() -> Self {
        Self {
            last_partial: String::new(),
        }
    }

    /// Route a partial hypothesis.
    ///
    /// Emits `PartialResult` only when the text is non-empty and differs
    /// from the immediately previous partial.
    pub fn route_partial(&mut self, raw: &str, bus: &EventBus) {
        let parsed: RawPartial = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("dropping undecodable partial result: {}", e);
                return;
            }
        };

        if parsed.partial.is_empty() || parsed.partial == self.last_partial {
            return;
        }

        self.last_partial = parsed.partial.clone();
        bus.emit(SessionEvent::PartialResult {
            text: parsed.partial,
        });
    }

    /// Route a completed utterance.
    ///
    /// Emits `Result` and `FinalResult` carrying the word-timestamp sequence
    /// when the engine supplied one, the plain transcript text otherwise.
    pub fn route_final(&mut self, raw: &str, bus: &EventBus) {
        let parsed: RawFinal = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("dropping undecodable final result: {}", e);
                return;
            }
        };

        // Nothing settled, nothing to announce. Covers the teardown flush
        // when the engine has no buffered speech.
        if parsed.text.is_empty() && parsed.result.is_empty() {
            return;
        }

        let transcript = if parsed.result.is_empty() {
            Transcript::Text(parsed.text)
        } else {
            Transcript::Words(
                parsed
                    .result
                    .into_iter()
                    .map(|w| WordTimestamp {
                        word: w.word,
                        start_sec: w.start,
                        end_sec: w.end,
                        confidence: w.conf,
                    })
                    .collect(),
            )
        };

        // A new utterance starts from a clean partial slate.
        self.last_partial.clear();

        bus.emit(SessionEvent::Result {
            transcript: transcript.clone(),
        });
        bus.emit(SessionEvent::FinalResult { transcript });
    }
}

impl Default for ResultRouter {
    fn default() -> Self {
        Self::new()
    }
}
