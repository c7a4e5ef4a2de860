//! Typed session events and the bus that delivers them to listeners.

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One recognized word with its timing, relative to session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start_sec: f32,
    pub end_sec: f32,
    /// Engine confidence in [0.0, 1.0].
    pub confidence: f32,
}

/// Payload of a settled recognition result: the word-timestamp sequence when
/// the engine supplied one, the plain transcript text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transcript {
    Words(Vec<WordTimestamp>),
    Text(String),
}

impl Transcript {
    /// The plain text of this transcript.
    pub fn text(&self) -> String {
        match self {
            Transcript::Text(text) => text.clone(),
            Transcript::Words(words) => words
                .iter()
                .map(|w| w.word.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Events emitted to host listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A completed utterance (paired with `FinalResult`).
    Result { transcript: Transcript },
    /// A changed, non-empty partial hypothesis.
    PartialResult { text: String },
    /// A completed utterance, including the teardown-time flush.
    FinalResult { transcript: Transcript },
    /// An in-flight failure; the session has been torn down to Stopped.
    Error { message: String },
    /// The session's timeout expired. A normal terminal event, not an error.
    Timeout,
    /// Throttled loudness update, normalized to [0, 1].
    VolumeChanged { level: f32 },
}

/// Fan-out bus from the session to host listeners.
///
/// Each subscriber gets its own unbounded channel; delivery order per
/// subscriber is the enqueue order. Disconnected subscribers are pruned on
/// the next emit.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<SessionEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; events arrive on the returned receiver.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Deliver one event to every live listener.
    pub fn emit(&self, event: SessionEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// True if at least one listener is registered.
    ///
    /// Dropped receivers are only detected (and pruned) at emit time, so
    /// this may briefly overcount.
    pub fn has_listeners(&self) -> bool {
        self.subscribers
            .lock()
            .map(|subscribers| !subscribers.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_emit_order() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        bus.emit(SessionEvent::PartialResult {
            text: "he".to_string(),
        });
        bus.emit(SessionEvent::VolumeChanged { level: 0.5 });
        bus.emit(SessionEvent::Timeout);

        assert_eq!(
            rx.recv().unwrap(),
            SessionEvent::PartialResult {
                text: "he".to_string()
            }
        );
        assert_eq!(rx.recv().unwrap(), SessionEvent::VolumeChanged { level: 0.5 });
        assert_eq!(rx.recv().unwrap(), SessionEvent::Timeout);
    }

    #[test]
    fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        bus.emit(SessionEvent::Timeout);

        assert_eq!(rx1.recv().unwrap(), SessionEvent::Timeout);
        assert_eq!(rx2.recv().unwrap(), SessionEvent::Timeout);
    }

    #[test]
    fn test_disconnected_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);

        bus.emit(SessionEvent::Timeout);
        assert!(!bus.has_listeners());
    }

    #[test]
    fn test_has_listeners() {
        let bus = EventBus::new();
        assert!(!bus.has_listeners());

        let _rx = bus.subscribe();
        assert!(bus.has_listeners());
    }

    #[test]
    fn test_event_json_format() {
        let json = serde_json::to_string(&SessionEvent::PartialResult {
            text: "hello".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"partial_result","text":"hello"}"#);

        let json = serde_json::to_string(&SessionEvent::Timeout).unwrap();
        assert_eq!(json, r#"{"type":"timeout"}"#);
    }

    #[test]
    fn test_final_result_serializes_words_or_text() {
        let with_words = SessionEvent::FinalResult {
            transcript: Transcript::Words(vec![WordTimestamp {
                word: "hi".to_string(),
                start_sec: 0.1,
                end_sec: 0.4,
                confidence: 0.92,
            }]),
        };
        let json = serde_json::to_string(&with_words).unwrap();
        assert!(json.contains(r#""type":"final_result""#));
        assert!(json.contains(r#""word":"hi""#));

        let with_text = SessionEvent::FinalResult {
            transcript: Transcript::Text("hi there".to_string()),
        };
        let json = serde_json::to_string(&with_text).unwrap();
        assert!(json.contains(r#""transcript":"hi there""#));
    }

    #[test]
    fn test_transcript_text_joins_words() {
        let transcript = Transcript::Words(vec![
            WordTimestamp {
                word: "hello".to_string(),
                start_sec: 0.0,
                end_sec: 0.3,
                confidence: 1.0,
            },
            WordTimestamp {
                word: "world".to_string(),
                start_sec: 0.4,
                end_sec: 0.8,
                confidence: 0.9,
            },
        ]);
        assert_eq!(transcript.text(), "hello world");
        assert_eq!(Transcript::Text("plain".to_string()).text(), "plain");
    }
}
