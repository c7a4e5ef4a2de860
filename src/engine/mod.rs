//! Recognition engine boundary.
//!
//! The engine is an opaque, externally supplied dependency with a
//! handle-based API: create (with or without a grammar constraint),
//! accept-waveform, get-partial-result, get-final-result, free. Handles are
//! freed by dropping. Word timestamps are enabled unconditionally at
//! recognizer creation.
//!
//! Result accessors return the engine's JSON strings; parsing and
//! de-duplication happen in the session's result router.

#[cfg(feature = "vosk")]
pub mod vosk;

use crate::error::{HearkenError, Result};
use std::any::Any;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Opaque handle to a loaded recognition model.
///
/// The model stays in memory between sessions; each session creates its own
/// recognizer from it. `as_any` lets a provider recover its concrete model
/// type from the handle it previously issued.
pub trait ModelHandle: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// One live recognizer. Created per session, destroyed at teardown.
pub trait RecognitionEngine: Send {
    /// Feed one frame of interleaved PCM16 samples.
    ///
    /// # Returns
    /// true when the engine has endpointed a completed utterance (fetch it
    /// with `final_result`), false while a partial hypothesis is pending.
    fn accept(&mut self, samples: &[i16]) -> Result<bool>;

    /// The engine's current partial hypothesis, as its JSON string.
    fn partial_result(&mut self) -> String;

    /// The engine's settled result, as its JSON string. Also used at
    /// teardown to flush whatever is still buffered.
    fn final_result(&mut self) -> String;
}

/// Factory boundary the session controller drives.
pub trait EngineProvider: Send + Sync {
    /// Load a model from disk.
    ///
    /// # Errors
    /// Returns `Engine` if the model cannot be loaded.
    fn load_model(&self, path: &Path) -> Result<Arc<dyn ModelHandle>>;

    /// Create a recognizer for one session.
    ///
    /// Word timestamps are always enabled. A grammar restricts recognition
    /// to the given phrases; `"[unk]"` among them enables strict matching.
    ///
    /// # Errors
    /// Returns `Engine` on recognizer-creation failure or `InvalidGrammar`
    /// when the engine rejects the phrase set.
    fn create_engine(
        &self,
        model: &Arc<dyn ModelHandle>,
        sample_rate: u32,
        grammar: Option<&[String]>,
    ) -> Result<Box<dyn RecognitionEngine>>;
}

/// Mock model handle for testing.
pub struct MockModel;

impl ModelHandle for MockModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One scripted engine response.
#[derive(Debug, Clone)]
enum ScriptedStep {
    Partial(String),
    Final(String),
}

/// Mock recognition engine for testing.
///
/// Plays back a script of partial/final steps, one per accepted frame, and
/// records how many frames it saw. Dropping the engine sets its `freed`
/// flag, which tests use to assert teardown order.
pub struct MockEngine {
    script: VecDeque<ScriptedStep>,
    current_partial: String,
    pending_final: String,
    accepted: Arc<AtomicUsize>,
    freed: Arc<AtomicBool>,
    fail_accept: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            current_partial: r#"{"partial": ""}"#.to_string(),
            pending_final: r#"{"text": ""}"#.to_string(),
            accepted: Arc::new(AtomicUsize::new(0)),
            freed: Arc::new(AtomicBool::new(false)),
            fail_accept: false,
        }
    }

    /// Queue a partial hypothesis with the given text.
    pub fn with_partial(mut self, text: &str) -> Self {
        self.script.push_back(ScriptedStep::Partial(format!(
            r#"{{"partial": "{}"}}"#,
            text
        )));
        self
    }

    /// Queue a raw partial payload (for malformed-output tests).
    pub fn with_raw_partial(mut self, json: &str) -> Self {
        self.script
            .push_back(ScriptedStep::Partial(json.to_string()));
        self
    }

    /// Queue an endpointed utterance with plain text.
    pub fn with_final_text(mut self, text: &str) -> Self {
        self.script
            .push_back(ScriptedStep::Final(format!(r#"{{"text": "{}"}}"#, text)));
        self
    }

    /// Queue an endpointed utterance with a raw result payload.
    pub fn with_raw_final(mut self, json: &str) -> Self {
        self.script.push_back(ScriptedStep::Final(json.to_string()));
        self
    }

    /// Set the residual result returned once the script is exhausted and at
    /// teardown flush.
    pub fn with_residual(mut self, json: &str) -> Self {
        self.pending_final = json.to_string();
        self
    }

    /// Configure accept to fail.
    pub fn with_accept_failure(mut self) -> Self {
        self.fail_accept = true;
        self
    }

    /// Shared counter of accepted frames.
    pub fn accepted_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.accepted)
    }

    /// Shared flag set when the engine handle is dropped.
    pub fn freed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.freed)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionEngine for MockEngine {
    fn accept(&mut self, _samples: &[i16]) -> Result<bool> {
        if self.fail_accept {
            return Err(HearkenError::Engine {
                message: "mock accept failure".to_string(),
            });
        }
        self.accepted.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(ScriptedStep::Partial(json)) => {
                self.current_partial = json;
                Ok(false)
            }
            Some(ScriptedStep::Final(json)) => {
                self.pending_final = json;
                Ok(true)
            }
            None => {
                self.current_partial = r#"{"partial": ""}"#.to_string();
                Ok(false)
            }
        }
    }

    fn partial_result(&mut self) -> String {
        self.current_partial.clone()
    }

    // Consumes the settled result like a real recognizer does.
    fn final_result(&mut self) -> String {
        std::mem::replace(&mut self.pending_final, r#"{"text": ""}"#.to_string())
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.freed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockProviderState {
    engines: VecDeque<MockEngine>,
    grammars: Vec<Option<Vec<String>>>,
    sample_rates: Vec<u32>,
    fail_load: bool,
    fail_create: bool,
}

/// Mock engine provider for testing.
///
/// Hands out queued `MockEngine`s (a default engine when the queue is
/// empty) and records the grammar and sample rate of every create call.
#[derive(Clone, Default)]
pub struct MockEngineProvider {
    state: Arc<Mutex<MockProviderState>>,
}

impl MockEngineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an engine for the next create call.
    pub fn with_engine(self, engine: MockEngine) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.engines.push_back(engine);
        }
        self
    }

    /// Configure model loading to fail.
    pub fn with_load_failure(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.fail_load = true;
        }
        self
    }

    /// Configure recognizer creation to fail.
    pub fn with_create_failure(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.fail_create = true;
        }
        self
    }

    /// Grammars passed to create calls, in order.
    pub fn grammars(&self) -> Vec<Option<Vec<String>>> {
        self.state.lock().map(|s| s.grammars.clone()).unwrap_or_default()
    }

    /// Sample rates passed to create calls, in order.
    pub fn sample_rates(&self) -> Vec<u32> {
        self.state
            .lock()
            .map(|s| s.sample_rates.clone())
            .unwrap_or_default()
    }

    /// Number of recognizers created so far.
    pub fn created(&self) -> usize {
        self.state.lock().map(|s| s.grammars.len()).unwrap_or(0)
    }
}

impl EngineProvider for MockEngineProvider {
    fn load_model(&self, path: &Path) -> Result<Arc<dyn ModelHandle>> {
        let state = self.state.lock().map_err(|_| HearkenError::Engine {
            message: "mock provider poisoned".to_string(),
        })?;
        if state.fail_load {
            return Err(HearkenError::Engine {
                message: format!("cannot load model at {}", path.display()),
            });
        }
        Ok(Arc::new(MockModel))
    }

    fn create_engine(
        &self,
        _model: &Arc<dyn ModelHandle>,
        sample_rate: u32,
        grammar: Option<&[String]>,
    ) -> Result<Box<dyn RecognitionEngine>> {
        let mut state = self.state.lock().map_err(|_| HearkenError::Engine {
            message: "mock provider poisoned".to_string(),
        })?;
        if state.fail_create {
            return Err(HearkenError::Engine {
                message: "mock recognizer creation failure".to_string(),
            });
        }
        state.grammars.push(grammar.map(|g| g.to_vec()));
        state.sample_rates.push(sample_rate);
        let engine = state.engines.pop_front().unwrap_or_default();
        Ok(Box::new(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_engine_plays_back_script() {
        let mut engine = MockEngine::new()
            .with_partial("he")
            .with_partial("hello")
            .with_final_text("hello world");

        assert!(!engine.accept(&[0; 16]).unwrap());
        assert_eq!(engine.partial_result(), r#"{"partial": "he"}"#);

        assert!(!engine.accept(&[0; 16]).unwrap());
        assert_eq!(engine.partial_result(), r#"{"partial": "hello"}"#);

        assert!(engine.accept(&[0; 16]).unwrap());
        assert_eq!(engine.final_result(), r#"{"text": "hello world"}"#);
    }

    #[test]
    fn test_mock_engine_exhausted_script_yields_empty_partials() {
        let mut engine = MockEngine::new();
        assert!(!engine.accept(&[0; 16]).unwrap());
        assert_eq!(engine.partial_result(), r#"{"partial": ""}"#);
    }

    #[test]
    fn test_mock_engine_final_result_is_consumed() {
        let mut engine = MockEngine::new().with_final_text("once");
        assert!(engine.accept(&[0; 16]).unwrap());
        assert_eq!(engine.final_result(), r#"{"text": "once"}"#);
        assert_eq!(engine.final_result(), r#"{"text": ""}"#);
    }

    #[test]
    fn test_mock_engine_counts_accepts_and_signals_free() {
        let engine = MockEngine::new();
        let accepted = engine.accepted_counter();
        let freed = engine.freed_flag();

        let mut boxed: Box<dyn RecognitionEngine> = Box::new(engine);
        boxed.accept(&[0; 16]).unwrap();
        boxed.accept(&[0; 16]).unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
        assert!(!freed.load(Ordering::SeqCst));

        drop(boxed);
        assert!(freed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_mock_engine_accept_failure() {
        let mut engine = MockEngine::new().with_accept_failure();
        assert!(matches!(
            engine.accept(&[0; 16]),
            Err(HearkenError::Engine { .. })
        ));
    }

    #[test]
    fn test_mock_provider_records_create_calls() {
        let provider = MockEngineProvider::new();
        let model = provider.load_model(Path::new("/models/test")).unwrap();

        let grammar = vec!["yes".to_string(), "no".to_string()];
        provider
            .create_engine(&model, 16000, Some(&grammar))
            .unwrap();
        provider.create_engine(&model, 44100, None).unwrap();

        assert_eq!(provider.created(), 2);
        assert_eq!(provider.grammars(), vec![Some(grammar), None]);
        assert_eq!(provider.sample_rates(), vec![16000, 44100]);
    }

    #[test]
    fn test_mock_provider_load_failure() {
        let provider = MockEngineProvider::new().with_load_failure();
        let result = provider.load_model(Path::new("/missing"));
        assert!(matches!(result, Err(HearkenError::Engine { .. })));
    }

    #[test]
    fn test_mock_provider_create_failure() {
        let provider = MockEngineProvider::new().with_create_failure();
        let model = Arc::new(MockModel) as Arc<dyn ModelHandle>;
        let result = provider.create_engine(&model, 16000, None);
        assert!(matches!(result, Err(HearkenError::Engine { .. })));
    }
}
