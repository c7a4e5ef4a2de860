//! Vosk adapter for the recognition engine boundary.
//!
//! Feature-gated: hosts that embed Vosk enable the `vosk` feature and use
//! `VoskProvider`; everything else in the crate stays engine-agnostic.

use crate::engine::{EngineProvider, ModelHandle, RecognitionEngine};
use crate::error::{HearkenError, Result};
use serde_json::json;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;

/// A loaded Vosk model.
pub struct VoskModel(vosk::Model);

// SAFETY: the underlying VoskModel is reference-counted and documented as
// safe to share between recognizers on different threads.
unsafe impl Send for VoskModel {}
unsafe impl Sync for VoskModel {}

impl ModelHandle for VoskModel {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One live Vosk recognizer.
pub struct VoskEngine {
    recognizer: vosk::Recognizer,
}

// SAFETY: the recognizer is owned by a single session worker; it is moved
// between threads whole, never shared.
unsafe impl Send for VoskEngine {}

impl RecognitionEngine for VoskEngine {
    fn accept(&mut self, samples: &[i16]) -> Result<bool> {
        match self.recognizer.accept_waveform(samples) {
            Ok(vosk::DecodingState::Finalized) => Ok(true),
            Ok(vosk::DecodingState::Running) => Ok(false),
            Ok(vosk::DecodingState::Failed) | Err(_) => Err(HearkenError::Engine {
                message: "waveform decoding failed".to_string(),
            }),
        }
    }

    fn partial_result(&mut self) -> String {
        let partial = self.recognizer.partial_result();
        json!({ "partial": partial.partial }).to_string()
    }

    fn final_result(&mut self) -> String {
        match self.recognizer.final_result().single() {
            Some(result) => {
                let words: Vec<_> = result
                    .result
                    .iter()
                    .map(|w| {
                        json!({
                            "word": w.word,
                            "start": w.start,
                            "end": w.end,
                            "conf": w.conf,
                        })
                    })
                    .collect();
                json!({ "text": result.text, "result": words }).to_string()
            }
            None => json!({ "text": "" }).to_string(),
        }
    }
}

/// Engine provider backed by the Vosk library.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoskProvider;

impl VoskProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EngineProvider for VoskProvider {
    fn load_model(&self, path: &Path) -> Result<Arc<dyn ModelHandle>> {
        let model =
            vosk::Model::new(path.to_string_lossy()).ok_or_else(|| HearkenError::Engine {
                message: format!("cannot load model at {}", path.display()),
            })?;
        Ok(Arc::new(VoskModel(model)))
    }

    fn create_engine(
        &self,
        model: &Arc<dyn ModelHandle>,
        sample_rate: u32,
        grammar: Option<&[String]>,
    ) -> Result<Box<dyn RecognitionEngine>> {
        let model = model
            .as_any()
            .downcast_ref::<VoskModel>()
            .ok_or_else(|| HearkenError::Engine {
                message: "model handle was not created by VoskProvider".to_string(),
            })?;

        let mut recognizer = match grammar {
            Some(phrases) => {
                let phrases: Vec<&str> = phrases.iter().map(String::as_str).collect();
                vosk::Recognizer::new_with_grammar(&model.0, sample_rate as f32, &phrases)
                    .ok_or_else(|| HearkenError::InvalidGrammar {
                        message: "engine rejected the grammar phrase set".to_string(),
                    })?
            }
            None => vosk::Recognizer::new(&model.0, sample_rate as f32).ok_or_else(|| {
                HearkenError::Engine {
                    message: "recognizer creation failed".to_string(),
                }
            })?,
        };
        recognizer.set_words(true);

        Ok(Box::new(VoskEngine { recognizer }))
    }
}
