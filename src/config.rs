//! Session options supplied by the host application.

use crate::defaults;
use crate::error::{HearkenError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration record accepted by `start()`.
///
/// Host bridges pass this as a JSON object with camelCase field names;
/// unknown fields are ignored so older hosts keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionOptions {
    /// Ordered set of phrase constraints the engine is restricted to.
    /// The special phrase `"[unk]"` enables strict matching.
    pub grammar: Option<Vec<String>>,
    /// Duration in milliseconds after which the session self-terminates.
    pub timeout_ms: Option<u64>,
    /// Destination for the captured audio as a WAV file.
    pub audio_file_path: Option<PathBuf>,
}

impl SessionOptions {
    /// Parse an options record from the host's JSON payload.
    ///
    /// # Errors
    /// Returns `InvalidGrammar` for malformed JSON or a grammar that fails
    /// validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: SessionOptions =
            serde_json::from_str(json).map_err(|e| HearkenError::InvalidGrammar {
                message: format!("malformed options record: {}", e),
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Validate the options.
    ///
    /// A grammar that is present but empty, or that contains an empty
    /// phrase, is rejected since the engine would otherwise accept nothing.
    pub fn validate(&self) -> Result<()> {
        if let Some(grammar) = &self.grammar {
            if grammar.is_empty() {
                return Err(HearkenError::InvalidGrammar {
                    message: "grammar phrase list is empty".to_string(),
                });
            }
            if grammar.iter().any(|p| p.trim().is_empty()) {
                return Err(HearkenError::InvalidGrammar {
                    message: "grammar contains an empty phrase".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Whether the grammar requests strict matching via `"[unk]"`.
    pub fn strict_grammar(&self) -> bool {
        self.grammar
            .as_deref()
            .is_some_and(|g| g.iter().any(|p| p == defaults::UNKNOWN_PHRASE))
    }
}
