//! Error types for hearken.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HearkenError {
    // Configuration errors: the triggering call is rejected, session state
    // is left untouched.
    #[error("No recognition model is loaded")]
    NoModelLoaded,

    #[error("Invalid grammar: {message}")]
    InvalidGrammar { message: String },

    // Permission errors: start is rejected before any resource is acquired.
    #[error("Microphone permission denied: {message}")]
    PermissionDenied { message: String },

    // Audio subsystem errors: start is rejected and partially acquired
    // resources are torn down.
    #[error("Audio format negotiation failed: {message}")]
    AudioFormat { message: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition engine errors
    #[error("Recognition engine error: {message}")]
    Engine { message: String },

    // Audio persistence errors: non-fatal to the session, logged and the
    // session continues without a file.
    #[error("Audio persistence failed: {message}")]
    Persistence { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, HearkenError>;
