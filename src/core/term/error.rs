//! Error taxonomy for the interpreter
//!
//! Only configuration errors are ever returned to callers. Everything raised
//! while a stream is being processed is reported as a
//! [`TermEvent::Diagnostic`](super::TermEvent::Diagnostic) and the parser
//! moves on to the next unit.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TermError {
    #[error("Unsupported encoding mode: {0}")]
    UnsupportedEncodingMode(String),

    #[error("Decoder not initialized")]
    DecoderNotInitialized,

    #[error("Invalid color index: {0}")]
    InvalidColorIndex(i64),

    #[error("Malformed SGR token: {0:?}")]
    MalformedSgrToken(String),

    #[error("Malformed OSC sequence: {0:?}")]
    MalformedOscSequence(String),

    #[error("Unsupported CSI sequence: {0:?}")]
    UnsupportedCsiFinal(String),

    #[error("Unsupported OSC command: {0:?}")]
    UnsupportedOscCommand(String),

    #[error("Unsupported SGR parameter: {0}")]
    UnsupportedSgrParameter(i64),

    #[error("Unsupported escape sequence: ESC {0:?}")]
    UnsupportedEscape(char),
}

pub type Result<T> = std::result::Result<T, TermError>;
