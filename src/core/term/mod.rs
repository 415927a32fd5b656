//! VT byte-stream interpretation
//!
//! [`VtParser`] turns raw pty output into mutations of a [`TerminalState`].
//! Effects on screen content (printed glyphs, erasures, scrolling) and
//! replies owed to the child are queued as [`TermEvent`]s on the state.

pub mod color;
pub mod csi;
pub mod decoder;
pub mod error;
pub mod event;
pub mod osc;
pub mod parser;
pub mod sgr;
pub mod state;

pub use color::{ColorState, Rgba};
pub use decoder::{Decoder, EncodingMode};
pub use error::TermError;
pub use event::{EraseMode, Response, TermEvent};
pub use parser::{ParseState, VtParser};
pub use state::{AttrFlags, TerminalState};
