//! vtinterp - a streaming VT/ANSI escape-sequence interpreter
//!
//! Feeds the raw output of a pseudo-terminal through a byte decoder and an
//! escape-sequence state machine, keeping a [`TerminalState`] that a renderer
//! can draw from.
//!
//! ```
//! use vtinterp::{TermEvent, TerminalState, VtParser};
//!
//! let mut state = TerminalState::new(80, 24);
//! let mut parser = VtParser::new();
//! parser.feed(b"\x1b]2;build\x07ok\x1b[1m", &mut state);
//!
//! assert_eq!(state.title, "build");
//! assert_eq!(state.cursor.col, 2);
//! assert!(state.take_events().contains(&TermEvent::Print('o')));
//! ```

pub mod config;
pub mod core;

pub use crate::config::Config;
pub use crate::core::session::{Session, SessionEvent};
pub use crate::core::term::{
    AttrFlags, ColorState, Decoder, EncodingMode, EraseMode, ParseState, Response, Rgba,
    TermError, TermEvent, TerminalState, VtParser,
};
