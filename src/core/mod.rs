//! Core terminal emulation components.
//!
//! - **term**: byte decoding, the escape-sequence parser and terminal state
//! - **session**: reader thread plus parse loop driving a `TerminalState`
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── reader thread (Read -> mpsc channel of chunks)
//! └── VtParser
//!     ├── Decoder (ASCII / UTF-8 / Latin-1 / Windows-1251)
//!     ├── CSI / SGR / OSC dispatch
//!     └── TerminalState (cursor, colors, modes, events)
//! ```

pub mod session;
pub mod term;
