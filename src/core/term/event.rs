//! Notifications produced by the interpreter

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::color::Rgba;
use super::error::TermError;

/// Erase extent for EL and ED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// From the cursor to the end
    ToEnd,
    /// From the start to the cursor
    ToStart,
    /// Everything
    All,
    /// Saved lines (ED 3 only)
    Scrollback,
}

impl EraseMode {
    pub fn from_param(param: u16) -> Option<Self> {
        match param {
            0 => Some(EraseMode::ToEnd),
            1 => Some(EraseMode::ToStart),
            2 => Some(EraseMode::All),
            3 => Some(EraseMode::Scrollback),
            _ => None,
        }
    }
}

/// Bytes that should be written back to the pty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Device status: ESC [ 0 n
    StatusOk,
    /// Cursor position report: ESC [ row ; col R
    CursorPosition(u16, u16),
    /// OSC 4 query reply
    PaletteColor { index: u8, color: Rgba },
    /// OSC 10-17 query reply
    DynamicColor { code: u8, color: Rgba },
    /// OSC 52 query reply
    Selection { targets: String, data: Vec<u8> },
}

impl Response {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::StatusOk => b"\x1b[0n".to_vec(),
            Response::CursorPosition(row, col) => {
                format!("\x1b[{};{}R", row, col).into_bytes()
            }
            Response::PaletteColor { index, color } => {
                format!("\x1b]4;{};{}\x1b\\", index, color.to_x11_spec()).into_bytes()
            }
            Response::DynamicColor { code, color } => {
                format!("\x1b]{};{}\x1b\\", code, color.to_x11_spec()).into_bytes()
            }
            Response::Selection { targets, data } => {
                format!("\x1b]52;{};{}\x1b\\", targets, STANDARD.encode(data)).into_bytes()
            }
        }
    }
}

/// State-change notifications, drained with
/// [`TerminalState::take_events`](super::TerminalState::take_events)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermEvent {
    /// A printable character was emitted at the cursor
    Print(char),
    Bell,
    ClearScreen,
    EraseLine(EraseMode),
    EraseDisplay(EraseMode),
    /// Lines `top..=bottom` (0-indexed) moved up by `count`
    ScrollUp { top: u16, bottom: u16, count: u16 },
    /// Lines `top..=bottom` (0-indexed) moved down by `count`
    ScrollDown { top: u16, bottom: u16, count: u16 },
    TitleChanged(String),
    IconTitleChanged(String),
    PaletteChanged { index: u8, color: Rgba },
    DynamicColorChanged { code: u8, color: Rgba },
    /// OSC 52 selection data, already base64-decoded. Bytes are kept as
    /// sent and need not be UTF-8.
    SelectionSet { targets: String, data: Vec<u8> },
    Reply(Response),
    /// A non-fatal problem in the stream
    Diagnostic(TermError),
}
