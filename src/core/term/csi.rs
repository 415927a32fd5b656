//! CSI command table
//!
//! A completed control sequence arrives as everything after `ESC [`,
//! final byte included. It is routed on the final byte into a
//! [`CsiCommand`], then applied to the terminal state.

use tracing::debug;

use super::error::TermError;
use super::event::{EraseMode, Response, TermEvent};
use super::sgr;
use super::state::TerminalState;

/// A parsed control sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsiCommand<'a> {
    /// CUP / HVP, 1-based
    CursorPosition { row: u16, col: u16 },
    CursorUp(u16),
    CursorDown(u16),
    CursorForward(u16),
    CursorBackward(u16),
    /// CNL
    CursorNextLine(u16),
    /// CPL
    CursorPreviousLine(u16),
    /// CHA, 1-based
    CursorColumn(u16),
    /// VPA, 1-based
    CursorRow(u16),
    /// SGR with its raw parameter text
    Sgr(&'a str),
    /// `ESC [ 2 J`
    ClearScreen,
    EraseDisplay(EraseMode),
    EraseLine(EraseMode),
    ScrollUp(u16),
    ScrollDown(u16),
    DeviceStatusReport(u16),
    SetMode { private: bool, modes: Vec<u16>, enable: bool },
    /// DECSTBM, 1-based; `None` bottom means the last row
    SetScrollingRegion { top: u16, bottom: Option<u16> },
    SaveCursor,
    RestoreCursor,
    Unsupported(&'a str),
}

impl<'a> CsiCommand<'a> {
    /// Route a sequence on its final byte
    pub fn parse(sequence: &'a str) -> Self {
        let Some((split, final_char)) = sequence.char_indices().last() else {
            return CsiCommand::Unsupported(sequence);
        };
        if !final_char.is_ascii() {
            return CsiCommand::Unsupported(sequence);
        }
        let final_byte = final_char as u8;
        let params = &sequence[..split];

        if sequence == "2J" {
            return CsiCommand::ClearScreen;
        }

        // Set/reset mode carries its own private marker
        if final_byte == b'h' || final_byte == b'l' {
            let (private, list) = match params.strip_prefix('?') {
                Some(rest) => (true, rest),
                None => (false, params),
            };
            return CsiCommand::SetMode {
                private,
                modes: numbers(list),
                enable: final_byte == b'h',
            };
        }

        // Private-marker or intermediate-byte variants of other finals are
        // different commands (e.g. `CSI > 4 ; 1 m`, `CSI 2 SP q`)
        if params.starts_with(&['<', '=', '>', '?'][..])
            || params.bytes().any(|b| (0x20..=0x2F).contains(&b))
        {
            return CsiCommand::Unsupported(sequence);
        }

        match final_byte {
            b'H' | b'f' => {
                let values = numbers(params);
                CsiCommand::CursorPosition {
                    row: nth_or(&values, 0, 1),
                    col: nth_or(&values, 1, 1),
                }
            }
            b'A' => CsiCommand::CursorUp(count(params)),
            b'B' => CsiCommand::CursorDown(count(params)),
            b'C' => CsiCommand::CursorForward(count(params)),
            b'D' => CsiCommand::CursorBackward(count(params)),
            b'E' => CsiCommand::CursorNextLine(count(params)),
            b'F' => CsiCommand::CursorPreviousLine(count(params)),
            b'G' => CsiCommand::CursorColumn(count(params)),
            b'd' => CsiCommand::CursorRow(count(params)),
            b'm' => CsiCommand::Sgr(params),
            b'J' => match EraseMode::from_param(first(params)) {
                Some(mode) => CsiCommand::EraseDisplay(mode),
                None => CsiCommand::Unsupported(sequence),
            },
            b'K' => match EraseMode::from_param(first(params)) {
                Some(mode) if mode != EraseMode::Scrollback => CsiCommand::EraseLine(mode),
                _ => CsiCommand::Unsupported(sequence),
            },
            b'S' => CsiCommand::ScrollUp(count(params)),
            b'T' => CsiCommand::ScrollDown(count(params)),
            b'n' => CsiCommand::DeviceStatusReport(first(params)),
            b'r' => {
                let values = numbers(params);
                CsiCommand::SetScrollingRegion {
                    top: nth_or(&values, 0, 1),
                    bottom: values.get(1).copied().filter(|&n| n != 0),
                }
            }
            b's' if params.is_empty() => CsiCommand::SaveCursor,
            b'u' if params.is_empty() => CsiCommand::RestoreCursor,
            _ => CsiCommand::Unsupported(sequence),
        }
    }

    pub fn apply(self, state: &mut TerminalState) {
        match self {
            CsiCommand::CursorPosition { row, col } => state.cursor_position(row, col),
            CsiCommand::CursorUp(n) => state.cursor_up(n),
            CsiCommand::CursorDown(n) => state.cursor_down(n),
            CsiCommand::CursorForward(n) => state.cursor_forward(n),
            CsiCommand::CursorBackward(n) => state.cursor_backward(n),
            CsiCommand::CursorNextLine(n) => {
                state.cursor_down(n);
                state.carriage_return();
            }
            CsiCommand::CursorPreviousLine(n) => {
                state.cursor_up(n);
                state.carriage_return();
            }
            CsiCommand::CursorColumn(col) => state.cursor_to_col(col),
            CsiCommand::CursorRow(row) => state.cursor_to_row(row),
            CsiCommand::Sgr(params) => sgr::apply(params, state),
            CsiCommand::ClearScreen => state.clear_screen(),
            CsiCommand::EraseDisplay(mode) => state.erase_in_display(mode),
            CsiCommand::EraseLine(mode) => state.erase_in_line(mode),
            CsiCommand::ScrollUp(n) => state.scroll_up(n),
            CsiCommand::ScrollDown(n) => state.scroll_down(n),
            CsiCommand::DeviceStatusReport(kind) => match kind {
                5 => state.emit(TermEvent::Reply(Response::StatusOk)),
                6 => {
                    let (row, col) = (state.cursor.row + 1, state.cursor.col + 1);
                    state.emit(TermEvent::Reply(Response::CursorPosition(row, col)));
                }
                _ => debug!("Ignoring device status report {}", kind),
            },
            CsiCommand::SetMode { private, modes, enable } => {
                for mode in modes {
                    if private {
                        state.set_private_mode(mode, enable);
                    } else {
                        state.set_mode(mode, enable);
                    }
                }
            }
            CsiCommand::SetScrollingRegion { top, bottom } => {
                let bottom = bottom.unwrap_or(state.rows);
                state.set_scroll_region(top, bottom);
            }
            CsiCommand::SaveCursor => state.save_cursor(),
            CsiCommand::RestoreCursor => state.restore_cursor(),
            CsiCommand::Unsupported(sequence) => {
                state.report(TermError::UnsupportedCsiFinal(sequence.to_string()));
            }
        }
    }
}

/// Dispatch a completed sequence (parameters plus final byte)
pub fn dispatch(sequence: &str, state: &mut TerminalState) {
    let command = CsiCommand::parse(sequence);
    debug!(?command, "CSI");
    command.apply(state);
}

/// Split `;`-separated numbers. Empty or non-numeric entries become 0,
/// oversized ones saturate.
fn numbers(params: &str) -> Vec<u16> {
    params
        .split(';')
        .map(|token| {
            token
                .parse::<u32>()
                .map(|n| u16::try_from(n).unwrap_or(u16::MAX))
                .unwrap_or(0)
        })
        .collect()
}

fn first(params: &str) -> u16 {
    numbers(params).first().copied().unwrap_or(0)
}

/// Entry `i`, with 0 or absent meaning `default`
fn nth_or(values: &[u16], i: usize, default: u16) -> u16 {
    values.get(i).copied().filter(|&n| n != 0).unwrap_or(default)
}

/// A count parameter, default 1
fn count(params: &str) -> u16 {
    nth_or(&numbers(params), 0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::color::ANSI_COLORS;

    #[test]
    fn test_routing() {
        assert_eq!(
            CsiCommand::parse("5;10H"),
            CsiCommand::CursorPosition { row: 5, col: 10 }
        );
        assert_eq!(
            CsiCommand::parse("f"),
            CsiCommand::CursorPosition { row: 1, col: 1 }
        );
        assert_eq!(
            CsiCommand::parse(";7H"),
            CsiCommand::CursorPosition { row: 1, col: 7 }
        );
        assert_eq!(CsiCommand::parse("A"), CsiCommand::CursorUp(1));
        assert_eq!(CsiCommand::parse("0B"), CsiCommand::CursorDown(1));
        assert_eq!(CsiCommand::parse("12C"), CsiCommand::CursorForward(12));
        assert_eq!(CsiCommand::parse("3D"), CsiCommand::CursorBackward(3));
        assert_eq!(CsiCommand::parse("1;31m"), CsiCommand::Sgr("1;31"));
        assert_eq!(CsiCommand::parse("2J"), CsiCommand::ClearScreen);
        assert_eq!(CsiCommand::parse("J"), CsiCommand::EraseDisplay(EraseMode::ToEnd));
        assert_eq!(CsiCommand::parse("1K"), CsiCommand::EraseLine(EraseMode::ToStart));
        assert_eq!(CsiCommand::parse("2S"), CsiCommand::ScrollUp(2));
        assert_eq!(CsiCommand::parse("T"), CsiCommand::ScrollDown(1));
        assert_eq!(CsiCommand::parse("6n"), CsiCommand::DeviceStatusReport(6));
        assert_eq!(
            CsiCommand::parse("?25;1049h"),
            CsiCommand::SetMode { private: true, modes: vec![25, 1049], enable: true }
        );
        assert_eq!(
            CsiCommand::parse("4l"),
            CsiCommand::SetMode { private: false, modes: vec![4], enable: false }
        );
        assert_eq!(
            CsiCommand::parse("3;20r"),
            CsiCommand::SetScrollingRegion { top: 3, bottom: Some(20) }
        );
        assert_eq!(
            CsiCommand::parse("r"),
            CsiCommand::SetScrollingRegion { top: 1, bottom: None }
        );
    }

    #[test]
    fn test_unsupported_routing() {
        assert_eq!(CsiCommand::parse("5K"), CsiCommand::Unsupported("5K"));
        assert_eq!(CsiCommand::parse("9J"), CsiCommand::Unsupported("9J"));
        assert_eq!(CsiCommand::parse("Z"), CsiCommand::Unsupported("Z"));
        assert_eq!(CsiCommand::parse(">4;1m"), CsiCommand::Unsupported(">4;1m"));
        assert_eq!(CsiCommand::parse("2 q"), CsiCommand::Unsupported("2 q"));
        assert_eq!(CsiCommand::parse("1é"), CsiCommand::Unsupported("1é"));
        assert_eq!(CsiCommand::parse(""), CsiCommand::Unsupported(""));
    }

    #[test]
    fn test_oversized_params_saturate() {
        assert_eq!(CsiCommand::parse("99999A"), CsiCommand::CursorUp(u16::MAX));
    }

    #[test]
    fn test_cursor_movement() {
        let mut state = TerminalState::new(80, 24);
        dispatch("5;10H", &mut state);
        assert_eq!((state.cursor.row, state.cursor.col), (4, 9));
        dispatch("2A", &mut state);
        dispatch("3C", &mut state);
        assert_eq!((state.cursor.row, state.cursor.col), (2, 12));
        dispatch("100B", &mut state);
        dispatch("100D", &mut state);
        assert_eq!((state.cursor.row, state.cursor.col), (23, 0));
        dispatch("2F", &mut state);
        assert_eq!((state.cursor.row, state.cursor.col), (21, 0));
        dispatch("40G", &mut state);
        dispatch("7d", &mut state);
        assert_eq!((state.cursor.row, state.cursor.col), (6, 39));
    }

    #[test]
    fn test_sgr_colors() {
        let mut state = TerminalState::new(80, 24);
        dispatch("31m", &mut state);
        assert_eq!(state.colors.foreground, ANSI_COLORS[1]);
    }

    #[test]
    fn test_device_status_reports() {
        let mut state = TerminalState::new(80, 24);
        dispatch("3;4H", &mut state);
        dispatch("5n", &mut state);
        dispatch("6n", &mut state);
        assert_eq!(
            state.take_events(),
            vec![
                TermEvent::Reply(Response::StatusOk),
                TermEvent::Reply(Response::CursorPosition(3, 4)),
            ]
        );
    }

    #[test]
    fn test_modes() {
        let mut state = TerminalState::new(80, 24);
        dispatch("?25l", &mut state);
        dispatch("?7l", &mut state);
        dispatch("20h", &mut state);
        assert!(!state.cursor.visible);
        assert!(!state.modes.auto_wrap);
        assert!(state.modes.linefeed_newline);

        dispatch("5;5H", &mut state);
        dispatch("?1049h", &mut state);
        assert!(state.modes.alternate_screen);
        dispatch("H", &mut state);
        dispatch("?1049l", &mut state);
        assert!(!state.modes.alternate_screen);
        assert_eq!((state.cursor.row, state.cursor.col), (4, 4));
    }

    #[test]
    fn test_erase_and_scroll_events() {
        let mut state = TerminalState::new(80, 24);
        dispatch("K", &mut state);
        dispatch("2J", &mut state);
        dispatch("3S", &mut state);
        assert_eq!(
            state.take_events(),
            vec![
                TermEvent::EraseLine(EraseMode::ToEnd),
                TermEvent::ClearScreen,
                TermEvent::ScrollUp { top: 0, bottom: 23, count: 3 },
            ]
        );
    }

    #[test]
    fn test_scroll_region_defaults_to_last_row() {
        let mut state = TerminalState::new(80, 24);
        dispatch("5r", &mut state);
        assert_eq!(state.scroll_region, (4, 23));
        dispatch("r", &mut state);
        assert_eq!(state.scroll_region, (0, 23));
    }

    #[test]
    fn test_unsupported_is_reported() {
        let mut state = TerminalState::new(80, 24);
        dispatch("Z", &mut state);
        assert_eq!(
            state.take_events(),
            vec![TermEvent::Diagnostic(TermError::UnsupportedCsiFinal("Z".to_string()))]
        );
    }
}
