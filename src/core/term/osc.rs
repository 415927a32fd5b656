//! OSC command table
//!
//! OSC strings have the form `ESC ] command ; parameter` followed by BEL or
//! `ESC \`. Only the subset a renderer cares about is implemented: titles,
//! palette entries, dynamic colors and selection data.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use super::color::{parse_color_spec, Rgba, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
use super::error::TermError;
use super::event::{Response, TermEvent};
use super::state::{SelectionData, TerminalState};

const QUERY: &str = "?";

/// First and last dynamic color codes (10 = foreground ... 17 = highlight)
const DYNAMIC_FIRST: u8 = 10;
const DYNAMIC_LAST: u8 = 17;

/// A parsed OSC command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscCommand<'a> {
    /// OSC 0
    SetTitleAndIcon(&'a str),
    /// OSC 1
    SetIconTitle(&'a str),
    /// OSC 2
    SetWindowTitle(&'a str),
    /// OSC 4, `index;spec` pairs
    SetPalette(&'a str),
    /// OSC 10-17
    SetDynamicColor { code: u8, specs: &'a str },
    /// OSC 52, `targets;base64`
    Selection(&'a str),
    Unsupported(&'a str),
}

impl<'a> OscCommand<'a> {
    /// Parse a full OSC buffer, introducer and terminator included
    pub fn parse(sequence: &'a str) -> Result<Self, TermError> {
        let body = sequence.strip_prefix("\x1b]").unwrap_or(sequence);
        let body = body
            .strip_suffix('\x07')
            .or_else(|| body.strip_suffix("\x1b\\"))
            .unwrap_or(body);

        let Some((command, param)) = body.split_once(';') else {
            return Err(TermError::MalformedOscSequence(body.to_string()));
        };

        Ok(match command {
            "0" => OscCommand::SetTitleAndIcon(param),
            "1" => OscCommand::SetIconTitle(param),
            "2" => OscCommand::SetWindowTitle(param),
            "4" => OscCommand::SetPalette(param),
            "52" => OscCommand::Selection(param),
            _ => match command.parse::<u8>() {
                Ok(code) if (DYNAMIC_FIRST..=DYNAMIC_LAST).contains(&code) => {
                    OscCommand::SetDynamicColor { code, specs: param }
                }
                _ => OscCommand::Unsupported(command),
            },
        })
    }

    pub fn apply(self, state: &mut TerminalState) {
        match self {
            OscCommand::SetTitleAndIcon(title) => {
                state.set_title(title);
                state.set_icon_title(title);
            }
            OscCommand::SetIconTitle(title) => state.set_icon_title(title),
            OscCommand::SetWindowTitle(title) => state.set_title(title),
            OscCommand::SetPalette(param) => set_palette(param, state),
            OscCommand::SetDynamicColor { code, specs } => set_dynamic_colors(code, specs, state),
            OscCommand::Selection(param) => manipulate_selection(param, state),
            OscCommand::Unsupported(command) => {
                state.report(TermError::UnsupportedOscCommand(command.to_string()));
            }
        }
    }
}

/// Dispatch a completed OSC buffer
pub fn dispatch(sequence: &str, state: &mut TerminalState) {
    match OscCommand::parse(sequence) {
        Ok(command) => {
            debug!(?command, "OSC");
            command.apply(state);
        }
        Err(e) => state.report(e),
    }
}

fn set_palette(param: &str, state: &mut TerminalState) {
    let parts: Vec<&str> = param.split(';').collect();
    if parts.len() % 2 != 0 {
        state.report(TermError::MalformedOscSequence(format!("4;{}", param)));
        return;
    }

    for pair in parts.chunks(2) {
        let (index, spec) = (pair[0], pair[1]);
        let index = match index.parse::<i64>() {
            Ok(i) => match u8::try_from(i) {
                Ok(i) => i,
                Err(_) => {
                    state.report(TermError::InvalidColorIndex(i));
                    continue;
                }
            },
            Err(_) => {
                state.report(TermError::MalformedOscSequence(format!("4;{}", param)));
                continue;
            }
        };

        if spec == QUERY {
            let color = state.palette_color(index);
            state.emit(TermEvent::Reply(Response::PaletteColor { index, color }));
        } else if let Some(color) = parse_color_spec(spec) {
            state.set_palette_color(index, color);
        } else {
            state.report(TermError::MalformedOscSequence(format!("4;{};{}", index, spec)));
        }
    }
}

/// Each further `;`-separated spec applies to the next slot
fn set_dynamic_colors(code: u8, specs: &str, state: &mut TerminalState) {
    for (code, spec) in (code..=DYNAMIC_LAST).zip(specs.split(';')) {
        let slot = usize::from(code - DYNAMIC_FIRST);
        if spec == QUERY {
            let color = state.dynamic_colors[slot].unwrap_or_else(|| default_dynamic_color(code));
            state.emit(TermEvent::Reply(Response::DynamicColor { code, color }));
        } else if let Some(color) = parse_color_spec(spec) {
            state.dynamic_colors[slot] = Some(color);
            state.emit(TermEvent::DynamicColorChanged { code, color });
        } else {
            state.report(TermError::MalformedOscSequence(format!("{};{}", code, spec)));
        }
    }
}

/// Color reported for a slot that was never set
fn default_dynamic_color(code: u8) -> Rgba {
    match code {
        11 | 14 | 16 | 17 => DEFAULT_BACKGROUND,
        _ => DEFAULT_FOREGROUND,
    }
}

fn manipulate_selection(param: &str, state: &mut TerminalState) {
    let Some((targets, data)) = param.split_once(';') else {
        state.report(TermError::MalformedOscSequence(format!("52;{}", param)));
        return;
    };
    // xterm's default target list
    let targets = if targets.is_empty() { "s0" } else { targets };

    if data == QUERY {
        let data = state
            .selection
            .as_ref()
            .map(|s| s.data.clone())
            .unwrap_or_default();
        state.emit(TermEvent::Reply(Response::Selection {
            targets: targets.to_string(),
            data,
        }));
        return;
    }

    match STANDARD.decode(data) {
        Ok(data) => {
            state.selection = Some(SelectionData {
                targets: targets.to_string(),
                data: data.clone(),
            });
            state.emit(TermEvent::SelectionSet {
                targets: targets.to_string(),
                data,
            });
        }
        Err(e) => {
            debug!("OSC 52 payload is not base64: {}", e);
            state.report(TermError::MalformedOscSequence(format!("52;{}", param)));
        }
    }
}
