//! SGR (Select Graphic Rendition) handling
//!
//! Parameters arrive as the raw text between `ESC [` and `m`. Tokens are
//! applied left to right and each one mutates the state immediately, so a
//! bad token only costs itself.

use super::color::Rgba;
use super::error::TermError;
use super::state::{AttrFlags, TerminalState};

/// Apply an SGR parameter list
pub fn apply(params: &str, state: &mut TerminalState) {
    // No parameters means reset
    let params = if params.is_empty() { "0" } else { params };

    let mut tokens = params.split(';');
    while let Some(token) = tokens.next() {
        if token.contains(':') {
            apply_colon_token(token, state);
            continue;
        }

        let Some(value) = parse_token(token) else {
            state.report(TermError::MalformedSgrToken(token.to_string()));
            continue;
        };

        match value {
            38 => {
                if let Some(color) = extended_color(&mut tokens, state) {
                    state.set_foreground_rgba(color);
                }
            }
            48 => {
                if let Some(color) = extended_color(&mut tokens, state) {
                    state.set_background_rgba(color);
                }
            }
            _ => apply_code(value, state),
        }
    }
}

/// Numeric token. An empty token is malformed; only an empty list resets.
fn parse_token(token: &str) -> Option<i64> {
    token.parse().ok()
}

fn apply_code(value: i64, state: &mut TerminalState) {
    match value {
        0 => state.reset_graphics_mode(),
        1 => state.attrs |= AttrFlags::BOLD,
        2 => state.attrs |= AttrFlags::DIM,
        3 => state.attrs |= AttrFlags::ITALIC,
        4 => state.attrs |= AttrFlags::UNDERLINE,
        5 => state.attrs |= AttrFlags::BLINK,
        7 => state.attrs |= AttrFlags::REVERSE,
        8 => state.attrs |= AttrFlags::HIDDEN,
        9 => state.attrs |= AttrFlags::STRIKETHROUGH,

        22 => state.attrs &= !(AttrFlags::BOLD | AttrFlags::DIM),
        23 => state.attrs &= !AttrFlags::ITALIC,
        24 => state.attrs &= !AttrFlags::UNDERLINE,
        25 => state.attrs &= !AttrFlags::BLINK,
        27 => state.attrs &= !AttrFlags::REVERSE,
        28 => state.attrs &= !AttrFlags::HIDDEN,
        29 => state.attrs &= !AttrFlags::STRIKETHROUGH,

        30..=37 => state.set_foreground_color(value - 30),
        39 => state.reset_foreground_color(),
        40..=47 => state.set_background_color(value - 40),
        49 => state.reset_background_color(),

        // Bright colors
        90..=97 => state.set_foreground_color(value - 90 + 8),
        100..=107 => state.set_background_color(value - 100 + 8),

        _ => state.report(TermError::UnsupportedSgrParameter(value)),
    }
}

/// Handle the ITU T.416 colon form, e.g. `38:2::255:0:0` or `4:0`
fn apply_colon_token(token: &str, state: &mut TerminalState) {
    let mut parts: Vec<&str> = token.split(':').collect();
    let Some(code) = parts.first().copied().and_then(parse_token) else {
        state.report(TermError::MalformedSgrToken(token.to_string()));
        return;
    };
    let mut subparams = parts.split_off(1);

    match code {
        38 | 48 => {
            // Drop the optional color space id in `2::r:g:b`
            if subparams.first() == Some(&"2") && subparams.len() == 5 {
                subparams.remove(1);
            }
            if let Some(color) = extended_color(&mut subparams.into_iter(), state) {
                if code == 38 {
                    state.set_foreground_rgba(color);
                } else {
                    state.set_background_rgba(color);
                }
            }
        }
        // Underline style; 4:0 turns underline off
        4 if subparams.first() == Some(&"0") => state.attrs &= !AttrFlags::UNDERLINE,
        _ => apply_code(code, state),
    }
}

/// Parse the tokens after 38/48: `5;n` or `2;r;g;b`. Consumes every
/// component token even when one of them is bad.
fn extended_color<'a, I>(tokens: &mut I, state: &mut TerminalState) -> Option<Rgba>
where
    I: Iterator<Item = &'a str>,
{
    let Some(mode_token) = tokens.next() else {
        state.report(TermError::MalformedSgrToken(String::new()));
        return None;
    };
    let Some(mode) = parse_token(mode_token) else {
        state.report(TermError::MalformedSgrToken(mode_token.to_string()));
        return None;
    };

    match mode {
        5 => {
            let index = component(tokens.next(), state)?;
            Some(state.palette_color(index))
        }
        2 => {
            let raw: Vec<Option<&str>> = (0..3).map(|_| tokens.next()).collect();
            let mut channels = [0u8; 3];
            for (slot, token) in channels.iter_mut().zip(raw) {
                *slot = component(token, state)?;
            }
            let [r, g, b] = channels;
            Some(Rgba::new(r, g, b))
        }
        other => {
            state.report(TermError::UnsupportedSgrParameter(other));
            None
        }
    }
}

/// One 0-255 color component
fn component(token: Option<&str>, state: &mut TerminalState) -> Option<u8> {
    let Some(token) = token else {
        state.report(TermError::MalformedSgrToken(String::new()));
        return None;
    };
    let Some(value) = parse_token(token) else {
        state.report(TermError::MalformedSgrToken(token.to_string()));
        return None;
    };
    match u8::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            state.report(TermError::InvalidColorIndex(value));
            None
        }
    }
}
