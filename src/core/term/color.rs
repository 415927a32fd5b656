//! Colors and palettes
//!
//! The 16 base colors are fixed, process-wide tables. Sessions may shadow
//! entries through OSC 4 (see [`TerminalState::palette_color`]), but the
//! tables themselves never change.
//!
//! [`TerminalState::palette_color`]: super::TerminalState::palette_color

use std::fmt;

/// A 4-channel color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Format as an X11 color spec, the form xterm uses in query replies
    pub fn to_x11_spec(self) -> String {
        format!(
            "rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}",
            self.r, self.r, self.g, self.g, self.b, self.b
        )
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Standard ANSI colors
pub const ANSI_COLORS: [Rgba; 8] = [
    Rgba::new(0, 0, 0),       // Black
    Rgba::new(170, 0, 0),     // Red
    Rgba::new(0, 170, 0),     // Green
    Rgba::new(170, 85, 0),    // Yellow
    Rgba::new(0, 0, 170),     // Blue
    Rgba::new(170, 0, 170),   // Magenta
    Rgba::new(0, 170, 170),   // Cyan
    Rgba::new(170, 170, 170), // White
];

/// Bright ANSI colors
pub const ANSI_BRIGHT_COLORS: [Rgba; 8] = [
    Rgba::new(85, 85, 85),    // Bright Black
    Rgba::new(255, 85, 85),   // Bright Red
    Rgba::new(85, 255, 85),   // Bright Green
    Rgba::new(255, 255, 85),  // Bright Yellow
    Rgba::new(85, 85, 255),   // Bright Blue
    Rgba::new(255, 85, 255),  // Bright Magenta
    Rgba::new(85, 255, 255),  // Bright Cyan
    Rgba::new(255, 255, 255), // Bright White
];

pub const DEFAULT_FOREGROUND: Rgba = ANSI_COLORS[7];
pub const DEFAULT_BACKGROUND: Rgba = ANSI_COLORS[0];

/// Look up a folded 0-15 index in the base tables
pub fn base_color(index: u8) -> Option<Rgba> {
    match index {
        0..=7 => Some(ANSI_COLORS[usize::from(index)]),
        8..=15 => Some(ANSI_BRIGHT_COLORS[usize::from(index - 8)]),
        _ => None,
    }
}

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// xterm 256-color table: base colors, 6x6x6 cube, then a 24-step gray ramp
pub fn xterm_color(index: u8) -> Rgba {
    match index {
        0..=15 => base_color(index).unwrap_or(DEFAULT_FOREGROUND),
        16..=231 => {
            let i = index - 16;
            Rgba::new(
                CUBE_LEVELS[usize::from(i / 36)],
                CUBE_LEVELS[usize::from((i / 6) % 6)],
                CUBE_LEVELS[usize::from(i % 6)],
            )
        }
        232..=255 => {
            let level = 8 + 10 * (index - 232);
            Rgba::new(level, level, level)
        }
    }
}

/// Current foreground/background pair. Always replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorState {
    pub foreground: Rgba,
    pub background: Rgba,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl ColorState {
    pub fn with_foreground(self, foreground: Rgba) -> Self {
        Self { foreground, ..self }
    }

    pub fn with_background(self, background: Rgba) -> Self {
        Self { background, ..self }
    }
}

/// Parse an X11 color spec: `rgb:R/G/B` with 1-4 hex digits per channel,
/// or `#RGB` / `#RRGGBB`.
pub fn parse_color_spec(spec: &str) -> Option<Rgba> {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix("rgb:") {
        let mut channels = rest.split('/').map(scale_hex_channel);
        let r = channels.next()??;
        let g = channels.next()??;
        let b = channels.next()??;
        if channels.next().is_some() {
            return None;
        }
        return Some(Rgba::new(r, g, b));
    }

    let hex = spec.strip_prefix('#')?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
            Some(Rgba::new(digit(0)?, digit(1)?, digit(2)?))
        }
        6 => {
            let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Rgba::new(pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

/// Scale a 1-4 digit hex channel to 8 bits
fn scale_hex_channel(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 4 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(s, 16).ok()?;
    let max = (1u32 << (4 * s.len())) - 1;
    u8::try_from((value * 255 + max / 2) / max).ok()
}
