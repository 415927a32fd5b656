//! Terminal state management
//!
//! This module defines the terminal's cursor, attributes, colors and modes.
//! There is no cell grid: screen-content changes leave as [`TermEvent`]s for
//! the renderer, while everything a renderer needs to draw the next glyph
//! lives here as a read model.
//!
//! A `TerminalState` has exactly one writer, the parser feeding it. Share it
//! with a render thread only behind a lock.

use std::borrow::Cow;
use std::collections::BTreeMap;

use bitflags::bitflags;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthChar;

use super::color::{base_color, xterm_color, ColorState, Rgba};
use super::error::TermError;
use super::event::{EraseMode, TermEvent};

/// Tab stops every 8 columns
const TAB_WIDTH: u16 = 8;

/// Terminal state holding everything the interpreter mutates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalState {
    pub cols: u16,
    pub rows: u16,
    pub cursor: CursorState,
    pub colors: ColorState,
    pub attrs: AttrFlags,
    pub modes: TerminalModes,
    /// Scroll region (top, bottom) - 0-indexed, inclusive
    pub scroll_region: (u16, u16),
    pub saved_cursor: Option<SavedCursor>,
    pub title: String,
    pub icon_title: String,
    /// OSC 10-17 colors, indexed by `code - 10`
    pub dynamic_colors: [Option<Rgba>; 8],
    /// Last OSC 52 payload
    pub selection: Option<SelectionData>,
    palette_overrides: BTreeMap<u8, Rgba>,
    events: Vec<TermEvent>,
}

impl TerminalState {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            cursor: CursorState::default(),
            colors: ColorState::default(),
            attrs: AttrFlags::empty(),
            modes: TerminalModes::default(),
            scroll_region: (0, rows - 1),
            saved_cursor: None,
            title: String::new(),
            icon_title: String::new(),
            dynamic_colors: [None; 8],
            selection: None,
            palette_overrides: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Full reset (RIS). Dimensions and pending events survive.
    pub fn reset(&mut self) {
        let events = std::mem::take(&mut self.events);
        *self = Self::new(self.cols, self.rows);
        self.events = events;
    }

    pub fn emit(&mut self, event: TermEvent) {
        self.events.push(event);
    }

    /// Report a non-fatal stream error
    pub fn report(&mut self, error: TermError) {
        warn!("{}", error);
        self.events.push(TermEvent::Diagnostic(error));
    }

    /// Events produced since the last call
    pub fn take_events(&mut self) -> Vec<TermEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[TermEvent] {
        &self.events
    }

    /// Output emission: print a code point, or execute it if it is a C0 control
    pub fn put_char(&mut self, ch: char) {
        match ch {
            '\x07' => self.emit(TermEvent::Bell),
            '\x08' => self.backspace(),
            '\t' => self.horizontal_tab(),
            '\n' | '\x0B' | '\x0C' => {
                if self.modes.linefeed_newline {
                    self.carriage_return();
                }
                self.linefeed();
            }
            '\r' => self.carriage_return(),
            '\0'..='\x1F' | '\x7F' => {}
            _ => self.print(ch),
        }
    }

    fn print(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as u16;
        self.emit(TermEvent::Print(ch));

        // Combining characters attach to the previous cell
        if width == 0 {
            return;
        }

        // A wide character that does not fit on this line
        if self.cursor.col.saturating_add(width) > self.cols {
            if self.modes.auto_wrap {
                self.cursor.col = 0;
                self.linefeed();
            } else {
                self.cursor.col = self.cols.saturating_sub(width);
            }
        }

        self.cursor.col = self.cursor.col.saturating_add(width);
        if self.cursor.col >= self.cols {
            if self.modes.auto_wrap {
                self.cursor.col = 0;
                self.linefeed();
            } else {
                self.cursor.col = self.cols - 1;
            }
        }
    }

    /// Carriage return - move cursor to column 0
    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
    }

    /// Line feed - move cursor down, scroll at the bottom of the region
    pub fn linefeed(&mut self) {
        let scroll_bottom = self.scroll_region.1;

        if self.cursor.row == scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row < self.rows - 1 {
            self.cursor.row += 1;
        }
    }

    /// Reverse index - cursor up, scroll at the top of the region
    pub fn reverse_index(&mut self) {
        if self.cursor.row == self.scroll_region.0 {
            self.scroll_down(1);
        } else {
            self.cursor_up(1);
        }
    }

    /// Index - cursor down, scroll if at bottom
    pub fn index(&mut self) {
        self.linefeed();
    }

    /// Next line - carriage return plus line feed
    pub fn next_line(&mut self) {
        self.carriage_return();
        self.linefeed();
    }

    /// Backspace - move cursor left
    pub fn backspace(&mut self) {
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    /// Horizontal tab
    pub fn horizontal_tab(&mut self) {
        let next = (self.cursor.col / TAB_WIDTH + 1).saturating_mul(TAB_WIDTH);
        self.cursor.col = next.min(self.cols - 1);
    }

    /// Scroll the region up by n lines
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        self.emit(TermEvent::ScrollUp { top, bottom, count: n });
    }

    /// Scroll the region down by n lines
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        self.emit(TermEvent::ScrollDown { top, bottom, count: n });
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.cursor.row = self.cursor.row.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.cursor.row = self.cursor.row.saturating_add(n).min(self.rows - 1);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_add(n).min(self.cols - 1);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_sub(n);
    }

    /// Set cursor position (1-indexed parameters, 0 treated as 1)
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor_to_row(row);
        self.cursor_to_col(col);
    }

    /// Move to a column (1-indexed)
    pub fn cursor_to_col(&mut self, col: u16) {
        self.cursor.col = col.saturating_sub(1).min(self.cols - 1);
    }

    /// Move to a row (1-indexed)
    pub fn cursor_to_row(&mut self, row: u16) {
        self.cursor.row = row.saturating_sub(1).min(self.rows - 1);
    }

    pub fn clear_screen(&mut self) {
        self.emit(TermEvent::ClearScreen);
    }

    pub fn erase_in_line(&mut self, mode: EraseMode) {
        self.emit(TermEvent::EraseLine(mode));
    }

    pub fn erase_in_display(&mut self, mode: EraseMode) {
        self.emit(TermEvent::EraseDisplay(mode));
    }

    /// Set scroll region (1-indexed, inclusive). Ignored unless top < bottom.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let top = top.saturating_sub(1).min(self.rows - 1);
        let bottom = bottom.saturating_sub(1).min(self.rows - 1);
        if top < bottom {
            self.scroll_region = (top, bottom);
            self.cursor_position(1, 1);
        } else {
            debug!("Ignoring scroll region {}..{}", top, bottom);
        }
    }

    /// Save cursor position and rendition
    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            col: self.cursor.col,
            row: self.cursor.row,
            attrs: self.attrs,
            colors: self.colors,
        });
    }

    /// Restore cursor position and rendition
    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor.clone() {
            self.cursor.col = saved.col.min(self.cols - 1);
            self.cursor.row = saved.row.min(self.rows - 1);
            self.attrs = saved.attrs;
            self.colors = saved.colors;
        }
    }

    /// Set standard (ANSI) mode
    pub fn set_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            4 => self.modes.insert_mode = enable,
            20 => self.modes.linefeed_newline = enable,
            _ => debug!("Ignoring mode {} ({})", mode, enable),
        }
    }

    /// Set private (DEC) mode
    pub fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            1 => self.modes.application_cursor = enable,
            7 => self.modes.auto_wrap = enable,
            25 => self.cursor.visible = enable,
            47 | 1047 => self.modes.alternate_screen = enable,
            1048 => {
                if enable {
                    self.save_cursor();
                } else {
                    self.restore_cursor();
                }
            }
            1049 => {
                if enable {
                    self.save_cursor();
                    self.modes.alternate_screen = true;
                } else {
                    self.modes.alternate_screen = false;
                    self.restore_cursor();
                }
            }
            2004 => self.modes.bracketed_paste = enable,
            _ => debug!("Ignoring private mode {} ({})", mode, enable),
        }
    }

    /// Resolve a palette index, honoring OSC 4 overrides
    pub fn palette_color(&self, index: u8) -> Rgba {
        self.palette_overrides
            .get(&index)
            .copied()
            .unwrap_or_else(|| xterm_color(index))
    }

    pub fn set_palette_color(&mut self, index: u8, color: Rgba) {
        self.palette_overrides.insert(index, color);
        self.emit(TermEvent::PaletteChanged { index, color });
    }

    /// Set the foreground from a folded 0-15 palette index
    pub fn set_foreground_color(&mut self, index: i64) {
        match self.folded_color(index) {
            Some(color) => self.colors = self.colors.with_foreground(color),
            None => self.report(TermError::InvalidColorIndex(index)),
        }
    }

    /// Set the background from a folded 0-15 palette index
    pub fn set_background_color(&mut self, index: i64) {
        match self.folded_color(index) {
            Some(color) => self.colors = self.colors.with_background(color),
            None => self.report(TermError::InvalidColorIndex(index)),
        }
    }

    fn folded_color(&self, index: i64) -> Option<Rgba> {
        let index = u8::try_from(index).ok()?;
        base_color(index).map(|_| self.palette_color(index))
    }

    pub fn set_foreground_rgba(&mut self, color: Rgba) {
        self.colors = self.colors.with_foreground(color);
    }

    pub fn set_background_rgba(&mut self, color: Rgba) {
        self.colors = self.colors.with_background(color);
    }

    pub fn reset_foreground_color(&mut self) {
        self.colors = self.colors.with_foreground(ColorState::default().foreground);
    }

    pub fn reset_background_color(&mut self) {
        self.colors = self.colors.with_background(ColorState::default().background);
    }

    /// SGR 0: clear attributes and colors
    pub fn reset_graphics_mode(&mut self) {
        self.attrs = AttrFlags::empty();
        self.colors = ColorState::default();
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.emit(TermEvent::TitleChanged(self.title.clone()));
    }

    pub fn set_icon_title(&mut self, title: &str) {
        self.icon_title = title.to_string();
        self.emit(TermEvent::IconTitleChanged(self.icon_title.clone()));
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u16 {
        const BOLD          = 0b0000_0000_0001;
        const DIM           = 0b0000_0000_0010;
        const ITALIC        = 0b0000_0000_0100;
        const UNDERLINE     = 0b0000_0000_1000;
        const BLINK         = 0b0000_0001_0000;
        const REVERSE       = 0b0000_0010_0000;
        const HIDDEN        = 0b0000_0100_0000;
        const STRIKETHROUGH = 0b0000_1000_0000;
    }
}

/// Cursor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
        }
    }
}

/// Saved cursor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCursor {
    pub col: u16,
    pub row: u16,
    pub attrs: AttrFlags,
    pub colors: ColorState,
}

/// OSC 52 payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionData {
    /// Selection targets, e.g. `c` (clipboard) or `p` (primary)
    pub targets: String,
    pub data: Vec<u8>,
}

impl SelectionData {
    /// Payload as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Terminal modes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalModes {
    pub application_cursor: bool,
    pub auto_wrap: bool,
    pub insert_mode: bool,
    pub linefeed_newline: bool,
    pub bracketed_paste: bool,
    pub alternate_screen: bool,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            application_cursor: false,
            auto_wrap: true, // Usually enabled by default
            insert_mode: false,
            linefeed_newline: false,
            bracketed_paste: false,
            alternate_screen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::color::{ANSI_BRIGHT_COLORS, ANSI_COLORS};

    #[test]
    fn test_print_advances_and_wraps() {
        let mut state = TerminalState::new(3, 2);
        for ch in "abcd".chars() {
            state.put_char(ch);
        }
        assert_eq!((state.cursor.col, state.cursor.row), (1, 1));
    }

    #[test]
    fn test_wrap_on_last_row_scrolls() {
        let mut state = TerminalState::new(2, 2);
        for ch in "abcdef".chars() {
            state.put_char(ch);
        }
        assert_eq!((state.cursor.col, state.cursor.row), (0, 1));
        let scrolls = state
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, TermEvent::ScrollUp { .. }))
            .count();
        assert_eq!(scrolls, 2);
    }

    #[test]
    fn test_no_autowrap_clamps() {
        let mut state = TerminalState::new(3, 2);
        state.set_private_mode(7, false);
        for ch in "abcdef".chars() {
            state.put_char(ch);
        }
        assert_eq!((state.cursor.col, state.cursor.row), (2, 0));
    }

    #[test]
    fn test_wide_and_combining_chars() {
        let mut state = TerminalState::new(10, 2);
        state.put_char('日');
        assert_eq!(state.cursor.col, 2);
        state.put_char('\u{0301}');
        assert_eq!(state.cursor.col, 2);
    }

    #[test]
    fn test_controls_are_executed_not_printed() {
        let mut state = TerminalState::new(20, 5);
        for ch in "ab\r\ncd\tx\x08\x07".chars() {
            state.put_char(ch);
        }
        assert_eq!((state.cursor.col, state.cursor.row), (8, 1));
        let events = state.take_events();
        assert!(events.contains(&TermEvent::Bell));
        let printed: String = events
            .iter()
            .filter_map(|e| match e {
                TermEvent::Print(ch) => Some(*ch),
                _ => None,
            })
            .collect();
        assert_eq!(printed, "abcdx");
    }

    #[test]
    fn test_linefeed_respects_scroll_region() {
        let mut state = TerminalState::new(10, 10);
        state.set_scroll_region(2, 4);
        assert_eq!((state.cursor.col, state.cursor.row), (0, 0));
        state.cursor_position(4, 1);
        state.take_events();
        state.linefeed();
        assert_eq!(state.cursor.row, 3);
        assert_eq!(
            state.take_events(),
            vec![TermEvent::ScrollUp { top: 1, bottom: 3, count: 1 }]
        );
    }

    #[test]
    fn test_invalid_scroll_region_ignored() {
        let mut state = TerminalState::new(10, 10);
        state.set_scroll_region(5, 5);
        assert_eq!(state.scroll_region, (0, 9));
    }

    #[test]
    fn test_cursor_clamping() {
        let mut state = TerminalState::new(80, 24);
        state.cursor_position(100, 200);
        assert_eq!((state.cursor.col, state.cursor.row), (79, 23));
        state.cursor_up(500);
        state.cursor_backward(500);
        assert_eq!((state.cursor.col, state.cursor.row), (0, 0));
        state.cursor_forward(u16::MAX);
        state.cursor_down(u16::MAX);
        assert_eq!((state.cursor.col, state.cursor.row), (79, 23));
    }

    #[test]
    fn test_color_index_folding() {
        let mut state = TerminalState::new(80, 24);
        state.set_foreground_color(1);
        assert_eq!(state.colors.foreground, ANSI_COLORS[1]);
        state.set_background_color(12);
        assert_eq!(state.colors.background, ANSI_BRIGHT_COLORS[4]);
    }

    #[test]
    fn test_set_then_reset_foreground_is_identity() {
        let fresh = TerminalState::new(80, 24);
        for i in 0..=15 {
            let mut state = TerminalState::new(80, 24);
            state.set_foreground_color(i);
            state.reset_foreground_color();
            assert_eq!(state.colors, fresh.colors);
        }
    }

    #[test]
    fn test_invalid_color_index_leaves_colors() {
        let mut state = TerminalState::new(80, 24);
        state.set_foreground_color(3);
        let before = state.colors;
        for i in [-1, 16, 255, 1000] {
            state.set_foreground_color(i);
            state.set_background_color(i);
        }
        assert_eq!(state.colors, before);
        let errors = state
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, TermEvent::Diagnostic(TermError::InvalidColorIndex(_))))
            .count();
        assert_eq!(errors, 8);
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut state = TerminalState::new(80, 24);
        state.cursor_position(5, 10);
        state.attrs = AttrFlags::BOLD;
        state.save_cursor();
        state.cursor_position(1, 1);
        state.reset_graphics_mode();
        state.restore_cursor();
        assert_eq!((state.cursor.col, state.cursor.row), (9, 4));
        assert_eq!(state.attrs, AttrFlags::BOLD);
    }

    #[test]
    fn test_reset_keeps_dimensions() {
        let mut state = TerminalState::new(40, 10);
        state.cursor_position(3, 3);
        state.set_title("x");
        state.reset();
        assert_eq!((state.cols, state.rows), (40, 10));
        assert_eq!(state.cursor, CursorState::default());
        assert!(state.title.is_empty());
    }
}
