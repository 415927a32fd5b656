//! VT sequence parser
//!
//! Splits the pty byte stream into printable code points and escape
//! sequences, and dispatches completed sequences to the CSI and OSC tables.
//!
//! Everything that has to survive a chunk boundary lives in the parser: the
//! escape buffer, and the leading bytes of a code point whose tail has not
//! arrived yet. Feeding a stream in one piece or byte by byte gives the same
//! result.

use tracing::debug;

use super::csi;
use super::decoder::{Decoded, Decoder, EncodingMode};
use super::error::TermError;
use super::osc;
use super::state::TerminalState;

const ESC: u8 = 0x1B;
const BEL: u8 = 0x07;

/// Longest CSI or OSC sequence kept before it is discarded
const MAX_SEQUENCE_LEN: usize = 65536;

/// Parser state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseState {
    #[default]
    Normal,
    /// After ESC
    Escape,
    /// After ESC [
    Csi,
    /// After ESC ]
    Osc,
}

/// Parser state machine
#[derive(Debug, Clone)]
pub struct VtParser {
    state: ParseState,
    escape_buffer: Vec<u8>,
    /// Start of a multi-byte code point cut off by the end of a chunk
    pending: Vec<u8>,
    decoder: Decoder,
}

impl Default for VtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VtParser {
    /// Create a UTF-8 parser
    pub fn new() -> Self {
        Self::with_decoder(Decoder::for_mode(EncodingMode::Utf8))
    }

    pub fn with_encoding(mode: EncodingMode) -> Self {
        Self::with_decoder(Decoder::for_mode(mode))
    }

    pub fn with_decoder(decoder: Decoder) -> Self {
        Self {
            state: ParseState::Normal,
            escape_buffer: Vec::with_capacity(64),
            pending: Vec::with_capacity(4),
            decoder,
        }
    }

    /// Switch encodings. The decoder is rebuilt and any partial code point
    /// is dropped; terminal state is untouched.
    pub fn set_encoding(&mut self, mode: EncodingMode) {
        debug!("Switching encoding to {}", mode);
        self.decoder = Decoder::for_mode(mode);
        self.pending.clear();
    }

    /// Switch encodings by name, e.g. `"utf-8"` or `"cp1251"`
    pub fn set_encoding_name(&mut self, name: &str) -> Result<(), TermError> {
        let mode: EncodingMode = name.parse()?;
        self.set_encoding(mode);
        Ok(())
    }

    pub fn encoding(&self) -> Option<EncodingMode> {
        self.decoder.mode()
    }

    pub fn parse_state(&self) -> ParseState {
        self.state
    }

    pub fn escape_buffer(&self) -> &[u8] {
        &self.escape_buffer
    }

    /// Feed a chunk of pty output
    pub fn feed(&mut self, bytes: &[u8], state: &mut TerminalState) {
        let joined;
        let input = if self.pending.is_empty() {
            bytes
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(bytes);
            joined = buf;
            &joined[..]
        };

        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            match self.state {
                ParseState::Normal => {
                    if byte == ESC {
                        self.state = ParseState::Escape;
                        self.escape_buffer.push(byte);
                        i += 1;
                        continue;
                    }

                    match self.decoder.decode_one(&input[i..]) {
                        Ok(Decoded::Char { ch, len }) => {
                            state.put_char(ch);
                            i += len;
                        }
                        Ok(Decoded::Incomplete) => {
                            // Only possible at the end of the input
                            self.pending.extend_from_slice(&input[i..]);
                            break;
                        }
                        Err(e) => {
                            state.report(e);
                            i += 1;
                        }
                    }
                }
                ParseState::Escape => {
                    self.escape(byte, state);
                    i += 1;
                }
                ParseState::Csi => {
                    self.csi(byte, state);
                    i += 1;
                }
                ParseState::Osc => {
                    self.osc(byte, state);
                    i += 1;
                }
            }
        }
    }

    fn escape(&mut self, byte: u8, state: &mut TerminalState) {
        self.escape_buffer.push(byte);
        match byte {
            b'[' => self.state = ParseState::Csi,
            b']' => self.state = ParseState::Osc,
            // Any other byte completes a two-byte escape
            _ => {
                execute_escape(byte, state);
                self.finish();
            }
        }
    }

    fn csi(&mut self, byte: u8, state: &mut TerminalState) {
        self.escape_buffer.push(byte);

        if (0x40..=0x7E).contains(&byte) && byte != b'[' {
            // Skip ESC [
            let sequence = String::from_utf8_lossy(&self.escape_buffer[2..]);
            csi::dispatch(&sequence, state);
            self.finish();
        } else if self.escape_buffer.len() > MAX_SEQUENCE_LEN {
            state.report(TermError::UnsupportedCsiFinal(overflow_preview(&self.escape_buffer)));
            self.finish();
        }
    }

    fn osc(&mut self, byte: u8, state: &mut TerminalState) {
        self.escape_buffer.push(byte);
        let len = self.escape_buffer.len();

        let terminated = byte == BEL || (byte == b'\\' && self.escape_buffer[len - 2] == ESC);
        if terminated {
            let sequence = String::from_utf8_lossy(&self.escape_buffer);
            osc::dispatch(&sequence, state);
            self.finish();
        } else if len > MAX_SEQUENCE_LEN {
            state.report(TermError::MalformedOscSequence(overflow_preview(&self.escape_buffer)));
            self.finish();
        }
    }

    /// Back to normal text
    fn finish(&mut self) {
        self.state = ParseState::Normal;
        self.escape_buffer.clear();
    }
}

fn execute_escape(byte: u8, state: &mut TerminalState) {
    match byte {
        // DECSC - Save cursor
        b'7' => state.save_cursor(),
        // DECRC - Restore cursor
        b'8' => state.restore_cursor(),
        // IND - Index
        b'D' => state.index(),
        // NEL - Next line
        b'E' => state.next_line(),
        // RI - Reverse index
        b'M' => state.reverse_index(),
        // RIS - Full reset
        b'c' => state.reset(),
        _ => state.report(TermError::UnsupportedEscape(byte as char)),
    }
}

fn overflow_preview(buffer: &[u8]) -> String {
    let head = &buffer[..buffer.len().min(32)];
    format!("{}... ({} bytes)", String::from_utf8_lossy(head), buffer.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::color::{ColorState, ANSI_COLORS};
    use crate::core::term::decoder::REPLACEMENT_CHAR;
    use crate::core::term::event::{EraseMode, TermEvent};
    use crate::core::term::state::AttrFlags;

    fn run(input: &[u8]) -> TerminalState {
        let mut state = TerminalState::new(80, 24);
        VtParser::new().feed(input, &mut state);
        state
    }

    fn printed(events: &[TermEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                TermEvent::Print(ch) => Some(*ch),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_cursor_movement() {
        let state = run(b"\x1b[5;10H");
        assert_eq!(state.cursor.row, 4);
        assert_eq!(state.cursor.col, 9);
    }

    #[test]
    fn test_sgr_colors() {
        let state = run(b"\x1b[31m");
        assert_eq!(state.colors.foreground, ANSI_COLORS[1]);
    }

    #[test]
    fn test_text_and_sgr_interleaved() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();

        parser.feed(b"A\x1b[31mB", &mut state);
        assert_eq!(state.colors.foreground, ANSI_COLORS[1]);
        parser.feed(b"\x1b[0mC", &mut state);

        assert_eq!(printed(state.events()), "ABC");
        assert_eq!(state.colors, ColorState::default());
        assert!(state.attrs.is_empty());
        assert_eq!(state.cursor.col, 3);
        assert_eq!(parser.parse_state(), ParseState::Normal);
    }

    #[test]
    fn test_split_csi_dispatches_once() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();
        parser.feed(b"\x1b[", &mut state);
        assert_eq!(parser.parse_state(), ParseState::Csi);
        assert_eq!(parser.escape_buffer(), b"\x1b[");
        parser.feed(b"2J", &mut state);

        let clears = state
            .take_events()
            .into_iter()
            .filter(|e| *e == TermEvent::ClearScreen)
            .count();
        assert_eq!(clears, 1);
        assert!(parser.escape_buffer().is_empty());
    }

    #[test]
    fn test_osc_title_terminators_match() {
        let bel = run(b"\x1b]0;hello\x07");
        let st = run(b"\x1b]0;hello\x1b\\");
        assert_eq!(bel.title, "hello");
        assert_eq!(bel.title, st.title);
        assert_eq!(bel.events(), st.events());
        assert!(bel.events().contains(&TermEvent::TitleChanged("hello".to_string())));
    }

    #[test]
    fn test_letter_inside_csi_is_a_final_byte() {
        // 'o' ends the sequence, the rest is plain text
        let mut state = run(b"\x1b[1;oops;4m");
        assert!(state.attrs.is_empty());
        assert_eq!(
            state.take_events(),
            vec![
                TermEvent::Diagnostic(TermError::UnsupportedCsiFinal("1;o".to_string())),
                TermEvent::Print('o'),
                TermEvent::Print('p'),
                TermEvent::Print('s'),
                TermEvent::Print(';'),
                TermEvent::Print('4'),
                TermEvent::Print('m'),
            ]
        );
    }

    #[test]
    fn test_empty_sgr_token_is_skipped() {
        let mut state = run(b"\x1b[1;;4m");
        assert!(state.attrs.contains(AttrFlags::BOLD | AttrFlags::UNDERLINE));
        assert_eq!(
            state.take_events(),
            vec![TermEvent::Diagnostic(TermError::MalformedSgrToken(String::new()))]
        );
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();
        let bytes = "a日b".as_bytes();
        parser.feed(&bytes[..2], &mut state);
        parser.feed(&bytes[2..3], &mut state);
        parser.feed(&bytes[3..], &mut state);
        assert_eq!(printed(state.events()), "a日b");
        assert_eq!(state.cursor.col, 4);
    }

    #[test]
    fn test_malformed_utf8_makes_progress() {
        let state = run(b"a\xff\xe6\x1b[1mb");
        assert_eq!(
            printed(state.events()),
            format!("a{}{}b", REPLACEMENT_CHAR, REPLACEMENT_CHAR)
        );
        assert!(state.attrs.contains(AttrFlags::BOLD));
    }

    #[test]
    fn test_legacy_encodings() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::with_encoding(EncodingMode::Windows1251);
        parser.feed(&[0xCF, 0xF0, 0xE8, 0x1b, b'[', b'1', b'm'], &mut state);
        assert_eq!(printed(state.events()), "При");

        state.take_events();
        parser.set_encoding(EncodingMode::Ascii);
        assert_eq!(parser.encoding(), Some(EncodingMode::Ascii));
        parser.feed(&[b'x', 0xCF], &mut state);
        assert_eq!(printed(state.events()), "x?");
        // Switching encodings leaves the terminal alone
        assert!(state.attrs.contains(AttrFlags::BOLD));
    }

    #[test]
    fn test_set_encoding_by_name() {
        let mut parser = VtParser::new();
        assert!(parser.set_encoding_name("latin1").is_ok());
        assert_eq!(parser.encoding(), Some(EncodingMode::Iso8859_1));
        assert_eq!(
            parser.set_encoding_name("ebcdic"),
            Err(TermError::UnsupportedEncodingMode("ebcdic".to_string()))
        );
        assert_eq!(parser.encoding(), Some(EncodingMode::Iso8859_1));
    }

    #[test]
    fn test_unconfigured_decoder_skips_units() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::with_decoder(Decoder::new());
        parser.feed(b"ab\x1b[31m", &mut state);
        let events = state.take_events();
        assert_eq!(
            events,
            vec![
                TermEvent::Diagnostic(TermError::DecoderNotInitialized),
                TermEvent::Diagnostic(TermError::DecoderNotInitialized),
            ]
        );
        // Control sequences still work
        assert_eq!(state.colors.foreground, ANSI_COLORS[1]);
    }

    #[test]
    fn test_short_escapes() {
        let mut state = run(b"\x1b[3;3H\x1b7\x1b[10;10H\x1b8");
        assert_eq!((state.cursor.row, state.cursor.col), (2, 2));

        state.take_events();
        let mut parser = VtParser::new();
        parser.feed(b"\x1b(B", &mut state);
        // Multi-byte escapes are not recognized: ESC ( completes on its own
        assert_eq!(
            state.take_events(),
            vec![
                TermEvent::Diagnostic(TermError::UnsupportedEscape('(')),
                TermEvent::Print('B'),
            ]
        );
    }

    #[test]
    fn test_reverse_index_at_top_scrolls_down() {
        let mut state = run(b"\x1bM");
        assert_eq!(
            state.take_events(),
            vec![TermEvent::ScrollDown { top: 0, bottom: 23, count: 1 }]
        );
    }

    #[test]
    fn test_full_reset() {
        let state = run(b"\x1b[1;31m\x1b]2;t\x07\x1b[5;5H\x1bc");
        assert_eq!((state.cursor.row, state.cursor.col), (0, 0));
        assert!(state.attrs.is_empty());
        assert!(state.title.is_empty());
    }

    #[test]
    fn test_unsupported_sequences_return_to_normal() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();
        parser.feed(b"\x1b[5Z\x1b]99;x\x07ok", &mut state);
        assert_eq!(parser.parse_state(), ParseState::Normal);
        assert_eq!(
            state.take_events(),
            vec![
                TermEvent::Diagnostic(TermError::UnsupportedCsiFinal("5Z".to_string())),
                TermEvent::Diagnostic(TermError::UnsupportedOscCommand("99".to_string())),
                TermEvent::Print('o'),
                TermEvent::Print('k'),
            ]
        );
    }

    #[test]
    fn test_unterminated_osc_is_discarded() {
        let mut state = TerminalState::new(80, 24);
        let mut parser = VtParser::new();
        parser.feed(b"\x1b]2;", &mut state);
        parser.feed(&vec![b'x'; MAX_SEQUENCE_LEN], &mut state);
        assert_eq!(parser.parse_state(), ParseState::Normal);
        assert!(matches!(
            state.take_events().as_slice(),
            [TermEvent::Diagnostic(TermError::MalformedOscSequence(_)), ..]
        ));
    }

    #[test]
    fn test_erase_line_sequence() {
        let mut state = run(b"\x1b[2K");
        assert_eq!(state.take_events(), vec![TermEvent::EraseLine(EraseMode::All)]);
    }

    mod proptest_chunking {
        use super::*;
        use proptest::prelude::*;

        fn fragment() -> impl Strategy<Value = Vec<u8>> {
            prop_oneof![
                "[a-zA-Z0-9 ]{1,8}".prop_map(String::into_bytes),
                Just("héllo 日本 🦀".as_bytes().to_vec()),
                Just(b"\r\n\t\x08".to_vec()),
                (0u16..120, 0u16..40)
                    .prop_map(|(row, col)| format!("\x1b[{};{}H", row, col).into_bytes()),
                (0u8..110).prop_map(|n| format!("\x1b[{}m", n).into_bytes()),
                Just(b"\x1b[38;5;196;48;2;1;2;3m".to_vec()),
                "[a-z ]{0,10}".prop_map(|t| format!("\x1b]2;{}\x07", t).into_bytes()),
                "[a-z ]{0,10}".prop_map(|t| format!("\x1b]0;{}\x1b\\", t).into_bytes()),
                Just(b"\x1b7\x1b[5B\x1b8\x1bM".to_vec()),
                Just(b"\x1b[2J\x1b[K\x1b[?25l\x1b[6n\x1b[3;10r".to_vec()),
                proptest::collection::vec(any::<u8>(), 0..6),
            ]
        }

        proptest! {
            #[test]
            fn chunk_boundaries_do_not_change_the_result(
                fragments in proptest::collection::vec(fragment(), 0..20),
                cuts in proptest::collection::vec(any::<proptest::sample::Index>(), 0..10),
            ) {
                let stream: Vec<u8> = fragments.concat();

                let mut whole = TerminalState::new(40, 10);
                VtParser::new().feed(&stream, &mut whole);

                let mut points: Vec<usize> = cuts.iter().map(|c| c.index(stream.len() + 1)).collect();
                points.sort_unstable();

                let mut split = TerminalState::new(40, 10);
                let mut parser = VtParser::new();
                let mut start = 0;
                for point in points {
                    parser.feed(&stream[start..point], &mut split);
                    start = point;
                }
                parser.feed(&stream[start..], &mut split);

                prop_assert_eq!(whole, split);
            }

            #[test]
            fn byte_at_a_time_matches_single_chunk(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
                let mut whole = TerminalState::new(20, 5);
                VtParser::new().feed(&bytes, &mut whole);

                let mut split = TerminalState::new(20, 5);
                let mut parser = VtParser::new();
                for byte in &bytes {
                    parser.feed(std::slice::from_ref(byte), &mut split);
                }

                prop_assert_eq!(whole, split);
            }
        }
    }
}
