//! Character decoding
//!
//! Turns pty bytes into Unicode code points for the configured encoding.
//! Multi-byte UTF-8 sequences that are cut off at the end of a read are
//! reported as [`Decoded::Incomplete`] so the parser can hold the bytes until
//! the next chunk arrives.

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use super::error::{Result, TermError};

/// Replacement for bytes that cannot be decoded in the active encoding
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Replacement used by the 7-bit ASCII decoder
pub const ASCII_REPLACEMENT: char = '?';

/// Supported byte encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncodingMode {
    #[serde(rename = "ascii")]
    Ascii,
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "iso-8859-1", alias = "latin1")]
    Iso8859_1,
    #[serde(rename = "windows-1251", alias = "cp1251")]
    Windows1251,
}

impl EncodingMode {
    /// Canonical name, as used in the config file
    pub fn name(self) -> &'static str {
        match self {
            EncodingMode::Ascii => "ascii",
            EncodingMode::Utf8 => "utf-8",
            EncodingMode::Iso8859_1 => "iso-8859-1",
            EncodingMode::Windows1251 => "windows-1251",
        }
    }

    /// Map a Windows codepage number to an encoding
    pub fn from_codepage(codepage: u32) -> Result<Self> {
        match codepage {
            20127 => Ok(EncodingMode::Ascii),
            65001 => Ok(EncodingMode::Utf8),
            28591 => Ok(EncodingMode::Iso8859_1),
            1251 => Ok(EncodingMode::Windows1251),
            other => Err(TermError::UnsupportedEncodingMode(format!("codepage {}", other))),
        }
    }

    /// Single-byte code page backing this mode, if any. Latin-1 is not
    /// listed: its WHATWG label resolves to windows-1252.
    fn legacy_encoding(self) -> Option<&'static Encoding> {
        match self {
            EncodingMode::Windows1251 => Some(encoding_rs::WINDOWS_1251),
            _ => None,
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncodingMode {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "ascii" | "us-ascii" => Ok(EncodingMode::Ascii),
            "utf-8" | "utf8" => Ok(EncodingMode::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(EncodingMode::Iso8859_1),
            "windows-1251" | "cp1251" => Ok(EncodingMode::Windows1251),
            _ => Err(TermError::UnsupportedEncodingMode(s.to_string())),
        }
    }
}

/// Result of decoding a single unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A code point and the number of bytes it used
    Char { ch: char, len: usize },
    /// The input is a valid but truncated multi-byte prefix
    Incomplete,
}

impl Decoded {
    fn replacement(ch: char) -> Self {
        Decoded::Char { ch, len: 1 }
    }
}

/// Byte-to-code-point decoder for the active encoding
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    mode: Option<EncodingMode>,
}

impl Decoder {
    /// Create an unconfigured decoder. Every decode fails until
    /// [`configure`](Self::configure) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder ready for `mode`
    pub fn for_mode(mode: EncodingMode) -> Self {
        Self { mode: Some(mode) }
    }

    /// Select the decoding strategy for `mode`
    pub fn configure(&mut self, mode: EncodingMode) -> Result<()> {
        self.mode = Some(mode);
        Ok(())
    }

    pub fn mode(&self) -> Option<EncodingMode> {
        self.mode
    }

    /// Decode one code point from the front of `bytes`
    pub fn decode_one(&self, bytes: &[u8]) -> Result<Decoded> {
        let mode = self.mode.ok_or(TermError::DecoderNotInitialized)?;
        let Some(&first) = bytes.first() else {
            return Ok(Decoded::Incomplete);
        };

        Ok(match mode {
            EncodingMode::Ascii => {
                if first < 0x80 {
                    Decoded::Char { ch: first as char, len: 1 }
                } else {
                    Decoded::replacement(ASCII_REPLACEMENT)
                }
            }
            EncodingMode::Utf8 => decode_utf8(bytes),
            // Latin-1 maps every byte onto the first 256 code points
            EncodingMode::Iso8859_1 => Decoded::Char { ch: first as char, len: 1 },
            EncodingMode::Windows1251 => match mode.legacy_encoding() {
                Some(encoding) => Decoded::Char { ch: single_byte(encoding, first), len: 1 },
                None => return Err(TermError::UnsupportedEncodingMode(mode.to_string())),
            },
        })
    }

    /// Decode a complete buffer. A truncated trailing sequence decodes to
    /// one replacement character per byte.
    pub fn decode_chunk(&self, bytes: &[u8]) -> Result<String> {
        let mut out = String::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match self.decode_one(&bytes[i..])? {
                Decoded::Char { ch, len } => {
                    out.push(ch);
                    i += len;
                }
                Decoded::Incomplete => {
                    out.push(REPLACEMENT_CHAR);
                    i += 1;
                }
            }
        }
        Ok(out)
    }
}

fn decode_utf8(bytes: &[u8]) -> Decoded {
    let lead = bytes[0];
    let len = match lead {
        0x00..=0x7F => return Decoded::Char { ch: lead as char, len: 1 },
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        // Stray continuation bytes, overlong leads and out-of-range leads
        _ => return Decoded::replacement(REPLACEMENT_CHAR),
    };

    // Reject overlongs and surrogates on the second byte so that a truncated
    // sequence is only ever a prefix of something decodable.
    for (i, &b) in bytes.iter().enumerate().take(len).skip(1) {
        let valid = if i == 1 {
            match lead {
                0xE0 => (0xA0..=0xBF).contains(&b),
                0xED => (0x80..=0x9F).contains(&b),
                0xF0 => (0x90..=0xBF).contains(&b),
                0xF4 => (0x80..=0x8F).contains(&b),
                _ => (0x80..=0xBF).contains(&b),
            }
        } else {
            (0x80..=0xBF).contains(&b)
        };
        if !valid {
            return Decoded::replacement(REPLACEMENT_CHAR);
        }
    }

    if bytes.len() < len {
        return Decoded::Incomplete;
    }

    match std::str::from_utf8(&bytes[..len]).ok().and_then(|s| s.chars().next()) {
        Some(ch) => Decoded::Char { ch, len },
        None => Decoded::replacement(REPLACEMENT_CHAR),
    }
}

/// Decode one byte of a single-byte code page. Unassigned bytes come back
/// from the WHATWG tables as C1 controls and are replaced.
fn single_byte(encoding: &'static Encoding, byte: u8) -> char {
    if byte < 0x80 {
        return byte as char;
    }
    let (text, _) = encoding.decode_without_bom_handling(std::slice::from_ref(&byte));
    match text.chars().next() {
        Some(ch) if !('\u{80}'..='\u{9F}').contains(&ch) => ch,
        _ => REPLACEMENT_CHAR,
    }
}
