//! Text encodings for thermal printers
//!
//! Receipt text is assembled as UTF-8 and converted to the printer's code
//! page at the very end. This module provides:
//! - Column widths in the target encoding (for alignment)
//! - Truncating/padding strings to a column width
//! - Converting UTF-8 content to the code page while preserving ESC/POS commands

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::PrintError;

/// Code page used for printable text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Western European (WPC1252), the default on most Star/Epson firmware
    #[default]
    Windows1252,
    /// Simplified Chinese (GBK), requires Chinese mode on the printer
    Gbk,
}

impl TextEncoding {
    fn codec(self) -> &'static Encoding {
        match self {
            TextEncoding::Windows1252 => encoding_rs::WINDOWS_1252,
            TextEncoding::Gbk => encoding_rs::GBK,
        }
    }

    /// Bytes emitted before any content to select the code page
    fn prologue(self) -> &'static [u8] {
        match self {
            // ESC t 16 - Select WPC1252
            TextEncoding::Windows1252 => &[0x1B, 0x74, 16],
            // FS & - Enable Chinese mode, FS C 1 - Select GBK
            TextEncoding::Gbk => &[0x1C, 0x26, 0x1C, 0x43, 0x01],
        }
    }

    /// Bytes emitted after the content
    fn epilogue(self) -> &'static [u8] {
        match self {
            TextEncoding::Windows1252 => &[],
            // FS . - Exit Chinese mode
            TextEncoding::Gbk => &[0x1C, 0x2E],
        }
    }

    /// Width of a string in printer columns
    ///
    /// Double-byte GBK characters occupy two columns, everything else one.
    pub fn width(self, s: &str) -> usize {
        s.chars().map(|c| self.char_width(c)).sum()
    }

    fn char_width(self, c: char) -> usize {
        if c.is_ascii() {
            return 1;
        }
        match self {
            TextEncoding::Windows1252 => 1,
            TextEncoding::Gbk => {
                let mut buf = [0u8; 4];
                let (bytes, _, had_errors) = self.codec().encode(c.encode_utf8(&mut buf));
                if had_errors { 1 } else { bytes.len() }
            }
        }
    }

    /// Truncate a string to fit within `max_width` columns
    pub fn truncate(self, s: &str, max_width: usize) -> String {
        let mut width = 0;
        let mut result = String::new();
        for c in s.chars() {
            let w = self.char_width(c);
            if width + w > max_width {
                break;
            }
            result.push(c);
            width += w;
        }
        result
    }

    /// Pad a string to exactly `width` columns
    ///
    /// If the string is longer than the width, it will be truncated.
    pub fn pad(self, s: &str, width: usize, align_right: bool) -> String {
        let current = self.width(s);
        if current >= width {
            return self.truncate(s, width);
        }
        let spaces = " ".repeat(width - current);
        if align_right {
            format!("{}{}", spaces, s)
        } else {
            format!("{}{}", s, spaces)
        }
    }

    /// Convert mixed UTF-8 content (with ESC/POS commands) to this code page
    ///
    /// ASCII bytes (0x00-0x7F) are kept exactly as is, which protects
    /// ESC/POS commands from being corrupted. Only runs of bytes >= 0x80
    /// are decoded as UTF-8 and re-encoded. Characters the code page cannot
    /// represent become `?`.
    ///
    /// An INIT command (ESC @) resets the code page, so the prologue is
    /// re-emitted after every INIT.
    #[instrument(skip(bytes), fields(encoding = %self, len = bytes.len()))]
    pub fn encode(self, bytes: &[u8]) -> Vec<u8> {
        let mut result = Vec::with_capacity(bytes.len() + 8);
        let mut pending = Vec::new();
        let mut prologue_written = false;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];

            if b == 0x1B && bytes.get(i + 1) == Some(&0x40) {
                self.flush(&mut pending, &mut result);
                result.extend_from_slice(&[0x1B, 0x40]);
                result.extend_from_slice(self.prologue());
                prologue_written = true;
                i += 2;
                continue;
            }

            if !prologue_written {
                result.extend_from_slice(self.prologue());
                prologue_written = true;
            }

            if b < 0x80 {
                self.flush(&mut pending, &mut result);
                result.push(b);
            } else {
                pending.push(b);
            }
            i += 1;
        }

        self.flush(&mut pending, &mut result);
        result.extend_from_slice(self.epilogue());
        result
    }

    fn flush(self, pending: &mut Vec<u8>, result: &mut Vec<u8>) {
        if pending.is_empty() {
            return;
        }

        let text = String::from_utf8_lossy(pending);
        let mut buf = [0u8; 4];
        for c in text.chars() {
            let (bytes, _, had_errors) = self.codec().encode(c.encode_utf8(&mut buf));
            if had_errors {
                result.push(b'?');
            } else {
                result.extend_from_slice(&bytes);
            }
        }
        pending.clear();
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Windows1252 => write!(f, "windows1252"),
            TextEncoding::Gbk => write!(f, "gbk"),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows1252" | "windows-1252" | "cp1252" | "latin1" => Ok(TextEncoding::Windows1252),
            "gbk" | "cp936" => Ok(TextEncoding::Gbk),
            other => Err(PrintError::UnsupportedEncoding(other.to_string())),
        }
    }
}
