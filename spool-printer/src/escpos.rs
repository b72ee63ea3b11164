//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use serde::{Deserialize, Serialize};

use crate::encoding::TextEncoding;
use crate::error::{PrintError, PrintResult};

/// ESC @ - Initialize printer
pub const INIT: [u8; 2] = [0x1B, 0x40];

/// How a finished ticket is separated from the roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutMode {
    /// GS V 66 n - feed n lines then full cut
    #[default]
    Full,
    /// GS V 65 n - feed n lines then partial cut (leaves a small connection)
    Partial,
}

impl CutMode {
    /// Byte sequence for this cut after feeding `lines`
    ///
    /// The printer manages the cutter-to-head distance itself, which wastes
    /// less paper than a separate feed followed by a plain cut.
    pub fn sequence(self, lines: u8) -> [u8; 4] {
        match self {
            CutMode::Full => [0x1D, 0x56, 0x42, lines],
            CutMode::Partial => [0x1D, 0x56, 0x41, lines],
        }
    }
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. Text is written as
/// UTF-8 and converted to the configured code page by [`finish`](Self::finish),
/// which is also the only way to obtain the bytes: every ticket therefore
/// starts with INIT and ends with a cut.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    encoding: TextEncoding,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        Self::with_encoding(width, TextEncoding::default())
    }

    /// Create a builder that encodes text with a specific code page
    pub fn with_encoding(width: usize, encoding: TextEncoding) -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(&INIT);
        Self {
            buf,
            width: width.max(1),
            encoding,
        }
    }

    /// Validate a paper width before building
    pub fn check_width(width: usize) -> PrintResult<usize> {
        match width {
            16..=80 => Ok(width),
            _ => Err(PrintError::InvalidConfig(format!(
                "paper width {} outside 16..=80 columns",
                width
            ))),
        }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write raw text (converted to the code page on finish)
    pub fn text(&mut self, s: &str) -> &mut Self {
        // Control characters in user text would be interpreted as commands
        for c in s.chars() {
            if c.is_control() {
                self.buf.push(b' ');
            } else {
                let mut tmp = [0u8; 4];
                self.buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Enable single underline
    pub fn underline(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x01]);
        self
    }

    /// Disable underline
    pub fn underline_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x00]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    /// Double height only
    pub fn double_height(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x01]);
        self
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned,
    /// with spaces filling the gap. When both do not fit, the left text is
    /// truncated so the right column stays aligned.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let rw = self.encoding.width(right);

        if rw + 1 >= self.width {
            self.line(left);
            return self.line(right);
        }

        let room = self.width - rw - 1;
        let left = self.encoding.truncate(left, room);
        let lw = self.encoding.width(&left);
        let spaces = self.width - lw - rw;
        self.text(&left);
        self.text(&" ".repeat(spaces));
        self.line(right)
    }

    // === Build ===

    /// Finish the ticket: encode text to the code page, then cut
    ///
    /// The cut is appended after encoding so that no code page trailer can
    /// follow it; the returned bytes always end with the cut sequence.
    pub fn finish(self, cut: CutMode, feed_lines: u8) -> Vec<u8> {
        let mut out = self.encoding.encode(&self.buf);
        out.extend_from_slice(&cut.sequence(feed_lines));
        out
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(data: &[u8]) -> String {
        String::from_utf8_lossy(data).into_owned()
    }

    #[test]
    fn test_builder_starts_with_init_and_ends_with_cut() {
        let mut b = EscPosBuilder::new(32);
        b.center().double_size().line("Title").reset_size().left().line("Body");

        let data = b.finish(CutMode::Full, 3);
        assert_eq!(&data[..2], &INIT);
        assert!(data.ends_with(&CutMode::Full.sequence(3)));
    }

    #[test]
    fn test_gbk_trailer_precedes_cut() {
        let mut b = EscPosBuilder::with_encoding(32, TextEncoding::Gbk);
        b.line("厨房");
        let data = b.finish(CutMode::Partial, 2);
        assert!(data.ends_with(&[0x1C, 0x2E, 0x1D, 0x56, 0x41, 2]));
    }

    #[test]
    fn test_line_lr() {
        let mut b = EscPosBuilder::new(20);
        b.line_lr("Soup", "4.50");

        let s = as_text(&b.finish(CutMode::Full, 0));
        assert!(s.contains(&format!("Soup{}4.50\n", " ".repeat(12))));
    }

    #[test]
    fn test_line_lr_truncates_long_left_text() {
        let mut b = EscPosBuilder::new(16);
        b.line_lr("A very long dish name", "12.00");

        let s = as_text(&b.finish(CutMode::Full, 0));
        assert!(s.contains("A very lon 12.00\n"));
    }

    #[test]
    fn test_separators() {
        let mut b = EscPosBuilder::new(10);
        b.sep_double();

        let s = as_text(&b.finish(CutMode::Full, 0));
        assert!(s.contains("=========="));
    }

    #[test]
    fn test_control_characters_are_neutralised() {
        let mut b = EscPosBuilder::new(10);
        b.text("a\x1Bb");
        let data = b.finish(CutMode::Full, 0);
        assert!(as_text(&data).contains("a b"));
    }

    #[test]
    fn test_check_width() {
        assert!(EscPosBuilder::check_width(48).is_ok());
        assert!(EscPosBuilder::check_width(4).is_err());
    }

    #[test]
    fn test_cut_mode_serde() {
        let mode: CutMode = serde_json::from_str("\"partial\"").unwrap();
        assert_eq!(mode, CutMode::Partial);
    }
}
