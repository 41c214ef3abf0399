//! Soft-wrapping of the buffer into visual lines.
//!
//! A [`TextLayout`] maps character offsets to screen rows and back. It is a
//! snapshot: it records the buffer revision it was built from, and anything
//! that needs geometry for a newer revision must wait for the next pass.

use std::ops::Range;

use ropey::Rope;
use unicode_width::UnicodeWidthChar;

/// One row of wrapped text, as a char range into the buffer (no newline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualLine {
    pub start: usize,
    pub end: usize,
}

impl VisualLine {
    pub const fn range(self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLayout {
    lines: Vec<VisualLine>,
    width: u16,
    len_chars: usize,
    revision: Option<u64>,
}

impl TextLayout {
    /// Wrap `text` to `width` display columns.
    pub fn build(text: &Rope, width: u16, revision: u64) -> Self {
        let max_cols = usize::from(width.max(1));
        let mut lines = Vec::with_capacity(text.len_lines());
        let mut base = 0;
        for line in text.lines() {
            let mut start = base;
            let mut pos = base;
            let mut cols = 0;
            for ch in line.chars() {
                if is_line_break(ch) {
                    break;
                }
                let w = ch.width().unwrap_or(0);
                if cols + w > max_cols && cols > 0 {
                    lines.push(VisualLine { start, end: pos });
                    start = pos;
                    cols = 0;
                }
                cols += w;
                pos += 1;
            }
            lines.push(VisualLine { start, end: pos });
            base += line.len_chars();
        }
        Self {
            lines,
            width,
            len_chars: text.len_chars(),
            revision: Some(revision),
        }
    }

    /// Whether this layout reflects buffer `revision` or something newer.
    pub fn covers(&self, revision: u64) -> bool {
        self.revision.is_some_and(|r| r >= revision)
    }

    pub const fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub const fn width(&self) -> u16 {
        self.width
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<VisualLine> {
        self.lines.get(index).copied()
    }

    /// Rows in `range`, clamped to the layout.
    pub fn lines(&self, range: Range<usize>) -> &[VisualLine] {
        let end = range.end.min(self.lines.len());
        let start = range.start.min(end);
        &self.lines[start..end]
    }

    /// Document offset at the start of row `line`.
    pub fn offset_for_line(&self, line: usize) -> Option<usize> {
        self.lines.get(line).map(|l| l.start)
    }

    /// Row containing document offset `offset`.
    ///
    /// Returns `None` when the offset lies outside the laid-out text.
    pub fn line_for_offset(&self, offset: usize) -> Option<usize> {
        if self.lines.is_empty() || offset > self.len_chars {
            return None;
        }
        self.lines
            .partition_point(|l| l.start <= offset)
            .checked_sub(1)
    }
}

const fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}
