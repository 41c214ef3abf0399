//! Chapter-windowed text buffer.
//!
//! [`WindowedTextBuffer`] holds the rendered text of a contiguous run of
//! chapters. It grows at either end one chapter at a time and evicts
//! chapters from the opposite end once the window exceeds its cap, keeping
//! the per-chapter [`OffsetTable`] consistent across every mutation.

use std::ops::Range;

use ropey::Rope;

use super::offsets::{LoadedWindow, OffsetTable, Shift};

/// Default number of chapters kept in the buffer.
pub const MAX_KEEP_CHAPTERS: usize = 8;

/// Text placed between two consecutive chapters.
pub const SEPARATOR: &str = "\n\n";

/// Render the header line that opens a chapter.
pub fn chapter_header(title: &str) -> String {
    format!("【{title}】\n\n")
}

/// An append or prepend that does not touch the window edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoundaryError {
    #[error("no chapters are loaded")]
    EmptyWindow,
    #[error("chapter {index} is not adjacent to the window (expected {expected:?})")]
    NotAdjacent {
        index: usize,
        expected: Option<usize>,
    },
}

/// Result of a prepend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prepended {
    /// Characters inserted at offset 0.
    pub inserted: usize,
    /// Characters evicted from the bottom.
    pub removed: usize,
}

#[derive(Debug, Clone)]
pub struct WindowedTextBuffer {
    text: Rope,
    window: LoadedWindow,
    offsets: OffsetTable,
    max_chapters: usize,
    revision: u64,
}

impl Default for WindowedTextBuffer {
    fn default() -> Self {
        Self::new(MAX_KEEP_CHAPTERS)
    }
}

impl WindowedTextBuffer {
    /// Create an empty buffer keeping at most `max_chapters` (minimum 1).
    pub fn new(max_chapters: usize) -> Self {
        Self {
            text: Rope::new(),
            window: LoadedWindow::EMPTY,
            offsets: OffsetTable::new(),
            max_chapters: max_chapters.max(1),
            revision: 0,
        }
    }

    pub const fn text(&self) -> &Rope {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub const fn window(&self) -> LoadedWindow {
        self.window
    }

    pub const fn max_chapters(&self) -> usize {
        self.max_chapters
    }

    pub const fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Incremented on every text mutation.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn chapter_range(&self, index: usize) -> Option<Range<usize>> {
        if !self.window.contains(index) {
            return None;
        }
        self.offsets.range(index)
    }

    /// The loaded chapter whose text contains `offset`.
    pub fn chapter_at(&self, offset: usize) -> Option<usize> {
        self.offsets
            .chapter_at(offset)
            .filter(|&index| self.window.contains(index))
    }

    /// Clear everything and load `index` as the only chapter.
    pub fn start_from_chapter(&mut self, index: usize, title: &str, body: &str) {
        self.reset();
        let mut chunk = chapter_header(title);
        chunk.push_str(body);
        self.text.insert(0, &chunk);
        let end = self.text.len_chars();
        if let Err(err) = self.offsets.record_range(index, 0..end) {
            tracing::error!(%err, "fresh offset table rejected a range");
        }
        self.window = LoadedWindow::single(index);
        self.bump();
    }

    /// Append chapter `index` at the bottom of the window.
    ///
    /// Returns the number of characters evicted from the top to keep the
    /// window within its cap.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] when `index` is not `window.end + 1`; the
    /// buffer is left unchanged.
    pub fn append_chapter(&mut self, index: usize, title: &str, body: &str) -> Result<usize, BoundaryError> {
        let expected = self.window.next_below().ok_or(BoundaryError::EmptyWindow)?;
        if index != expected {
            return Err(BoundaryError::NotAdjacent {
                index,
                expected: Some(expected),
            });
        }

        let start = self.text.len_chars();
        let mut chunk = String::new();
        if start > 0 {
            chunk.push_str(SEPARATOR);
        }
        chunk.push_str(&chapter_header(title));
        chunk.push_str(body);
        self.text.insert(start, &chunk);
        let end = self.text.len_chars();

        if let Err(err) = self.offsets.record_range(index, start..end) {
            tracing::error!(%err, "append produced an overlapping range");
        }
        self.window.extend_end();
        self.bump();
        Ok(self.shrink_from_top())
    }

    /// Prepend chapter `index` at the top of the window.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] when `index` is not `window.start - 1`; the
    /// buffer is left unchanged.
    pub fn prepend_chapter(&mut self, index: usize, title: &str, body: &str) -> Result<Prepended, BoundaryError> {
        if self.window.is_empty() {
            return Err(BoundaryError::EmptyWindow);
        }
        let expected = self.window.next_above();
        if expected != Some(index) {
            return Err(BoundaryError::NotAdjacent { index, expected });
        }

        let mut chunk = chapter_header(title);
        chunk.push_str(body);
        chunk.push_str(SEPARATOR);
        let inserted = chunk.chars().count();
        self.text.insert(0, &chunk);

        self.offsets.shift_from(index + 1, Shift::Inserted(inserted));
        if let Err(err) = self.offsets.record_range(index, 0..inserted) {
            tracing::error!(%err, "prepend produced an overlapping range");
        }
        self.window.extend_start();
        self.bump();
        let removed = self.shrink_from_bottom();
        Ok(Prepended { inserted, removed })
    }

    /// Evict chapters from the top until the window fits its cap.
    ///
    /// Returns the total number of characters removed.
    pub fn shrink_from_top(&mut self) -> usize {
        let mut total = 0;
        while self.window.len() > self.max_chapters {
            let Some(first) = self.window.start() else {
                break;
            };
            match self.offsets.forget(first) {
                Some(range) if range.end > 0 => {
                    let removed = range.end.min(self.text.len_chars());
                    self.text.remove(0..removed);
                    self.offsets.shift_from(first + 1, Shift::Removed(removed));
                    total += removed;
                }
                _ => tracing::warn!(chapter = first, "evicting chapter with no recorded text"),
            }
            self.window.advance_start();
            crate::perf::log_event("buffer.evict.top", format!("chapter={first} removed={total}"));
        }
        if let Some(first) = self.window.start() {
            self.offsets.pin_to_origin(first);
        }
        if total > 0 {
            self.bump();
        }
        total
    }

    /// Evict chapters from the bottom until the window fits its cap.
    ///
    /// Returns the total number of characters removed.
    pub fn shrink_from_bottom(&mut self) -> usize {
        let mut total = 0;
        while self.window.len() > self.max_chapters {
            let Some(last) = self.window.end() else {
                break;
            };
            let len = self.text.len_chars();
            match self.offsets.forget(last) {
                Some(range) if range.start < len => {
                    self.text.remove(range.start..len);
                    total += len - range.start;
                }
                _ => tracing::warn!(chapter = last, "evicting chapter with no recorded text"),
            }
            self.window.retreat_end();
            crate::perf::log_event("buffer.evict.bottom", format!("chapter={last} removed={total}"));
        }
        if total > 0 {
            self.bump();
        }
        total
    }

    /// Drop all text, bounds and offsets.
    pub fn reset(&mut self) {
        self.text = Rope::new();
        self.window = LoadedWindow::EMPTY;
        self.offsets.clear();
        self.bump();
    }

    const fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
