//! Reading position capture, throttled persistence and restoration.

use serde::{Deserialize, Serialize};

use crate::debounce::Debouncer;

use super::buffer::WindowedTextBuffer;

/// Quiet period after the last scroll before the position is written.
pub const SAVE_DELAY_MS: u64 = 600;

/// Persisted "where was I" record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPosition {
    pub chapter_index: usize,
    pub offset_within_chapter: usize,
}

impl ReadingPosition {
    pub const fn new(chapter_index: usize, offset_within_chapter: usize) -> Self {
        Self {
            chapter_index,
            offset_within_chapter,
        }
    }
}

/// The chapter shown at document offset `top`.
///
/// Falls back to the last loaded chapter when `top` lies past every
/// recorded range, and to `None` when nothing is loaded.
pub fn chapter_at_top(buffer: &WindowedTextBuffer, top: usize) -> Option<usize> {
    buffer.chapter_at(top).or_else(|| buffer.window().end())
}

/// Where the viewport top should go to restore `persisted` into the chapter
/// that was just loaded.
///
/// Only applies when `loaded` is the persisted chapter; otherwise the stale
/// offset belongs to some other chapter (or another file) and is ignored.
pub fn restore_if_matches(persisted: ReadingPosition, loaded: usize, buffer: &WindowedTextBuffer) -> Option<usize> {
    if persisted.chapter_index != loaded {
        return None;
    }
    let range = buffer.chapter_range(loaded)?;
    Some((range.start + persisted.offset_within_chapter).min(buffer.len_chars()))
}

/// Coalesces position saves: every scroll restarts the delay.
#[derive(Debug, Clone)]
pub struct ReadingPositionTracker {
    save: Debouncer<()>,
}

impl Default for ReadingPositionTracker {
    fn default() -> Self {
        Self::new(SAVE_DELAY_MS)
    }
}

impl ReadingPositionTracker {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            save: Debouncer::new(delay_ms),
        }
    }

    /// Derive the current position from the viewport-top offset.
    pub fn capture(buffer: &WindowedTextBuffer, top: Option<usize>) -> Option<ReadingPosition> {
        let top = top?;
        let chapter = chapter_at_top(buffer, top)?;
        let start = buffer.chapter_range(chapter)?.start;
        Some(ReadingPosition::new(chapter, top.saturating_sub(start)))
    }

    /// Note a position change; restarts the save delay.
    pub fn schedule_save(&mut self, now_ms: u64) {
        self.save.queue((), now_ms);
    }

    /// True once, when the quiet period after the last change has elapsed.
    pub fn take_due(&mut self, now_ms: u64) -> bool {
        self.save.take_ready(now_ms).is_some()
    }

    pub const fn is_pending(&self) -> bool {
        self.save.is_pending()
    }

    pub fn cancel(&mut self) {
        self.save.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(range: std::ops::RangeInclusive<usize>) -> WindowedTextBuffer {
        let mut buffer = WindowedTextBuffer::new(8);
        let first = *range.start();
        buffer.start_from_chapter(first, "t", &"正".repeat(100));
        for i in range.skip(1) {
            buffer.append_chapter(i, "t", &"文".repeat(100)).unwrap();
        }
        buffer
    }

    #[test]
    fn test_capture_reports_offset_within_chapter() {
        let buffer = loaded(2..=4);
        let start3 = buffer.chapter_range(3).unwrap().start;
        let pos = ReadingPositionTracker::capture(&buffer, Some(start3 + 17)).unwrap();
        assert_eq!(pos, ReadingPosition::new(3, 17));
    }

    #[test]
    fn test_capture_past_last_chapter_attributes_to_window_end() {
        let buffer = loaded(2..=4);
        assert_eq!(chapter_at_top(&buffer, buffer.len_chars() + 5), Some(4));
    }

    #[test]
    fn test_capture_without_geometry_is_none() {
        let buffer = loaded(0..=0);
        assert_eq!(ReadingPositionTracker::capture(&buffer, None), None);
    }

    #[test]
    fn test_restore_applies_only_to_matching_chapter() {
        let buffer = loaded(2..=2);
        let persisted = ReadingPosition::new(2, 50);
        assert_eq!(restore_if_matches(persisted, 2, &buffer), Some(50));
        assert_eq!(restore_if_matches(persisted, 3, &buffer), None);
    }

    #[test]
    fn test_restore_clamps_to_buffer_length() {
        let buffer = loaded(1..=1);
        let persisted = ReadingPosition::new(1, 10_000);
        assert_eq!(restore_if_matches(persisted, 1, &buffer), Some(buffer.len_chars()));
    }

    #[test]
    fn test_saves_coalesce_within_delay() {
        let mut tracker = ReadingPositionTracker::default();
        tracker.schedule_save(0);
        tracker.schedule_save(400);
        tracker.schedule_save(800);
        assert!(!tracker.take_due(1_000));
        assert!(tracker.take_due(1_400));
        assert!(!tracker.take_due(3_000));
    }

    #[test]
    fn test_position_serializes_camel_case() {
        let json = serde_json::to_string(&ReadingPosition::new(2, 50)).unwrap();
        assert_eq!(json, r#"{"chapterIndex":2,"offsetWithinChapter":50}"#);
    }
}
