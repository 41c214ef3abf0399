//! The reading session.
//!
//! [`Reader`] owns the chapter index, the windowed buffer and the viewport
//! state, and is only ever touched from the event loop thread. Chapter
//! bodies are fetched elsewhere: the session queues [`LoadRequest`]s and
//! later receives [`LoadedChapter`]s, which it checks against the current
//! source and restart epoch before mutating anything.
//!
//! At most one load is in flight per direction (start, append, prepend).
//! A repeated request for the chapter already in flight coalesces with it,
//! and a jump-to-title intent upgrades the pending placement. Any other
//! request in that direction is rejected until the first one lands. A full
//! restart bumps the epoch, which invalidates every outstanding result.

pub mod anchor;
pub mod buffer;
pub mod gesture;
pub mod layout;
pub mod offsets;
pub mod position;

pub use anchor::{ScrollAnchorController, ScrollTarget, capture_anchor, resolve_anchor_after_mutation};
pub use buffer::{BoundaryError, MAX_KEEP_CHAPTERS, Prepended, WindowedTextBuffer};
pub use gesture::{ScrollDirection, SustainedScrollDetector};
pub use layout::{TextLayout, VisualLine};
pub use offsets::{LoadedWindow, OffsetTable};
pub use position::{ReadingPosition, ReadingPositionTracker};

use crate::chapter::{Chapter, ChapterIndex, LoadKind, LoadRequest, LoadedChapter};
use crate::error::ReaderError;
use crate::ui::viewport::Viewport;

/// Who changed the chapter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    /// The reader picked a chapter; this may load text.
    User,
    /// The view moved and the highlight follows; never loads.
    Programmatic,
}

/// Where the viewport goes once a load lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Put the chapter title at the top.
    JumpToTitle,
    /// Keep the text currently at the top where it is.
    KeepAnchor,
    /// Apply the persisted reading position if it belongs to this chapter.
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDecision {
    Submitted,
    Coalesced,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Programmatic selection: highlight only.
    Highlighted,
    /// Already loaded; scrolled to its title.
    Jumped,
    /// Adjacent to the window; extends it.
    Extended(LoadDecision),
    /// Outside the window; reloads from scratch.
    Restarted(LoadDecision),
    /// Not in the index.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    index: usize,
    placement: Placement,
}

#[derive(Debug, Clone, Copy, Default)]
struct InFlightSlots {
    start: Option<InFlight>,
    append: Option<InFlight>,
    prepend: Option<InFlight>,
}

impl InFlightSlots {
    const fn slot(&mut self, kind: LoadKind) -> &mut Option<InFlight> {
        match kind {
            LoadKind::Start => &mut self.start,
            LoadKind::Append => &mut self.append,
            LoadKind::Prepend => &mut self.prepend,
        }
    }

    const fn any(&self) -> bool {
        self.start.is_some() || self.append.is_some() || self.prepend.is_some()
    }
}

#[derive(Debug)]
pub struct Reader {
    index: ChapterIndex,
    buffer: WindowedTextBuffer,
    anchor: ScrollAnchorController,
    tracker: ReadingPositionTracker,
    gestures: SustainedScrollDetector,
    layout: TextLayout,
    viewport: Viewport,
    source: u64,
    epoch: u64,
    in_flight: InFlightSlots,
    outbox: Vec<LoadRequest>,
    selected: Option<usize>,
    restore: Option<ReadingPosition>,
    opened: bool,
    last_error: Option<ReaderError>,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new(MAX_KEEP_CHAPTERS)
    }
}

impl Reader {
    pub fn new(max_chapters: usize) -> Self {
        Self {
            index: ChapterIndex::new(),
            buffer: WindowedTextBuffer::new(max_chapters),
            anchor: ScrollAnchorController::new(),
            tracker: ReadingPositionTracker::default(),
            gestures: SustainedScrollDetector::default(),
            layout: TextLayout::default(),
            viewport: Viewport::new(80, 24, 0),
            source: 0,
            epoch: 0,
            in_flight: InFlightSlots::default(),
            outbox: Vec::new(),
            selected: None,
            restore: None,
            opened: false,
            last_error: None,
        }
    }

    pub const fn index(&self) -> &ChapterIndex {
        &self.index
    }

    pub const fn buffer(&self) -> &WindowedTextBuffer {
        &self.buffer
    }

    pub const fn layout(&self) -> &TextLayout {
        &self.layout
    }

    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub const fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub const fn anchor(&self) -> &ScrollAnchorController {
        &self.anchor
    }

    /// Identity of the current source; results for any other are stale.
    pub const fn source(&self) -> u64 {
        self.source
    }

    /// Chapter highlighted in the catalog.
    pub const fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Whether any chapter text has been requested or shown for this source.
    pub const fn is_opened(&self) -> bool {
        self.opened || self.in_flight.start.is_some()
    }

    pub const fn is_loading(&self) -> bool {
        self.in_flight.any()
    }

    pub const fn restore_position(&self) -> Option<ReadingPosition> {
        self.restore
    }

    /// Persisted position to apply when the index completes.
    pub const fn set_restore(&mut self, position: Option<ReadingPosition>) {
        self.restore = position;
    }

    /// Drain the loads queued since the last call.
    pub fn take_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Take the most recent chapter failure, for reporting.
    pub const fn take_error(&mut self) -> Option<ReaderError> {
        self.last_error.take()
    }

    /// Forget everything about the current source and start a new one.
    ///
    /// Returns the new source id; split and load results tagged with any
    /// older id are dropped on arrival.
    pub fn reset_source(&mut self) -> u64 {
        self.source = self.source.wrapping_add(1);
        self.epoch = self.epoch.wrapping_add(1);
        self.index.clear();
        self.buffer.reset();
        self.anchor.cancel();
        self.tracker.cancel();
        self.gestures.reset();
        self.layout = TextLayout::default();
        self.viewport.set_total_lines(0);
        self.viewport.go_to_top();
        self.in_flight = InFlightSlots::default();
        self.outbox.clear();
        self.selected = None;
        self.opened = false;
        self.last_error = None;
        tracing::debug!(source = self.source, "reader reset for new source");
        self.source
    }

    /// Add a chapter discovered by the splitter.
    pub fn publish_chapter(&mut self, source: u64, chapter: Chapter) -> Option<usize> {
        if source != self.source {
            tracing::debug!(source, current = self.source, "stale chapter discovery dropped");
            return None;
        }
        self.index.push(chapter)
    }

    /// Seal the index once splitting stops, then open the persisted chapter
    /// if nothing has been opened yet.
    ///
    /// Returns true when that opening load was queued.
    pub fn finish_index(&mut self, source: u64) -> bool {
        if source != self.source {
            return false;
        }
        self.index.seal();
        if self.is_opened() || self.index.is_empty() {
            return false;
        }
        let last = self.index.len() - 1;
        let target = self.restore.map_or(0, |p| p.chapter_index).min(last);
        self.start_from_chapter(target, Placement::Restore) == LoadDecision::Submitted
    }

    /// React to a catalog selection.
    pub fn select_chapter(&mut self, index: usize, source: SelectionSource) -> SelectOutcome {
        if !self.index.contains(index) {
            return SelectOutcome::Ignored;
        }
        if source == SelectionSource::Programmatic {
            self.selected = Some(index);
            return SelectOutcome::Highlighted;
        }

        self.selected = Some(index);
        let window = self.buffer.window();
        if let Some(range) = self.buffer.chapter_range(index) {
            self.anchor
                .jump_to_offset(range.start, self.buffer.len_chars(), self.buffer.revision());
            return SelectOutcome::Jumped;
        }
        if window.next_below() == Some(index) {
            return SelectOutcome::Extended(self.request_append(index, Placement::JumpToTitle));
        }
        if window.next_above() == Some(index) {
            return SelectOutcome::Extended(self.request_prepend(index, Placement::JumpToTitle));
        }
        SelectOutcome::Restarted(self.start_from_chapter(index, Placement::JumpToTitle))
    }

    /// Replace the window with `index` once it loads.
    pub fn start_from_chapter(&mut self, index: usize, placement: Placement) -> LoadDecision {
        if !self.index.contains(index) {
            tracing::debug!(index, "start requested for unknown chapter");
            return LoadDecision::Rejected;
        }
        if let Some(pending) = self.in_flight.start.as_mut()
            && pending.index == index
        {
            if placement == Placement::JumpToTitle {
                pending.placement = placement;
            }
            return LoadDecision::Coalesced;
        }

        self.epoch = self.epoch.wrapping_add(1);
        self.in_flight = InFlightSlots::default();
        self.outbox.clear();
        self.in_flight.start = Some(InFlight { index, placement });
        self.submit(LoadKind::Start, index);
        LoadDecision::Submitted
    }

    pub fn request_append(&mut self, index: usize, placement: Placement) -> LoadDecision {
        self.request_extend(LoadKind::Append, index, placement)
    }

    pub fn request_prepend(&mut self, index: usize, placement: Placement) -> LoadDecision {
        self.request_extend(LoadKind::Prepend, index, placement)
    }

    fn request_extend(&mut self, kind: LoadKind, index: usize, placement: Placement) -> LoadDecision {
        if self.in_flight.start.is_some() {
            tracing::debug!(index, ?kind, "window restart in flight; extension rejected");
            return LoadDecision::Rejected;
        }
        let window = self.buffer.window();
        let expected = match kind {
            LoadKind::Append => window.next_below(),
            LoadKind::Prepend => window.next_above(),
            LoadKind::Start => None,
        };
        if expected != Some(index) || !self.index.contains(index) {
            tracing::debug!(index, ?kind, ?expected, "extension not adjacent to window");
            return LoadDecision::Rejected;
        }

        let decision = match self.in_flight.slot(kind) {
            Some(pending) if pending.index == index => {
                if placement == Placement::JumpToTitle {
                    pending.placement = placement;
                }
                LoadDecision::Coalesced
            }
            Some(pending) => {
                tracing::debug!(index, busy = pending.index, ?kind, "extension already in flight");
                LoadDecision::Rejected
            }
            slot @ None => {
                *slot = Some(InFlight { index, placement });
                LoadDecision::Submitted
            }
        };
        if decision == LoadDecision::Submitted {
            self.submit(kind, index);
        }
        decision
    }

    fn submit(&mut self, kind: LoadKind, index: usize) {
        let Some(chapter) = self.index.get(index).cloned() else {
            return;
        };
        self.outbox.push(LoadRequest {
            source: self.source,
            epoch: self.epoch,
            index,
            kind,
            chapter,
        });
    }

    /// Apply a finished load. Returns false when it was stale or no longer
    /// fits the window.
    pub fn apply_loaded(&mut self, loaded: LoadedChapter) -> bool {
        if loaded.source != self.source || loaded.epoch != self.epoch {
            tracing::debug!(index = loaded.index, kind = ?loaded.kind, "stale chapter load dropped");
            return false;
        }
        let Some(pending) = self
            .in_flight
            .slot(loaded.kind)
            .take_if(|p| p.index == loaded.index)
        else {
            tracing::debug!(index = loaded.index, kind = ?loaded.kind, "unrequested chapter load dropped");
            return false;
        };

        let body = match loaded.body {
            Ok(body) => body,
            Err(message) => {
                let err = ReaderError::ChapterLoadFailure {
                    index: loaded.index,
                    message,
                };
                tracing::warn!(%err, "chapter body replaced by error text");
                let text = err.placeholder();
                self.last_error = Some(err);
                text
            }
        };

        let top = self.top_offset();
        match loaded.kind {
            LoadKind::Start => {
                self.buffer.start_from_chapter(loaded.index, &loaded.title, &body);
                self.opened = true;
                self.gestures.reset();
                self.selected = Some(loaded.index);
                let restored = match pending.placement {
                    Placement::Restore => self
                        .restore
                        .and_then(|p| position::restore_if_matches(p, loaded.index, &self.buffer)),
                    Placement::JumpToTitle | Placement::KeepAnchor => None,
                };
                let (len, revision) = (self.buffer.len_chars(), self.buffer.revision());
                match restored {
                    // Restoring moves the viewport top only; the caret starts over.
                    Some(target) => {
                        self.anchor.cancel();
                        self.anchor.keep_anchor(target, len, revision);
                    }
                    None => self.anchor.jump_to_offset(0, len, revision),
                }
            }
            LoadKind::Append => match self.buffer.append_chapter(loaded.index, &loaded.title, &body) {
                Ok(removed) => {
                    let anchor = top.map(|a| resolve_anchor_after_mutation(a, removed));
                    self.place(loaded.index, pending.placement, anchor);
                }
                Err(err) => {
                    tracing::debug!(%err, "append no longer fits the window");
                    return false;
                }
            },
            LoadKind::Prepend => match self.buffer.prepend_chapter(loaded.index, &loaded.title, &body) {
                Ok(Prepended { inserted, .. }) => {
                    self.place(loaded.index, pending.placement, top.map(|a| a + inserted));
                }
                Err(err) => {
                    tracing::debug!(%err, "prepend no longer fits the window");
                    return false;
                }
            },
        }
        crate::perf::log_event(
            "reader.apply",
            format!(
                "index={} kind={:?} window={:?}..={:?} chars={}",
                loaded.index,
                loaded.kind,
                self.buffer.window().start(),
                self.buffer.window().end(),
                self.buffer.len_chars()
            ),
        );
        true
    }

    fn place(&mut self, index: usize, placement: Placement, anchor: Option<usize>) {
        let len = self.buffer.len_chars();
        let revision = self.buffer.revision();
        match placement {
            Placement::JumpToTitle | Placement::Restore => {
                if let Some(range) = self.buffer.chapter_range(index) {
                    self.selected = Some(index);
                    self.anchor.jump_to_offset(range.start, len, revision);
                }
            }
            Placement::KeepAnchor => {
                if let Some(anchor) = anchor {
                    self.anchor.keep_anchor(anchor, len, revision);
                }
            }
        }
    }

    /// Document offset at the top of the view.
    ///
    /// A parked scroll request wins over the on-screen row since it is where
    /// the view is about to be. `None` when the layout lags the buffer.
    pub fn top_offset(&self) -> Option<usize> {
        if let Some(target) = self.anchor.pending() {
            return Some(target.offset());
        }
        if !self.layout.covers(self.buffer.revision()) {
            return None;
        }
        capture_anchor(&self.layout, &self.viewport)
    }

    /// Chapter shown at the top of the view.
    pub fn current_chapter(&self) -> Option<usize> {
        self.top_offset()
            .and_then(|top| position::chapter_at_top(&self.buffer, top))
            .or_else(|| self.buffer.window().start())
    }

    /// Terminal resized: keep the text at the top of the view in place.
    pub fn on_resize(&mut self, width: u16, height: u16) {
        if width != self.viewport.width()
            && let Some(top) = self.top_offset()
        {
            self.anchor
                .keep_anchor(top, self.buffer.len_chars(), self.buffer.revision());
        }
        self.viewport.resize(width, height);
    }

    /// Layout pass: rewrap if the buffer or width changed, then resolve any
    /// parked scroll request. Returns the request applied, if any.
    pub fn layout_pass(&mut self, now_ms: u64) -> Option<ScrollTarget> {
        let width = self.viewport.width();
        if !self.layout.covers(self.buffer.revision()) || self.layout.width() != width {
            let _scope = crate::perf::scope("reader.relayout");
            self.layout = TextLayout::build(self.buffer.text(), width, self.buffer.revision());
        }
        self.viewport.set_total_lines(self.layout.line_count());
        let applied = self.anchor.after_layout(&self.layout, &mut self.viewport);
        if applied.is_some() {
            self.tracker.schedule_save(now_ms);
        }
        if let Some(current) = self.current_chapter() {
            self.select_chapter(current, SelectionSource::Programmatic);
        }
        applied
    }

    /// Scroll by `rows`. At the edge of the loaded text this counts toward
    /// a sustained-scroll load instead.
    pub fn scroll(&mut self, direction: ScrollDirection, rows: usize, now_ms: u64) -> Option<LoadDecision> {
        let at_edge = match direction {
            ScrollDirection::Up => self.viewport.is_at_top(),
            ScrollDirection::Down => self.viewport.is_at_bottom(),
        };
        if at_edge && !self.buffer.window().is_empty() {
            if self.gestures.on_boundary(direction, now_ms) {
                return self.load_beyond(direction);
            }
            return None;
        }

        self.gestures.off_boundary(direction);
        match direction {
            ScrollDirection::Up => self.viewport.scroll_up(rows),
            ScrollDirection::Down => self.viewport.scroll_down(rows),
        }
        self.tracker.schedule_save(now_ms);
        None
    }

    /// Jump to the first or last row of the loaded text.
    pub fn scroll_to_edge(&mut self, direction: ScrollDirection, now_ms: u64) {
        match direction {
            ScrollDirection::Up => self.viewport.go_to_top(),
            ScrollDirection::Down => self.viewport.go_to_bottom(),
        }
        self.tracker.schedule_save(now_ms);
    }

    fn load_beyond(&mut self, direction: ScrollDirection) -> Option<LoadDecision> {
        let window = self.buffer.window();
        let decision = match direction {
            ScrollDirection::Down => {
                let next = window.next_below().filter(|&i| self.index.contains(i))?;
                self.request_append(next, Placement::KeepAnchor)
            }
            ScrollDirection::Up => {
                let prev = window.next_above()?;
                self.request_prepend(prev, Placement::KeepAnchor)
            }
        };
        Some(decision)
    }

    /// The chapter before or after the one on screen.
    pub fn neighbour_chapter(&self, direction: ScrollDirection) -> Option<usize> {
        let current = self.current_chapter()?;
        match direction {
            ScrollDirection::Up => current.checked_sub(1),
            ScrollDirection::Down => Some(current + 1).filter(|&i| self.index.contains(i)),
        }
    }

    /// Current position derived from the view, if it can be resolved.
    pub fn current_position(&self) -> Option<ReadingPosition> {
        ReadingPositionTracker::capture(&self.buffer, self.top_offset())
    }

    /// The position to persist, once the save delay has passed.
    pub fn poll_save(&mut self, now_ms: u64) -> Option<ReadingPosition> {
        if !self.tracker.take_due(now_ms) {
            return None;
        }
        let position = self.current_position()?;
        self.restore = Some(position);
        Some(position)
    }

    pub const fn save_pending(&self) -> bool {
        self.tracker.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{ChapterSplitter, FileChapterStore};
    use tempfile::TempDir;

    const NUMERALS: [&str; 10] = ["一", "二", "三", "四", "五", "六", "七", "八", "九", "十"];

    fn novel(chapters: usize, lines_per_chapter: usize) -> String {
        let mut text = String::from("楔子的文字。\n");
        for (i, numeral) in NUMERALS.iter().enumerate().take(chapters) {
            text.push_str(&format!("第{numeral}章 标题{}\n", i + 1));
            for line in 0..lines_per_chapter {
                text.push_str(&format!("正文{}之{line}。\n", i + 1));
            }
        }
        text
    }

    fn session(text: &str, cap: usize) -> (TempDir, Reader) {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = Reader::new(cap);
        reader.on_resize(40, 10);
        let source = reader.reset_source();
        ChapterSplitter::new(dir.path())
            .split(text.as_bytes(), |chapter| {
                reader.publish_chapter(source, chapter);
            })
            .unwrap();
        (dir, reader)
    }

    fn opened(text: &str, cap: usize) -> (TempDir, Reader) {
        let (dir, mut reader) = session(text, cap);
        let source = reader.source();
        assert!(reader.finish_index(source));
        pump(&mut reader);
        (dir, reader)
    }

    fn pump(reader: &mut Reader) {
        loop {
            let requests = reader.take_requests();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                reader.apply_loaded(request.fulfill(&FileChapterStore));
            }
        }
        reader.layout_pass(0);
    }

    fn text(reader: &Reader) -> String {
        reader.buffer().text().to_string()
    }

    #[test]
    fn test_start_then_view_at_top_reports_that_chapter() {
        let (_dir, mut reader) = opened(&novel(6, 5), 8);
        for k in [0, 3, 6] {
            reader.start_from_chapter(k, Placement::JumpToTitle);
            pump(&mut reader);
            assert!(reader.viewport().is_at_top());
            assert_eq!(reader.current_chapter(), Some(k));
        }
    }

    #[test]
    fn test_heading_scenario() {
        let (_dir, mut reader) = opened(&novel(6, 30), 8);
        assert_eq!(reader.index().get(1).map(|c| c.title.as_str()), Some("第一章 标题1"));
        assert_eq!(reader.buffer().window(), LoadedWindow::single(0));
        assert!(text(&reader).starts_with("【开篇】\n\n楔子的文字。"));
        assert!(!text(&reader).contains("第一章"));

        let outcome = reader.select_chapter(1, SelectionSource::User);
        assert_eq!(outcome, SelectOutcome::Extended(LoadDecision::Submitted));
        pump(&mut reader);
        assert_eq!(reader.buffer().window().start(), Some(0));
        assert_eq!(reader.buffer().window().end(), Some(1));
        assert_eq!(reader.current_chapter(), Some(1));

        let outcome = reader.select_chapter(5, SelectionSource::User);
        assert_eq!(outcome, SelectOutcome::Restarted(LoadDecision::Submitted));
        pump(&mut reader);
        assert_eq!(reader.buffer().window(), LoadedWindow::single(5));
        assert!(text(&reader).starts_with("【第五章 标题5】"));
    }

    #[test]
    fn test_selecting_loaded_chapter_jumps_without_loading() {
        let (_dir, mut reader) = opened(&novel(3, 3), 8);
        reader.request_append(1, Placement::KeepAnchor);
        pump(&mut reader);
        assert_eq!(reader.select_chapter(0, SelectionSource::User), SelectOutcome::Jumped);
        assert!(reader.take_requests().is_empty());
        assert_eq!(reader.anchor().pending(), Some(ScrollTarget::Jump(0)));
    }

    #[test]
    fn test_programmatic_selection_never_loads() {
        let (_dir, mut reader) = opened(&novel(6, 3), 8);
        assert_eq!(reader.select_chapter(5, SelectionSource::Programmatic), SelectOutcome::Highlighted);
        assert_eq!(reader.selected(), Some(5));
        assert!(reader.take_requests().is_empty());
        assert_eq!(reader.buffer().window(), LoadedWindow::single(0));
    }

    #[test]
    fn test_duplicate_append_in_flight_does_not_duplicate_text() {
        let (_dir, mut reader) = opened(&novel(4, 3), 8);
        assert_eq!(reader.request_append(1, Placement::KeepAnchor), LoadDecision::Submitted);
        assert_eq!(reader.request_append(1, Placement::KeepAnchor), LoadDecision::Coalesced);
        let requests = reader.take_requests();
        assert_eq!(requests.len(), 1);

        let loaded = requests[0].clone().fulfill(&FileChapterStore);
        assert!(reader.apply_loaded(loaded.clone()));
        assert!(!reader.apply_loaded(loaded));
        assert_eq!(text(&reader).matches("【第一章 标题1】").count(), 1);
    }

    #[test]
    fn test_other_append_while_in_flight_is_rejected() {
        let (_dir, mut reader) = opened(&novel(4, 3), 8);
        reader.request_append(1, Placement::KeepAnchor);
        assert_eq!(reader.request_append(2, Placement::KeepAnchor), LoadDecision::Rejected);
        assert_eq!(reader.take_requests().len(), 1);
    }

    #[test]
    fn test_jump_intent_upgrades_coalesced_append() {
        let (_dir, mut reader) = opened(&novel(4, 30), 8);
        reader.request_append(1, Placement::KeepAnchor);
        reader.select_chapter(1, SelectionSource::User);
        pump(&mut reader);
        assert_eq!(reader.current_chapter(), Some(1));
    }

    #[test]
    fn test_extension_rejected_while_restart_in_flight() {
        let (_dir, mut reader) = opened(&novel(6, 3), 8);
        reader.start_from_chapter(4, Placement::JumpToTitle);
        assert_eq!(reader.request_append(1, Placement::KeepAnchor), LoadDecision::Rejected);
        assert_eq!(reader.start_from_chapter(4, Placement::KeepAnchor), LoadDecision::Coalesced);
    }

    #[test]
    fn test_restart_invalidates_outstanding_loads() {
        let (_dir, mut reader) = opened(&novel(6, 3), 8);
        reader.request_append(1, Placement::KeepAnchor);
        let stale = reader.take_requests();
        reader.start_from_chapter(4, Placement::JumpToTitle);
        for request in stale {
            assert!(!reader.apply_loaded(request.fulfill(&FileChapterStore)));
        }
        pump(&mut reader);
        assert_eq!(reader.buffer().window(), LoadedWindow::single(4));
    }

    #[test]
    fn test_source_switch_drops_old_results() {
        let (_dir, mut reader) = opened(&novel(3, 3), 8);
        reader.request_append(1, Placement::KeepAnchor);
        let stale = reader.take_requests();
        reader.reset_source();
        for request in stale {
            assert!(!reader.apply_loaded(request.fulfill(&FileChapterStore)));
        }
        assert!(reader.buffer().window().is_empty());
        assert!(reader.index().is_empty());
    }

    #[test]
    fn test_append_at_cap_evicts_exactly_one_chapter() {
        let (_dir, mut reader) = opened(&novel(9, 2), 8);
        for i in 1..=7 {
            reader.request_append(i, Placement::KeepAnchor);
            pump(&mut reader);
        }
        assert_eq!(reader.buffer().window().len(), 8);
        reader.request_append(8, Placement::KeepAnchor);
        pump(&mut reader);
        assert_eq!(reader.buffer().window().start(), Some(1));
        assert_eq!(reader.buffer().window().end(), Some(8));
        assert!(!text(&reader).contains("【开篇】"));
    }

    #[test]
    fn test_window_stays_within_cap_across_mixed_loads() {
        let (_dir, mut reader) = opened(&novel(10, 2), 3);
        reader.start_from_chapter(5, Placement::JumpToTitle);
        pump(&mut reader);
        let plan = [true, true, true, false, false, false, false, true, false, false];
        for append in plan {
            let window = reader.buffer().window();
            if append {
                if let Some(next) = window.next_below() {
                    reader.request_append(next, Placement::KeepAnchor);
                }
            } else if let Some(prev) = window.next_above() {
                reader.request_prepend(prev, Placement::KeepAnchor);
            }
            pump(&mut reader);
            assert!(reader.buffer().window().len() <= 3);
            let ranges: Vec<_> = reader
                .buffer()
                .window()
                .indices()
                .map(|i| reader.buffer().chapter_range(i).unwrap())
                .collect();
            for pair in ranges.windows(2) {
                assert!(pair[0].end <= pair[1].start);
            }
        }
    }

    #[test]
    fn test_eviction_moves_anchor_back_by_removed_length() {
        let (_dir, mut reader) = opened(&novel(6, 20), 3);
        reader.start_from_chapter(3, Placement::JumpToTitle);
        pump(&mut reader);
        reader.request_append(4, Placement::KeepAnchor);
        pump(&mut reader);
        reader.request_append(5, Placement::KeepAnchor);
        pump(&mut reader);

        let inside5 = reader.buffer().chapter_range(5).unwrap().start + 30;
        let row = reader.layout().line_for_offset(inside5).unwrap();
        reader.viewport_mut().go_to_line(row);
        let x = reader.top_offset().unwrap();
        let r = reader.buffer().chapter_range(3).unwrap().end;

        reader.request_append(6, Placement::KeepAnchor);
        for request in reader.take_requests() {
            assert!(reader.apply_loaded(request.fulfill(&FileChapterStore)));
        }
        assert_eq!(reader.buffer().window().start(), Some(4));
        assert_eq!(reader.anchor().pending(), Some(ScrollTarget::Anchor(x - r)));

        reader.layout_pass(0);
        assert_eq!(reader.top_offset(), Some(x - r));
        assert_eq!(reader.current_chapter(), Some(5));
    }

    #[test]
    fn test_prepend_keeps_view_on_same_text() {
        let (_dir, mut reader) = opened(&novel(6, 20), 8);
        reader.start_from_chapter(3, Placement::JumpToTitle);
        pump(&mut reader);
        reader.viewport_mut().go_to_line(4);
        let before = reader.top_offset().unwrap();
        let line_text = |reader: &Reader, top: usize| reader.buffer().text().slice(top..top + 5).to_string();
        let expected = line_text(&reader, before);

        reader.request_prepend(2, Placement::KeepAnchor);
        pump(&mut reader);
        let after = reader.top_offset().unwrap();
        assert!(after > before);
        assert_eq!(line_text(&reader, after), expected);
    }

    #[test]
    fn test_restore_applies_persisted_offset() {
        let (_dir, mut reader) = session(&novel(4, 40), 8);
        reader.set_restore(Some(ReadingPosition::new(2, 50)));
        let source = reader.source();
        assert!(reader.finish_index(source));
        pump(&mut reader);

        let start = reader.buffer().chapter_range(2).unwrap().start;
        assert_eq!(reader.buffer().window(), LoadedWindow::single(2));
        assert_eq!(reader.anchor().pending(), None);
        assert_eq!(reader.anchor().caret(), 0, "restoring moves the view, not the caret");
        let row = reader.layout().line_for_offset(start + 50).unwrap();
        assert_eq!(reader.viewport().offset(), row.min(reader.layout().line_count() - 10));
    }

    #[test]
    fn test_restore_index_is_clamped_to_index() {
        let (_dir, mut reader) = session(&novel(2, 3), 8);
        reader.set_restore(Some(ReadingPosition::new(40, 7)));
        let source = reader.source();
        reader.finish_index(source);
        pump(&mut reader);
        assert_eq!(reader.buffer().window(), LoadedWindow::single(2));
        assert_eq!(reader.anchor().caret(), 0);
    }

    #[test]
    fn test_finish_index_does_not_override_user_selection() {
        let (_dir, mut reader) = session(&novel(4, 3), 8);
        reader.select_chapter(3, SelectionSource::User);
        let source = reader.source();
        assert!(!reader.finish_index(source));
        pump(&mut reader);
        assert_eq!(reader.buffer().window(), LoadedWindow::single(3));
    }

    #[test]
    fn test_failed_load_shows_error_text_and_advances_window() {
        let (dir, mut reader) = opened(&novel(3, 3), 8);
        std::fs::remove_file(dir.path().join("00001.txt")).unwrap();
        reader.request_append(1, Placement::KeepAnchor);
        pump(&mut reader);
        assert_eq!(reader.buffer().window().end(), Some(1));
        assert!(text(&reader).contains("[Failed to read chapter 1:"));
        assert!(matches!(
            reader.take_error(),
            Some(ReaderError::ChapterLoadFailure { index: 1, .. })
        ));
    }

    #[test]
    fn test_sustained_scroll_at_bottom_appends() {
        let (_dir, mut reader) = opened(&novel(3, 2), 8);
        reader.scroll_to_edge(ScrollDirection::Down, 0);
        assert_eq!(reader.scroll(ScrollDirection::Down, 1, 100), None);
        assert_eq!(reader.scroll(ScrollDirection::Down, 1, 200), None);
        assert_eq!(reader.scroll(ScrollDirection::Down, 1, 300), Some(LoadDecision::Submitted));
        pump(&mut reader);
        assert_eq!(reader.buffer().window().end(), Some(1));
    }

    #[test]
    fn test_sustained_scroll_at_first_chapter_top_loads_nothing() {
        let (_dir, mut reader) = opened(&novel(3, 2), 8);
        for t in [0, 100, 200] {
            assert_eq!(reader.scroll(ScrollDirection::Up, 1, t), None);
        }
        assert!(reader.take_requests().is_empty());
    }

    #[test]
    fn test_scroll_schedules_position_save() {
        let (_dir, mut reader) = opened(&novel(2, 40), 8);
        reader.start_from_chapter(1, Placement::JumpToTitle);
        pump(&mut reader);
        assert_eq!(reader.poll_save(10_000), Some(ReadingPosition::new(1, 0)));

        assert_eq!(reader.scroll(ScrollDirection::Down, 5, 20_000), None);
        reader.layout_pass(20_000);
        assert_eq!(reader.poll_save(20_100), None);
        let saved = reader.poll_save(20_700).unwrap();
        assert_eq!(saved.chapter_index, 1);
        assert!(saved.offset_within_chapter > 0);
    }

    #[test]
    fn test_resize_keeps_top_text() {
        let (_dir, mut reader) = opened(&novel(2, 40), 8);
        reader.start_from_chapter(1, Placement::JumpToTitle);
        pump(&mut reader);
        reader.viewport_mut().go_to_line(12);
        let before = reader.top_offset().unwrap();

        reader.on_resize(12, 10);
        assert_eq!(reader.anchor().pending(), Some(ScrollTarget::Anchor(before)));
        reader.layout_pass(0);
        let row = reader.layout().line_for_offset(before).unwrap();
        assert_eq!(reader.viewport().offset(), row);
        assert_eq!(reader.top_offset(), Some(before));
    }

    #[test]
    fn test_neighbour_chapter_follows_view() {
        let (_dir, mut reader) = opened(&novel(3, 2), 8);
        assert_eq!(reader.neighbour_chapter(ScrollDirection::Up), None);
        assert_eq!(reader.neighbour_chapter(ScrollDirection::Down), Some(1));
        reader.start_from_chapter(3, Placement::JumpToTitle);
        pump(&mut reader);
        assert_eq!(reader.neighbour_chapter(ScrollDirection::Down), None);
    }
}
