use crate::app::Model;
use crate::app::model::ToastLevel;
use crate::chapter::{Chapter, LoadedChapter};
use crate::error::ReaderError;
use crate::reader::{LoadDecision, ScrollDirection, SelectOutcome, SelectionSource};
use crate::settings::Settings;

/// All possible events and actions in the application.
///
/// These represent user input, worker results and watcher events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Navigation
    /// Scroll up by n lines
    ScrollUp(usize),
    /// Scroll down by n lines
    ScrollDown(usize),
    /// Scroll up one page
    PageUp,
    /// Scroll down one page
    PageDown,
    /// Scroll up half page
    HalfPageUp,
    /// Scroll down half page
    HalfPageDown,
    /// Go to the first row of the loaded text
    GoToTop,
    /// Go to the last row of the loaded text
    GoToBottom,
    /// Open the chapter after the one on screen
    NextChapter,
    /// Open the chapter before the one on screen
    PrevChapter,

    // Catalog
    /// Toggle catalog sidebar visibility
    ToggleToc,
    /// Toggle catalog and focus it
    ToggleTocFocus,
    /// Switch focus between catalog and text
    SwitchFocus,
    /// Move catalog cursor up
    TocUp,
    /// Move catalog cursor down
    TocDown,
    /// Scroll catalog list up
    TocScrollUp,
    /// Scroll catalog list down
    TocScrollDown,
    /// Open the chapter under the catalog cursor
    TocSelect,
    /// Open a chapter by catalog row
    TocClick(usize),
    /// Chapter selection from any origin
    ChapterSelected {
        index: usize,
        source: SelectionSource,
    },

    // Workers
    /// Splitter found a chapter
    ChapterDiscovered { source: u64, chapter: Chapter },
    /// Splitter reached the end of the file
    SplitFinished { source: u64, chapters: usize },
    /// Splitter stopped on an error
    SplitFailed { source: u64, error: String },
    /// Loader finished reading a chapter
    ChapterLoaded(LoadedChapter),

    // Watchers
    /// The shared settings record changed on disk
    SettingsChanged(Settings),
    /// The novel file changed on disk
    SourceChanged,
    /// Re-split the current novel
    Reload,

    // Overlays
    /// Toggle help overlay
    ToggleHelp,
    /// Hide help overlay
    HideHelp,

    // Window
    /// Terminal resized
    Resize(u16, u16),

    // Application
    /// Quit the application
    Quit,
}

/// Pure function that updates the model based on a message.
///
/// All state transitions happen here. File access, worker threads and
/// persistence are handled afterwards by the effects runtime.
pub fn update(mut model: Model, msg: Message) -> Model {
    let should_sync_toc = !matches!(
        &msg,
        Message::TocUp
            | Message::TocDown
            | Message::TocScrollUp
            | Message::TocScrollDown
            | Message::SwitchFocus
    );
    let now = model.now_ms;
    let page = usize::from(model.reader.viewport().height()).max(1);

    match msg {
        // Navigation
        Message::ScrollUp(n) => scroll(&mut model, ScrollDirection::Up, n),
        Message::ScrollDown(n) => scroll(&mut model, ScrollDirection::Down, n),
        Message::PageUp => scroll(&mut model, ScrollDirection::Up, page),
        Message::PageDown => scroll(&mut model, ScrollDirection::Down, page),
        Message::HalfPageUp => scroll(&mut model, ScrollDirection::Up, (page / 2).max(1)),
        Message::HalfPageDown => scroll(&mut model, ScrollDirection::Down, (page / 2).max(1)),
        Message::GoToTop => model.reader.scroll_to_edge(ScrollDirection::Up, now),
        Message::GoToBottom => model.reader.scroll_to_edge(ScrollDirection::Down, now),
        Message::NextChapter | Message::PrevChapter => {
            let direction = if msg == Message::NextChapter {
                ScrollDirection::Down
            } else {
                ScrollDirection::Up
            };
            if let Some(index) = model.reader.neighbour_chapter(direction) {
                model = select(model, index, SelectionSource::User);
            }
        }

        // Catalog
        Message::ToggleToc => {
            model.toc_visible = !model.toc_visible;
            if !model.toc_visible {
                model.toc_focused = false;
            }
            model.relayout();
        }
        Message::ToggleTocFocus => {
            model.toc_visible = !model.toc_visible;
            model.toc_focused = model.toc_visible;
            if model.toc_visible && model.toc_cursor.is_none() && model.chapter_count() > 0 {
                model.toc_cursor = Some(model.reader.selected().unwrap_or(0));
            }
            model.reveal_toc_cursor();
            model.relayout();
        }
        Message::SwitchFocus => {
            if model.toc_visible {
                model.toc_focused = !model.toc_focused;
            }
        }
        Message::TocUp => {
            if let Some(cursor) = model.toc_cursor {
                model.toc_cursor = Some(cursor.saturating_sub(1));
                model.reveal_toc_cursor();
            }
        }
        Message::TocDown => {
            let max = model.chapter_count().saturating_sub(1);
            model.toc_cursor = Some(model.toc_cursor.map_or(0, |c| (c + 1).min(max)));
            model.reveal_toc_cursor();
        }
        Message::TocScrollUp => {
            model.toc_scroll_offset = model.toc_scroll_offset.saturating_sub(1);
        }
        Message::TocScrollDown => {
            model.toc_scroll_offset = (model.toc_scroll_offset + 1).min(model.max_toc_scroll_offset());
        }
        Message::TocSelect => {
            if let Some(cursor) = model.toc_cursor {
                model = select(model, cursor, SelectionSource::User);
            }
        }
        Message::TocClick(index) => {
            if index < model.chapter_count() {
                model.toc_cursor = Some(index);
                model = select(model, index, SelectionSource::User);
            }
        }
        Message::ChapterSelected { index, source } => {
            model = select(model, index, source);
        }

        // Workers
        Message::ChapterDiscovered { source, chapter } => {
            if model.reader.publish_chapter(source, chapter).is_some() && model.toc_cursor.is_none() {
                model.toc_cursor = Some(0);
            }
        }
        Message::SplitFinished { source, chapters } => {
            if source == model.reader.source() {
                model.split_running = false;
                tracing::info!(chapters, "chapter index complete");
                if model.reader.finish_index(source) {
                    model.notice = Some("Loading chapter...".to_string());
                }
            }
        }
        Message::SplitFailed { source, error } => {
            if source == model.reader.source() {
                model.split_running = false;
                let err = ReaderError::SplitFailure { message: error };
                tracing::warn!(%err, "chapter split stopped");
                if model.reader.index().is_empty() {
                    model.notice = Some(err.to_string());
                } else {
                    model.show_toast(ToastLevel::Error, err.to_string());
                    if model.reader.finish_index(source) {
                        model.notice = Some("Loading chapter...".to_string());
                    }
                }
            }
        }
        Message::ChapterLoaded(loaded) => {
            if model.reader.apply_loaded(loaded) {
                model.notice = None;
            }
            if let Some(err) = model.reader.take_error() {
                model.show_toast(ToastLevel::Error, err.to_string());
            }
        }

        // Watchers: reopening is a side effect; only adopt the record here.
        Message::SettingsChanged(settings) => {
            model.settings = settings;
        }
        Message::SourceChanged | Message::Reload => {}

        // Overlays
        Message::ToggleHelp => {
            model.help_visible = !model.help_visible;
        }
        Message::HideHelp => {
            model.help_visible = false;
        }

        // Window
        Message::Resize(width, height) => {
            model.set_terminal_size(width, height);
            model.reveal_toc_cursor();
        }

        Message::Quit => {
            model.should_quit = true;
        }
    }

    if should_sync_toc {
        model.sync_toc_with_reader();
    }
    model
}

fn scroll(model: &mut Model, direction: ScrollDirection, rows: usize) {
    if model.reader.scroll(direction, rows, model.now_ms) == Some(LoadDecision::Submitted) {
        tracing::debug!(?direction, "sustained scroll at edge; loading next chapter");
    }
}

fn select(mut model: Model, index: usize, source: SelectionSource) -> Model {
    match model.reader.select_chapter(index, source) {
        SelectOutcome::Ignored => {
            tracing::debug!(index, "selection outside the chapter index ignored");
        }
        SelectOutcome::Extended(LoadDecision::Rejected) | SelectOutcome::Restarted(LoadDecision::Rejected) => {
            model.show_toast(ToastLevel::Info, "A chapter is still loading");
        }
        SelectOutcome::Highlighted
        | SelectOutcome::Jumped
        | SelectOutcome::Extended(_)
        | SelectOutcome::Restarted(_) => {}
    }
    if source == SelectionSource::User {
        model.toc_cursor = Some(index);
        model.reveal_toc_cursor();
    }
    model
}
