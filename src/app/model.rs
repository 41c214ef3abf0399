use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::reader::Reader;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// Rows taken by the status bar under the text.
pub const FOOTER_ROWS: u16 = 1;

/// The complete application state.
///
/// All state lives here - no global or scattered state. Worker handles,
/// watchers and the chapter cache live with the side-effect runtime.
#[derive(Debug)]
pub struct Model {
    /// The reading session
    pub reader: Reader,
    /// Shared settings record as last loaded or saved
    pub settings: Settings,
    /// Where the settings record lives
    pub settings_path: PathBuf,
    /// Novel currently opened (None before the first open)
    pub source_path: Option<PathBuf>,
    /// Size of the opened novel in KB
    pub source_size_kb: u64,
    /// Status text shown instead of the reading view
    pub notice: Option<String>,
    /// Whether the chapter prepass is running
    pub split_running: bool,
    /// Whether the catalog sidebar is visible
    pub toc_visible: bool,
    /// Focus: true = catalog, false = text
    pub toc_focused: bool,
    /// Catalog cursor
    pub toc_cursor: Option<usize>,
    /// Scroll offset for the catalog list
    pub toc_scroll_offset: usize,
    /// Whether the novel file is watched for changes
    pub watch_enabled: bool,
    /// Optional maximum text width in columns
    pub wrap_width: Option<u16>,
    /// Global config path shown in help
    pub config_global_path: Option<PathBuf>,
    /// Local override path shown in help
    pub config_local_path: Option<PathBuf>,
    /// Whether help overlay is visible
    pub help_visible: bool,
    /// Whether the app should quit
    pub should_quit: bool,
    /// Event loop clock, in ms since start
    pub now_ms: u64,
    terminal_size: (u16, u16),
    toast: Option<Toast>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Settings::default(), PathBuf::new(), (80, 24))
    }
}

impl Model {
    pub fn new(settings: Settings, settings_path: PathBuf, terminal_size: (u16, u16)) -> Self {
        let mut model = Self {
            reader: Reader::default(),
            settings,
            settings_path,
            source_path: None,
            source_size_kb: 0,
            notice: None,
            split_running: false,
            toc_visible: true,
            toc_focused: false,
            toc_cursor: None,
            toc_scroll_offset: 0,
            watch_enabled: false,
            wrap_width: None,
            config_global_path: None,
            config_local_path: None,
            help_visible: false,
            should_quit: false,
            now_ms: 0,
            terminal_size,
            toast: None,
        };
        model.relayout();
        model
    }

    /// Replace the reader with one keeping at most `max_chapters`.
    #[must_use]
    pub fn with_window(mut self, max_chapters: usize) -> Self {
        self.reader = Reader::new(max_chapters);
        self.relayout();
        self
    }

    pub const fn terminal_size(&self) -> (u16, u16) {
        self.terminal_size
    }

    pub fn set_terminal_size(&mut self, width: u16, height: u16) {
        self.terminal_size = (width, height);
        self.relayout();
    }

    /// Width available to the text, honouring sidebar and wrap width.
    pub fn text_width(&self) -> u16 {
        let width = crate::ui::text_content_width(self.terminal_size.0, self.toc_visible);
        match self.wrap_width {
            Some(w) if w > 0 => width.min(w),
            _ => width,
        }
    }

    pub const fn text_height(&self) -> u16 {
        self.terminal_size.1.saturating_sub(FOOTER_ROWS)
    }

    /// Push the current text area size into the reader.
    pub fn relayout(&mut self) {
        let (width, height) = (self.text_width(), self.text_height());
        self.reader.on_resize(width, height);
    }

    pub fn chapter_count(&self) -> usize {
        self.reader.index().len()
    }

    /// Rows available to catalog entries (inside borders).
    pub const fn toc_visible_rows(&self) -> usize {
        self.terminal_size.1.saturating_sub(2) as usize
    }

    pub fn max_toc_scroll_offset(&self) -> usize {
        self.chapter_count().saturating_sub(self.toc_visible_rows())
    }

    /// Keep the catalog cursor on screen.
    pub fn reveal_toc_cursor(&mut self) {
        let Some(cursor) = self.toc_cursor else {
            return;
        };
        let visible = self.toc_visible_rows().max(1);
        if cursor < self.toc_scroll_offset {
            self.toc_scroll_offset = cursor;
        } else if cursor >= self.toc_scroll_offset + visible {
            self.toc_scroll_offset = cursor + 1 - visible;
        }
        self.toc_scroll_offset = self.toc_scroll_offset.min(self.max_toc_scroll_offset());
    }

    /// Unfocused catalog follows the reading position.
    pub fn sync_toc_with_reader(&mut self) {
        if self.toc_focused {
            return;
        }
        if let Some(selected) = self.reader.selected()
            && self.toc_cursor != Some(selected)
        {
            self.toc_cursor = Some(selected);
            self.reveal_toc_cursor();
        }
    }

    /// Title of the chapter at the top of the view.
    pub fn current_title(&self) -> Option<&str> {
        let current = self.reader.current_chapter()?;
        self.reader.index().get(current).map(|c| c.title.as_str())
    }

    pub fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: Instant::now() + Duration::from_secs(3),
        });
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .filter(|t| t.expires_at > Instant::now())
            .map(|t| (t.message.as_str(), t.level))
    }

    /// Drop an expired toast. Returns true when one was removed.
    pub fn expire_toast(&mut self, now: Instant) -> bool {
        if self.toast.as_ref().is_some_and(|t| t.expires_at <= now) {
            self.toast = None;
            return true;
        }
        false
    }
}
