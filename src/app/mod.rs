//! Application state and main event loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: Pure function for state transitions
//! - [`Runtime`]: Worker threads, watchers and persistence driven by messages
//! - [`App::run`]: Main event loop with rendering

mod effects;
mod event_loop;
mod input;
mod model;
mod update;

pub use effects::Runtime;
pub use model::{FOOTER_ROWS, Model, ToastLevel};
pub use update::{Message, update};

use std::path::PathBuf;

use crate::reader::MAX_KEEP_CHAPTERS;

/// Main application struct that owns the terminal and runs the event loop.
pub struct App {
    settings_path: PathBuf,
    watch_enabled: bool,
    toc_visible: bool,
    wrap_width: Option<u16>,
    max_chapters: usize,
    config_global_path: Option<PathBuf>,
    config_local_path: Option<PathBuf>,
}

impl App {
    /// Create an application reading and persisting `settings_path`.
    pub fn new(settings_path: PathBuf) -> Self {
        Self {
            settings_path,
            watch_enabled: false,
            toc_visible: true,
            wrap_width: None,
            max_chapters: MAX_KEEP_CHAPTERS,
            config_global_path: None,
            config_local_path: None,
        }
    }

    /// Reload when the novel file changes on disk.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    /// Set initial catalog visibility.
    pub fn with_toc_visible(mut self, visible: bool) -> Self {
        self.toc_visible = visible;
        self
    }

    /// Wrap text at most this many columns wide.
    pub const fn with_wrap_width(mut self, width: Option<u16>) -> Self {
        self.wrap_width = width;
        self
    }

    /// Keep at most this many chapters loaded.
    pub fn with_max_chapters(mut self, max: usize) -> Self {
        self.max_chapters = max.max(1);
        self
    }

    /// Set config paths to show in help.
    pub fn with_config_paths(mut self, global_path: Option<PathBuf>, local_path: Option<PathBuf>) -> Self {
        self.config_global_path = global_path;
        self.config_local_path = local_path;
        self
    }
}
