// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. chapter::ChapterIndex)
    clippy::module_name_repetitions
)]

//! # Novel Reader
//!
//! A terminal reader for very large plain-text novels.
//!
//! The novel is split into chapters by a background prepass that recognises
//! heading lines such as `第十二章 风起`. Only a bounded window of adjacent
//! chapters is held in memory; the window grows as the reader scrolls and
//! evicts chapters from the far end, keeping the view steady.
//!
//! ## Architecture
//!
//! The terminal front end uses The Elm Architecture (TEA) pattern:
//! - **Model**: Application state, including the [`reader::Reader`] session
//! - **Message**: Events, worker results and watcher notifications
//! - **Update**: Pure state transitions
//! - **View**: Render to terminal
//!
//! ## Modules
//!
//! - [`app`]: Main application loop and state
//! - [`chapter`]: Chapter index, splitting prepass and background loading
//! - [`reader`]: Windowed buffer, layout, scroll anchoring and reading position
//! - [`settings`]: The persisted settings record
//! - [`config`]: Saved CLI defaults
//! - [`ui`]: Terminal UI components
//! - [`watcher`]: File watching
//! - [`perf`]: Timing and debug event log

pub mod app;
pub mod chapter;
pub mod config;
pub mod debounce;
pub mod error;
pub mod perf;
pub mod reader;
pub mod settings;
pub mod ui;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model};
    pub use crate::chapter::{Chapter, ChapterIndex, ChapterSplitter};
    pub use crate::error::ReaderError;
    pub use crate::reader::{ReadingPosition, Reader, WindowedTextBuffer};
    pub use crate::settings::Settings;
    pub use crate::ui::viewport::Viewport;
}
