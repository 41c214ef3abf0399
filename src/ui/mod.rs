//! Terminal UI components.
//!
//! This module contains all UI-related code including:
//! - [`viewport`]: Scroll position and visible range management
//! - catalog sidebar and text rendering
//! - status bar and help overlay

pub mod viewport;

mod overlays;
mod render;
mod status;

pub use render::{render, split_main_columns, text_content_width};

pub const TEXT_LEFT_PADDING: u16 = 2;
pub const TOC_WIDTH_PERCENT: u16 = 30;
pub const TEXT_WIDTH_PERCENT: u16 = 70;
