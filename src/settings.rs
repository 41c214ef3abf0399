//! Persisted reader settings.
//!
//! One JSON record shared by every running reader. Each instance watches the
//! file and re-applies it on change, so a save in one is seen by the others.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reader::ReadingPosition;

pub const DEFAULT_FONT_SIZE: u16 = 16;
pub const MIN_FONT_SIZE: u16 = 10;
pub const MAX_FONT_SIZE: u16 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub novel_file_path: String,
    /// Kept for other front ends sharing the record; a terminal cannot
    /// change its own font size.
    pub font_size: u16,
    pub last_chapter_index: usize,
    pub last_offset_in_chapter: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            novel_file_path: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            last_chapter_index: 0,
            last_offset_in_chapter: 0,
        }
    }
}

impl Settings {
    /// Bring out-of-range values back into range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.font_size = self.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        self
    }

    pub fn novel_path(&self) -> Option<PathBuf> {
        let trimmed = self.novel_file_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    pub const fn reading_position(&self) -> ReadingPosition {
        ReadingPosition::new(self.last_chapter_index, self.last_offset_in_chapter)
    }

    pub const fn set_reading_position(&mut self, position: ReadingPosition) {
        self.last_chapter_index = position.chapter_index;
        self.last_offset_in_chapter = position.offset_within_chapter;
    }

    /// Point at a new novel. A different file starts from the beginning.
    pub fn set_novel_path(&mut self, path: &Path) {
        let path = path.to_string_lossy().into_owned();
        if path != self.novel_file_path {
            self.novel_file_path = path;
            self.set_reading_position(ReadingPosition::default());
        }
    }
}

pub fn settings_path() -> PathBuf {
    crate::config::config_dir().join("settings.json")
}

/// Load settings, falling back to defaults when the file is missing or
/// unreadable.
pub fn load_or_default(path: &Path) -> Settings {
    match load(path) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "using default settings");
            Settings::default()
        }
    }
}

/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed.
pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read settings {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings {}", path.display()))?;
    Ok(settings.normalized())
}

/// Write `settings` atomically (temp file + rename), so watchers never see
/// a half-written record.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let json = serde_json::to_string_pretty(settings).context("Failed to encode settings")?;
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    fs::write(tmp.path(), json).with_context(|| format!("Failed to write {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace settings {}", path.display()))?;
    Ok(())
}
