//! Chapter discovery and retrieval.
//!
//! - [`ChapterIndex`]: ordered, append-only list of chapters
//! - [`splitter`]: heading-based prepass that produces the index
//! - [`store`]: reads a chapter body back from the private cache
//! - [`loader`]: runs chapter reads off the UI thread

pub mod loader;
pub mod splitter;
pub mod store;

use std::path::{Path, PathBuf};

pub use loader::{ChapterLoader, LoadKind, LoadRequest, LoadedChapter};
pub use splitter::{
    ChapterSplitter, PROLOGUE_TITLE, SplitEvent, SplitHandle, heading_title, split_channel,
};
pub use store::{ChapterStore, FileChapterStore, StoreError};

/// Opaque handle to the stored body of one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterRef(PathBuf);

impl ChapterRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// A chapter descriptor. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub content: ChapterRef,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: ChapterRef) -> Self {
        Self {
            title: title.into(),
            content,
        }
    }
}

/// Ordered chapter list in document order.
///
/// Grows while the splitter is running and becomes fixed once
/// [`ChapterIndex::seal`] is called. Indices are assigned in push order
/// and never reused; the index never shrinks except through
/// [`ChapterIndex::clear`] when the source file changes.
#[derive(Debug, Clone, Default)]
pub struct ChapterIndex {
    chapters: Vec<Chapter>,
    complete: bool,
}

impl ChapterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chapter and return its index. Ignored once sealed.
    pub fn push(&mut self, chapter: Chapter) -> Option<usize> {
        if self.complete {
            tracing::warn!(title = %chapter.title, "chapter pushed after index was sealed");
            return None;
        }
        self.chapters.push(chapter);
        Some(self.chapters.len() - 1)
    }

    /// Mark the index as complete.
    pub const fn seal(&mut self) {
        self.complete = true;
    }

    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn clear(&mut self) {
        self.chapters.clear();
        self.complete = false;
    }

    pub fn get(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.chapters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter()
    }
}
