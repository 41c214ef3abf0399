use std::io;
use std::path::PathBuf;

use super::ChapterRef;

/// Failure to read one chapter body.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of chapter text, given a chapter handle.
pub trait ChapterStore: Send + Sync {
    /// Return the full decoded text of one chapter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the body cannot be read.
    fn fetch_content(&self, chapter: &ChapterRef) -> Result<String, StoreError>;
}

/// Reads chapter bodies from the splitter's cache files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileChapterStore;

impl ChapterStore for FileChapterStore {
    fn fetch_content(&self, chapter: &ChapterRef) -> Result<String, StoreError> {
        let bytes = std::fs::read(chapter.path()).map_err(|source| StoreError::Io {
            path: chapter.path().to_path_buf(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
