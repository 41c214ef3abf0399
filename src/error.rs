//! Reader failure taxonomy.
//!
//! None of these reach the user as a propagated error. The app renders them
//! as a notice, an inline chapter placeholder, or a toast.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    /// The configured novel path is missing or not a regular file.
    #[error("File not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The chapter prepass hit an I/O error.
    #[error("Failed to split chapters: {message}")]
    SplitFailure { message: String },

    /// A chapter body could not be read back.
    #[error("Failed to read chapter {index}: {message}")]
    ChapterLoadFailure { index: usize, message: String },
}

impl ReaderError {
    /// Text substituted for a chapter body that failed to load.
    pub fn placeholder(&self) -> String {
        format!("[{self}]\n")
    }
}
