//! Background chapter loading.
//!
//! Chapter bodies are read on a worker thread so file I/O never blocks the
//! event loop. Results come back tagged with the request that produced them;
//! the owner decides whether they are still current before applying them.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use super::{Chapter, ChapterStore};

/// Which buffer operation a load feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Replace the whole window with this chapter.
    Start,
    /// Extend the window at the bottom.
    Append,
    /// Extend the window at the top.
    Prepend,
}

/// A chapter read to be performed off-thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub source: u64,
    pub epoch: u64,
    pub index: usize,
    pub kind: LoadKind,
    pub chapter: Chapter,
}

/// Outcome of a [`LoadRequest`]. A read failure carries the error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedChapter {
    pub source: u64,
    pub epoch: u64,
    pub index: usize,
    pub kind: LoadKind,
    pub title: String,
    pub body: Result<String, String>,
}

impl LoadRequest {
    /// Perform the read synchronously.
    pub fn fulfill(self, store: &dyn ChapterStore) -> LoadedChapter {
        let body = store
            .fetch_content(&self.chapter.content)
            .map_err(|err| err.to_string());
        LoadedChapter {
            source: self.source,
            epoch: self.epoch,
            index: self.index,
            kind: self.kind,
            title: self.chapter.title,
            body,
        }
    }
}

/// Worker thread serving chapter reads in request order.
pub struct ChapterLoader {
    requests: Sender<LoadRequest>,
    results: Receiver<LoadedChapter>,
}

impl ChapterLoader {
    pub fn new(store: Arc<dyn ChapterStore>) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<LoadRequest>();
        let (res_tx, res_rx) = mpsc::channel();
        thread::spawn(move || {
            while let Ok(request) = req_rx.recv() {
                crate::perf::log_event(
                    "loader.fetch",
                    format!("index={} kind={:?}", request.index, request.kind),
                );
                if res_tx.send(request.fulfill(store.as_ref())).is_err() {
                    break;
                }
            }
        });
        Self {
            requests: req_tx,
            results: res_rx,
        }
    }

    pub fn submit(&self, request: LoadRequest) {
        if self.requests.send(request).is_err() {
            tracing::warn!("chapter loader thread has stopped");
        }
    }

    /// Take one finished load, if any.
    pub fn try_recv(&self) -> Option<LoadedChapter> {
        self.results.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{ChapterRef, FileChapterStore};
    use std::time::Duration;
    use tempfile::tempdir;

    fn request(path: &std::path::Path, kind: LoadKind) -> LoadRequest {
        LoadRequest {
            source: 1,
            epoch: 2,
            index: 3,
            kind,
            chapter: Chapter::new("第三章", ChapterRef::new(path)),
        }
    }

    #[test]
    fn test_fulfill_carries_request_identity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.txt");
        std::fs::write(&path, "body").unwrap();
        let loaded = request(&path, LoadKind::Append).fulfill(&FileChapterStore);
        assert_eq!((loaded.source, loaded.epoch, loaded.index), (1, 2, 3));
        assert_eq!(loaded.kind, LoadKind::Append);
        assert_eq!(loaded.title, "第三章");
        assert_eq!(loaded.body, Ok("body".to_string()));
    }

    #[test]
    fn test_fulfill_turns_read_failure_into_error_text() {
        let dir = tempdir().unwrap();
        let loaded = request(&dir.path().join("gone.txt"), LoadKind::Start).fulfill(&FileChapterStore);
        assert!(loaded.body.unwrap_err().contains("gone.txt"));
    }

    #[test]
    fn test_loader_thread_returns_results() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.txt");
        std::fs::write(&path, "hello").unwrap();
        let loader = ChapterLoader::new(Arc::new(FileChapterStore));
        loader.submit(request(&path, LoadKind::Prepend));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let mut got = None;
        while got.is_none() && std::time::Instant::now() < deadline {
            got = loader.try_recv();
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(got.map(|l| l.body), Some(Ok("hello".to_string())));
    }
}
