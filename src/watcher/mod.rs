//! File watching for the settings record and the novel file.
//!
//! Uses notify for cross-platform file system events. Bursts of events
//! (editors and atomic saves produce several) collapse into one change
//! through a [`Debouncer`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::debounce::Debouncer;

/// Quiet period before a change is reported.
pub const WATCH_DEBOUNCE_MS: u64 = 200;

/// Watches a single file and reports debounced changes.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    pending: Debouncer<()>,
}

impl FileWatcher {
    /// Watch `path`. The file itself need not exist yet; its directory must.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or the directory
    /// cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce_ms: u64) -> notify::Result<Self> {
        let path = path.as_ref();
        // Event paths from the OS are canonical; match against the same form.
        let target_path = path.canonicalize().unwrap_or_else(|_| {
            let root = watch_root_for(path);
            root.canonicalize()
                .ok()
                .zip(path.file_name())
                .map_or_else(|| path.to_path_buf(), |(dir, name)| dir.join(name))
        });
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
        tracing::debug!(target = %target_path.display(), "watching file");

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            pending: Debouncer::new(debounce_ms),
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Drain pending events. Returns true once the quiet period after the
    /// last relevant event has passed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let mut relevant = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.is_relevant(&ev) => relevant += 1,
                Ok(ev) => {
                    crate::perf::log_event("watcher.irrelevant", format!("kind={:?} paths={:?}", ev.kind, ev.paths));
                }
                Err(err) => tracing::debug!(%err, "watch error"),
            }
        }
        if relevant > 0 {
            crate::perf::log_event(
                "watcher.change",
                format!("events={relevant} target={}", self.target_path.display()),
            );
            self.pending.queue((), now_ms);
        }
        self.pending.take_ready(now_ms).is_some()
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
