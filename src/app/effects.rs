use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use tempfile::TempDir;

use crate::app::{Message, Model, ToastLevel};
use crate::chapter::{ChapterLoader, ChapterSplitter, FileChapterStore, SplitEvent, SplitHandle, split_channel};
use crate::error::ReaderError;
use crate::reader::ReadingPosition;
use crate::settings;
use crate::watcher::{FileWatcher, WATCH_DEBOUNCE_MS};

const CACHE_PREFIX: &str = "novel_reader_chapters_";

/// Everything outside the model that messages act on: worker threads,
/// the chapter cache directory and file watchers.
pub struct Runtime {
    loader: ChapterLoader,
    split_tx: std::sync::mpsc::Sender<SplitEvent>,
    split_rx: Receiver<SplitEvent>,
    split: Option<SplitHandle>,
    cache: Option<TempDir>,
    settings_watcher: Option<FileWatcher>,
    source_watcher: Option<FileWatcher>,
}

impl Runtime {
    pub fn new() -> Self {
        let (split_tx, split_rx) = split_channel();
        Self {
            loader: ChapterLoader::new(Arc::new(FileChapterStore)),
            split_tx,
            split_rx,
            split: None,
            cache: None,
            settings_watcher: None,
            source_watcher: None,
        }
    }

    /// Start watching the shared settings record.
    pub fn watch_settings(&mut self, model: &mut Model) {
        match FileWatcher::new(&model.settings_path, WATCH_DEBOUNCE_MS) {
            Ok(watcher) => self.settings_watcher = Some(watcher),
            Err(err) => {
                tracing::warn!(%err, path = %model.settings_path.display(), "settings watch unavailable");
                crate::perf::log_event("watcher.error", format!("settings err={err}"));
            }
        }
    }

    /// Open the novel named by the settings record, or report why not.
    pub fn open_from_settings(&mut self, model: &mut Model) {
        match model.settings.novel_path() {
            Some(path) => self.open_source(model, &path),
            None => {
                model.reader.reset_source();
                model.source_path = None;
                model.notice = Some("No novel selected. Pass a file path to start reading.".to_string());
            }
        }
    }

    /// Replace the current novel with `path` and start splitting it.
    pub fn open_source(&mut self, model: &mut Model, path: &Path) {
        let _scope = crate::perf::scope("app.open_source");
        let source = model.reader.reset_source();
        self.split = None;
        self.cache = None;
        self.source_watcher = None;
        model.source_path = Some(path.to_path_buf());
        model.split_running = false;
        model.toc_cursor = None;
        model.toc_scroll_offset = 0;

        if !path.is_file() {
            let err = ReaderError::SourceNotFound {
                path: path.to_path_buf(),
            };
            tracing::warn!(%err, "cannot open novel");
            model.notice = Some(err.to_string());
            return;
        }

        let restore = model
            .settings
            .novel_path()
            .filter(|p| p == path)
            .map(|_| model.settings.reading_position());
        model.reader.set_restore(restore);

        let cache = match tempfile::Builder::new().prefix(CACHE_PREFIX).tempdir() {
            Ok(dir) => dir,
            Err(err) => {
                let err = ReaderError::SplitFailure {
                    message: err.to_string(),
                };
                model.notice = Some(err.to_string());
                return;
            }
        };
        let handle = ChapterSplitter::new(cache.path()).spawn(path, source, self.split_tx.clone());
        self.split = Some(handle);
        self.cache = Some(cache);

        model.source_size_kb = std::fs::metadata(path).map_or(0, |m| m.len() / 1024);
        model.split_running = true;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        model.notice = Some(format!("Splitting chapters of {name} ({} KB)...", model.source_size_kb));
        tracing::info!(path = %path.display(), source, restore = ?restore, "opening novel");

        if model.watch_enabled {
            match FileWatcher::new(path, WATCH_DEBOUNCE_MS) {
                Ok(watcher) => self.source_watcher = Some(watcher),
                Err(err) => {
                    model.show_toast(ToastLevel::Warning, format!("Watch unavailable: {err}"));
                    crate::perf::log_event("watcher.error", format!("path={} err={err}", path.display()));
                }
            }
        }
    }

    pub fn handle_message_side_effects(&mut self, model: &mut Model, msg: &Message) {
        match msg {
            Message::Reload | Message::SourceChanged => {
                self.flush_position(model);
                if let Some(path) = model.source_path.clone() {
                    self.open_source(model, &path);
                    if matches!(msg, Message::Reload) {
                        model.show_toast(ToastLevel::Info, "Reloading");
                    }
                }
            }
            Message::SettingsChanged(settings) => {
                if settings.novel_path() != model.source_path {
                    self.open_from_settings(model);
                }
            }
            Message::Quit => self.flush_position(model),
            _ => {}
        }
        self.submit_loads(model);
    }

    /// Hand queued chapter reads to the loader thread.
    pub fn submit_loads(&self, model: &mut Model) {
        for request in model.reader.take_requests() {
            self.loader.submit(request);
        }
    }

    /// Collect finished worker results as messages.
    pub fn drain_workers(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .split_rx
            .try_iter()
            .map(|event| match event {
                SplitEvent::Chapter { source, chapter } => Message::ChapterDiscovered { source, chapter },
                SplitEvent::Finished { source, chapters } => Message::SplitFinished { source, chapters },
                SplitEvent::Failed { source, error } => Message::SplitFailed { source, error },
            })
            .collect();
        while let Some(loaded) = self.loader.try_recv() {
            messages.push(Message::ChapterLoaded(loaded));
        }
        messages
    }

    /// Poll file watchers for settled changes.
    pub fn poll_watchers(&mut self, model: &Model, now_ms: u64) -> Vec<Message> {
        let mut messages = Vec::new();
        if self.settings_watcher.as_mut().is_some_and(|w| w.poll(now_ms)) {
            match settings::load(&model.settings_path) {
                Ok(settings) if settings != model.settings => messages.push(Message::SettingsChanged(settings)),
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "ignoring unreadable settings change"),
            }
        }
        if self.source_watcher.as_mut().is_some_and(|w| w.poll(now_ms)) {
            messages.push(Message::SourceChanged);
        }
        messages
    }

    /// Save the reading position once the save delay has passed.
    pub fn persist_position(&self, model: &mut Model) {
        if let Some(position) = model.reader.poll_save(model.now_ms) {
            save_position(model, position);
        }
    }

    /// Save the current position immediately, if one is pending.
    pub fn flush_position(&self, model: &mut Model) {
        if !model.reader.save_pending() {
            return;
        }
        if let Some(position) = model.reader.current_position() {
            model.reader.set_restore(Some(position));
            save_position(model, position);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn save_position(model: &mut Model, position: ReadingPosition) {
    if model.settings.novel_path() != model.source_path {
        tracing::debug!("settings point at another novel; position not saved");
        return;
    }
    if model.settings.reading_position() == position {
        return;
    }
    model.settings.set_reading_position(position);
    if let Err(err) = settings::save(&model.settings_path, &model.settings) {
        tracing::warn!(error = %format!("{err:#}"), "failed to save reading position");
        model.show_toast(ToastLevel::Error, format!("Save failed: {err}"));
    } else {
        crate::perf::log_event(
            "settings.save",
            format!("chapter={} offset={}", position.chapter_index, position.offset_within_chapter),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::update;
    use crate::settings::Settings;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn pump_until(runtime: &mut Runtime, mut model: Model, done: impl Fn(&Model) -> bool) -> Model {
        let started = Instant::now();
        while !done(&model) && started.elapsed() < Duration::from_secs(5) {
            for msg in runtime.drain_workers() {
                model = update(model, msg.clone());
                runtime.handle_message_side_effects(&mut model, &msg);
            }
            model.reader.layout_pass(model.now_ms);
            std::thread::sleep(Duration::from_millis(5));
        }
        model
    }

    #[test]
    fn test_missing_novel_shows_not_found() {
        let dir = tempdir().unwrap();
        let mut model = Model::default();
        let mut runtime = Runtime::new();
        runtime.open_source(&mut model, &dir.path().join("missing.txt"));
        assert!(model.notice.as_deref().unwrap().starts_with("File not found:"));
        assert!(!model.split_running);
    }

    #[test]
    fn test_blank_settings_path_shows_prompt() {
        let mut model = Model::default();
        let mut runtime = Runtime::new();
        runtime.open_from_settings(&mut model);
        assert!(model.notice.as_deref().unwrap().contains("No novel selected"));
    }

    #[test]
    fn test_open_splits_and_restores_position() {
        let dir = tempdir().unwrap();
        let novel = dir.path().join("book.txt");
        std::fs::write(&novel, "序\n第一章 起\n甲乙丙丁戊己庚辛\n第二章 承\n子丑寅卯\n").unwrap();
        let mut settings = Settings::default();
        settings.set_novel_path(&novel);
        settings.set_reading_position(ReadingPosition::new(1, 3));
        let mut model = Model::new(settings, dir.path().join("settings.json"), (80, 24));
        let mut runtime = Runtime::new();

        runtime.open_source(&mut model, &novel);
        assert!(model.split_running);
        assert!(model.notice.as_deref().unwrap().contains("book.txt"));

        let model = pump_until(&mut runtime, model, |m| m.reader.buffer().window().start().is_some());
        assert_eq!(model.chapter_count(), 3);
        assert!(!model.split_running);
        assert_eq!(model.notice, None);
        assert_eq!(model.reader.buffer().window().start(), Some(1));
        assert_eq!(model.reader.restore_position(), Some(ReadingPosition::new(1, 3)));
        assert_eq!(model.reader.anchor().pending(), None);
    }

    #[test]
    fn test_flush_writes_position_to_settings() {
        let dir = tempdir().unwrap();
        let novel = dir.path().join("book.txt");
        let body: String = (0..60).map(|i| format!("第{i}行。\n")).collect();
        std::fs::write(&novel, format!("第一章 起\n{body}")).unwrap();
        let settings_path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.set_novel_path(&novel);
        let mut model = Model::new(settings, settings_path.clone(), (80, 24));
        let mut runtime = Runtime::new();
        runtime.open_source(&mut model, &novel);
        let mut model = pump_until(&mut runtime, model, |m| m.reader.buffer().window().start().is_some());

        let select = Message::ChapterSelected {
            index: 1,
            source: crate::reader::SelectionSource::User,
        };
        model = update(model, select.clone());
        runtime.handle_message_side_effects(&mut model, &select);
        let mut model = pump_until(&mut runtime, model, |m| m.reader.buffer().window().end() == Some(1));
        model.reader.layout_pass(0);
        model.reader.scroll(crate::reader::ScrollDirection::Down, 3, 0);
        model = update(model, Message::Quit);
        runtime.handle_message_side_effects(&mut model, &Message::Quit);

        let saved = settings::load(&settings_path).unwrap();
        assert_eq!(saved.last_chapter_index, 1);
        assert!(saved.last_offset_in_chapter > 0);
    }
}
