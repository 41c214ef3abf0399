//! End-to-end reading: split a novel on a worker thread, load chapters
//! through the background loader and walk the window across the book.

use std::sync::Arc;
use std::time::{Duration, Instant};

use novel_reader::chapter::{ChapterLoader, ChapterSplitter, FileChapterStore, SplitEvent, split_channel};
use novel_reader::reader::{LoadedWindow, Placement, Reader, ReadingPosition, ScrollDirection};
use novel_reader::settings::{self, Settings};

fn write_novel(dir: &std::path::Path, chapters: usize, lines: usize) -> std::path::PathBuf {
    let mut text = String::from("序章的内容。\n");
    for i in 1..=chapters {
        text.push_str(&format!("第{i}章 风起{i}\n"));
        for line in 0..lines {
            text.push_str(&format!("正文{i}之{line}，夜色很深。\n"));
        }
    }
    let path = dir.join("novel.txt");
    std::fs::write(&path, text).unwrap();
    path
}

/// Split `path` in the background and feed the index into `reader`.
fn split(reader: &mut Reader, path: &std::path::Path, cache: &std::path::Path) {
    let source = reader.reset_source();
    let (tx, rx) = split_channel();
    let _handle = ChapterSplitter::new(cache).spawn(path, source, tx);
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(SplitEvent::Chapter { source, chapter }) => {
                reader.publish_chapter(source, chapter);
            }
            Ok(SplitEvent::Finished { source, .. }) => {
                reader.finish_index(source);
                return;
            }
            Ok(SplitEvent::Failed { error, .. }) => panic!("split failed: {error}"),
            Err(_) => {}
        }
    }
    panic!("split did not finish");
}

/// Submit queued loads and apply results until the reader is idle.
fn settle(reader: &mut Reader, loader: &ChapterLoader) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        for request in reader.take_requests() {
            loader.submit(request);
        }
        if !reader.is_loading() {
            break;
        }
        assert!(Instant::now() < deadline, "loads did not finish");
        match loader.try_recv() {
            Some(loaded) => {
                reader.apply_loaded(loaded);
            }
            None => std::thread::sleep(Duration::from_millis(2)),
        }
    }
    reader.layout_pass(0);
}

#[test]
fn test_background_split_and_load_opens_first_chapter() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let path = write_novel(dir.path(), 5, 20);
    let loader = ChapterLoader::new(Arc::new(FileChapterStore));
    let mut reader = Reader::new(8);
    reader.on_resize(40, 12);

    split(&mut reader, &path, cache.path());
    settle(&mut reader, &loader);

    assert_eq!(reader.index().len(), 6);
    assert_eq!(reader.buffer().window(), LoadedWindow::single(0));
    assert!(reader.buffer().text().to_string().starts_with("【开篇】"));
    assert_eq!(reader.current_chapter(), Some(0));
}

#[test]
fn test_scrolling_through_the_book_keeps_window_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let path = write_novel(dir.path(), 8, 6);
    let loader = ChapterLoader::new(Arc::new(FileChapterStore));
    let mut reader = Reader::new(3);
    reader.on_resize(40, 12);
    split(&mut reader, &path, cache.path());
    settle(&mut reader, &loader);

    let mut now = 0;
    for _ in 0..200 {
        now += 50;
        reader.scroll(ScrollDirection::Down, 4, now);
        settle(&mut reader, &loader);
        assert!(reader.buffer().window().len() <= 3);
    }
    assert_eq!(reader.buffer().window().end(), Some(8));
    assert_eq!(reader.buffer().window().start(), Some(6));
    assert!(reader.buffer().text().to_string().contains("正文8之5"));
}

#[test]
fn test_position_round_trips_through_settings() {
    let dir = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    let path = write_novel(dir.path(), 4, 50);
    let settings_path = dir.path().join("settings.json");
    let loader = ChapterLoader::new(Arc::new(FileChapterStore));

    let mut reader = Reader::new(8);
    reader.on_resize(40, 12);
    split(&mut reader, &path, cache.path());
    settle(&mut reader, &loader);
    reader.start_from_chapter(3, Placement::JumpToTitle);
    settle(&mut reader, &loader);
    reader.scroll(ScrollDirection::Down, 7, 1_000);
    reader.layout_pass(1_000);
    let position = reader.poll_save(2_000).unwrap();
    assert_eq!(position.chapter_index, 3);

    let mut record = Settings::default();
    record.set_novel_path(&path);
    record.set_reading_position(position);
    settings::save(&settings_path, &record).unwrap();

    let saved = settings::load(&settings_path).unwrap();
    let mut reopened = Reader::new(8);
    reopened.on_resize(40, 12);
    reopened.set_restore(Some(saved.reading_position()));
    split(&mut reopened, &path, cache.path());
    settle(&mut reopened, &loader);

    assert_eq!(reopened.buffer().window(), LoadedWindow::single(3));
    assert_eq!(reopened.current_position(), Some(ReadingPosition::new(3, position.offset_within_chapter)));
}
