//! Chapter splitting prepass.
//!
//! Scans a novel line by line, recognises heading lines and writes each
//! chapter body to its own file in a private cache directory. Chapters are
//! reported as soon as their heading is seen so the index can be consumed
//! while the rest of the file is still being scanned.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use regex::Regex;

use super::{Chapter, ChapterRef};

/// Title given to the text that precedes the first heading.
pub const PROLOGUE_TITLE: &str = "开篇";

// Lazy title plus the trailing `\s*` drops trailing whitespace from titles.
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(第[0-9一二三四五六七八九十百千两〇零]+[章节回卷部篇].*?)\s*$")
        .expect("heading pattern is valid")
});

/// Return the chapter title if `line` is a heading line.
///
/// ```
/// use novel_reader::chapter::heading_title;
///
/// assert_eq!(heading_title("  第十二章 风起  "), Some("第十二章 风起"));
/// assert_eq!(heading_title("他说第一章写得好"), None);
/// ```
pub fn heading_title(line: &str) -> Option<&str> {
    HEADING_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Events reported by a background split, tagged with the source id
/// they belong to.
#[derive(Debug)]
pub enum SplitEvent {
    Chapter { source: u64, chapter: Chapter },
    Finished { source: u64, chapters: usize },
    Failed { source: u64, error: String },
}

/// Line-by-line heading splitter writing into `cache_dir`.
#[derive(Debug, Clone)]
pub struct ChapterSplitter {
    cache_dir: PathBuf,
}

impl ChapterSplitter {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Split `reader` synchronously, calling `on_chapter` for each chapter
    /// as soon as it is opened. Returns the number of chapters produced.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the source or writing a chapter file fails.
    /// Chapters already reported stay valid.
    pub fn split<R, F>(&self, reader: R, mut on_chapter: F) -> io::Result<usize>
    where
        R: BufRead,
        F: FnMut(Chapter),
    {
        self.split_until(reader, &AtomicBool::new(false), &mut on_chapter)
    }

    fn split_until<R, F>(&self, mut reader: R, cancel: &AtomicBool, on_chapter: &mut F) -> io::Result<usize>
    where
        R: BufRead,
        F: FnMut(Chapter),
    {
        let mut count = 0usize;
        let mut writer = self.open_chapter(count, PROLOGUE_TITLE, on_chapter)?;
        count += 1;

        let mut raw = Vec::new();
        loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!(chapters = count, "split cancelled");
                break;
            }
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            // Invalid UTF-8 decodes to U+FFFD instead of ending the split.
            let decoded = String::from_utf8_lossy(&raw);
            let line = decoded.strip_suffix('\n').unwrap_or(&decoded);
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(title) = heading_title(line) {
                writer.flush()?;
                writer = self.open_chapter(count, title, on_chapter)?;
                count += 1;
                continue;
            }
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(count)
    }

    fn open_chapter<F>(&self, seq: usize, title: &str, on_chapter: &mut F) -> io::Result<BufWriter<File>>
    where
        F: FnMut(Chapter),
    {
        let path = self.cache_dir.join(format!("{seq:05}.txt"));
        let file = File::create(&path)?;
        on_chapter(Chapter::new(title, ChapterRef::new(path)));
        Ok(BufWriter::new(file))
    }

    /// Run the split on a worker thread, reporting through `tx`.
    pub fn spawn(self, source_path: &Path, source: u64, tx: Sender<SplitEvent>) -> SplitHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let source_path = source_path.to_path_buf();
        thread::spawn(move || {
            let result = File::open(&source_path).and_then(|file| {
                let mut report = |chapter| {
                    let _ = tx.send(SplitEvent::Chapter { source, chapter });
                };
                self.split_until(BufReader::new(file), &worker_cancel, &mut report)
            });
            let event = match result {
                Ok(chapters) => SplitEvent::Finished { source, chapters },
                Err(err) => SplitEvent::Failed {
                    source,
                    error: err.to_string(),
                },
            };
            let _ = tx.send(event);
        });
        SplitHandle { cancel }
    }
}

/// Handle to a background split. Dropping it stops the worker early.
#[derive(Debug)]
pub struct SplitHandle {
    cancel: Arc<AtomicBool>,
}

impl SplitHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for SplitHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Create the channel a [`ChapterSplitter::spawn`] reports on.
pub fn split_channel() -> (Sender<SplitEvent>, Receiver<SplitEvent>) {
    mpsc::channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[test]
    fn test_heading_title_accepts_all_unit_suffixes() {
        for line in ["第1章", "第二节 夜", "第三回", "第四卷 终", "第五部", "第六篇"] {
            assert!(heading_title(line).is_some(), "{line} should be a heading");
        }
    }

    #[test]
    fn test_heading_title_rejects_mid_line_mentions() {
        assert_eq!(heading_title("正文 第一章"), None);
        assert_eq!(heading_title("第章"), None);
        assert_eq!(heading_title("第一"), None);
    }

    #[test]
    fn test_heading_title_trims_surrounding_whitespace() {
        assert_eq!(heading_title("第一章 开始   "), Some("第一章 开始"));
        assert_eq!(heading_title("\t第二回 风雨 夜\u{3000}"), Some("第二回 风雨 夜"));
    }

    #[test]
    fn test_split_puts_leading_text_in_prologue() {
        let dir = tempdir().unwrap();
        let splitter = ChapterSplitter::new(dir.path());
        let src = "序言一行\n第一章 开始\n正文A\n第二章 延续\n正文B\n";
        let mut chapters = Vec::new();
        let count = splitter.split(src.as_bytes(), |c| chapters.push(c)).unwrap();

        assert_eq!(count, 3);
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec![PROLOGUE_TITLE, "第一章 开始", "第二章 延续"]);
        assert_eq!(
            std::fs::read_to_string(chapters[0].content.path()).unwrap(),
            "序言一行\n"
        );
        assert_eq!(
            std::fs::read_to_string(chapters[2].content.path()).unwrap(),
            "正文B\n"
        );
    }

    #[test]
    fn test_split_names_files_by_zero_padded_sequence() {
        let dir = tempdir().unwrap();
        let splitter = ChapterSplitter::new(dir.path());
        let mut chapters = Vec::new();
        splitter
            .split("第一章\nx\n".as_bytes(), |c| chapters.push(c))
            .unwrap();
        assert!(chapters[1].content.path().ends_with("00001.txt"));
    }

    #[test]
    fn test_split_strips_carriage_returns() {
        let dir = tempdir().unwrap();
        let splitter = ChapterSplitter::new(dir.path());
        let mut chapters = Vec::new();
        splitter
            .split("第一章 甲\r\n行\r\n".as_bytes(), |c| chapters.push(c))
            .unwrap();
        assert_eq!(chapters[1].title, "第一章 甲");
        assert_eq!(
            std::fs::read_to_string(chapters[1].content.path()).unwrap(),
            "行\n"
        );
    }

    #[test]
    fn test_split_keeps_going_past_invalid_utf8() {
        let dir = tempdir().unwrap();
        let splitter = ChapterSplitter::new(dir.path());
        let src = [
            "第一章 开始\nbad ".as_bytes(),
            &b"\xff"[..],
            " byte\n第二章 延续\n乙\n".as_bytes(),
        ]
        .concat();
        let mut chapters = Vec::new();
        let count = splitter.split(src.as_slice(), |c| chapters.push(c)).unwrap();

        assert_eq!(count, 3);
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec![PROLOGUE_TITLE, "第一章 开始", "第二章 延续"]);
        assert_eq!(
            std::fs::read_to_string(chapters[1].content.path()).unwrap(),
            "bad \u{FFFD} byte\n"
        );
        assert_eq!(
            std::fs::read_to_string(chapters[2].content.path()).unwrap(),
            "乙\n"
        );
    }

    #[test]
    fn test_split_handles_missing_final_newline() {
        let dir = tempdir().unwrap();
        let splitter = ChapterSplitter::new(dir.path());
        let mut chapters = Vec::new();
        splitter
            .split("第一章 甲\n末行".as_bytes(), |c| chapters.push(c))
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(chapters[1].content.path()).unwrap(),
            "末行\n"
        );
    }

    /// Yields `data`, then fails every further read.
    struct FailAfter {
        data: io::Cursor<Vec<u8>>,
    }

    impl io::Read for FailAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("disk went away")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_error_keeps_chapters_already_reported() {
        let dir = tempdir().unwrap();
        let splitter = ChapterSplitter::new(dir.path());
        let reader = BufReader::new(FailAfter {
            data: io::Cursor::new("序\n第一章 开始\n甲\n第二章 延续\n乙".as_bytes().to_vec()),
        });
        let mut chapters = Vec::new();
        let err = splitter.split(reader, |c| chapters.push(c)).unwrap_err();

        assert_eq!(err.to_string(), "disk went away");
        let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec![PROLOGUE_TITLE, "第一章 开始", "第二章 延续"]);
        assert_eq!(
            std::fs::read_to_string(chapters[1].content.path()).unwrap(),
            "甲\n"
        );
    }

    #[test]
    fn test_spawned_split_reports_chapters_then_finish() {
        let dir = tempdir().unwrap();
        let novel = dir.path().join("novel.txt");
        std::fs::write(&novel, "a\n第一章\nb\n").unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir(&cache).unwrap();

        let (tx, rx) = split_channel();
        let _handle = ChapterSplitter::new(&cache).spawn(&novel, 7, tx);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut titles = Vec::new();
        let mut finished = None;
        while finished.is_none() && Instant::now() < deadline {
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(SplitEvent::Chapter { source, chapter }) => {
                    assert_eq!(source, 7);
                    titles.push(chapter.title);
                }
                Ok(SplitEvent::Finished { chapters, .. }) => finished = Some(chapters),
                Ok(SplitEvent::Failed { error, .. }) => panic!("split failed: {error}"),
                Err(_) => {}
            }
        }
        assert_eq!(finished, Some(2));
        assert_eq!(titles, vec![PROLOGUE_TITLE.to_string(), "第一章".to_string()]);
    }

    #[test]
    fn test_spawned_split_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        let (tx, rx) = split_channel();
        let _handle = ChapterSplitter::new(dir.path()).spawn(&dir.path().join("nope.txt"), 1, tx);
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, SplitEvent::Failed { source: 1, .. }));
    }
}
