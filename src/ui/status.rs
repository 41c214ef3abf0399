use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Model, ToastLevel};

pub fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    frame.render_widget(
        Paragraph::new(status_text(model)).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        area,
    );
}

pub(super) fn status_text(model: &Model) -> String {
    let filename = model
        .source_path
        .as_deref()
        .and_then(|p| p.file_name())
        .map_or_else(|| "no novel".to_string(), |s| s.to_string_lossy().into_owned());

    let reader = &model.reader;
    let chapter_info = reader
        .current_chapter()
        .map(|current| format!("  ch {}/{}", current + 1, reader.index().len()))
        .unwrap_or_default();
    let title = model
        .current_title()
        .map(|t| format!("  {t}"))
        .unwrap_or_default();
    let percent = reader.viewport().scroll_percent();

    let splitting = if model.split_running { " [splitting]" } else { "" };
    let loading = if reader.is_loading() { " [loading]" } else { "" };
    let watching = if model.watch_enabled { " [watching]" } else { "" };

    format!(" {filename}{title}  [{percent}%]{chapter_info}{splitting}{loading}{watching}  ?:help")
}

pub fn render_toast_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, level)) = model.active_toast() else {
        return;
    };
    let (prefix, style) = match level {
        ToastLevel::Info => ("[info]", Style::default().bg(Color::DarkGray).fg(Color::White)),
        ToastLevel::Warning => ("[warn]", Style::default().bg(Color::Yellow).fg(Color::Black)),
        ToastLevel::Error => ("[error]", Style::default().bg(Color::Red).fg(Color::White)),
    };
    frame.render_widget(Paragraph::new(format!("{prefix} {message}")).style(style), area);
}
