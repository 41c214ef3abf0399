use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};

use crate::app::{FOOTER_ROWS, Model};

use super::{TEXT_LEFT_PADDING, TEXT_WIDTH_PERCENT, TOC_WIDTH_PERCENT, overlays, status};

/// Chapter headers inserted into the buffer open with this character.
const HEADER_MARK: char = '【';

pub fn split_main_columns(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(TOC_WIDTH_PERCENT),
            Constraint::Percentage(TEXT_WIDTH_PERCENT),
        ])
        .split(area)
}

/// Columns available to wrapped text for a terminal `total_width` wide.
pub fn text_content_width(total_width: u16, toc_visible: bool) -> u16 {
    let area = Rect::new(0, 0, total_width, 1);
    let text_width = if toc_visible {
        split_main_columns(area)[1].width
    } else {
        total_width
    };
    text_width.saturating_sub(TEXT_LEFT_PADDING).max(1)
}

/// Render the complete UI.
pub fn render(model: &Model, frame: &mut Frame) {
    let area = frame.area();

    if model.toc_visible {
        let chunks = split_main_columns(area);
        render_toc(model, frame, chunks[0]);
        render_text(model, frame, chunks[1]);
    } else {
        render_text(model, frame, area);
    }

    if model.help_visible {
        overlays::render_help_overlay(model, frame, area);
    }
}

fn render_toc(model: &Model, frame: &mut Frame, area: Rect) {
    let index = model.reader.index();
    let visible_rows = usize::from(area.height.saturating_sub(2));
    let max_start = index.len().saturating_sub(visible_rows);
    let start = model.toc_scroll_offset.min(max_start);
    let selected = model.reader.selected();

    let items: Vec<Line> = index
        .iter()
        .enumerate()
        .skip(start)
        .take(visible_rows)
        .map(|(i, chapter)| {
            let marker = if model.toc_cursor == Some(i) { ">" } else { " " };
            let base = if selected == Some(i) {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let style = if model.toc_focused && model.toc_cursor == Some(i) {
                base.reversed()
            } else {
                base
            };
            Line::styled(format!("{marker} {}", chapter.title), style)
        })
        .collect();

    let title = if model.split_running {
        format!("Chapters ({}...)", index.len())
    } else {
        format!("Chapters ({})", index.len())
    };
    let toc_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if model.toc_focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        });

    frame.render_widget(Paragraph::new(items).block(toc_block), area);
}

fn render_text(model: &Model, frame: &mut Frame, area: Rect) {
    let text_outer_area = Rect {
        height: area.height.saturating_sub(FOOTER_ROWS),
        ..area
    };
    let status_area = Rect {
        y: area.y + area.height.saturating_sub(1),
        height: 1,
        ..area
    };

    let block = Block::default()
        .borders(Borders::NONE)
        .padding(Padding::left(TEXT_LEFT_PADDING));
    frame.render_widget(Clear, text_outer_area);

    let reader = &model.reader;
    if reader.buffer().window().is_empty() {
        let notice = model.notice.as_deref().unwrap_or("");
        let paragraph = Paragraph::new(Line::styled(notice.to_string(), Style::default().fg(Color::Indexed(245))))
            .block(block.padding(Padding::new(TEXT_LEFT_PADDING, 0, 1, 0)))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, text_outer_area);
    } else {
        let content: Vec<Line> = visible_text(model)
            .into_iter()
            .map(|row| {
                if row.starts_with(HEADER_MARK) {
                    Line::styled(row, Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
                } else {
                    Line::raw(row)
                }
            })
            .collect();
        frame.render_widget(Paragraph::new(content).block(block), text_outer_area);
    }

    if model.active_toast().is_some() {
        status::render_toast_bar(model, frame, status_area);
    } else {
        status::render_status_bar(model, frame, status_area);
    }
}

/// Text of the rows currently in view.
///
/// The layout can trail the buffer by a frame; ranges are clamped so a
/// stale row never slices past the end of the text.
pub(super) fn visible_text(model: &Model) -> Vec<String> {
    let reader = &model.reader;
    let text = reader.buffer().text();
    let len = text.len_chars();
    reader
        .layout()
        .lines(reader.viewport().visible_range())
        .iter()
        .map(|line| {
            let end = line.end.min(len);
            let start = line.start.min(end);
            text.slice(start..end).to_string()
        })
        .collect()
}
