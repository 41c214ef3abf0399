use crossterm::event::{self, Event, KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::app::{App, Message, Model};
use crate::debounce::Debouncer;

/// Rows moved per mouse wheel notch.
const WHEEL_ROWS: usize = 3;

impl App {
    pub(super) fn handle_event(
        event: &Event,
        model: &Model,
        now_ms: u64,
        resize_debouncer: &mut Debouncer<(u16, u16)>,
    ) -> Option<Message> {
        match event {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => Self::handle_key(*key, model),
            Event::Mouse(mouse) => Self::handle_mouse(*mouse, model),
            Event::Resize(w, h) => {
                crate::perf::log_event("event.resize.queue", format!("width={w} height={h}"));
                resize_debouncer.queue((*w, *h), now_ms);
                None
            }
            _ => None,
        }
    }

    pub(super) fn handle_mouse(mouse: MouseEvent, model: &Model) -> Option<Message> {
        if model.help_visible {
            return None;
        }

        if model.toc_visible {
            let (width, height) = model.terminal_size();
            let toc_area = crate::ui::split_main_columns(Rect::new(0, 0, width, height))[0];
            if point_in_rect(mouse.column, mouse.row, toc_area) {
                return match mouse.kind {
                    MouseEventKind::Up(MouseButton::Left) => toc_row_at(model, toc_area, mouse.row).map(Message::TocClick),
                    MouseEventKind::ScrollDown => Some(Message::TocScrollDown),
                    MouseEventKind::ScrollUp => Some(Message::TocScrollUp),
                    _ => None,
                };
            }
        }

        // Edge scrolls are still sent: they feed sustained-scroll loading.
        match mouse.kind {
            MouseEventKind::ScrollDown => Some(Message::ScrollDown(WHEEL_ROWS)),
            MouseEventKind::ScrollUp => Some(Message::ScrollUp(WHEEL_ROWS)),
            _ => None,
        }
    }

    pub(super) fn handle_key(key: event::KeyEvent, model: &Model) -> Option<Message> {
        if model.help_visible {
            return Some(Message::HideHelp);
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Some(Message::Quit);
        }

        // Catalog-focused navigation
        if model.toc_focused && model.toc_visible {
            return match key.code {
                KeyCode::Char('j') | KeyCode::Down => Some(Message::TocDown),
                KeyCode::Char('k') | KeyCode::Up => Some(Message::TocUp),
                KeyCode::Enter | KeyCode::Char(' ' | 'l') | KeyCode::Right => {
                    Some(Message::TocSelect)
                }
                KeyCode::Tab | KeyCode::Esc | KeyCode::Char('h') | KeyCode::Left => Some(Message::SwitchFocus),
                KeyCode::Char('?') | KeyCode::F(1) => Some(Message::ToggleHelp),
                KeyCode::Char('t') => Some(Message::ToggleToc),
                KeyCode::Char('q') => Some(Message::Quit),
                _ => None,
            };
        }

        match key.code {
            // Navigation
            KeyCode::Char('j') | KeyCode::Down => Some(Message::ScrollDown(1)),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::ScrollUp(1)),
            KeyCode::Char(' ') | KeyCode::PageDown => Some(Message::PageDown),
            KeyCode::Char('b') | KeyCode::PageUp => Some(Message::PageUp),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Message::HalfPageDown),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Message::HalfPageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::GoToTop),
            KeyCode::Char('G') | KeyCode::End => Some(Message::GoToBottom),
            KeyCode::Char('n' | ']') => Some(Message::NextChapter),
            KeyCode::Char('p' | '[') => Some(Message::PrevChapter),

            // Catalog
            KeyCode::Char('t') => Some(Message::ToggleToc),
            KeyCode::Char('T') => Some(Message::ToggleTocFocus),
            KeyCode::Tab if model.toc_visible => Some(Message::SwitchFocus),

            // File
            KeyCode::Char('r' | 'R') => Some(Message::Reload),
            KeyCode::Char('?') | KeyCode::F(1) => Some(Message::ToggleHelp),
            KeyCode::Esc => Some(Message::HideHelp),

            KeyCode::Char('q') => Some(Message::Quit),
            _ => None,
        }
    }

    pub(super) fn view(model: &Model, frame: &mut Frame) {
        crate::ui::render(model, frame);
    }
}

fn point_in_rect(col: u16, row: u16, rect: Rect) -> bool {
    col >= rect.x && col < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Catalog entry under a click, skipping the border rows.
fn toc_row_at(model: &Model, toc_area: Rect, row: u16) -> Option<usize> {
    let count = model.chapter_count();
    if count == 0 || row <= toc_area.y || row >= toc_area.y + toc_area.height.saturating_sub(1) {
        return None;
    }
    let inner_height = usize::from(toc_area.height.saturating_sub(2));
    let start = model.toc_scroll_offset.min(count.saturating_sub(inner_height));
    let index = start + usize::from(row - toc_area.y - 1);
    (index < count).then_some(index)
}
