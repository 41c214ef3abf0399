use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph};

use crate::app::Model;

pub fn render_help_overlay(model: &Model, frame: &mut Frame, area: Rect) {
    let popup_width = area.width.saturating_sub(12).max(48);
    let popup_height = area.height.saturating_sub(4).max(12);
    let popup = centered_popup_rect(popup_width, popup_height, area);

    let global_cfg = model
        .config_global_path
        .as_ref()
        .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string());
    let local_cfg = model
        .config_local_path
        .as_ref()
        .map_or_else(|| "<none>".to_string(), |p| p.display().to_string());

    let section_style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let dim_style = Style::default().fg(Color::Indexed(245));

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::styled("Reading", section_style));
    lines.push(Line::raw("  j/k or Up/Down      Scroll"));
    lines.push(Line::raw("  Space/PageDown      Page down"));
    lines.push(Line::raw("  b/PageUp            Page up"));
    lines.push(Line::raw("  Ctrl-d / Ctrl-u     Half page"));
    lines.push(Line::raw("  g / G               Top / bottom of loaded text"));
    lines.push(Line::raw("  n / p               Next / previous chapter"));
    lines.push(Line::raw("  Keep scrolling at an edge to load the next chapter"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Chapters", section_style));
    lines.push(Line::raw("  t                   Toggle catalog"));
    lines.push(Line::raw("  T                   Toggle + focus catalog"));
    lines.push(Line::raw("  Tab                 Switch focus"));
    lines.push(Line::raw("  j/k, Enter, click   Pick a chapter"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Other", section_style));
    lines.push(Line::raw("  r                   Reload novel"));
    lines.push(Line::raw("  q / Ctrl-c          Quit"));
    lines.push(Line::raw("  ? / F1              Toggle help"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Files", section_style));
    lines.push(Line::raw(format!("  Settings: {}", model.settings_path.display())));
    lines.push(Line::raw(format!("  Global flags: {global_cfg}")));
    lines.push(Line::raw(format!("  Local override: {local_cfg}")));

    let block = Block::default()
        .title("Help")
        .borders(Borders::ALL)
        .padding(Padding::uniform(1))
        .style(Style::default().bg(Color::Black).fg(Color::White));

    frame.render_widget(Clear, popup);
    frame.render_widget(block, popup);

    // Inner area: border(1) + padding(1) on each side
    let inner = Rect::new(
        popup.x + 2,
        popup.y + 2,
        popup.width.saturating_sub(4),
        popup.height.saturating_sub(4),
    );
    let content_height = inner.height.saturating_sub(1);
    let content_area = Rect::new(inner.x, inner.y, inner.width, content_height);
    frame.render_widget(Paragraph::new(lines), content_area);

    let footer_area = Rect::new(inner.x, inner.y + content_height, inner.width, 1);
    frame.render_widget(
        Paragraph::new(Line::styled("any key closes", dim_style)),
        footer_area,
    );
}

fn centered_popup_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w) / 2);
    let y = area.y + (area.height.saturating_sub(h) / 2);
    Rect::new(x, y, w, h)
}
