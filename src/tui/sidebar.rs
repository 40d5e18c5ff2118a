/// Session sidebar — collapsible left panel listing every stored chat.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
};

use super::AppState;

pub fn draw_sidebar(f: &mut Frame, state: &AppState, area: Rect) {
    let focused = state.sidebar_focused;
    let border_color = if focused { Color::Cyan } else { Color::Rgb(40, 38, 60) };

    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(6, 6, 12)));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let w = inner.width as usize;
    let mut items: Vec<ListItem<'static>> = Vec::new();

    // Header
    let ctrl_hint = if focused { " Esc=exit" } else { " Tab=focus" };
    let header_pad = w.saturating_sub(6 + ctrl_hint.len());
    items.push(ListItem::new(Line::from(vec![
        Span::styled(
            " Chats",
            Style::default().fg(Color::Rgb(100, 95, 150)).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" ".repeat(header_pad), Style::default()),
        Span::styled(ctrl_hint.to_string(), Style::default().fg(Color::Rgb(50, 47, 75))),
    ])));
    items.push(ListItem::new(Line::from(vec![
        Span::styled("─".repeat(w), Style::default().fg(Color::Rgb(35, 33, 55))),
    ])));

    if state.sidebar_rows.is_empty() {
        items.push(ListItem::new(Line::from(vec![
            Span::styled(" no chats yet", Style::default().fg(Color::Rgb(50, 47, 75))),
        ])));
    } else {
        for (i, row) in state.sidebar_rows.iter().enumerate() {
            let selected = focused && i == state.sidebar_selected;

            // Colour scheme: current chat = cyan; keyboard selection = bright highlight
            let (bg, bullet_fg, name_fg, meta_fg) = if row.is_current && selected {
                (Color::Rgb(20, 40, 50), Color::Cyan, Color::Cyan, Color::Rgb(0, 200, 200))
            } else if row.is_current {
                (Color::Rgb(10, 22, 30), Color::Cyan, Color::Cyan, Color::Rgb(0, 170, 170))
            } else if selected {
                (Color::Rgb(28, 26, 48), Color::Rgb(160, 155, 220), Color::White, Color::Rgb(140, 135, 200))
            } else {
                (Color::Reset, Color::Rgb(60, 57, 90), Color::Rgb(150, 145, 190), Color::Rgb(70, 67, 100))
            };

            let bullet = if row.is_current { "●" } else { "○" };

            // Line 1: bullet + title on the left, message count on the right
            let count_str = format!("{} msg ", row.message_count);
            let name_max = w.saturating_sub(3 + count_str.len());
            let name: String = row.title.chars().take(name_max).collect();
            let gap = w.saturating_sub(3 + name.chars().count() + count_str.len());
            items.push(ListItem::new(Line::from(vec![
                Span::styled(format!(" {bullet} "), Style::default().fg(bullet_fg).bg(bg)),
                Span::styled(
                    name,
                    Style::default().fg(name_fg).bg(bg).add_modifier(if row.is_current {
                        Modifier::BOLD
                    } else {
                        Modifier::empty()
                    }),
                ),
                Span::styled(" ".repeat(gap), Style::default().bg(bg)),
                Span::styled(count_str, Style::default().fg(meta_fg).bg(bg)),
            ])));

            // Line 2: creation timestamp
            let ts: String = row.timestamp.chars().take(w.saturating_sub(2)).collect();
            items.push(ListItem::new(Line::from(vec![
                Span::styled(format!("  {ts}"), Style::default().fg(meta_fg).bg(bg)),
            ])));

            items.push(ListItem::new(Line::from(vec![
                Span::styled("─".repeat(w), Style::default().fg(Color::Rgb(25, 23, 40))),
            ])));
        }
    }

    // Footer hint
    items.push(ListItem::new(Line::from(vec![
        Span::styled(" Ctrl+N new · d delete", Style::default().fg(Color::Rgb(55, 52, 80))),
    ])));

    f.render_widget(List::new(items), inner);
}
