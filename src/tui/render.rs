/// Ratatui draw entry-point for tabletalk.
/// Thin dispatcher — the transcript painter lives in chat.rs, the session
/// panel in sidebar.rs.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use super::chat::{self, truncate_path};
use super::sidebar::draw_sidebar;
use super::{AppState, Mode};

// ── Top-level layout ──────────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let main = if state.sidebar_visible {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(0)])
            .split(area);
        draw_sidebar(f, state, cols[0]);
        cols[1]
    } else {
        area
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // transcript
            Constraint::Length(1), // status bar
            Constraint::Length(3), // input box
        ])
        .split(main);

    chat::draw_history(f, state, rows[0]);
    draw_status_bar(f, state, rows[1]);
    draw_input(f, state, rows[2]);
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let bg = if state.mode == Mode::Sending {
        Color::Rgb(15, 15, 25)
    } else {
        Color::Rgb(10, 10, 18)
    };

    let (glyph, glyph_color) = if state.mode == Mode::Sending {
        let (g, _, _) = chat::spinner_frame(state.spinner_tick);
        (g, Color::Cyan)
    } else {
        ("▲", Color::White)
    };

    let endpoint = truncate_path(&state.endpoint, 28);
    let mut spans = vec![
        Span::styled(format!(" {glyph} "), Style::default().fg(glyph_color)),
        Span::styled("tabletalk", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled("  ", Style::default()),
        Span::styled(
            state.profile_name.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(endpoint.clone(), Style::default().fg(Color::Rgb(90, 90, 110))),
    ];

    let mut left_width =
        3 + "tabletalk".len() + 2 + state.profile_name.width() + 5 + endpoint.width();
    if let Some(outcome) = state.last_outcome {
        spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(
            outcome,
            Style::default().fg(Color::Rgb(120, 115, 170)),
        ));
        left_width += 5 + outcome.len();
    }

    let hints = "Ctrl+B chats  Ctrl+N new  Ctrl+C quit ";
    let pad = (area.width as usize).saturating_sub(left_width + hints.len());
    spans.push(Span::styled(" ".repeat(pad), Style::default()));
    spans.push(Span::styled(hints, Style::default().fg(Color::Rgb(55, 50, 90))));

    let bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    f.render_widget(bar, area);
}

// ── Input box ─────────────────────────────────────────────────────────────────

fn draw_input(f: &mut Frame, state: &AppState, area: Rect) {
    let (border_color, prompt_color, prompt) = match state.mode {
        Mode::Normal => (Color::Rgb(60, 60, 80), Color::Cyan, "❯"),
        Mode::Sending => (Color::Rgb(40, 40, 60), Color::DarkGray, "·"),
    };

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(border_color))
        .style(Style::default().bg(Color::Rgb(8, 8, 14)));

    let content = if state.mode == Mode::Sending {
        Line::from(vec![
            Span::styled(format!(" {prompt} "), Style::default().fg(prompt_color)),
            Span::styled(
                "waiting for the assistant…",
                Style::default().fg(Color::Rgb(70, 70, 90)),
            ),
        ])
    } else if state.input.is_empty() {
        Line::from(vec![
            Span::styled(format!(" {prompt} "), Style::default().fg(prompt_color)),
            Span::styled(
                "describe a table, list or flowchart…",
                Style::default().fg(Color::Rgb(70, 70, 90)),
            ),
        ])
    } else {
        Line::from(vec![
            Span::styled(format!(" {prompt} "), Style::default().fg(prompt_color)),
            Span::styled(state.input.clone(), Style::default().fg(Color::White)),
        ])
    };

    let remaining = state.char_limit.saturating_sub(state.input.chars().count());
    let counter_fg = if remaining == 0 {
        Color::Rgb(200, 100, 100)
    } else {
        Color::Rgb(70, 70, 90)
    };
    let counter = Line::from(vec![Span::styled(
        format!("{remaining} characters remaining "),
        Style::default().fg(counter_fg),
    )])
    .right_aligned();

    let input = Paragraph::new(vec![content, counter]).block(block);
    f.render_widget(input, area);

    // Hardware cursor tracks the byte-offset cursor while editing
    if state.mode == Mode::Normal {
        let prompt_width: u16 = 3;
        let text_before_cursor = &state.input[..state.cursor.min(state.input.len())];
        let cursor_x = area.x + prompt_width + text_before_cursor.width() as u16;
        let cursor_y = area.y + 1;
        if cursor_x < area.x + area.width {
            f.set_cursor_position((cursor_x, cursor_y));
        }
    }
}
