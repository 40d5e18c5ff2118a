/// Transcript pane rendering — build_items, draw_history, block painter, spinner.
///
/// Bot messages go through the full pipeline here: stored message →
/// HTML fragment (render.rs) → block tree (html.rs) → styled lines. The
/// whole transcript is rebuilt every draw; scroll state lives in AppState.
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::{AppState, Mode};
use crate::diagram;
use crate::html::{self, Inline, Marker};
use crate::math::{self, MathSegment};
use crate::render;
use crate::store::Role;

// ── Spinner ───────────────────────────────────────────────────────────────────

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_MSGS: &[(&str, Color)] = &[
    ("composing…",        Color::Cyan),
    ("shaping tables…",   Color::Cyan),
    ("lining up rows…",   Color::Rgb(0, 200, 255)),
    ("sketching…",        Color::Rgb(0, 220, 180)),
    ("almost there…",     Color::Rgb(100, 200, 255)),
    ("working on it…",    Color::Cyan),
];

pub fn spinner_frame(tick: u32) -> (&'static str, &'static str, Color) {
    let glyph = SPINNER_GLYPHS[(tick as usize) % SPINNER_GLYPHS.len()];
    // Message cycles more slowly — changes every ~2 seconds (120ms × 16 ticks)
    let msg_idx = (tick as usize / 16) % SPINNER_MSGS.len();
    let (msg, color) = SPINNER_MSGS[msg_idx];
    (glyph, msg, color)
}

// ── Palette ───────────────────────────────────────────────────────────────────

const BOT_LABEL_FG: Color = Color::Rgb(0, 210, 210);
const BOT_TEXT_FG: Color = Color::Rgb(210, 230, 255);
const MATH_FG: Color = Color::Rgb(190, 160, 255);
const CODE_FG: Color = Color::Rgb(220, 220, 200);
const CODE_BG: Color = Color::Rgb(16, 16, 26);
const DIM_FG: Color = Color::Rgb(90, 90, 120);
const TABLE_HEAD_FG: Color = Color::Rgb(0, 220, 180);
const TABLE_LINE_FG: Color = Color::Rgb(50, 50, 70);
const QUOTE_BAR_FG: Color = Color::Rgb(110, 90, 200);
const DIAGRAM_FG: Color = Color::Rgb(150, 220, 170);

// ── Transcript items builder ──────────────────────────────────────────────────

pub fn build_items(state: &AppState, term_width: u16) -> Vec<ListItem<'static>> {
    let mut items: Vec<ListItem<'static>> = Vec::new();

    for msg in &state.messages {
        match msg.role {
            Role::User => push_user_bubble(&mut items, &msg.content, term_width),
            Role::Bot => {
                let fragment = render::render_message(msg, state.sanitize);
                let blocks = html::parse_blocks(&fragment);

                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(
                        "tabletalk",
                        Style::default().fg(BOT_LABEL_FG).add_modifier(Modifier::BOLD),
                    ),
                ])));

                let wrap_width = (term_width as usize).saturating_sub(3).max(20);
                for block in &blocks {
                    push_block(&mut items, block, wrap_width);
                }
                items.push(ListItem::new(Line::raw("")));
            }
        }
    }

    if state.mode == Mode::Sending {
        let (glyph, msg, color) = spinner_frame(state.spinner_tick);
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled(
                format!("{glyph} "),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(msg.to_string(), Style::default().fg(color)),
        ])));
    }

    items
}

// ── User bubble ───────────────────────────────────────────────────────────────

fn push_user_bubble(items: &mut Vec<ListItem<'static>>, msg: &str, term_width: u16) {
    let bg       = Color::Rgb(28, 26, 52);
    let border   = Color::Rgb(110, 90, 200);
    let label_fg = Color::Rgb(160, 140, 255);
    let text_fg  = Color::Rgb(235, 232, 255);
    let body_style = Style::default().fg(text_fg).bg(bg);
    let edge_style = Style::default().fg(border).bg(bg);

    // Dynamic widths — 2 chars left margin, 1 right margin
    let inner_w = (term_width as usize).saturating_sub(3).max(10);
    // Top: "╭─ you ──...──╮"  — label is " you " (5 chars), corners+space = 4
    let dash_total = inner_w.saturating_sub(4 + 5);
    let top_dashes = "─".repeat(dash_total);
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled("╭─ ".to_string(), edge_style),
        Span::styled(
            "you",
            Style::default().fg(label_fg).bg(bg).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {top_dashes}╮"), edge_style),
    ])));

    // Body — word-wrap inside the box (inner_w minus "│ " = 2)
    let wrap_width = inner_w.saturating_sub(2).max(10);
    let raw_lines: Vec<&str> = if msg.is_empty() { vec![""] } else { msg.lines().collect() };
    let wrapped: Vec<String> = raw_lines
        .iter()
        .flat_map(|line| wrap_text(line, wrap_width))
        .collect();
    for line in &wrapped {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("│ ".to_string(), edge_style),
            Span::styled(line.clone(), body_style),
        ])));
    }

    // Bottom: "╰──...──╯"
    let bot_dashes = "─".repeat(inner_w.saturating_sub(2));
    items.push(ListItem::new(Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("╰{bot_dashes}╯"), edge_style),
    ])));
    items.push(ListItem::new(Line::raw("")));
}

// ── Block painter ─────────────────────────────────────────────────────────────

fn push_block(items: &mut Vec<ListItem<'static>>, block: &html::Block, width: usize) {
    match block {
        html::Block::Heading { level, inlines } => {
            let fg = match level {
                1 => Color::Rgb(0, 220, 220),
                2 => Color::Rgb(0, 200, 255),
                _ => Color::Rgb(150, 200, 255),
            };
            let frags: Vec<Frag> = styled_frags(inlines, fg)
                .into_iter()
                .map(|f| Frag {
                    style: f.style.add_modifier(Modifier::BOLD),
                    ..f
                })
                .collect();
            for spans in wrap_frags(&frags, width.saturating_sub(2)) {
                items.push(indented(spans, "  "));
            }
        }

        html::Block::Paragraph { inlines } => {
            let frags = styled_frags(inlines, BOT_TEXT_FG);
            for spans in wrap_frags(&frags, width.saturating_sub(2)) {
                items.push(indented(spans, "  "));
            }
        }

        html::Block::Quote { inlines } => {
            let frags = styled_frags(inlines, Color::Rgb(180, 175, 210));
            for mut spans in wrap_frags(&frags, width.saturating_sub(4)) {
                spans.insert(0, Span::styled("┃ ".to_string(), Style::default().fg(QUOTE_BAR_FG)));
                items.push(indented(spans, "  "));
            }
        }

        html::Block::ListItem { depth, marker, inlines } => {
            let indent = "  ".repeat(depth + 1);
            let marker_text = match marker {
                Marker::Bullet => "• ".to_string(),
                Marker::Number(n) => format!("{n}. "),
            };
            let hang = " ".repeat(indent.len() + marker_text.len());
            let frags = styled_frags(inlines, BOT_TEXT_FG);
            let avail = width.saturating_sub(hang.len()).max(10);
            for (i, mut spans) in wrap_frags(&frags, avail).into_iter().enumerate() {
                if i == 0 {
                    spans.insert(
                        0,
                        Span::styled(
                            format!("{indent}{marker_text}"),
                            Style::default().fg(Color::Rgb(120, 150, 220)),
                        ),
                    );
                    items.push(ListItem::new(Line::from(spans)));
                } else {
                    items.push(indented(spans, &hang));
                }
            }
        }

        html::Block::CodeBlock { lang, text } => {
            if let Some(lang) = lang {
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(lang.clone(), Style::default().fg(DIM_FG)),
                ])));
            }
            for line in text.lines() {
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(
                        format!(" {line} "),
                        Style::default().fg(CODE_FG).bg(CODE_BG),
                    ),
                ])));
            }
        }

        html::Block::Diagram { source } => match diagram::parse_flowchart(source) {
            Ok(chart) => {
                for line in diagram::layout(&chart) {
                    items.push(ListItem::new(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(line, Style::default().fg(DIAGRAM_FG)),
                    ])));
                }
            }
            Err(err) => {
                tracing::debug!("diagram parse failed: {err:#}");
                items.push(ListItem::new(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(
                        diagram::PARSE_ERROR_PLACEHOLDER.to_string(),
                        Style::default().fg(Color::Rgb(220, 100, 100)),
                    ),
                ])));
            }
        },

        html::Block::Table { head, rows } => push_table(items, head, rows, width),

        html::Block::Rule => {
            items.push(ListItem::new(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    "─".repeat(width.saturating_sub(2).min(60)),
                    Style::default().fg(TABLE_LINE_FG),
                ),
            ])));
        }
    }
}

// ── Table grid ────────────────────────────────────────────────────────────────

fn push_table(
    items: &mut Vec<ListItem<'static>>,
    head: &[String],
    rows: &[Vec<String>],
    width: usize,
) {
    let cols = head
        .len()
        .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));
    if cols == 0 {
        return;
    }

    // Column widths from the widest cell, each capped so wide tables degrade
    // by clipping cells instead of wrapping the grid.
    let mut widths = vec![1usize; cols];
    for (i, cell) in head.iter().enumerate() {
        widths[i] = widths[i].max(cell.width());
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(cell.width());
        }
    }
    let cap = (width.saturating_sub(2 + 2 * cols.saturating_sub(1)) / cols).max(4);
    for w in &mut widths {
        *w = (*w).min(cap);
    }

    let grid_width: usize = widths.iter().sum::<usize>() + 2 * cols.saturating_sub(1);

    if !head.is_empty() {
        let mut spans = vec![Span::raw("  ")];
        for (i, w) in widths.iter().enumerate() {
            let cell = head.get(i).map(String::as_str).unwrap_or("");
            spans.push(Span::styled(
                pad_cell(cell, *w),
                Style::default().fg(TABLE_HEAD_FG).add_modifier(Modifier::BOLD),
            ));
            if i + 1 < cols {
                spans.push(Span::raw("  "));
            }
        }
        items.push(ListItem::new(Line::from(spans)));
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  "),
            Span::styled("─".repeat(grid_width), Style::default().fg(TABLE_LINE_FG)),
        ])));
    }

    for row in rows {
        let mut spans = vec![Span::raw("  ")];
        for (i, w) in widths.iter().enumerate() {
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            spans.push(Span::styled(
                pad_cell(cell, *w),
                Style::default().fg(BOT_TEXT_FG),
            ));
            if i + 1 < cols {
                spans.push(Span::raw("  "));
            }
        }
        items.push(ListItem::new(Line::from(spans)));
    }
}

/// Clip to `max` display columns (reserving one for the ellipsis) and pad
/// right so every cell in a column lines up.
fn pad_cell(cell: &str, max: usize) -> String {
    let mut out = if cell.width() <= max {
        cell.to_string()
    } else {
        let mut clipped = String::new();
        let mut w = 0usize;
        for c in cell.chars() {
            let cw = c.width().unwrap_or(0);
            if w + cw > max.saturating_sub(1) {
                break;
            }
            clipped.push(c);
            w += cw;
        }
        clipped.push('…');
        clipped
    };
    let pad = max.saturating_sub(out.width());
    out.push_str(&" ".repeat(pad));
    out
}

// ── Inline styling ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Frag {
    text: String,
    style: Style,
}

fn inline_style(s: &html::InlineStyle, base: Color) -> Style {
    let mut style = Style::default().fg(base);
    if s.code {
        style = Style::default().fg(Color::Rgb(255, 200, 120)).bg(CODE_BG);
    }
    if s.link.is_some() {
        style = style
            .fg(Color::Rgb(100, 180, 255))
            .add_modifier(Modifier::UNDERLINED);
    }
    if s.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if s.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if s.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if s.strike {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    style
}

/// Expand inline runs into styled fragments, restyling `$…$` / `$$…$$` math
/// spans. Code runs are exempt — a dollar sign in code is just a dollar sign.
fn styled_frags(inlines: &[Inline], base: Color) -> Vec<Frag> {
    let mut out = Vec::new();
    for run in inlines {
        let style = inline_style(&run.style, base);
        if run.style.code {
            out.push(Frag { text: run.text.clone(), style });
            continue;
        }
        for seg in math::split_math(&run.text) {
            match seg {
                MathSegment::Text(t) => out.push(Frag { text: t.to_string(), style }),
                MathSegment::Inline(m) | MathSegment::Display(m) => out.push(Frag {
                    text: m.to_string(),
                    style: style.fg(MATH_FG).add_modifier(Modifier::ITALIC),
                }),
            }
        }
    }
    out
}

// ── Span-aware word wrap ──────────────────────────────────────────────────────

enum Tok {
    /// One word, possibly spanning style changes mid-word
    Word(Vec<(String, Style)>),
    Newline,
}

fn tokenize_frags(frags: &[Frag]) -> Vec<Tok> {
    let mut toks = Vec::new();
    let mut word: Vec<(String, Style)> = Vec::new();

    fn close(word: &mut Vec<(String, Style)>, toks: &mut Vec<Tok>) {
        if !word.is_empty() {
            toks.push(Tok::Word(std::mem::take(word)));
        }
    }

    for frag in frags {
        for c in frag.text.chars() {
            if c == '\n' {
                close(&mut word, &mut toks);
                toks.push(Tok::Newline);
            } else if c.is_whitespace() {
                close(&mut word, &mut toks);
            } else {
                match word.last_mut() {
                    Some((text, style)) if *style == frag.style => text.push(c),
                    _ => word.push((c.to_string(), frag.style)),
                }
            }
        }
    }
    close(&mut word, &mut toks);
    toks
}

/// Wrap styled fragments to `max_width` columns. Whitespace collapses to a
/// single space; a word keeps its style boundaries even when split across
/// differently-styled runs ("encyclo<em>pedia</em>" stays one word).
fn wrap_frags(frags: &[Frag], max_width: usize) -> Vec<Vec<Span<'static>>> {
    let max_width = max_width.max(8);
    let mut lines: Vec<Vec<Span<'static>>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut width = 0usize;

    for tok in tokenize_frags(frags) {
        match tok {
            Tok::Newline => {
                lines.push(std::mem::take(&mut current));
                width = 0;
            }
            Tok::Word(pieces) => {
                let word_width: usize =
                    pieces.iter().map(|(t, _)| t.as_str().width()).sum();
                if width > 0 && width + 1 + word_width > max_width {
                    lines.push(std::mem::take(&mut current));
                    width = 0;
                }
                for (i, (text, style)) in pieces.into_iter().enumerate() {
                    if i == 0 && width > 0 {
                        current.push(Span::styled(format!(" {text}"), style));
                    } else {
                        current.push(Span::styled(text, style));
                    }
                }
                width += if width > 0 { 1 + word_width } else { word_width };
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn indented(mut spans: Vec<Span<'static>>, indent: &str) -> ListItem<'static> {
    spans.insert(0, Span::raw(indent.to_string()));
    ListItem::new(Line::from(spans))
}

// ── Draw functions ─────────────────────────────────────────────────────────────

pub fn draw_history(f: &mut Frame, state: &AppState, area: Rect) {
    let all_items = build_items(state, area.width);
    let total = all_items.len();
    let visible = area.height as usize;

    let skip = if total > visible {
        (total - visible).saturating_sub(state.scroll)
    } else {
        0
    };

    let sliced: Vec<ListItem<'static>> = all_items.into_iter().skip(skip).collect();
    let list = List::new(sliced)
        .block(Block::default().style(Style::default().bg(Color::Rgb(8, 8, 14))));
    f.render_widget(list, area);
}

// ── Utilities ──────────────────────────────────────────────────────────────────

/// Word-wrap a single line of plain text to `max_width` columns.
/// Splits on whitespace; never truncates mid-word unless the word alone exceeds max_width.
pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current_width == 0 {
            // First word on line
            current.push_str(word);
            current_width = word_width;
        } else if current_width + 1 + word_width <= max_width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            lines.push(current.clone());
            current = word.to_string();
            current_width = word_width;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn truncate_path(path: &str, max: usize) -> String {
    if path.len() <= max {
        return path.to_string();
    }
    // The cut may land inside a multibyte char; move forward to the next
    // boundary so the slice stays valid.
    let mut cut = (path.len() + 1).saturating_sub(max).min(path.len());
    while !path.is_char_boundary(cut) {
        cut += 1;
    }
    format!("…{}", &path[cut..])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
