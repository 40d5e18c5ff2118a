/// Message rendering: one stored message to one safe HTML fragment.
///
/// Pre-sanitized HTML messages pass back through the sanitizer and are
/// otherwise untouched. Everything else is markdown source, rendered here
/// at display time with tables, strikethrough and task lists enabled and
/// soft breaks promoted to hard breaks. Raw HTML embedded in markdown is
/// rendered as visible text, and image syntax is stripped up front, so a
/// fragment built here never carries markup that skipped the sanitizer.
use pulldown_cmark::{Event, Options, Parser, html};

use crate::sanitize;
use crate::store::{Message, Role};

/// Render a message to an HTML fragment. Pure aside from the sanitizer
/// bypass flag, and idempotent for a given input.
pub fn render_message(msg: &Message, sanitize_html: bool) -> String {
    if msg.role == Role::Bot && msg.html {
        sanitize::clean_or_passthrough(&msg.content, sanitize_html)
    } else {
        markdown_to_html(&msg.content)
    }
}

pub fn markdown_to_html(source: &str) -> String {
    let stripped = strip_images(source);
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(&stripped, options).map(|event| match event {
        // The chat contract treats every newline as a line break
        Event::SoftBreak => Event::HardBreak,
        // Raw markup becomes visible text instead of live markup
        Event::Html(raw) => Event::Text(raw),
        Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn strip_images(text: &str) -> String {
    strip_img_tags(&strip_md_images(text))
}

/// Remove `![alt](url)` image syntax, shortest match first.
fn strip_md_images(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = rest.find("![") else {
            out.push_str(rest);
            break;
        };
        let after = &rest[start..];
        let complete = after
            .find("](")
            .and_then(|mid| after[mid..].find(')').map(|end| mid + end + 1));
        match complete {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &after[len..];
            }
            None => {
                out.push_str(&rest[..start + 2]);
                rest = &rest[start + 2..];
            }
        }
    }
    out
}

/// Remove literal `<img ...>` tags, case-insensitive.
fn strip_img_tags(text: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        match lower[i..].find("<img") {
            Some(pos) => {
                out.push_str(&text[i..i + pos]);
                let tag_start = i + pos;
                match text[tag_start..].find('>') {
                    Some(end) => i = tag_start + end + 1,
                    None => {
                        // No closing bracket: not a tag, keep the text
                        out.push_str(&text[tag_start..]);
                        break;
                    }
                }
            }
            None => {
                out.push_str(&text[i..]);
                break;
            }
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn md(content: &str) -> Message {
        Message {
            role: Role::Bot,
            content: content.to_string(),
            html: false,
        }
    }

    #[test]
    fn markdown_rendering_is_idempotent() {
        let msg = md("# Title\n\nSome *emphasis* and a [link](https://example.com).");
        let first = render_message(&msg, true);
        let second = render_message(&msg, true);
        assert_eq!(first, second);
        assert!(first.contains("<h1>"));
        assert!(first.contains("<em>emphasis</em>"));
    }

    #[test]
    fn newlines_become_hard_breaks() {
        let out = render_message(&md("first line\nsecond line"), true);
        assert!(out.contains("<br"));
    }

    #[test]
    fn gfm_tables_render() {
        let out = render_message(&md("| a | b |\n|---|---|\n| 1 | 2 |"), true);
        assert!(out.contains("<table>"));
        assert!(out.contains("<th>a</th>"));
        assert!(out.contains("<td>2</td>"));
    }

    #[test]
    fn raw_html_in_markdown_is_escaped_to_text() {
        let out = render_message(&md("before <script>alert('x')</script> after"), true);
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn image_syntax_is_stripped() {
        let out = render_message(&md("see ![chart](http://x/y.png) here"), true);
        assert!(!out.contains("img"));
        assert!(out.contains("see"));
        assert!(out.contains("here"));

        let out = render_message(&md("see <IMG src=x onerror=alert(1)> here"), true);
        assert!(!out.to_ascii_lowercase().contains("<img"));
    }

    #[test]
    fn incomplete_image_syntax_is_left_alone() {
        let out = render_message(&md("a ![dangling bracket"), true);
        assert!(out.contains("![dangling bracket"));
    }

    #[test]
    fn pre_sanitized_html_passes_verbatim() {
        let msg = Message {
            role: Role::Bot,
            content: "<p>hi</p>".to_string(),
            html: true,
        };
        assert_eq!(render_message(&msg, true), "<p>hi</p>");
    }

    #[test]
    fn pre_sanitized_html_is_re_sanitized_on_render() {
        // A store written by an older or foreign build could hold markup
        // that never saw the current profile; re-rendering cleans it
        let msg = Message {
            role: Role::Bot,
            content: "<p>ok</p><script>alert('x')</script>".to_string(),
            html: true,
        };
        assert_eq!(render_message(&msg, true), "<p>ok</p>");
        assert_eq!(render_message(&msg, false), msg.content);
    }

    #[test]
    fn user_messages_render_as_markdown() {
        let msg = Message {
            role: Role::User,
            content: "show me **totals**".to_string(),
            html: false,
        };
        let out = render_message(&msg, true);
        assert!(out.contains("<strong>totals</strong>"));
    }

    #[test]
    fn user_html_flag_is_ignored_for_user_role() {
        // Only bot messages may carry pre-sanitized markup
        let msg = Message {
            role: Role::User,
            content: "<p>sneaky</p>".to_string(),
            html: true,
        };
        let out = render_message(&msg, true);
        assert!(out.contains("&lt;p&gt;"));
    }
}
