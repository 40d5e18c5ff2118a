/// Allowlist HTML sanitizer.
///
/// Sits at the same seam the original page gave its DOM sanitizer: every
/// html-mode envelope passes through here before being stored with
/// `html = true`. The profile is fixed: the structural tags the painter
/// understands, `class` (the backend marks artifacts with it), and `href`
/// on anchors restricted to http/https/mailto. Disallowed tags are dropped
/// but their children survive; script and style lose their content too.
use crate::html::{self, Tag, Token};

const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "em", "b", "i", "u", "s",
    "del", "code", "pre", "blockquote", "ul", "ol", "li", "table", "thead", "tbody", "tr", "th",
    "td", "div", "span", "a",
];

fn allowed(name: &str) -> bool {
    ALLOWED_TAGS.contains(&name)
}

/// Tags whose text content must not leak through when the tag is removed.
fn dropped_with_content(name: &str) -> bool {
    name == "script" || name == "style"
}

/// Sanitize a fragment against the fixed profile.
pub fn clean(raw: &str) -> String {
    let tokens = html::tokenize(raw);
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut suppressed = 0usize;
    for token in tokens {
        match token {
            Token::Open(tag) => {
                if dropped_with_content(&tag.name) {
                    suppressed += 1;
                    continue;
                }
                if suppressed > 0 {
                    continue;
                }
                if allowed(&tag.name) {
                    out.push(Token::Open(scrub(tag)));
                }
            }
            Token::SelfClose(tag) => {
                if suppressed > 0 || dropped_with_content(&tag.name) {
                    continue;
                }
                if allowed(&tag.name) {
                    out.push(Token::SelfClose(scrub(tag)));
                }
            }
            Token::Close(name) => {
                if dropped_with_content(&name) {
                    suppressed = suppressed.saturating_sub(1);
                    continue;
                }
                if suppressed > 0 {
                    continue;
                }
                if allowed(&name) {
                    out.push(Token::Close(name));
                }
            }
            Token::Text(t) => {
                if suppressed == 0 {
                    out.push(Token::Text(t));
                }
            }
        }
    }
    html::serialize(&out)
}

/// `clean` unless sanitization is disabled in config, in which case the
/// markup passes through untouched. Debug escape hatch only.
pub fn clean_or_passthrough(raw: &str, enabled: bool) -> String {
    if enabled {
        clean(raw)
    } else {
        tracing::warn!("sanitizer disabled, storing markup unsanitized");
        raw.to_string()
    }
}

fn scrub(tag: Tag) -> Tag {
    let is_anchor = tag.name == "a";
    let attrs = tag
        .attrs
        .into_iter()
        .filter(|(k, v)| match k.as_str() {
            "class" => true,
            "href" if is_anchor => safe_href(v),
            _ => false,
        })
        .collect();
    Tag {
        name: tag.name,
        attrs,
    }
}

fn safe_href(href: &str) -> bool {
    let h = href.trim().to_ascii_lowercase();
    h.starts_with("http://") || h.starts_with("https://") || h.starts_with("mailto:")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_markup_is_unchanged() {
        assert_eq!(clean("<p>hi</p>"), "<p>hi</p>");
    }

    #[test]
    fn table_artifact_keeps_its_class() {
        let html = "<table class=\"llm-table\"><thead><tr><th>A</th></tr></thead>\
                    <tbody><tr><td>1</td></tr></tbody></table>";
        assert_eq!(clean(html), html);
    }

    #[test]
    fn script_is_dropped_with_its_content() {
        assert_eq!(
            clean("<p>before</p><script>alert('x')</script><p>after</p>"),
            "<p>before</p><p>after</p>"
        );
        assert_eq!(clean("<style>body { display: none }</style>ok"), "ok");
    }

    #[test]
    fn event_handler_attributes_are_stripped() {
        assert_eq!(
            clean("<p onclick=\"evil()\" class=\"note\">hi</p>"),
            "<p class=\"note\">hi</p>"
        );
    }

    #[test]
    fn disallowed_tags_are_unwrapped_keeping_children() {
        assert_eq!(clean("<article><p>x</p></article>"), "<p>x</p>");
        assert_eq!(clean("<video><p>fallback</p></video>"), "<p>fallback</p>");
    }

    #[test]
    fn href_schemes_are_restricted() {
        assert_eq!(
            clean("<a href=\"https://example.com\">ok</a>"),
            "<a href=\"https://example.com\">ok</a>"
        );
        assert_eq!(clean("<a href=\"javascript:alert(1)\">x</a>"), "<a>x</a>");
        assert_eq!(
            clean("<a href=\"data:text/html,boom\">x</a>"),
            "<a>x</a>"
        );
    }

    #[test]
    fn mermaid_div_survives() {
        let html = "<div class=\"mermaid\">graph TD; A-->B;</div>";
        assert_eq!(clean(html), "<div class=\"mermaid\">graph TD; A--&gt;B;</div>");
    }

    #[test]
    fn passthrough_mode_leaves_input_alone() {
        let risky = "<script>alert('x')</script>";
        assert_eq!(clean_or_passthrough(risky, false), risky);
        assert_eq!(clean_or_passthrough(risky, true), "");
    }
}
