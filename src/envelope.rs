/// Response envelope classification.
///
/// The compose backend answers one of four shapes, tagged by `mode`:
/// finished HTML to substitute and sanitize, markdown to render later, a
/// block/denial notice, or something unrecognized. The enum carries exactly
/// those four, with the catch-all keeping the raw JSON so an integration
/// mistake is shown to the user instead of swallowed.
use std::collections::BTreeMap;

use serde_json::Value;

use crate::sanitize;
use crate::store::{Message, Role};

/// Shown for a blocked request with no postamble of its own.
pub const DENIAL_NOTICE: &str = "Request denied.";

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Html {
        template: String,
        variables: BTreeMap<String, Option<String>>,
        preamble: Option<String>,
        postamble: Option<String>,
    },
    Markdown {
        template: String,
        preamble: Option<String>,
        postamble: Option<String>,
    },
    Blocked {
        postamble: Option<String>,
    },
    Unrecognized {
        raw: Value,
    },
}

impl Envelope {
    /// Classify a raw response body. Never fails: anything without a known
    /// `mode` lands in `Unrecognized`.
    pub fn classify(raw: Value) -> Envelope {
        let mode = raw.get("mode").and_then(Value::as_str);
        match mode {
            Some("html") => Envelope::Html {
                template: str_field(&raw, "final_template"),
                variables: variables(&raw),
                preamble: opt_field(&raw, "preamble"),
                postamble: opt_field(&raw, "postamble"),
            },
            Some("markdown") => Envelope::Markdown {
                template: str_field(&raw, "final_template"),
                preamble: opt_field(&raw, "preamble"),
                postamble: opt_field(&raw, "postamble"),
            },
            Some("blocked") => Envelope::Blocked {
                postamble: opt_field(&raw, "postamble"),
            },
            _ => Envelope::Unrecognized { raw },
        }
    }

    /// The label the status line shows for this outcome.
    pub fn mode_name(&self) -> &'static str {
        match self {
            Envelope::Html { .. } => "html",
            Envelope::Markdown { .. } => "markdown",
            Envelope::Blocked { .. } => "blocked",
            Envelope::Unrecognized { .. } => "unrecognized",
        }
    }

    /// Produce the bot message to store. `sanitize_html = false` is the
    /// debug escape hatch that skips the sanitizer.
    pub fn materialize(&self, sanitize_html: bool) -> Message {
        match self {
            Envelope::Html {
                template,
                variables,
                preamble,
                postamble,
            } => {
                let mut html = template.clone();
                // Literal replacement in sorted key order. When keys overlap
                // as substrings the later key rewrites the earlier key's
                // output; that quirk is part of the contract.
                for (key, value) in variables {
                    let needle = format!("{{{key}}}");
                    html = html.replace(&needle, value.as_deref().unwrap_or(""));
                }
                if let Some(pre) = preamble {
                    html = format!("<p>{pre}</p>\n{html}");
                }
                if let Some(post) = postamble {
                    html = format!("{html}\n<p>{post}</p>");
                }
                Message {
                    role: Role::Bot,
                    content: sanitize::clean_or_passthrough(&html, sanitize_html),
                    html: true,
                }
            }
            Envelope::Markdown {
                template,
                preamble,
                postamble,
            } => {
                let md = [
                    preamble.as_deref(),
                    Some(template.as_str()),
                    postamble.as_deref(),
                ]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
                Message {
                    role: Role::Bot,
                    content: md,
                    html: false,
                }
            }
            Envelope::Blocked { postamble } => Message {
                role: Role::Bot,
                content: postamble
                    .clone()
                    .unwrap_or_else(|| DENIAL_NOTICE.to_string()),
                html: false,
            },
            Envelope::Unrecognized { raw } => {
                let pretty =
                    serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
                Message {
                    role: Role::Bot,
                    content: format!(
                        "Compose returned unexpected mode. Raw JSON:\n```json\n{pretty}\n```"
                    ),
                    html: false,
                }
            }
        }
    }
}

fn str_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Present-and-non-empty string fields only, matching the truthiness the
/// original dispatch applied to preamble/postamble.
fn opt_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn variables(raw: &Value) -> BTreeMap<String, Option<String>> {
    let Some(map) = raw.get("variables").and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            (k.clone(), value)
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn html_mode_substitutes_placeholders() {
        let env = Envelope::classify(json!({
            "mode": "html",
            "final_template": "<p>{x}</p>",
            "variables": {"x": "hi"}
        }));
        let msg = env.materialize(true);
        assert_eq!(msg.content, "<p>hi</p>");
        assert!(msg.html);
        assert_eq!(msg.role, Role::Bot);
    }

    #[test]
    fn absent_and_null_variables_become_empty() {
        let env = Envelope::classify(json!({
            "mode": "html",
            "final_template": "<p>{x}{y}</p>",
            "variables": {"x": null}
        }));
        // {y} has no variable at all, so it stays literal, the same way the
        // original only replaced declared keys
        assert_eq!(env.materialize(true).content, "<p>{y}</p>");

        let env = Envelope::classify(json!({
            "mode": "html",
            "final_template": "<p>{x}{y}</p>",
            "variables": {"x": null, "y": "b"}
        }));
        assert_eq!(env.materialize(true).content, "<p>b</p>");
    }

    #[test]
    fn substring_keys_apply_in_sorted_order() {
        let env = Envelope::classify(json!({
            "mode": "html",
            "final_template": "<p>{a} and {ab}</p>",
            "variables": {"a": "one {ab}", "ab": "two"}
        }));
        // "a" runs first and injects an {ab} pattern, then "ab" rewrites
        // both occurrences: last replacement wins
        assert_eq!(env.materialize(true).content, "<p>one two and two</p>");
    }

    #[test]
    fn preamble_and_postamble_wrap_as_paragraphs() {
        let env = Envelope::classify(json!({
            "mode": "html",
            "final_template": "<table class=\"llm-table\"><tr><td>1</td></tr></table>",
            "preamble": "Here are your results:",
            "postamble": "Anything else?"
        }));
        assert_eq!(
            env.materialize(true).content,
            "<p>Here are your results:</p>\n<table class=\"llm-table\"><tr><td>1</td></tr></table>\n<p>Anything else?</p>"
        );
    }

    #[test]
    fn html_mode_is_sanitized_before_storage() {
        let env = Envelope::classify(json!({
            "mode": "html",
            "final_template": "<p>ok</p><script>alert('x')</script>"
        }));
        assert_eq!(env.materialize(true).content, "<p>ok</p>");
        // Debug bypass keeps the markup untouched
        assert_eq!(
            env.materialize(false).content,
            "<p>ok</p><script>alert('x')</script>"
        );
    }

    #[test]
    fn markdown_mode_joins_present_parts() {
        let env = Envelope::classify(json!({
            "mode": "markdown",
            "final_template": "| a | b |\n|---|---|\n| 1 | 2 |",
            "preamble": "Here you go:"
        }));
        let msg = env.materialize(true);
        assert!(!msg.html);
        assert_eq!(
            msg.content,
            "Here you go:\n\n| a | b |\n|---|---|\n| 1 | 2 |"
        );
    }

    #[test]
    fn markdown_mode_with_only_template() {
        let env = Envelope::classify(json!({
            "mode": "markdown",
            "final_template": "plain text"
        }));
        assert_eq!(env.materialize(true).content, "plain text");
    }

    #[test]
    fn blocked_mode_uses_postamble_or_fixed_notice() {
        let env = Envelope::classify(json!({"mode": "blocked", "postamble": "no"}));
        assert_eq!(env.materialize(true).content, "no");

        let env = Envelope::classify(json!({"mode": "blocked"}));
        assert_eq!(env.materialize(true).content, DENIAL_NOTICE);
    }

    #[test]
    fn unknown_mode_embeds_raw_json() {
        let env = Envelope::classify(json!({"mode": "weird", "extra": 7}));
        let msg = env.materialize(true);
        assert!(!msg.html);
        assert!(msg.content.contains("```json"));
        assert!(msg.content.contains("\"mode\": \"weird\""));
        assert!(msg.content.contains("\"extra\": 7"));
    }

    #[test]
    fn missing_mode_is_unrecognized() {
        let env = Envelope::classify(json!({"final_template": "<p>x</p>"}));
        assert!(matches!(env, Envelope::Unrecognized { .. }));
    }

    #[test]
    fn classification_is_pure() {
        let body = json!({"mode": "blocked", "postamble": "no"});
        assert_eq!(
            Envelope::classify(body.clone()),
            Envelope::classify(body.clone())
        );
        let env = Envelope::classify(body);
        assert_eq!(env.materialize(true), env.materialize(true));
    }
}
