/// Send flow for TableTalk.
///
/// One send produces exactly one bot message, whatever happens on the wire:
/// a composed envelope on success, the plain-chat fallback when compose
/// errors, and a fixed unavailability notice when both endpoints fail.
use tokio::sync::mpsc;

use crate::client::ComposeClient;
use crate::envelope::Envelope;
use crate::html;
use crate::render;
use crate::store::{Message, Role};
use crate::tui::UiEvent;

/// Shown when both the compose and fallback chat endpoints fail.
pub const UNAVAILABLE_NOTICE: &str =
    "Sorry, the assistant is unavailable. Please try again later.";

// ── Input preparation ─────────────────────────────────────────────────────────

/// Trim the draft and reject empty sends. Returns the text to submit.
pub fn prepare_input(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Last table context ────────────────────────────────────────────────────────

/// The most recent data table the user can see, serialized for the backend.
///
/// Scans bot messages newest-first, renders each one the same way the
/// transcript does, and returns the first `llm-table` found. Follow-up
/// questions like "sort that by revenue" resolve against this.
pub fn last_table_html(messages: &[Message], sanitize_html: bool) -> Option<String> {
    for msg in messages.iter().rev() {
        if msg.role != Role::Bot {
            continue;
        }
        let fragment = render::render_message(msg, sanitize_html);
        if let Some(table) = html::find_llm_table(&fragment) {
            return Some(table);
        }
    }
    None
}

// ── Send flow ─────────────────────────────────────────────────────────────────

/// Run one send against the backend, emitting UiEvents as results arrive.
///
/// Emits exactly one `UiEvent::BotReply` followed by `UiEvent::SendDone`.
/// The caller is responsible for appending the user message before calling
/// and for refusing input while the send is in flight.
pub async fn run_send(
    input: String,
    last_table: Option<String>,
    client: &ComposeClient,
    sanitize_html: bool,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) {
    let (bot, outcome) = match client.compose(&input, last_table.as_deref()).await {
        Ok(raw) => {
            let envelope = Envelope::classify(raw);
            (envelope.materialize(sanitize_html), envelope.mode_name())
        }
        Err(err) => {
            tracing::warn!("compose failed, falling back to /api/chat: {err:#}");
            fallback_reply(&input, client).await
        }
    };

    let _ = ui_tx.send(UiEvent::BotReply(bot, outcome));
    let _ = ui_tx.send(UiEvent::SendDone);
}

/// Plain-chat fallback. An empty or failed reply becomes the fixed
/// unavailability notice so the user always sees something.
async fn fallback_reply(input: &str, client: &ComposeClient) -> (Message, &'static str) {
    let reply = match client.chat(input).await {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!("chat fallback failed: {err:#}");
            String::new()
        }
    };

    let (content, outcome) = if reply.is_empty() {
        (UNAVAILABLE_NOTICE.to_string(), "unavailable")
    } else {
        (reply, "fallback")
    };

    let bot = Message {
        role: Role::Bot,
        content,
        html: false,
    };
    (bot, outcome)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn bot(content: &str, html: bool) -> Message {
        Message {
            role: Role::Bot,
            content: content.to_string(),
            html,
        }
    }

    fn user(content: &str) -> Message {
        Message {
            role: Role::User,
            content: content.to_string(),
            html: false,
        }
    }

    async fn collect_send(
        input: &str,
        last_table: Option<String>,
        client: &ComposeClient,
    ) -> Vec<UiEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        run_send(input.to_string(), last_table, client, true, tx).await;
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn single_reply(events: &[UiEvent]) -> &Message {
        let replies: Vec<&Message> = events
            .iter()
            .filter_map(|ev| match ev {
                UiEvent::BotReply(msg, _) => Some(msg),
                _ => None,
            })
            .collect();
        assert_eq!(replies.len(), 1, "expected exactly one bot reply");
        assert!(matches!(events.last(), Some(UiEvent::SendDone)));
        replies[0]
    }

    fn outcome(events: &[UiEvent]) -> &'static str {
        events
            .iter()
            .find_map(|ev| match ev {
                UiEvent::BotReply(_, outcome) => Some(*outcome),
                _ => None,
            })
            .expect("no bot reply in events")
    }

    #[test]
    fn prepare_input_trims_and_rejects_empty() {
        assert_eq!(prepare_input("  hello  "), Some("hello".to_string()));
        assert_eq!(prepare_input("   "), None);
        assert_eq!(prepare_input(""), None);
    }

    #[test]
    fn last_table_prefers_newest_bot_message() {
        let messages = vec![
            bot(
                "<table class=\"llm-table\"><tr><td>old</td></tr></table>",
                true,
            ),
            user("and now?"),
            bot(
                "<table class=\"llm-table\"><tr><td>new</td></tr></table>",
                true,
            ),
        ];
        let table = last_table_html(&messages, true).unwrap();
        assert!(table.contains("new"));
        assert!(!table.contains("old"));
    }

    #[test]
    fn last_table_skips_user_and_tableless_messages() {
        let messages = vec![
            bot(
                "<table class=\"llm-table\"><tr><td>only</td></tr></table>",
                true,
            ),
            bot("just text", false),
            user("<table class=\"llm-table\"><tr><td>nope</td></tr></table>"),
        ];
        let table = last_table_html(&messages, true).unwrap();
        assert!(table.contains("only"));
    }

    #[test]
    fn last_table_none_when_no_tables() {
        let messages = vec![user("hi"), bot("hello", false)];
        assert_eq!(last_table_html(&messages, true), None);
    }

    #[tokio::test]
    async fn composed_envelope_becomes_the_single_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compose"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mode": "html",
                "final_template": "<p>{greeting}</p>",
                "variables": { "greeting": "hi there" },
            })))
            .mount(&server)
            .await;

        let client = ComposeClient::new(server.uri());
        let events = collect_send("hello", None, &client).await;
        let reply = single_reply(&events);
        assert!(reply.html);
        assert_eq!(reply.content, "<p>hi there</p>");
        assert_eq!(outcome(&events), "html");
    }

    #[tokio::test]
    async fn last_table_is_forwarded_to_compose() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compose"))
            .and(body_partial_json(serde_json::json!({
                "context": { "last_table": "<table class=\"llm-table\"></table>" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mode": "markdown",
                "final_template": "sorted",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ComposeClient::new(server.uri());
        let events = collect_send(
            "sort it",
            Some("<table class=\"llm-table\"></table>".to_string()),
            &client,
        )
        .await;
        assert_eq!(single_reply(&events).content, "sorted");
    }

    #[tokio::test]
    async fn compose_failure_falls_back_to_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compose"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "reply": "plain answer",
            })))
            .mount(&server)
            .await;

        let client = ComposeClient::new(server.uri());
        let events = collect_send("hello", None, &client).await;
        let reply = single_reply(&events);
        assert!(!reply.html);
        assert_eq!(reply.content, "plain answer");
        assert_eq!(outcome(&events), "fallback");
    }

    #[tokio::test]
    async fn both_endpoints_down_yields_unavailability_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compose"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ComposeClient::new(server.uri());
        let events = collect_send("hello", None, &client).await;
        assert_eq!(single_reply(&events).content, UNAVAILABLE_NOTICE);
        assert_eq!(outcome(&events), "unavailable");
    }

    #[tokio::test]
    async fn empty_fallback_reply_yields_unavailability_notice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compose"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "reply": "",
            })))
            .mount(&server)
            .await;

        let client = ComposeClient::new(server.uri());
        let events = collect_send("hello", None, &client).await;
        assert_eq!(single_reply(&events).content, UNAVAILABLE_NOTICE);
    }

    #[tokio::test]
    async fn unexpected_mode_reports_diagnostics_without_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/compose"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mode": "sculpture",
                "detail": 7,
            })))
            .mount(&server)
            .await;
        // The fallback endpoint must not be touched for a well-formed but
        // unrecognized envelope.
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ComposeClient::new(server.uri());
        let events = collect_send("hello", None, &client).await;
        let reply = single_reply(&events);
        assert!(reply.content.contains("unexpected mode"));
        assert!(reply.content.contains("\"sculpture\""));
        assert_eq!(outcome(&events), "unrecognized");
    }
}
