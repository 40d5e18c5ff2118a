/// Session directory: which sessions exist and which one is current.
///
/// The directory is an owned value wrapping a `SessionStore` plus the
/// transient current-session id, so independent directories (tests, one-shot
/// runs) never share state. The current id is rebuilt from the store on cold
/// start and is never unset once bootstrap completes: deleting the current
/// session immediately re-assigns current to a sibling, creating a fresh
/// session if none remain.
use anyhow::Result;
use rand::Rng;

use crate::store::{Message, Role, Session, SessionStore};

// ── Directory ─────────────────────────────────────────────────────────────────

pub struct SessionDirectory {
    store: SessionStore,
    current: Option<String>,
}

impl SessionDirectory {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// All sessions in creation order.
    pub fn sessions(&self) -> Vec<Session> {
        self.store.list_sessions()
    }

    /// Message history of the current session (empty when nothing is
    /// selected yet).
    pub fn current_messages(&self) -> Vec<Message> {
        match &self.current {
            Some(id) => self.store.load_messages(id),
            None => Vec::new(),
        }
    }

    pub fn messages_for(&self, id: &str) -> Vec<Message> {
        self.store.load_messages(id)
    }

    /// Guarantee at least one session exists and one is current. Creates a
    /// session with an empty name on first run. Idempotent.
    pub fn ensure_at_least_one(&mut self) -> Result<String> {
        let sessions = self.store.list_sessions();
        if sessions.is_empty() {
            let session = fresh_session(String::new());
            self.store.create_session(&session)?;
            self.current = Some(session.session_id.clone());
            return Ok(session.session_id);
        }
        match &self.current {
            Some(id) => Ok(id.clone()),
            None => {
                let id = sessions[0].session_id.clone();
                self.current = Some(id.clone());
                Ok(id)
            }
        }
    }

    /// Create a new session with empty history and make it current.
    pub fn add_session(&mut self, name: &str) -> Result<String> {
        let session = fresh_session(name.to_string());
        self.store.create_session(&session)?;
        self.current = Some(session.session_id.clone());
        Ok(session.session_id)
    }

    /// Make `id` current. No existence check: selecting an id the store does
    /// not know leaves a dangling selection until the directory is reloaded,
    /// matching the storage contract.
    pub fn select_session(&mut self, id: &str) {
        self.current = Some(id.to_string());
    }

    /// Remove a session and its messages. If it was current, an existing
    /// sibling becomes current, or a fresh session is created so the UI is
    /// never left without a selectable session.
    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        self.store.delete_session(id)?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
            let remaining = self.store.list_sessions();
            match remaining.first() {
                Some(first) => self.current = Some(first.session_id.clone()),
                None => {
                    self.ensure_at_least_one()?;
                }
            }
        }
        Ok(())
    }

    /// Storage supports renames; nothing in the UI drives one yet.
    #[allow(dead_code)]
    pub fn rename_session(&self, id: &str, name: &str) -> Result<()> {
        self.store.rename_session(id, name)
    }

    /// Append a message to the current session, ensuring one exists first.
    pub fn push_message(&mut self, role: Role, content: &str, html: bool) -> Result<()> {
        let id = self.ensure_at_least_one()?;
        self.store.append_message(
            &id,
            &Message {
                role,
                content: content.to_string(),
                html,
            },
        )
    }
}

fn fresh_session(name: String) -> Session {
    let created_ms = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    Session {
        session_id: format!("chat_{created_ms}_{suffix}"),
        name,
        created_ms,
    }
}

// ── Display names ─────────────────────────────────────────────────────────────

/// Sidebar label for a session: its trimmed name if set, else a preview
/// built from the first user message (first two words plus an ellipsis),
/// else `Chat {n}` by list position. Capped at 28 characters.
pub fn display_name(session: &Session, messages: &[Message], position: usize) -> String {
    let trimmed = session.name.trim();
    let name = if !trimmed.is_empty() {
        trimmed.to_string()
    } else if let Some(p) = preview(messages) {
        p
    } else {
        format!("Chat {}", position + 1)
    };
    truncate_name(&name)
}

fn preview(messages: &[Message]) -> Option<String> {
    let first = messages
        .iter()
        .find(|m| m.role == Role::User && !m.content.is_empty())?;
    let words: Vec<&str> = first.content.trim().split_whitespace().collect();
    let mut p = words.iter().take(2).copied().collect::<Vec<_>>().join(" ");
    if words.len() > 2 {
        p.push('…');
    }
    if p.is_empty() { None } else { Some(p) }
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() > 28 {
        let mut s: String = name.chars().take(25).collect();
        s.push('…');
        s
    } else {
        name.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
