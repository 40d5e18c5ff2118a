/// Durable session storage for tabletalk.
///
/// Every chat session is kept as a pair of files under
/// `~/.local/share/tabletalk/chats/`:
/// one `<id>.meta.json` with the session record, and one
/// `<id>.messages.jsonl` with one message per line, append-only.
///
/// The split gives the two operations the state machine actually performs
/// cheap, race-free shapes: appending a message is a single O_APPEND write,
/// and creating/deleting a session touches only that session's files. Two
/// processes rewriting the same meta file still race last-writer-wins; that
/// limitation is accepted and documented here rather than solved.
///
/// Reads are fail-soft: a meta file or message line that does not parse is
/// skipped with a debug log, never an error to the caller. A missing or
/// unreadable store reads as empty.
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ── Records ───────────────────────────────────────────────────────────────────

/// Who authored a message. Serialized as `"user"` / `"bot"` to match the
/// wire and storage vocabulary everywhere else in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// One chat message. `html = true` means `content` already passed the
/// sanitizer and is interpreted as markup verbatim at render time; `false`
/// means markdown source rendered at display time, never stored pre-rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub html: bool,
}

/// Session metadata. Identity is `session_id`; `name` may be empty, in which
/// case the UI derives a display name from the first user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub name: String,
    /// Millisecond creation timestamp. Creation order is display order.
    pub created_ms: i64,
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// File-backed store rooted at one directory. Owned by a `SessionDirectory`;
/// tests construct several independent stores over temp dirs.
pub struct SessionStore {
    dir: PathBuf,
}

/// Default store location: `$XDG_DATA_HOME/tabletalk/chats`, falling back to
/// `~/.local/share/tabletalk/chats`.
pub fn default_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(std::env::var("HOME").unwrap_or_default())
                .join(".local/share")
        })
        .join("tabletalk/chats")
}

impl SessionStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating store dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.meta.json"))
    }

    fn messages_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.messages.jsonl"))
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// All sessions in creation order (oldest first). Unparsable meta files
    /// are skipped.
    pub fn list_sessions(&self) -> Vec<Session> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut sessions: Vec<Session> = entries
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .ends_with(".meta.json")
            })
            .filter_map(|e| read_meta(&e.path()))
            .collect();
        sessions.sort_by(|a, b| {
            (a.created_ms, &a.session_id).cmp(&(b.created_ms, &b.session_id))
        });
        sessions
    }

    /// Look up one session by id.
    pub fn get_session(&self, id: &str) -> Option<Session> {
        read_meta(&self.meta_path(id))
    }

    /// Persist a new session record. Writing an existing id overwrites its
    /// metadata and leaves its messages alone.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.write_meta(session)
    }

    /// Update the stored name of a session. No-op if the session is gone.
    pub fn rename_session(&self, id: &str, name: &str) -> Result<()> {
        let Some(mut session) = self.get_session(id) else {
            return Ok(());
        };
        session.name = name.to_string();
        self.write_meta(&session)
    }

    /// Remove a session and its message history. Missing files are fine.
    pub fn delete_session(&self, id: &str) -> Result<()> {
        for path in [self.meta_path(id), self.messages_path(id)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("removing {}", path.display())
                    });
                }
            }
        }
        Ok(())
    }

    fn write_meta(&self, session: &Session) -> Result<()> {
        let path = self.meta_path(&session.session_id);
        let json = serde_json::to_string(session)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    /// All messages of a session in append order. Lines that do not parse
    /// are skipped; a missing file reads as an empty history.
    pub fn load_messages(&self, id: &str) -> Vec<Message> {
        let path = self.messages_path(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str::<Message>(l) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::debug!(
                        session = id,
                        error = %e,
                        "skipping corrupt message line"
                    );
                    None
                }
            })
            .collect()
    }

    /// Append one message as a single JSONL line (one line = one message).
    pub fn append_message(&self, id: &str, message: &Message) -> Result<()> {
        let path = self.messages_path(id);
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let line = serde_json::to_string(message)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

fn read_meta(path: &Path) -> Option<Session> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Session>(&content) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "skipping corrupt session meta"
            );
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("chats")).unwrap();
        (dir, store)
    }

    fn session(id: &str, created_ms: i64) -> Session {
        Session {
            session_id: id.to_string(),
            name: String::new(),
            created_ms,
        }
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_sessions().is_empty());
        assert!(store.load_messages("chat_1_1").is_empty());
    }

    #[test]
    fn sessions_list_in_creation_order() {
        let (_dir, store) = store();
        store.create_session(&session("chat_30_1", 30)).unwrap();
        store.create_session(&session("chat_10_1", 10)).unwrap();
        store.create_session(&session("chat_20_1", 20)).unwrap();
        let ids: Vec<_> = store
            .list_sessions()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["chat_10_1", "chat_20_1", "chat_30_1"]);
    }

    #[test]
    fn append_then_load_preserves_order() {
        let (_dir, store) = store();
        store.create_session(&session("chat_1_1", 1)).unwrap();
        for i in 0..5 {
            let msg = Message {
                role: if i % 2 == 0 { Role::User } else { Role::Bot },
                content: format!("msg {i}"),
                html: false,
            };
            store.append_message("chat_1_1", &msg).unwrap();
        }
        let msgs = store.load_messages("chat_1_1");
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs.last().unwrap().content, "msg 4");
        for (i, m) in msgs.iter().enumerate() {
            assert_eq!(m.content, format!("msg {i}"));
        }
    }

    #[test]
    fn corrupt_meta_is_skipped() {
        let (_dir, store) = store();
        store.create_session(&session("chat_1_1", 1)).unwrap();
        std::fs::write(store.meta_path("chat_2_2"), "{not json").unwrap();
        let sessions = store.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "chat_1_1");
    }

    #[test]
    fn corrupt_message_lines_are_skipped() {
        let (_dir, store) = store();
        store.create_session(&session("chat_1_1", 1)).unwrap();
        let good = Message {
            role: Role::User,
            content: "hello".into(),
            html: false,
        };
        store.append_message("chat_1_1", &good).unwrap();
        {
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(store.messages_path("chat_1_1"))
                .unwrap();
            writeln!(f, "%%% garbage %%%").unwrap();
        }
        store.append_message("chat_1_1", &good).unwrap();
        assert_eq!(store.load_messages("chat_1_1").len(), 2);
    }

    #[test]
    fn delete_removes_session_and_messages() {
        let (_dir, store) = store();
        store.create_session(&session("chat_1_1", 1)).unwrap();
        store
            .append_message(
                "chat_1_1",
                &Message {
                    role: Role::User,
                    content: "x".into(),
                    html: false,
                },
            )
            .unwrap();
        store.delete_session("chat_1_1").unwrap();
        assert!(store.list_sessions().is_empty());
        assert!(store.load_messages("chat_1_1").is_empty());
        // Deleting again is not an error
        store.delete_session("chat_1_1").unwrap();
    }

    #[test]
    fn rename_persists() {
        let (_dir, store) = store();
        store.create_session(&session("chat_1_1", 1)).unwrap();
        store.rename_session("chat_1_1", "budget tables").unwrap();
        assert_eq!(store.get_session("chat_1_1").unwrap().name, "budget tables");
        // Renaming a missing session is a no-op
        store.rename_session("chat_9_9", "ghost").unwrap();
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = Message {
            role: Role::Bot,
            content: "hi".into(),
            html: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"bot\""));
        assert!(json.contains("\"html\":true"));
    }
}
