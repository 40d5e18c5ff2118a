/// Ratatui-based TUI for tabletalk.
///
/// Architecture:
///   main thread:  event loop — crossterm keyboard events + mpsc UiEvent drain
///   send task:    tokio::spawn — posts to the compose service and sends
///                 UiEvents back to the main thread via UnboundedSender
///
/// Layout:
///   ┌──────────┬───────────────────────────────────┐
///   │ sessions │  transcript (scrollable, Min(0))  │
///   │ sidebar  ├───────────────────────────────────┤
///   │ (Ctrl+B) │  status bar (1 line)              │
///   │          ├───────────────────────────────────┤
///   │          │  input box (3 lines, fixed)       │
///   └──────────┴───────────────────────────────────┘
pub mod render;
pub mod chat;
pub mod sidebar;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use crossterm::{
    event::{
        Event, EventStream, KeyCode, KeyEvent, KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::client::ComposeClient;
use crate::config::ResolvedConfig;
use crate::controller;
use crate::directory::{self, SessionDirectory};
use crate::mount;
use crate::store::{Message, Role};

// ── UiEvent — typed events from send task → TUI ──────────────────────────────

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// The single bot message a send produced, with the outcome label
    /// (envelope mode, "fallback" or "unavailable") for the status line
    BotReply(Message, &'static str),
    /// The send task finished; input unlocks
    SendDone,
}

// ── Mode ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// A send is in flight — input is locked, spinner card shows
    Sending,
}

// ── SidebarRow — displayable session summaries ───────────────────────────────

#[derive(Debug, Clone)]
pub struct SidebarRow {
    pub id: String,
    pub title: String,
    pub timestamp: String,
    pub message_count: usize,
    pub is_current: bool,
}

// ── AppState ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub directory: SessionDirectory,
    pub client: Arc<ComposeClient>,

    /// Transcript of the current session. Rebuilt from storage after every
    /// mutation; the renderer never reads storage directly.
    pub messages: Vec<Message>,

    pub input: String,
    pub cursor: usize,        // byte offset in input
    pub scroll: usize,        // lines scrolled up in transcript
    pub mode: Mode,
    pub spinner_tick: u32,
    /// How the previous send resolved, shown in the status line.
    pub last_outcome: Option<&'static str>,

    pub sidebar_visible: bool,
    pub sidebar_focused: bool,
    pub sidebar_selected: usize,
    pub sidebar_rows: Vec<SidebarRow>,

    pub profile_name: String,
    pub endpoint: String,
    pub char_limit: usize,
    pub sanitize: bool,
}

impl AppState {
    pub fn new(
        resolved: &ResolvedConfig,
        directory: SessionDirectory,
        client: Arc<ComposeClient>,
    ) -> Self {
        let mut state = Self {
            directory,
            client,
            messages: Vec::new(),
            input: String::new(),
            cursor: 0,
            scroll: 0,
            mode: Mode::Normal,
            spinner_tick: 0,
            last_outcome: None,
            sidebar_visible: false,
            sidebar_focused: false,
            sidebar_selected: 0,
            sidebar_rows: Vec::new(),
            profile_name: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
            char_limit: resolved.char_limit,
            sanitize: resolved.sanitize,
        };
        state.reload();
        state
    }

    /// Rebuild the cached transcript and sidebar rows from storage.
    pub fn reload(&mut self) {
        self.messages = self.directory.current_messages();
        self.sidebar_rows = self.load_sidebar_rows();
        if self.sidebar_selected >= self.sidebar_rows.len() {
            self.sidebar_selected = self.sidebar_rows.len().saturating_sub(1);
        }
    }

    fn load_sidebar_rows(&self) -> Vec<SidebarRow> {
        let current_id = self.directory.current_id().unwrap_or("").to_string();
        self.directory
            .sessions()
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let messages = self.directory.messages_for(&s.session_id);
                let title = directory::display_name(s, &messages, i);
                let timestamp = chrono::DateTime::from_timestamp_millis(s.created_ms)
                    .unwrap_or_default()
                    .with_timezone(&chrono::Local)
                    .format("%b %d %H:%M")
                    .to_string();
                SidebarRow {
                    id: s.session_id.clone(),
                    title,
                    timestamp,
                    message_count: messages.len(),
                    is_current: s.session_id == current_id,
                }
            })
            .collect()
    }

    /// First-paint bootstrap: guarantee a session exists and show it. Runs
    /// behind the ready gate so the transcript mounts exactly once.
    pub fn bootstrap(&mut self) {
        if let Err(e) = self.directory.ensure_at_least_one() {
            tracing::warn!("session bootstrap failed: {e:#}");
        }
        self.reload();
    }

    /// Fold one event from the send task into state.
    pub fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::BotReply(msg, outcome) => {
                if let Err(e) = self.directory.push_message(msg.role, &msg.content, msg.html) {
                    tracing::warn!("could not persist reply: {e:#}");
                }
                self.last_outcome = Some(outcome);
                self.reload();
                self.scroll = 0;
            }
            UiEvent::SendDone => {
                self.mode = Mode::Normal;
            }
        }
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig, directory: SessionDirectory) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, resolved, directory).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    resolved: ResolvedConfig,
    directory: SessionDirectory,
) -> Result<()> {
    let client = Arc::new(ComposeClient::new(resolved.endpoint.clone()));
    let mut state = AppState::new(&resolved, directory, client);

    // Auto-show sidebar when terminal is wide enough
    if let Ok((w, _)) = crossterm::terminal::size() {
        state.sidebar_visible = w >= 100;
    }

    // Channel: send task → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    // First paint signals readiness; history mounts once behind the gate
    // instead of racing the initial draw.
    let (ready, mut gate) = mount::ready_channel();
    terminal.draw(|f| render::draw(f, &state))?;
    ready.notify();
    gate.bind_once(mount::READY_WAIT, || state.bootstrap()).await;
    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.mode == Mode::Sending {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Drain UI events from the send task ────────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        let keep = handle_key(key, &mut state, ui_tx.clone())?;
                        if !keep { break; }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

fn handle_key(
    key: KeyEvent,
    state: &mut AppState,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
) -> Result<bool> {
    // ── Sidebar focused navigation ────────────────────────────────────────────
    if state.sidebar_focused && state.sidebar_visible {
        match key.code {
            KeyCode::Up => {
                if state.sidebar_selected > 0 {
                    state.sidebar_selected -= 1;
                }
                return Ok(true);
            }
            KeyCode::Down => {
                if state.sidebar_selected + 1 < state.sidebar_rows.len() {
                    state.sidebar_selected += 1;
                }
                return Ok(true);
            }
            KeyCode::Enter => {
                if let Some(row) = state.sidebar_rows.get(state.sidebar_selected) {
                    let id = row.id.clone();
                    state.directory.select_session(&id);
                    state.sidebar_focused = false;
                    state.scroll = 0;
                    state.reload();
                }
                return Ok(true);
            }
            KeyCode::Char('d') | KeyCode::Delete if key.modifiers == KeyModifiers::NONE => {
                if let Some(row) = state.sidebar_rows.get(state.sidebar_selected) {
                    let id = row.id.clone();
                    if let Err(e) = state.directory.delete_session(&id) {
                        tracing::warn!("delete session: {e:#}");
                    }
                    state.scroll = 0;
                    state.reload();
                }
                return Ok(true);
            }
            KeyCode::Esc | KeyCode::Tab => {
                state.sidebar_focused = false;
                return Ok(true);
            }
            // Any char typed while sidebar is focused: unfocus and pass through
            KeyCode::Char(_) => {
                state.sidebar_focused = false;
                // fall through to normal char handling below
            }
            _ => {
                return Ok(true);
            }
        }
    }

    match (key.modifiers, key.code) {
        // Ctrl+C / Ctrl+D — quit
        (KeyModifiers::CONTROL, KeyCode::Char('c'))
        | (KeyModifiers::CONTROL, KeyCode::Char('d')) => {
            return Ok(false);
        }
        // Ctrl+N — fresh session, made current immediately
        (KeyModifiers::CONTROL, KeyCode::Char('n')) => {
            if let Err(e) = state.directory.add_session("") {
                tracing::warn!("new session: {e:#}");
            }
            state.scroll = 0;
            state.reload();
        }
        // Ctrl+B — toggle the sessions sidebar
        (KeyModifiers::CONTROL, KeyCode::Char('b')) => {
            state.sidebar_visible = !state.sidebar_visible;
            if !state.sidebar_visible {
                state.sidebar_focused = false;
            }
        }
        // Tab — focus the sidebar (visible, and nothing being drafted)
        (KeyModifiers::NONE, KeyCode::Tab) => {
            if state.sidebar_visible && state.input.is_empty() {
                state.sidebar_focused = true;
                state.sidebar_selected = state
                    .sidebar_rows
                    .iter()
                    .position(|r| r.is_current)
                    .unwrap_or(0);
            }
        }
        // Enter — send the drafted message
        (KeyModifiers::NONE, KeyCode::Enter) => {
            if state.mode == Mode::Sending {
                // ignore while a send is in flight
            } else if let Some(input) = controller::prepare_input(&state.input) {
                state.input.clear();
                state.cursor = 0;
                launch_send(input, state, ui_tx);
            }
        }
        // Backspace — remove char before cursor
        (KeyModifiers::NONE, KeyCode::Backspace) => {
            if state.mode != Mode::Sending {
                input_backspace(&mut state.input, &mut state.cursor);
            }
        }
        // Delete — remove char at cursor
        (KeyModifiers::NONE, KeyCode::Delete) => {
            if state.mode != Mode::Sending {
                input_delete_forward(&mut state.input, &mut state.cursor);
            }
        }
        // Ctrl+Backspace / Ctrl+W — delete word before cursor
        (KeyModifiers::CONTROL, KeyCode::Backspace)
        | (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
            if state.mode != Mode::Sending {
                input_delete_word(&mut state.input, &mut state.cursor);
            }
        }
        // Left arrow — move cursor left
        (KeyModifiers::NONE, KeyCode::Left) => {
            if state.mode != Mode::Sending {
                state.cursor = prev_char_boundary(&state.input, state.cursor);
            }
        }
        // Right arrow — move cursor right
        (KeyModifiers::NONE, KeyCode::Right) => {
            if state.mode != Mode::Sending {
                state.cursor = next_char_boundary(&state.input, state.cursor);
            }
        }
        // Ctrl+Left — jump word left
        (KeyModifiers::CONTROL, KeyCode::Left) => {
            if state.mode != Mode::Sending {
                state.cursor = word_left(&state.input, state.cursor);
            }
        }
        // Ctrl+Right — jump word right
        (KeyModifiers::CONTROL, KeyCode::Right) => {
            if state.mode != Mode::Sending {
                state.cursor = word_right(&state.input, state.cursor);
            }
        }
        // Home / Ctrl+A — go to start of input
        (KeyModifiers::NONE, KeyCode::Home) | (KeyModifiers::CONTROL, KeyCode::Char('a')) => {
            if state.mode != Mode::Sending {
                state.cursor = 0;
            }
        }
        // End / Ctrl+E — go to end of input
        (KeyModifiers::NONE, KeyCode::End) | (KeyModifiers::CONTROL, KeyCode::Char('e')) => {
            if state.mode != Mode::Sending {
                state.cursor = state.input.len();
            }
        }
        // Ctrl+U — clear line before cursor
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
            if state.mode != Mode::Sending {
                state.input.drain(..state.cursor);
                state.cursor = 0;
            }
        }
        // Ctrl+K — clear from cursor to end
        (KeyModifiers::CONTROL, KeyCode::Char('k')) => {
            if state.mode != Mode::Sending {
                state.input.truncate(state.cursor);
            }
        }
        // Scroll up
        (KeyModifiers::NONE, KeyCode::Up) | (KeyModifiers::NONE, KeyCode::PageUp) => {
            state.scroll = state.scroll.saturating_add(3);
        }
        // Scroll down
        (KeyModifiers::NONE, KeyCode::Down) | (KeyModifiers::NONE, KeyCode::PageDown) => {
            state.scroll = state.scroll.saturating_sub(3);
        }
        // Regular char input — insert at cursor, capped at the char limit
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
            if state.mode != Mode::Sending
                && state.input.chars().count() < state.char_limit
            {
                let mut buf = [0u8; 4];
                let s = c.encode_utf8(&mut buf);
                state.input.insert_str(state.cursor, s);
                state.cursor += s.len();
            }
        }
        _ => {}
    }

    Ok(true)
}

// ── Send launcher ─────────────────────────────────────────────────────────────

fn launch_send(input: String, state: &mut AppState, ui_tx: mpsc::UnboundedSender<UiEvent>) {
    if let Err(e) = state.directory.push_message(Role::User, &input, false) {
        tracing::warn!("could not persist user message: {e:#}");
    }
    state.reload();
    state.scroll = 0;
    state.mode = Mode::Sending;
    state.spinner_tick = 0;

    // Context travels with the request: newest table in the transcript,
    // captured before the reply lands.
    let last_table = controller::last_table_html(&state.messages, state.sanitize);
    let client = Arc::clone(&state.client);
    let sanitize = state.sanitize;

    tokio::spawn(async move {
        controller::run_send(input, last_table, &client, sanitize, ui_tx).await;
    });
}

// ── Input editing helpers ─────────────────────────────────────────────────────

/// Remove the character immediately before the cursor (UTF-8 safe).
fn input_backspace(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let prev = prev_char_boundary(input, *cursor);
    input.drain(prev..*cursor);
    *cursor = prev;
}

/// Delete the character at the cursor position.
fn input_delete_forward(input: &mut String, cursor: &mut usize) {
    if *cursor >= input.len() {
        return;
    }
    let next = next_char_boundary(input, *cursor);
    input.drain(*cursor..next);
}

/// Delete the word immediately before the cursor (stops at whitespace boundary).
fn input_delete_word(input: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let start = word_left(input, *cursor);
    input.drain(start..*cursor);
    *cursor = start;
}

/// Previous UTF-8 char boundary before `pos`.
fn prev_char_boundary(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let mut p = pos - 1;
    while !s.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Next UTF-8 char boundary after `pos`.
fn next_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut p = pos + 1;
    while p <= s.len() && !s.is_char_boundary(p) {
        p += 1;
    }
    p.min(s.len())
}

/// Jump to the start of the previous word (skip trailing spaces, then the word).
fn word_left(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    // Skip whitespace to the left
    while pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    // Skip non-whitespace to the left
    while pos > 0 && !bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

/// Jump past the end of the next word to the right.
fn word_right(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    let len = s.len();
    // Skip whitespace to the right
    while pos < len && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    // Skip non-whitespace to the right
    while pos < len && !bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

// ── Tests ─────────────────────────────────────────────────────────────────────
