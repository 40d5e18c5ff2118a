mod client;
mod config;
mod controller;
mod diagram;
mod directory;
mod envelope;
mod html;
mod math;
mod mount;
mod render;
mod sanitize;
mod store;
mod tui;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

use client::ComposeClient;
use config::{ConfigFile, ResolvedConfig};
use directory::SessionDirectory;
use store::{Message, Role, SessionStore};
use tui::UiEvent;

#[derive(Parser, Debug)]
#[command(
    name = "tabletalk",
    about = "A terminal chat client for composition backends that answer with tables, lists and diagrams",
    long_about = None,
)]
struct Args {
    /// Message to send directly (omit to enter interactive TUI mode)
    message: Option<String>,

    /// Profile to use from config file
    #[arg(short, long, env = "TABLETALK_PROFILE")]
    profile: Option<String>,

    /// Override backend base URL
    #[arg(long, env = "TABLETALK_ENDPOINT")]
    endpoint: Option<String>,

    /// Override chat storage directory
    #[arg(long, env = "TABLETALK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Write a default config file to ~/.config/tabletalk/config.toml and exit
    #[arg(long)]
    init: bool,

    /// List available profiles and exit
    #[arg(long)]
    profiles: bool,

    /// List stored chats and exit
    #[arg(long)]
    list_sessions: bool,

    /// Generate shell completions and print to stdout (bash, zsh, fish, elvish)
    #[arg(long, value_name = "SHELL")]
    completions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── --init ────────────────────────────────────────────────────────────────
    if args.init {
        let path = ConfigFile::write_default_if_missing()?;
        println!("Config written to: {}", path.display());
        println!("Edit it, then run: tabletalk");
        return Ok(());
    }

    // ── --completions ─────────────────────────────────────────────────────────
    if let Some(shell_name) = &args.completions {
        return generate_completions(shell_name);
    }

    let file = ConfigFile::load()?;

    // ── --profiles ────────────────────────────────────────────────────────────
    if args.profiles {
        print_profiles(&file);
        return Ok(());
    }

    let resolved = ResolvedConfig::resolve(
        &file,
        args.profile.as_deref(),
        args.endpoint.as_deref(),
        args.data_dir.as_ref(),
    );

    init_logging(&resolved)?;

    // ── --list-sessions ───────────────────────────────────────────────────────
    if args.list_sessions {
        return list_sessions(&resolved);
    }

    // ── One-shot mode (plain stdout, no TUI) ──────────────────────────────────
    if let Some(message) = args.message {
        return run_one_shot(message, resolved).await;
    }

    // ── Interactive TUI mode ──────────────────────────────────────────────────
    let store = SessionStore::open(&resolved.data_dir)?;
    let directory = SessionDirectory::new(store);
    tui::run(resolved, directory).await
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Log to a file in the data dir — stderr belongs to the TUI.
fn init_logging(resolved: &ResolvedConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(&resolved.data_dir)?;
    let log_file = std::fs::File::create(resolved.data_dir.join("tabletalk.log"))?;
    let filter =
        EnvFilter::try_from_env("TABLETALK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

// ── One-shot mode (plain stdout, no TUI) ──────────────────────────────────────

/// Run a single send through the same controller path the TUI uses, persist
/// both sides of the exchange, and print the reply as plain text.
async fn run_one_shot(message: String, resolved: ResolvedConfig) -> Result<()> {
    let Some(input) = controller::prepare_input(&message) else {
        anyhow::bail!("refusing to send an empty message");
    };
    let chars = input.chars().count();
    if chars > resolved.char_limit {
        anyhow::bail!(
            "message is {chars} characters, over the {} limit",
            resolved.char_limit
        );
    }

    let store = SessionStore::open(&resolved.data_dir)?;
    let mut directory = SessionDirectory::new(store);
    directory.ensure_at_least_one()?;
    directory.push_message(Role::User, &input, false)?;

    let messages = directory.current_messages();
    let last_table = controller::last_table_html(&messages, resolved.sanitize);

    let client = ComposeClient::new(resolved.endpoint.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    controller::run_send(input, last_table, &client, resolved.sanitize, tx).await;

    while let Some(ev) = rx.recv().await {
        match ev {
            UiEvent::BotReply(msg, _) => {
                directory.push_message(msg.role, &msg.content, msg.html)?;
                print_reply_plain(&msg, resolved.sanitize);
            }
            UiEvent::SendDone => break,
        }
    }
    Ok(())
}

fn print_reply_plain(msg: &Message, sanitize_html: bool) {
    let fragment = render::render_message(msg, sanitize_html);
    for block in html::parse_blocks(&fragment) {
        match &block {
            html::Block::Heading { inlines, .. } => {
                println!("{}", inline_text(inlines));
                println!();
            }
            html::Block::Paragraph { inlines } => {
                println!("{}", inline_text(inlines));
                println!();
            }
            html::Block::Quote { inlines } => {
                println!("> {}", inline_text(inlines));
                println!();
            }
            html::Block::ListItem { depth, marker, inlines } => {
                let indent = "  ".repeat(depth + 1);
                match marker {
                    html::Marker::Bullet => println!("{indent}• {}", inline_text(inlines)),
                    html::Marker::Number(n) => println!("{indent}{n}. {}", inline_text(inlines)),
                }
            }
            html::Block::CodeBlock { text, .. } => {
                for line in text.lines() {
                    println!("    {line}");
                }
                println!();
            }
            html::Block::Diagram { source } => {
                match diagram::parse_flowchart(source) {
                    Ok(chart) => {
                        for line in diagram::layout(&chart) {
                            println!("  {line}");
                        }
                    }
                    Err(_) => println!("  {}", diagram::PARSE_ERROR_PLACEHOLDER),
                }
                println!();
            }
            html::Block::Table { head, rows } => print_table_plain(head, rows),
            html::Block::Rule => println!("{}", "─".repeat(40)),
        }
    }
}

fn inline_text(inlines: &[html::Inline]) -> String {
    inlines.iter().map(|run| run.text.as_str()).collect()
}

fn print_table_plain(head: &[String], rows: &[Vec<String>]) {
    let cols = rows.iter().map(Vec::len).fold(head.len(), usize::max);
    if cols == 0 {
        return;
    }
    let mut widths = vec![0usize; cols];
    for row in std::iter::once(head).chain(rows.iter().map(Vec::as_slice)) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.width());
        }
    }
    let fmt_row = |row: &[String]| -> String {
        (0..cols)
            .map(|i| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                format!("{cell}{}", " ".repeat(widths[i].saturating_sub(cell.width())))
            })
            .collect::<Vec<_>>()
            .join("  ")
    };
    if !head.is_empty() {
        println!("  {}", fmt_row(head));
        let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        println!("  {}", sep.join("  "));
    }
    for row in rows {
        println!("  {}", fmt_row(row));
    }
    println!();
}

// ── Chats listing (non-TUI) ───────────────────────────────────────────────────

fn list_sessions(resolved: &ResolvedConfig) -> Result<()> {
    let store = SessionStore::open(&resolved.data_dir)?;
    let directory = SessionDirectory::new(store);
    let sessions = directory.sessions();
    if sessions.is_empty() {
        println!("No chats stored in {}", resolved.data_dir.display());
        return Ok(());
    }
    println!();
    println!("  Chats in {}", resolved.data_dir.display());
    for (i, session) in sessions.iter().enumerate() {
        let messages = directory.messages_for(&session.session_id);
        let title = directory::display_name(session, &messages, i);
        let when = chrono::DateTime::from_timestamp_millis(session.created_ms)
            .unwrap_or_default()
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        println!(
            "  {}  {}  {:>3} msg  {}",
            session.session_id,
            when,
            messages.len(),
            title
        );
    }
    println!();
    Ok(())
}

// ── Profiles listing (non-TUI) ────────────────────────────────────────────────

fn print_profiles(file: &ConfigFile) {
    let mut entries: Vec<(String, String, usize, bool)> = file
        .profiles
        .iter()
        .map(|(name, p)| (name.clone(), p.endpoint.clone(), p.char_limit, p.sanitize))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    println!();
    println!("  Profiles");
    for (name, endpoint, char_limit, sanitize) in &entries {
        let marker = if *name == file.default_profile { " ←" } else { "" };
        println!("  {name}{marker}");
        println!("    endpoint    {endpoint}");
        println!("    char limit  {char_limit}");
        println!("    sanitize    {sanitize}");
        println!();
    }
}

// ── Shell completions ─────────────────────────────────────────────────────────

fn generate_completions(shell_name: &str) -> Result<()> {
    use clap_complete::{Shell, generate};

    let shell: Shell = match shell_name.to_lowercase().as_str() {
        "bash"    => Shell::Bash,
        "zsh"     => Shell::Zsh,
        "fish"    => Shell::Fish,
        "elvish"  => Shell::Elvish,
        _ => {
            eprintln!("Unknown shell: {shell_name}");
            eprintln!("Supported: bash, zsh, fish, elvish");
            std::process::exit(1);
        }
    };

    let mut cmd = Args::command();
    generate(shell, &mut cmd, "tabletalk", &mut std::io::stdout());
    Ok(())
}
