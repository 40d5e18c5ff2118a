use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::store;

// ── Profile ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Base URL of the compose backend
    pub endpoint: String,
    /// Maximum characters per message; the input widget and the one-shot
    /// sender both enforce it
    #[serde(default = "default_char_limit")]
    pub char_limit: usize,
    /// Run backend HTML through the allowlist sanitizer before storing.
    /// Turning this off is a debug escape hatch, never safe against an
    /// untrusted backend.
    #[serde(default = "default_sanitize")]
    pub sanitize: bool,
    /// Optional override for where chats are stored
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_char_limit() -> usize {
    3000
}

fn default_sanitize() -> bool {
    true
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8001".to_string(),
            char_limit: default_char_limit(),
            sanitize: default_sanitize(),
            data_dir: None,
        }
    }
}

// ── Config file ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Which profile to use when none is specified
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

fn default_profile_name() -> String {
    "local".to_string()
}

impl ConfigFile {
    /// Load from disk, or return a default config if the file doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Write a starter config file to disk (only if it doesn't exist).
    pub fn write_default_if_missing() -> Result<PathBuf> {
        let path = config_path();
        if path.exists() {
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG_TOML)?;
        Ok(path)
    }

    /// Resolve the active profile given an optional override name.
    pub fn resolve_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let key = name.unwrap_or(&self.default_profile);
        self.profiles.get(key)
    }
}

// ── Resolved runtime config (after merging file + CLI overrides) ──────────────

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub char_limit: usize,
    pub sanitize: bool,
    /// Fully resolved chat storage directory
    pub data_dir: PathBuf,
    /// Profile name that was resolved (for display)
    pub profile_name: String,
}

impl ResolvedConfig {
    /// Merge config file profile with CLI overrides.
    /// Priority: CLI args > env vars (handled by clap) > config file profile > built-in defaults
    pub fn resolve(
        file: &ConfigFile,
        profile_override: Option<&str>,
        endpoint_override: Option<&str>,
        data_dir_override: Option<&PathBuf>,
    ) -> Self {
        let profile_name = profile_override
            .unwrap_or(&file.default_profile)
            .to_string();

        let base = file
            .resolve_profile(profile_override)
            .cloned()
            .unwrap_or_default();

        Self {
            endpoint: endpoint_override
                .map(str::to_string)
                .unwrap_or(base.endpoint),
            char_limit: base.char_limit,
            sanitize: base.sanitize,
            data_dir: data_dir_override
                .cloned()
                .or(base.data_dir)
                .unwrap_or_else(store::default_dir),
            profile_name,
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

pub fn config_path() -> PathBuf {
    dirs_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabletalk")
        .join("config.toml")
}

fn dirs_config_dir() -> Option<PathBuf> {
    // XDG_CONFIG_HOME or ~/.config on Linux/macOS
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
}

// ── Default config template written on first run ──────────────────────────────

const DEFAULT_CONFIG_TOML: &str = r#"# TableTalk configuration
# Run `tabletalk --init` to regenerate this file.

default_profile = "local"

# ── Local compose backend (default) ──────────────────────────────────────────
[profiles.local]
endpoint   = "http://localhost:8001"
char_limit = 3000
sanitize   = true
# data_dir = "/var/lib/tabletalk/chats"

# ── Staging backend example ──────────────────────────────────────────────────
# [profiles.staging]
# endpoint   = "https://compose.staging.example.com"
# char_limit = 3000

# ── Raw profile: skip the HTML sanitizer ─────────────────────────────────────
# Only for inspecting what the backend really sends. Never point this at a
# backend you do not control.
# [profiles.raw]
# endpoint = "http://localhost:8001"
# sanitize = false
"#;
