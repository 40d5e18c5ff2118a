use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::Value;

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    reply: Option<String>,
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct ComposeClient {
    http: reqwest::Client,
    pub endpoint: String,
}

impl ComposeClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Ask the compose backend to answer `user_input`. Returns the raw envelope
    /// JSON; classification happens in [`crate::envelope`].
    ///
    /// `last_table` is the most recent table the user can see, handed back to
    /// the backend so follow-up questions can refer to it.
    pub async fn compose(&self, user_input: &str, last_table: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/compose", self.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({
            "user_input": user_input,
            "context": { "last_table": last_table },
        });

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error {}: {}", status, text));
        }

        Ok(resp.json().await?)
    }

    /// Plain-text fallback endpoint, used when compose fails. Returns the reply
    /// string as-is; a missing or null `reply` field comes back empty.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));
        let body = serde_json::json!({ "message": message });

        let resp = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error {}: {}", status, text));
        }

        let parsed: ChatReply = resp.json().await?;
        Ok(parsed.reply.unwrap_or_default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
