use super::{render_sections, NotificationSink};
use crate::config::NotifyConfig;
use crate::error::NotifyError;
use crate::report::ChangeReport;
use crate::retry::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Discord rejects message content above 2000 characters
pub const DISCORD_MAX_CONTENT: usize = 2000;

#[derive(Clone)]
pub struct DiscordSink {
    webhook: String,
    client: Client,
    username: String,
    avatar_url: Option<String>,
    chunk_size: usize,
    pause: Duration,
    timeout: Duration,
    retry: RetryPolicy,
    include_unchanged: bool,
}

impl DiscordSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            username: "notify-mangas".to_string(),
            avatar_url: None,
            chunk_size: 1900,
            pause: Duration::from_millis(1200),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(500),
                max_jitter: Duration::from_millis(250),
            },
            include_unchanged: false,
        }
    }

    pub fn from_config(webhook: String, config: &NotifyConfig) -> Self {
        let mut sink = Self::new(webhook)
            .with_username(&config.username)
            .with_chunk_size(config.chunk_size)
            .with_pause(Duration::from_millis(config.pause_ms))
            .include_unchanged(config.notify_unchanged);
        sink.avatar_url = config.avatar_url.clone();
        sink
    }

    /// Replace the HTTP client, e.g. to route through a proxy
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn with_chunk_size(mut self, chars: usize) -> Self {
        self.chunk_size = chars.clamp(1, DISCORD_MAX_CONTENT);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn include_unchanged(mut self, include: bool) -> Self {
        self.include_unchanged = include;
        self
    }

    async fn post(&self, content: &str) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            content,
            username: &self.username,
            avatar_url: self.avatar_url.as_deref(),
        };
        let response = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    /// Posts every chunk even if an earlier one failed; the first failure is returned.
    async fn deliver(&self, report: &ChangeReport) -> Result<(), NotifyError> {
        let chunks: Vec<String> = render_sections(report, self.include_unchanged)
            .iter()
            .flat_map(|section| split_chunks(section, self.chunk_size))
            .collect();

        let mut first_error = None;
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            let sent = retry_with_backoff(
                &self.retry,
                "discord webhook",
                |_| self.post(chunk),
                NotifyError::is_retryable,
            )
            .await;
            if let Err(e) = sent {
                log::error!("Discord message {}/{} not delivered: {}", i + 1, chunks.len(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                log::info!("Sent {} Discord message(s)", chunks.len());
                Ok(())
            }
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
}

/// Split `text` into pieces of at most `max_chars` characters, breaking at line
/// ends where possible and inside a line only when the line alone is too long.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        let pieces: Vec<String> = if chars.is_empty() {
            vec![String::new()]
        } else {
            chars.chunks(max).map(|c| c.iter().collect()).collect()
        };

        for piece in pieces {
            let len = piece.chars().count();
            if !current.is_empty() && current_len + 1 + len > max {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
