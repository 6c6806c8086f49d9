//! Discord REST session and status-message publisher.
//!
//! The checker owns exactly one message in one channel. On startup it reuses
//! the newest message the bot already authored there, or posts a placeholder,
//! and every successful tick overwrites that message's embed.

use crate::error::CheckerError;
use crate::poller::ReportSink;
use presence_report::Report;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

/// Content of the placeholder message: a left-to-right mark and a space,
/// which Discord accepts as non-empty.
const PLACEHOLDER_CONTENT: &str = "\u{200e} ";

/// How far back to look for an earlier status message.
const HISTORY_LIMIT: &str = "50";

/// Channel types that can hold messages: guild text, DM, group DM,
/// announcement, and the three thread kinds.
const TEXT_CHANNEL_TYPES: [u8; 7] = [0, 1, 3, 5, 10, 11, 12];

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    author: DiscordUser,
}

/// The message the checker keeps editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    color: u32,
    footer: EmbedFooter<'a>,
}

#[derive(Debug, Serialize)]
struct EmbedFooter<'a> {
    text: &'a str,
}

/// The message edit body for `report`.
pub fn embed_payload(report: &Report) -> Value {
    let embed = Embed {
        title: &report.title,
        description: &report.description,
        color: report.color,
        footer: EmbedFooter {
            text: &report.footer,
        },
    };

    json!({ "embeds": [embed] })
}

/// An authenticated bot session.
#[derive(Debug)]
pub struct DiscordSession {
    client: Client,
    api_base: String,
    token: String,
    user: DiscordUser,
}

impl DiscordSession {
    /// Validates `token` and returns a session for the bot it belongs to.
    pub async fn connect(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CheckerError> {
        let client = Client::builder().timeout(timeout).build()?;
        let token = token.into();
        let api_base = api_base.into();

        let response = client
            .get(format!("{api_base}/users/@me"))
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await?;
        let user: DiscordUser = check(response).await?.json().await?;

        tracing::info!(user = %user.username, id = %user.id, "logged in to discord");

        Ok(Self {
            client,
            api_base,
            token,
            user,
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bot {}", self.token))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    /// Finds the bot's newest message in `channel_id`, or posts a
    /// placeholder to use instead.
    pub async fn status_message(&self, channel_id: &str) -> Result<StatusMessage, CheckerError> {
        let response = self
            .request(self.client.get(self.url(&format!("/channels/{channel_id}"))))
            .send()
            .await?;
        let channel: DiscordChannel = check(response).await?.json().await?;

        if !TEXT_CHANNEL_TYPES.contains(&channel.kind) {
            return Err(CheckerError::NotTextChannel(channel_id.to_string()));
        }

        let response = self
            .request(
                self.client
                    .get(self.url(&format!("/channels/{channel_id}/messages")))
                    .query(&[("limit", HISTORY_LIMIT)]),
            )
            .send()
            .await?;
        let history: Vec<DiscordMessage> = check(response).await?.json().await?;

        // History is returned newest first.
        if let Some(existing) = history.into_iter().find(|m| m.author.id == self.user.id) {
            tracing::info!(message_id = %existing.id, "reusing existing status message");
            return Ok(StatusMessage {
                channel_id: channel_id.to_string(),
                message_id: existing.id,
            });
        }

        let response = self
            .request(self.client.post(self.url(&format!("/channels/{channel_id}/messages"))))
            .json(&json!({ "content": PLACEHOLDER_CONTENT }))
            .send()
            .await?;
        let created: DiscordMessage = check(response).await?.json().await?;

        tracing::info!(message_id = %created.id, "no status message found, posted a new one");
        Ok(StatusMessage {
            channel_id: channel_id.to_string(),
            message_id: created.id,
        })
    }

    /// Replaces the embed of `message` with `report`.
    pub async fn edit_status(
        &self,
        message: &StatusMessage,
        report: &Report,
    ) -> Result<(), CheckerError> {
        let path = format!(
            "/channels/{}/messages/{}",
            message.channel_id, message.message_id
        );

        let response = self
            .request(self.client.patch(self.url(&path)))
            .json(&embed_payload(report))
            .send()
            .await?;
        check(response).await?;

        Ok(())
    }

    /// Ends the session.
    pub fn disconnect(self) {
        tracing::info!(user = %self.user.username, "discord session closed");
    }
}

/// Maps non-success responses to errors.
async fn check(response: Response) -> Result<Response, CheckerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        return Err(CheckerError::RateLimited { retry_after_secs });
    }

    let body = response.text().await.unwrap_or_default();
    Err(CheckerError::Discord {
        status: status.as_u16(),
        body,
    })
}

/// Publishes reports by editing the status message.
#[derive(Debug)]
pub struct DiscordPublisher {
    session: DiscordSession,
    message: StatusMessage,
}

impl DiscordPublisher {
    pub fn new(session: DiscordSession, message: StatusMessage) -> Self {
        Self { session, message }
    }

    pub fn into_session(self) -> DiscordSession {
        self.session
    }
}

impl ReportSink for DiscordPublisher {
    async fn publish(&mut self, report: &Report) -> Result<(), CheckerError> {
        self.session.edit_status(&self.message, report).await?;
        tracing::debug!(message_id = %self.message.message_id, "status message updated");
        Ok(())
    }
}
