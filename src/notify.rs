//! Discord delivery for board announcements.

use crate::{
    board::BoardState, detector::AnnounceReason, error::WatcherError, utils::format_timestamp,
    Notifier,
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const TITLE: &str = "Daily Twisted Board Update";
const FOOTER_SOURCE: &str = "Source: Dandy's World Wiki";
const EMBED_COLOR: u32 = 0x3498db;

/// Who gets pinged along with an announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mentions {
    pub role_id: Option<u64>,
    pub user_ids: Vec<u64>,
}

impl Mentions {
    /// Role first, then users, in configuration order.
    pub fn tokens(&self) -> Vec<String> {
        self.role_id
            .iter()
            .map(|id| format!("<@&{}>", id))
            .chain(self.user_ids.iter().map(|id| format!("<@{}>", id)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.role_id.is_none() && self.user_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub title: String,
    pub description: String,
    pub occupant: String,
    pub countdown: Option<String>,
    pub image_url: Option<String>,
    pub mentions: Mentions,
    /// Occupant page when known, else the board itself.
    pub link: String,
    pub checked_at: DateTime<Utc>,
}

impl Announcement {
    pub fn new(
        reason: &AnnounceReason,
        state: &BoardState,
        board_url: &str,
        mentions: &Mentions,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Announcement {
            title: TITLE.to_string(),
            description: reason.to_string(),
            occupant: state.occupant.to_string(),
            countdown: state.countdown_text.clone(),
            image_url: state.image_url.clone(),
            mentions: mentions.clone(),
            link: state
                .detail_page_url
                .clone()
                .unwrap_or_else(|| board_url.to_string()),
            checked_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<Embed<'a>>,
    allowed_mentions: AllowedMentions,
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
    url: &'a str,
    color: u32,
    fields: Vec<EmbedField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage<'a>>,
    footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
struct EmbedField<'a> {
    name: &'a str,
    value: &'a str,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct EmbedImage<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedFooter {
    text: String,
}

/// Only the configured role and users may actually be pinged.
#[derive(Debug, Serialize)]
struct AllowedMentions {
    parse: Vec<&'static str>,
    roles: Vec<String>,
    users: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordError {
    message: String,
}

fn message_payload(announcement: &Announcement) -> MessagePayload<'_> {
    let mut fields = vec![EmbedField {
        name: "Current Twisted",
        value: &announcement.occupant,
        inline: false,
    }];
    if let Some(countdown) = announcement.countdown.as_deref() {
        fields.push(EmbedField {
            name: "Timer Information",
            value: countdown,
            inline: false,
        });
    }

    let mentions = &announcement.mentions;
    MessagePayload {
        content: (!mentions.is_empty()).then(|| mentions.tokens().iter().join(" ")),
        embeds: vec![Embed {
            title: &announcement.title,
            description: &announcement.description,
            url: &announcement.link,
            color: EMBED_COLOR,
            fields,
            image: announcement
                .image_url
                .as_deref()
                .map(|url| EmbedImage { url }),
            footer: EmbedFooter {
                text: format!(
                    "{} | Last Checked: {}",
                    FOOTER_SOURCE,
                    format_timestamp(announcement.checked_at)
                ),
            },
        }],
        allowed_mentions: AllowedMentions {
            parse: vec![],
            roles: mentions.role_id.iter().map(ToString::to_string).collect(),
            users: mentions.user_ids.iter().map(ToString::to_string).collect(),
        },
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<DiscordError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Posts announcements to one channel through the Discord REST API.
pub struct DiscordNotifier {
    client: reqwest::Client,
    token: String,
    channel_id: u64,
    api_base: String,
}

impl DiscordNotifier {
    pub fn new(client: reqwest::Client, token: String, channel_id: u64) -> Self {
        DiscordNotifier {
            client,
            token,
            channel_id,
            api_base: DISCORD_API_BASE.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, announcement: &Announcement) -> Result<(), WatcherError> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);
        let payload = message_payload(announcement);
        debug!("Posting announcement to {}", url);

        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WatcherError::Delivery {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        info!(
            channel_id = self.channel_id,
            "Sent announcement for {}", announcement.occupant
        );
        Ok(())
    }
}
