use crate::notify::Mentions;
use clap::Parser;
use reqwest::Url;
use tracing::warn;

pub const DEFAULT_BOARD_URL: &str =
    "https://dandys-world-robloxhorror.fandom.com/wiki/Daily_Twisted_Board";

/// Announces Daily Twisted Board changes to a Discord channel.
#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Config {
    /// Bot token used to post messages
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    pub discord_token: String,

    /// Channel that receives announcements
    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    pub channel_id: u64,

    /// Role to mention in each announcement
    #[arg(long, env = "PING_ROLE_ID")]
    pub ping_role_id: Option<String>,

    /// Comma-separated users to mention in each announcement
    #[arg(long, env = "PING_USER_IDS", value_delimiter = ',')]
    pub ping_user_ids: Vec<String>,

    /// Wiki page to monitor
    #[arg(long, env = "BOARD_URL", default_value = DEFAULT_BOARD_URL, value_parser = Url::parse)]
    pub board_url: Url,

    /// Run a single check right away and exit
    #[arg(long)]
    pub once: bool,
}

impl Config {
    /// Malformed ids are optional extras: they are logged and left out.
    pub fn mentions(&self) -> Mentions {
        Mentions {
            role_id: self
                .ping_role_id
                .as_deref()
                .and_then(|id| snowflake(id, "PING_ROLE_ID")),
            user_ids: self
                .ping_user_ids
                .iter()
                .filter_map(|id| snowflake(id, "PING_USER_IDS"))
                .collect(),
        }
    }
}

fn snowflake(raw: &str, setting: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Ignoring invalid {} entry: {:?}", setting, raw);
            None
        }
    }
}
