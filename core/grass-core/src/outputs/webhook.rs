//! Discord-compatible webhook output.
//!
//! Posts each message as a single embed. Any non-2xx response counts as a
//! failed delivery; there are no retries.

use chrono::{SecondsFormat, Utc};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::OutputSink;
use crate::error::{Result, TrackerError};

/// Environment variable consulted when no webhook URL is configured.
pub const WEBHOOK_URL_ENV: &str = "DISCORD_WEBHOOK_URL";

const REQUEST_TIMEOUT_SECS: u64 = 10;
const BOT_NAME: &str = "Go Touch Grass!";
const EMBED_TITLE: &str = "Grass Touching Update";
const EMBED_COLOR: u32 = 0x3498db;
const EMBED_FOOTER: &str = "Automated computer usage tracker";
const EMBED_AUTHOR_NAME: &str = "github.com/viirret/go-touch-grass";
const EMBED_AUTHOR_URL: &str = "https://github.com/viirret/go-touch-grass";
const EMBED_AUTHOR_ICON: &str =
    "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";

pub struct WebhookOutput {
    url: String,
    client: Client,
}

impl WebhookOutput {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "webhook output enabled but no webhook URL configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| TrackerError::Http {
                context: "Failed to build webhook client".to_string(),
                source: err,
            })?;

        Ok(Self { url, client })
    }

    /// Uses `configured` when present, otherwise `DISCORD_WEBHOOK_URL`.
    pub fn from_config_or_env(configured: Option<&str>) -> Result<Self> {
        match configured.filter(|url| !url.trim().is_empty()) {
            Some(url) => Self::new(url),
            None => {
                let url = std::env::var(WEBHOOK_URL_ENV).map_err(|_| {
                    TrackerError::InvalidConfig(format!(
                        "webhook output enabled but neither webhook_url nor {} is set",
                        WEBHOOK_URL_ENV
                    ))
                })?;
                Self::new(url)
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn payload(message: &str) -> Value {
    json!({
        "username": BOT_NAME,
        "embeds": [{
            "title": EMBED_TITLE,
            "description": message,
            "color": EMBED_COLOR,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            "footer": {
                "text": EMBED_FOOTER
            },
            "author": {
                "name": EMBED_AUTHOR_NAME,
                "url": EMBED_AUTHOR_URL,
                "icon_url": EMBED_AUTHOR_ICON
            }
        }]
    })
}

impl OutputSink for WebhookOutput {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn deliver(&self, message: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&payload(message))
            .send()
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            .map_err(|err| TrackerError::Http {
                context: "Failed to send to webhook".to_string(),
                source: err,
            })
    }
}
