use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;

use crate::error::{Context, Result};
use crate::utils::{join_within, report_timestamp_slug};

use super::{AlertMessage, ChartImage};

/// Discord caps embed field values at 1024 characters.
const DISCORD_FIELD_LIMIT: usize = 1024;

/// One-way delivery of an alert and its chart.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, message: &AlertMessage, chart: &ChartImage) -> Result<()>;
}

/// Posts an embed plus the chart attachment to a Discord webhook.
pub struct DiscordWebhookSink {
    client: Client,
    url: String,
}

impl DiscordWebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to construct webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

/// Embed payload in Discord's `payload_json` shape.
pub fn discord_payload(message: &AlertMessage, chart: &ChartImage) -> serde_json::Value {
    let mut fields: Vec<serde_json::Value> = message
        .sections
        .iter()
        .map(|section| {
            json!({
                "name": section.heading,
                "value": join_within(&section.lines, DISCORD_FIELD_LIMIT),
                "inline": false,
            })
        })
        .collect();
    if fields.is_empty() {
        fields.push(json!({
            "name": "No signals",
            "value": "No symbols crossed a threshold.",
            "inline": false,
        }));
    }

    json!({
        "embeds": [{
            "title": message.title,
            "color": message.color,
            "fields": fields,
            "footer": { "text": message.footer },
        }],
        "attachments": [{ "id": 0, "filename": chart.filename }],
    })
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    fn name(&self) -> &str {
        "discord"
    }

    async fn deliver(&self, message: &AlertMessage, chart: &ChartImage) -> Result<()> {
        let payload = discord_payload(message, chart);
        let attachment = Part::bytes(chart.bytes.clone())
            .file_name(chart.filename.clone())
            .mime_str(&chart.content_type)?;
        let form = Form::new()
            .text("payload_json", payload.to_string())
            .part("files[0]", attachment);

        self.client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach Discord webhook")?
            .error_for_status()
            .context("Discord webhook rejected the alert")?;

        info!("Alert delivered to Discord");
        Ok(())
    }
}

/// First `<slug>[_n]` stem whose alert file does not exist yet in `dir`.
async fn unused_stem(dir: &Path, slug: &str) -> String {
    let mut stem = slug.to_string();
    let mut suffix = 1;
    while tokio::fs::try_exists(dir.join(format!("{stem}_alert.txt")))
        .await
        .unwrap_or(false)
    {
        stem = format!("{slug}_{suffix}");
        suffix += 1;
    }
    stem
}

/// Writes the alert text and chart into a directory; used when no webhook is configured.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl NotificationSink for DirectorySink {
    fn name(&self) -> &str {
        "directory"
    }

    async fn deliver(&self, message: &AlertMessage, chart: &ChartImage) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;

        let stem = unused_stem(&self.dir, &report_timestamp_slug(&Utc::now())).await;
        let text_path = self.dir.join(format!("{stem}_alert.txt"));
        let chart_path = self.dir.join(format!("{stem}_{}", chart.filename));

        tokio::fs::write(&text_path, message.to_text())
            .await
            .with_context(|| format!("Failed to write {}", text_path.display()))?;
        tokio::fs::write(&chart_path, &chart.bytes)
            .await
            .with_context(|| format!("Failed to write {}", chart_path.display()))?;

        info!("Alert written to {}", text_path.display());
        Ok(())
    }
}
