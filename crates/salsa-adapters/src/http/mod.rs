mod citypower;
mod eskom;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use salsa_core::outage::OutageWindow;
use salsa_core::stage::Stage;
use salsa_ports::error::SourceError;
use salsa_ports::outbound::ScheduleSource;
use salsa_ports::types::Block;

pub use citypower::{local_day_start, parse_schedule};
pub use eskom::parse_status;

const ACCEPT_ODATA: &str = "application/json;odata=verbose";

mod tz_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<Tz>().map_err(serde::de::Error::custom)
    }
}

/// Endpoints of the public stage and schedule feeds. `{timestamp}`,
/// `{stage}` and `{block}` placeholders are filled in per request.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSourceConfig {
    #[serde(default = "default_status_url")]
    pub status_url: String,
    #[serde(default = "default_schedule_url")]
    pub schedule_url: String,
    #[serde(default = "default_timezone", deserialize_with = "tz_serde::deserialize")]
    pub timezone: Tz,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_status_url() -> String {
    "http://loadshedding.eskom.co.za/LoadShedding/GetStatus?_={timestamp}".to_string()
}

fn default_schedule_url() -> String {
    "https://www.citypower.co.za/_api/web/lists/getByTitle('Loadshedding')/items?\
     $select=*&$filter=Title%20eq%20'Stage{stage}'%20and%20substringof('{block}',SubBlock)&$top=2000"
        .to_string()
}

fn default_timezone() -> Tz {
    chrono_tz::Africa::Johannesburg
}

fn default_timeout() -> u64 {
    20
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            status_url: default_status_url(),
            schedule_url: default_schedule_url(),
            timezone: default_timezone(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Clone)]
pub struct HttpScheduleSource {
    client: reqwest::Client,
    config: HttpSourceConfig,
}

impl HttpScheduleSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn status_url(&self, now: DateTime<Utc>) -> String {
        self.config
            .status_url
            .replace("{timestamp}", &now.timestamp_millis().to_string())
    }

    pub fn schedule_url(&self, stage: Stage, block: &Block) -> String {
        self.config
            .schedule_url
            .replace("{stage}", &stage.to_string())
            .replace("{block}", block.as_str())
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_ODATA)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| self.request_error(e))?;
        response.text().await.map_err(|e| self.request_error(e))
    }

    fn request_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else {
            SourceError::Unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl ScheduleSource for HttpScheduleSource {
    async fn get_stage(&self) -> Result<Stage, SourceError> {
        let body = self.get_text(&self.status_url(Utc::now())).await?;
        parse_status(&body)
    }

    async fn get_schedule(
        &self,
        stage: Stage,
        block: &Block,
        days: u32,
    ) -> Result<Vec<OutageWindow>, SourceError> {
        let body = self.get_text(&self.schedule_url(stage, block)).await?;
        let from = local_day_start(Utc::now(), self.config.timezone);
        let windows = parse_schedule(&body, from, days)?;
        debug!(%stage, %block, days, windows = windows.len(), "schedule fetched");
        Ok(windows)
    }
}
