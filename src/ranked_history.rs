use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use harsh::Harsh;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::SourceConfig;
use crate::dates::parse_day;
use crate::http_client::http_client;
use crate::model::RankedDay;

const REQUEST_TOKEN_SALT: &str = "realwebapp";
const REQUEST_TOKEN_MIN_LEN: usize = 16;
const WEB_ORIGIN: &str = "https://realsports.io";

/// Paged rank history for one external id, newest first. `before` is the
/// oldest day of the previous page.
pub trait RankedHistorySource {
    fn page(&self, user_id: &str, before: Option<NaiveDate>) -> Result<Vec<RankedDay>>;
}

impl<T: RankedHistorySource + ?Sized> RankedHistorySource for Box<T> {
    fn page(&self, user_id: &str, before: Option<NaiveDate>) -> Result<Vec<RankedDay>> {
        (**self).page(user_id, before)
    }
}

#[derive(Debug, Deserialize)]
struct RankedDaysResponse {
    #[serde(default)]
    days: Vec<RawRankedDay>,
}

#[derive(Debug, Deserialize)]
struct RawRankedDay {
    day: String,
    #[serde(default)]
    rank: Option<i64>,
    #[serde(default)]
    karma: Option<f64>,
}

pub fn parse_ranked_days_json(raw: &str) -> Result<Vec<RankedDay>> {
    let parsed: Option<RankedDaysResponse> =
        serde_json::from_str(raw).context("invalid ranked days json")?;
    let Some(parsed) = parsed else {
        return Ok(Vec::new());
    };
    Ok(parsed
        .days
        .into_iter()
        .filter_map(|d| {
            Some(RankedDay {
                day: parse_day(&d.day)?,
                rank: d.rank?,
                karma: d.karma.unwrap_or(0.0),
            })
        })
        .collect())
}

/// The authenticated `rankeddays` endpoint of the karma app.
pub struct RealRankedDaysSource {
    client: &'static Client,
    api_base: String,
    auth_token: String,
    device_uuid: String,
    device_name: String,
    version: String,
    token_encoder: Harsh,
}

impl RealRankedDaysSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let auth_token = config
            .real_auth_token
            .clone()
            .ok_or_else(|| anyhow!("REAL_AUTH_TOKEN is not set"))?;
        let token_encoder = Harsh::builder()
            .salt(REQUEST_TOKEN_SALT)
            .length(REQUEST_TOKEN_MIN_LEN)
            .build()
            .map_err(|e| anyhow!("request token encoder: {e:?}"))?;
        Ok(Self {
            client: http_client()?,
            api_base: config.real_api_base.clone(),
            auth_token,
            device_uuid: config.real_device_uuid.clone(),
            device_name: config.real_device_name.clone(),
            version: config.real_version.clone(),
            token_encoder,
        })
    }

    fn request_token(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.token_encoder.encode(&[millis])
    }
}

impl RankedHistorySource for RealRankedDaysSource {
    fn page(&self, user_id: &str, before: Option<NaiveDate>) -> Result<Vec<RankedDay>> {
        let mut url = format!("{}/rankeddays/{user_id}?sort=latest", self.api_base);
        if let Some(before) = before {
            url.push_str(&format!("&before={before}"));
        }
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("DNT", "1")
            .header("Origin", WEB_ORIGIN)
            .header("Referer", format!("{WEB_ORIGIN}/"))
            .header("real-auth-info", &self.auth_token)
            .header("real-device-name", &self.device_name)
            .header("real-device-type", "desktop_web")
            .header("real-device-uuid", &self.device_uuid)
            .header("real-request-token", self.request_token())
            .header("real-version", &self.version)
            .send()
            .with_context(|| format!("ranked days request failed for {user_id}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("ranked days for {user_id} returned {status}"));
        }
        let body = resp.text().context("failed reading ranked days response")?;
        let days = parse_ranked_days_json(&body)?;
        debug!(user_id, days = days.len(), ?before, "fetched ranked days page");
        Ok(days)
    }
}

/// In-memory history served with the same newest-first paging contract.
#[derive(Debug, Clone, Default)]
pub struct StaticHistorySource {
    by_id: HashMap<String, Vec<RankedDay>>,
    page_size: usize,
}

impl StaticHistorySource {
    pub fn new(page_size: usize) -> Self {
        Self {
            by_id: HashMap::new(),
            page_size: page_size.max(1),
        }
    }

    pub fn insert(&mut self, user_id: &str, mut days: Vec<RankedDay>) {
        days.sort_by(|a, b| b.day.cmp(&a.day));
        self.by_id.insert(user_id.to_string(), days);
    }
}

impl RankedHistorySource for StaticHistorySource {
    fn page(&self, user_id: &str, before: Option<NaiveDate>) -> Result<Vec<RankedDay>> {
        let Some(days) = self.by_id.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(days
            .iter()
            .filter(|d| before.is_none_or(|b| d.day < b))
            .take(self.page_size)
            .cloned()
            .collect())
    }
}
