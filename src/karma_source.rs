use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::SourceConfig;
use crate::dates::parse_day;
use crate::http_client::http_client;
use crate::model::KarmaRow;

const KARMA_TABLE: &str = "karma_rankings";
const PAGE_SIZE: usize = 1000;

/// Per-date karma leaderboard snapshots.
pub trait KarmaSource {
    fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<KarmaRow>>;
}

impl<T: KarmaSource + ?Sized> KarmaSource for Box<T> {
    fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<KarmaRow>> {
        (**self).rows_for_date(date)
    }
}

/// PostgREST access to the `karma_rankings` table.
pub struct SupabaseKarmaSource {
    client: &'static Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RawKarmaRow {
    user_id: Value,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    rank: Option<i64>,
}

impl SupabaseKarmaSource {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let url = config
            .supabase_url
            .as_deref()
            .ok_or_else(|| anyhow!("SUPABASE_URL is not set"))?;
        let key = config
            .supabase_key
            .as_deref()
            .ok_or_else(|| anyhow!("SUPABASE_KEY is not set"))?;
        Self::new(url, key)
    }

    fn fetch_page(&self, date: NaiveDate, offset: usize) -> Result<Vec<RawKarmaRow>> {
        let url = format!(
            "{}/rest/v1/{KARMA_TABLE}?select=user_id,username,amount,rank&scrape_date=eq.{date}&order=rank.asc&limit={PAGE_SIZE}&offset={offset}",
            self.base_url
        );
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
            .send()
            .with_context(|| format!("karma request failed for {date}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("karma request for {date} returned {status}"));
        }
        let body = resp.text().context("failed reading karma response")?;
        serde_json::from_str(&body).context("invalid karma json")
    }
}

impl KarmaSource for SupabaseKarmaSource {
    fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<KarmaRow>> {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.fetch_page(date, offset)?;
            let page_len = page.len();
            rows.extend(page.into_iter().filter_map(|raw| convert_row(raw, date)));
            if page_len < PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        debug!(%date, rows = rows.len(), "fetched karma snapshot");
        Ok(rows)
    }
}

fn convert_row(raw: RawKarmaRow, date: NaiveDate) -> Option<KarmaRow> {
    let user_id = match raw.user_id {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(KarmaRow {
        scrape_date: date,
        user_id,
        username: raw.username.unwrap_or_default(),
        amount: raw.amount.unwrap_or(0.0),
        rank: raw.rank?,
    })
}

/// Snapshots held in memory, loaded from rows or a JSON export of the table.
#[derive(Debug, Clone, Default)]
pub struct StaticKarmaSource {
    by_date: BTreeMap<NaiveDate, Vec<KarmaRow>>,
}

#[derive(Debug, Deserialize)]
struct ExportedKarmaRow {
    scrape_date: String,
    #[serde(flatten)]
    row: RawKarmaRow,
}

impl StaticKarmaSource {
    pub fn new(rows: Vec<KarmaRow>) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<KarmaRow>> = BTreeMap::new();
        for row in rows {
            by_date.entry(row.scrape_date).or_default().push(row);
        }
        for day in by_date.values_mut() {
            day.sort_by_key(|r| r.rank);
        }
        Self { by_date }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let exported: Vec<ExportedKarmaRow> =
            serde_json::from_str(raw).context("invalid karma export json")?;
        let rows = exported
            .into_iter()
            .filter_map(|e| {
                let date = parse_day(&e.scrape_date)?;
                convert_row(e.row, date)
            })
            .collect();
        Ok(Self::new(rows))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.by_date.keys()
    }
}

impl KarmaSource for StaticKarmaSource {
    fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<KarmaRow>> {
        Ok(self.by_date.get(&date).cloned().unwrap_or_default())
    }
}
