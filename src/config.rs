use std::env;
use std::time::Duration;

use chrono::NaiveDate;

use crate::dates::parse_day;

const DEFAULT_RANK_PATTERN_TOLERANCE: i64 = 30;
const DEFAULT_HISTORY_RANK_TOLERANCE: i64 = 50;
const DEFAULT_HISTORY_DELAY_MS: u64 = 500;
const DEFAULT_SEASON_START: &str = "2025-03-01";
const DEFAULT_REAL_API_BASE: &str = "https://web.realsports.io";
const DEFAULT_REAL_VERSION: &str = "27";
const DEFAULT_DEVICE_NAME: &str = "Chrome on Windows";

/// Tuning for the identity resolver. Thresholds that define a confidence
/// grade are fixed in `identity`; these are the search windows and pacing.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub rank_pattern_tolerance: i64,
    pub history_rank_tolerance: i64,
    pub history_candidate_cap: usize,
    pub history_request_delay: Duration,
    pub season_start: NaiveDate,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            rank_pattern_tolerance: DEFAULT_RANK_PATTERN_TOLERANCE,
            history_rank_tolerance: DEFAULT_HISTORY_RANK_TOLERANCE,
            history_candidate_cap: 5,
            history_request_delay: Duration::from_millis(DEFAULT_HISTORY_DELAY_MS),
            season_start: default_season_start(),
        }
    }
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        let rank_pattern_tolerance = env_i64("RANK_PATTERN_TOLERANCE")
            .unwrap_or(DEFAULT_RANK_PATTERN_TOLERANCE)
            .clamp(1, 500);
        let history_rank_tolerance = env_i64("HISTORY_RANK_TOLERANCE")
            .unwrap_or(DEFAULT_HISTORY_RANK_TOLERANCE)
            .clamp(1, 1000);
        let history_candidate_cap = env_i64("HISTORY_CANDIDATE_CAP")
            .unwrap_or(5)
            .clamp(1, 50) as usize;
        let delay_ms = env::var("HISTORY_REQUEST_DELAY_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_HISTORY_DELAY_MS)
            .min(10_000);
        let season_start = env::var("SEASON_START")
            .ok()
            .and_then(|v| parse_day(&v))
            .unwrap_or_else(default_season_start);

        Self {
            rank_pattern_tolerance,
            history_rank_tolerance,
            history_candidate_cap,
            history_request_delay: Duration::from_millis(delay_ms),
            season_start,
        }
    }
}

fn default_season_start() -> NaiveDate {
    parse_day(DEFAULT_SEASON_START).unwrap_or(NaiveDate::MIN)
}

/// Endpoints and credentials for the snapshot and history sources.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub real_api_base: String,
    pub real_auth_token: Option<String>,
    pub real_device_uuid: String,
    pub real_device_name: String,
    pub real_version: String,
}

impl SourceConfig {
    pub fn from_env() -> Self {
        let real_api_base = env_string("REAL_API_BASE")
            .unwrap_or_else(|| DEFAULT_REAL_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            supabase_url: env_string("SUPABASE_URL").map(|s| s.trim_end_matches('/').to_string()),
            supabase_key: env_string("SUPABASE_KEY"),
            real_api_base,
            real_auth_token: env_string("REAL_AUTH_TOKEN"),
            real_device_uuid: env_string("REAL_DEVICE_UUID")
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            real_device_name: env_string("REAL_DEVICE_NAME")
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            real_version: env_string("REAL_VERSION")
                .unwrap_or_else(|| DEFAULT_REAL_VERSION.to_string()),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_i64(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<i64>().ok())
}
