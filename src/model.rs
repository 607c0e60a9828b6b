use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::{eastern_date, parse_timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub created_at: String,
    #[serde(default)]
    pub text: String,
}

impl Post {
    pub fn game_date(&self) -> Option<NaiveDate> {
        parse_timestamp(&self.created_at).map(eastern_date)
    }

    pub fn is_thread_root(&self) -> bool {
        self.id == self.thread_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Winner precedence shared by full results, paired single-team results and
/// backfilled scores: a win mark on either side, then a loss mark on either
/// side, then the higher score.
pub fn decide_winner(
    mark_a: Option<bool>,
    mark_b: Option<bool>,
    score_a: Option<f64>,
    score_b: Option<f64>,
) -> Option<Side> {
    if mark_a == Some(true) {
        return Some(Side::A);
    }
    if mark_b == Some(true) {
        return Some(Side::B);
    }
    if mark_a == Some(false) {
        return Some(Side::B);
    }
    if mark_b == Some(false) {
        return Some(Side::A);
    }
    let (Some(a), Some(b)) = (score_a, score_b) else {
        return None;
    };
    if a > b {
        Some(Side::A)
    } else if b > a {
        Some(Side::B)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Leaderboard,
    Result,
    Lineup,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    pub post_id: i64,
    pub thread_id: i64,
    pub posted_at: String,
    pub game_date: Option<NaiveDate>,
    pub team_a: String,
    pub team_b: String,
    pub captain_a: Option<String>,
    pub captain_b: Option<String>,
    pub roster_a: Vec<String>,
    pub roster_b: Vec<String>,
    pub seed_a: Option<u32>,
    pub seed_b: Option<u32>,
    pub round_name: Option<String>,
    pub is_postseason: bool,
}

impl Lineup {
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.team_a, &mut self.team_b);
        std::mem::swap(&mut self.captain_a, &mut self.captain_b);
        std::mem::swap(&mut self.roster_a, &mut self.roster_b);
        std::mem::swap(&mut self.seed_a, &mut self.seed_b);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStat {
    pub handle: String,
    pub score: Option<f64>,
    pub rank: Option<i64>,
    pub is_captain: bool,
    pub side: Option<Side>,
    #[serde(default)]
    pub canonical_id: Option<String>,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub karma_amount: Option<f64>,
    #[serde(default)]
    pub karma_rank: Option<i64>,
}

impl PlayerStat {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            score: None,
            rank: None,
            is_captain: false,
            side: None,
            canonical_id: None,
            confidence: Confidence::None,
            karma_amount: None,
            karma_rank: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub post_id: i64,
    pub thread_id: i64,
    pub posted_at: String,
    pub game_date: Option<NaiveDate>,
    pub team_a: String,
    pub team_b: String,
    pub score_a: Option<f64>,
    pub score_b: Option<f64>,
    pub winner: Option<Side>,
    pub adjustment_a: Option<f64>,
    pub adjustment_b: Option<f64>,
    pub seed_a: Option<u32>,
    pub seed_b: Option<u32>,
    pub round_name: Option<String>,
    pub is_postseason: bool,
    pub player_stats: Vec<PlayerStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTeamResult {
    pub post_id: i64,
    pub thread_id: i64,
    pub posted_at: String,
    pub game_date: Option<NaiveDate>,
    pub team: String,
    pub score: f64,
    pub wins: u32,
    pub losses: u32,
    pub is_winner: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardScore {
    pub team: String,
    pub score: f64,
    pub is_winner: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Full,
    LineupOnly,
    ResultOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Regular,
    Postseason,
}

impl GameType {
    pub fn from_flag(is_postseason: bool) -> Self {
        if is_postseason {
            GameType::Postseason
        } else {
            GameType::Regular
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteGame {
    pub game_id: u32,
    pub game_date: Option<NaiveDate>,
    pub kind: GameKind,
    pub game_type: GameType,
    pub team_a: String,
    pub team_b: String,
    pub captain_a: Option<String>,
    pub captain_b: Option<String>,
    pub roster_a: Vec<String>,
    pub roster_b: Vec<String>,
    pub score_a: Option<f64>,
    pub score_b: Option<f64>,
    pub winner: Option<Side>,
    pub adjustment_a: Option<f64>,
    pub adjustment_b: Option<f64>,
    pub player_stats: Vec<PlayerStat>,
    pub seed_a: Option<u32>,
    pub seed_b: Option<u32>,
    pub round_name: Option<String>,
    pub swapped: bool,
    pub backfilled: bool,
    pub lineup_post_id: Option<i64>,
    pub result_post_id: Option<i64>,
    pub lineup_thread_id: Option<i64>,
    pub result_thread_id: Option<i64>,
}

impl CompleteGame {
    pub fn missing_scores(&self) -> bool {
        self.score_a.is_none() && self.score_b.is_none()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Direct,
    OutsideKnownPopulation,
    UsernameExact,
    UsernameFuzzy,
    RankPattern,
    RankedHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verification {
    #[default]
    Unverified,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub handle: String,
    pub canonical_id: Option<String>,
    pub confidence: Confidence,
    pub method: MatchMethod,
    pub evidence: String,
    #[serde(default)]
    pub uncertain: bool,
    #[serde(default)]
    pub candidate_count: Option<usize>,
    #[serde(default)]
    pub verification: Verification,
    // Snapshot rank of the chosen id on each evidence date, as seen when the
    // record was created. Re-verification compares history against these.
    #[serde(default)]
    pub snapshot_ranks: BTreeMap<NaiveDate, i64>,
}

impl IdentityRecord {
    pub fn is_usable(&self) -> bool {
        self.canonical_id.is_some()
            && self.confidence > Confidence::None
            && self.verification != Verification::Rejected
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KarmaRow {
    pub scrape_date: NaiveDate,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub amount: f64,
    pub rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDay {
    pub day: NaiveDate,
    pub rank: i64,
    #[serde(default)]
    pub karma: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_mark_beats_loss_mark_and_score() {
        assert_eq!(
            decide_winner(None, Some(true), Some(50.0), Some(10.0)),
            Some(Side::B)
        );
        assert_eq!(decide_winner(Some(false), None, Some(50.0), None), Some(Side::B));
        assert_eq!(decide_winner(None, None, Some(1.0), Some(1.0)), None);
        assert_eq!(decide_winner(None, None, Some(2.0), None), None);
    }

    #[test]
    fn confidence_orders_from_none_to_high() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Low > Confidence::None);
    }
}
