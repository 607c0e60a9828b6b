use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::thread;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::fetch_cache::FetchCache;
use crate::karma_source::KarmaSource;
use crate::model::{
    CompleteGame, Confidence, IdentityRecord, KarmaRow, MatchMethod, RankedDay, Verification,
};
use crate::ranked_history::RankedHistorySource;

const FUZZY_ACCEPT: f64 = 0.85;
const FUZZY_MEDIUM: f64 = 0.90;
const FUZZY_HIGH: f64 = 0.95;
const HISTORY_MAX_AVG_DEVIATION: f64 = 30.0;
const HISTORY_HIGH_AVG_DEVIATION: f64 = 10.0;
const REVERIFY_MAX_RANK_DIFF: i64 = 5;
const RANK_PATTERN_MIN_DATES: usize = 2;

/// What the game records say about one handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleEvidence {
    pub handle: String,
    pub known_id: Option<String>,
    pub appearances: BTreeSet<NaiveDate>,
    pub expected_ranks: BTreeMap<NaiveDate, i64>,
}

/// Gathers per-handle evidence from linked games. Handles compare
/// case-insensitively; `known_ids` maps handle to canonical id.
pub fn collect_evidence(
    games: &[CompleteGame],
    known_ids: &HashMap<String, String>,
) -> Vec<HandleEvidence> {
    let known: HashMap<String, &String> = known_ids
        .iter()
        .map(|(handle, id)| (handle.to_lowercase(), id))
        .collect();
    let mut by_handle: BTreeMap<String, HandleEvidence> = BTreeMap::new();

    for game in games {
        let Some(date) = game.game_date else {
            continue;
        };
        for handle in game.roster_a.iter().chain(&game.roster_b) {
            evidence_entry(&mut by_handle, &known, handle, date);
        }
        for stat in &game.player_stats {
            let entry = evidence_entry(&mut by_handle, &known, &stat.handle, date);
            if let Some(rank) = stat.rank {
                entry.expected_ranks.entry(date).or_insert(rank);
            }
            if entry.known_id.is_none() {
                entry.known_id = stat.canonical_id.clone();
            }
        }
    }
    by_handle.into_values().collect()
}

fn evidence_entry<'a>(
    by_handle: &'a mut BTreeMap<String, HandleEvidence>,
    known: &HashMap<String, &String>,
    handle: &str,
    date: NaiveDate,
) -> &'a mut HandleEvidence {
    let key = handle.to_lowercase();
    let entry = by_handle
        .entry(key.clone())
        .or_insert_with(|| HandleEvidence {
            known_id: known.get(&key).map(|id| (*id).clone()),
            handle: key,
            ..HandleEvidence::default()
        });
    entry.appearances.insert(date);
    entry
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveSummary {
    pub handles: usize,
    pub resolved: usize,
    pub no_match: usize,
    pub outside_population: usize,
    pub verified: usize,
    pub rejected: usize,
    pub uncertain: usize,
    pub by_method: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
    pub snapshot_dates: usize,
    pub snapshot_rows: usize,
    pub history_fetches: usize,
    pub fetch_failures: usize,
}

#[derive(Debug, Clone)]
pub struct ResolveOutput {
    pub records: Vec<IdentityRecord>,
    pub summary: ResolveSummary,
}

/// Lowercase username to every id that used it across fetched snapshots.
#[derive(Debug, Clone, Default)]
pub struct UsernameIndex {
    ids_by_name: BTreeMap<String, BTreeSet<String>>,
}

impl UsernameIndex {
    pub fn build<'a>(rows: impl Iterator<Item = &'a KarmaRow>) -> Self {
        let mut ids_by_name: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for row in rows {
            let name = row.username.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            ids_by_name
                .entry(name)
                .or_default()
                .insert(row.user_id.clone());
        }
        Self { ids_by_name }
    }

    /// The single id behind `name`, or `None` when unknown or shared.
    pub fn unambiguous(&self, name: &str) -> Option<&String> {
        let ids = self.ids_by_name.get(name)?;
        if ids.len() == 1 { ids.iter().next() } else { None }
    }

    fn unambiguous_entries(&self) -> impl Iterator<Item = (&String, &String)> {
        self.ids_by_name.iter().filter_map(|(name, ids)| {
            if ids.len() == 1 {
                ids.iter().next().map(|id| (name, id))
            } else {
                None
            }
        })
    }

    /// Best fuzzy candidate among unambiguous names with its similarity.
    pub fn best_fuzzy(&self, handle: &str) -> Option<(&String, &String, f64)> {
        let mut best: Option<(&String, &String, f64)> = None;
        for (name, id) in self.unambiguous_entries() {
            let ratio = similarity(handle, name);
            if best.is_none_or(|(_, _, b)| ratio > b) {
                best = Some((name, id, ratio));
            }
        }
        best
    }
}

/// Matching-character ratio `2 * M / (len_a + len_b)` over a char diff.
fn similarity(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

fn fuzzy_confidence(ratio: f64) -> Option<Confidence> {
    if ratio <= FUZZY_ACCEPT {
        None
    } else if ratio > FUZZY_HIGH {
        Some(Confidence::High)
    } else if ratio > FUZZY_MEDIUM {
        Some(Confidence::Medium)
    } else {
        Some(Confidence::Low)
    }
}

pub struct IdentityResolver<K, H> {
    karma: K,
    history: H,
    config: ResolverConfig,
    snapshots: FetchCache<NaiveDate, Vec<KarmaRow>>,
    histories: FetchCache<String, Vec<RankedDay>>,
    records: BTreeMap<String, IdentityRecord>,
}

impl<K, H> IdentityResolver<K, H>
where
    K: KarmaSource,
    H: RankedHistorySource,
{
    pub fn new(karma: K, history: H, config: ResolverConfig) -> Self {
        Self {
            karma,
            history,
            config,
            snapshots: FetchCache::new("karma_snapshot"),
            histories: FetchCache::new("ranked_history"),
            records: BTreeMap::new(),
        }
    }

    pub fn records(&self) -> &BTreeMap<String, IdentityRecord> {
        &self.records
    }

    pub fn record(&self, handle: &str) -> Option<&IdentityRecord> {
        self.records.get(&handle.to_lowercase())
    }

    /// Runs every strategy in order, then re-checks uncertain rank matches.
    /// Fails only when no evidence date has any snapshot rows.
    pub fn resolve_all(&mut self, evidence: &[HandleEvidence]) -> Result<ResolveOutput> {
        let dates: BTreeSet<NaiveDate> = evidence
            .iter()
            .flat_map(|e| e.appearances.iter().chain(e.expected_ranks.keys()).copied())
            .collect();
        let mut rows_seen = 0;
        for date in &dates {
            rows_seen += self.snapshot(*date).len();
        }
        if !dates.is_empty() && rows_seen == 0 {
            return Err(anyhow!(
                "no karma snapshot rows for any of {} evidence dates",
                dates.len()
            ));
        }

        self.resolve_direct(evidence);
        self.resolve_by_username(evidence);
        self.resolve_by_rank_pattern(evidence);
        self.resolve_by_history(evidence);
        self.reverify_uncertain();

        let summary = self.summarize(evidence, &dates);
        info!(
            handles = summary.handles,
            resolved = summary.resolved,
            no_match = summary.no_match,
            rejected = summary.rejected,
            "identity resolution finished"
        );
        Ok(ResolveOutput {
            records: evidence
                .iter()
                .filter_map(|e| self.records.get(&e.handle).cloned())
                .collect(),
            summary,
        })
    }

    fn snapshot(&mut self, date: NaiveDate) -> &Vec<KarmaRow> {
        let karma = &self.karma;
        self.snapshots
            .get_or_fetch(&date, |d| karma.rows_for_date(*d))
    }

    fn cached_snapshot(&self, date: &NaiveDate) -> &[KarmaRow] {
        self.snapshots.get(date).map(Vec::as_slice).unwrap_or(&[])
    }

    fn history_for(&mut self, user_id: &str) -> &Vec<RankedDay> {
        let source = &self.history;
        let config = &self.config;
        self.histories
            .get_or_fetch(&user_id.to_string(), |id| fetch_full_history(source, id, config))
    }

    /// Stores `record` unless an existing one is at least as confident.
    fn offer(&mut self, record: IdentityRecord) -> bool {
        let keep_existing = self
            .records
            .get(&record.handle)
            .is_some_and(|existing| existing.confidence >= record.confidence);
        if keep_existing {
            return false;
        }
        debug!(handle = %record.handle, method = ?record.method, confidence = ?record.confidence, "identity record stored");
        self.records.insert(record.handle.clone(), record);
        true
    }

    fn is_settled(&self, handle: &str) -> bool {
        self.records.get(handle).is_some_and(|r| {
            r.confidence == Confidence::High
                || matches!(r.method, MatchMethod::Direct | MatchMethod::OutsideKnownPopulation)
        })
    }

    fn claimed_ids(&self) -> HashSet<String> {
        self.records
            .values()
            .filter(|r| {
                (r.confidence == Confidence::High || r.method == MatchMethod::Direct)
                    && r.verification != Verification::Rejected
            })
            .filter_map(|r| r.canonical_id.clone())
            .collect()
    }

    fn ranks_of(&self, user_id: &str, dates: impl Iterator<Item = NaiveDate>) -> BTreeMap<NaiveDate, i64> {
        dates
            .filter_map(|date| {
                self.cached_snapshot(&date)
                    .iter()
                    .find(|row| row.user_id == user_id)
                    .map(|row| (date, row.rank))
            })
            .collect()
    }

    fn resolve_direct(&mut self, evidence: &[HandleEvidence]) {
        for ev in evidence {
            let Some(known_id) = ev.known_id.clone() else {
                continue;
            };
            let dates_with_data: Vec<NaiveDate> = ev
                .appearances
                .iter()
                .copied()
                .filter(|d| !self.cached_snapshot(d).is_empty())
                .collect();
            let ranks = self.ranks_of(&known_id, dates_with_data.iter().copied());

            let record = if ranks.is_empty() && !dates_with_data.is_empty() {
                IdentityRecord {
                    handle: ev.handle.clone(),
                    canonical_id: Some(known_id),
                    confidence: Confidence::None,
                    method: MatchMethod::OutsideKnownPopulation,
                    evidence: format!(
                        "known id absent from snapshots on {} dates",
                        dates_with_data.len()
                    ),
                    uncertain: false,
                    candidate_count: None,
                    verification: Verification::Unverified,
                    snapshot_ranks: BTreeMap::new(),
                }
            } else {
                // Nothing to check the id against on any appearance date.
                let confidence = if dates_with_data.is_empty() {
                    Confidence::Medium
                } else {
                    Confidence::High
                };
                IdentityRecord {
                    handle: ev.handle.clone(),
                    canonical_id: Some(known_id),
                    confidence,
                    method: MatchMethod::Direct,
                    evidence: format!(
                        "known id present in snapshots on {} of {} dates",
                        ranks.len(),
                        dates_with_data.len()
                    ),
                    uncertain: false,
                    candidate_count: None,
                    verification: Verification::Unverified,
                    snapshot_ranks: ranks,
                }
            };
            self.offer(record);
        }
    }

    fn resolve_by_username(&mut self, evidence: &[HandleEvidence]) {
        let index = UsernameIndex::build(self.snapshots.values().flat_map(|(_, rows)| rows.iter()));
        let mut proposals = Vec::new();

        for ev in evidence {
            if self.is_settled(&ev.handle) {
                continue;
            }
            let handle = ev.handle.as_str();
            let (id, confidence, method, note) = if let Some(id) = index.unambiguous(handle) {
                (
                    id.clone(),
                    Confidence::High,
                    MatchMethod::UsernameExact,
                    format!("username '{handle}' matches exactly"),
                )
            } else {
                let Some((name, id, ratio)) = index.best_fuzzy(handle) else {
                    continue;
                };
                let Some(confidence) = fuzzy_confidence(ratio) else {
                    continue;
                };
                (
                    id.clone(),
                    confidence,
                    MatchMethod::UsernameFuzzy,
                    format!("username '{name}' similarity {ratio:.3}"),
                )
            };
            let ranks = self.ranks_of(&id, ev.appearances.iter().copied());
            proposals.push(IdentityRecord {
                handle: ev.handle.clone(),
                canonical_id: Some(id),
                confidence,
                method,
                evidence: note,
                uncertain: false,
                candidate_count: None,
                verification: Verification::Unverified,
                snapshot_ranks: ranks,
            });
        }
        for record in proposals {
            self.offer(record);
        }
    }

    fn resolve_by_rank_pattern(&mut self, evidence: &[HandleEvidence]) {
        let tolerance = self.config.rank_pattern_tolerance;
        for ev in evidence {
            if self.is_settled(&ev.handle) || ev.expected_ranks.len() < RANK_PATTERN_MIN_DATES {
                continue;
            }
            let claimed = self.claimed_ids();
            let mut survivors: Option<BTreeSet<String>> = None;
            let mut used_dates = Vec::new();

            for (date, expected) in &ev.expected_ranks {
                let rows = self.cached_snapshot(date);
                if rows.is_empty() {
                    continue;
                }
                let candidates: BTreeSet<String> = rows
                    .iter()
                    .filter(|row| (row.rank - expected).abs() <= tolerance)
                    .filter(|row| !claimed.contains(&row.user_id))
                    .map(|row| row.user_id.clone())
                    .collect();
                used_dates.push(*date);
                survivors = Some(match survivors {
                    None => candidates,
                    Some(prev) => prev.intersection(&candidates).cloned().collect(),
                });
            }

            let Some(survivors) = survivors else {
                continue;
            };
            if used_dates.len() < RANK_PATTERN_MIN_DATES {
                continue;
            }
            if survivors.is_empty() {
                debug!(handle = %ev.handle, dates = used_dates.len(), "rank pattern has no common candidate");
                continue;
            }

            let scored: Vec<(i64, &String)> = survivors
                .iter()
                .map(|id| {
                    let ranks = self.ranks_of(id, used_dates.iter().copied());
                    let deviation: i64 = ranks
                        .iter()
                        .filter_map(|(d, r)| ev.expected_ranks.get(d).map(|e| (r - e).abs()))
                        .sum();
                    (deviation, id)
                })
                .collect();
            let Some(&(deviation, best)) = scored.iter().min() else {
                continue;
            };
            let unique = survivors.len() == 1;
            let record = IdentityRecord {
                handle: ev.handle.clone(),
                canonical_id: Some(best.clone()),
                confidence: if unique { Confidence::High } else { Confidence::Medium },
                method: MatchMethod::RankPattern,
                evidence: if unique {
                    format!("only candidate within ±{tolerance} on {} dates", used_dates.len())
                } else {
                    format!(
                        "{} candidates within ±{tolerance} on {} dates, lowest total deviation {deviation}",
                        survivors.len(),
                        used_dates.len()
                    )
                },
                uncertain: !unique,
                candidate_count: Some(survivors.len()),
                verification: Verification::Unverified,
                snapshot_ranks: self.ranks_of(best, used_dates.iter().copied()),
            };
            self.offer(record);
        }
    }

    fn resolve_by_history(&mut self, evidence: &[HandleEvidence]) {
        let tolerance = self.config.history_rank_tolerance;
        let cap = self.config.history_candidate_cap;

        for ev in evidence {
            if self.records.contains_key(&ev.handle) || ev.expected_ranks.is_empty() {
                continue;
            }
            let claimed = self.claimed_ids();
            let mut closeness: BTreeMap<String, i64> = BTreeMap::new();
            for (date, expected) in &ev.expected_ranks {
                for row in self.cached_snapshot(date) {
                    let diff = (row.rank - expected).abs();
                    if diff > tolerance || claimed.contains(&row.user_id) {
                        continue;
                    }
                    closeness
                        .entry(row.user_id.clone())
                        .and_modify(|d| *d = (*d).min(diff))
                        .or_insert(diff);
                }
            }
            let mut candidates: Vec<(i64, String)> =
                closeness.into_iter().map(|(id, d)| (d, id)).collect();
            candidates.sort();
            candidates.truncate(cap);

            let mut best: Option<(f64, String, usize)> = None;
            for (_, id) in candidates {
                let Some((avg, matched)) = average_deviation(self.history_for(&id), &ev.expected_ranks)
                else {
                    continue;
                };
                if avg >= HISTORY_MAX_AVG_DEVIATION {
                    continue;
                }
                if best.as_ref().is_none_or(|(b, _, _)| avg < *b) {
                    best = Some((avg, id, matched));
                }
            }

            let Some((avg, id, matched)) = best else {
                continue;
            };
            let ranks = self.ranks_of(&id, ev.expected_ranks.keys().copied());
            self.offer(IdentityRecord {
                handle: ev.handle.clone(),
                canonical_id: Some(id),
                confidence: if avg < HISTORY_HIGH_AVG_DEVIATION {
                    Confidence::High
                } else {
                    Confidence::Medium
                },
                method: MatchMethod::RankedHistory,
                evidence: format!("history average deviation {avg:.1} over {matched} dates"),
                uncertain: false,
                candidate_count: None,
                verification: Verification::Unverified,
                snapshot_ranks: ranks,
            });
        }
    }

    /// Checks uncertain rank-pattern matches against the chosen id's own
    /// history. A gap above five places on any compared day rejects the match.
    pub fn reverify_uncertain(&mut self) {
        let pending: Vec<(String, String, BTreeMap<NaiveDate, i64>)> = self
            .records
            .values()
            .filter(|r| {
                r.method == MatchMethod::RankPattern
                    && r.uncertain
                    && r.verification == Verification::Unverified
            })
            .filter_map(|r| {
                Some((r.handle.clone(), r.canonical_id.clone()?, r.snapshot_ranks.clone()))
            })
            .collect();

        for (handle, id, snapshot_ranks) in pending {
            let history: HashMap<NaiveDate, i64> = self
                .history_for(&id)
                .iter()
                .map(|d| (d.day, d.rank))
                .collect();
            let diffs: Vec<i64> = snapshot_ranks
                .iter()
                .filter_map(|(date, snap)| history.get(date).map(|h| (h - snap).abs()))
                .collect();
            if diffs.is_empty() {
                continue;
            }
            let verdict = if diffs.iter().any(|d| *d > REVERIFY_MAX_RANK_DIFF) {
                Verification::Rejected
            } else {
                Verification::Verified
            };
            if verdict == Verification::Rejected {
                warn!(handle = %handle, id = %id, "uncertain rank match rejected by history");
            }
            if let Some(record) = self.records.get_mut(&handle) {
                record.verification = verdict;
            }
        }
    }

    /// Copies usable identities onto player stats, with the karma amount and
    /// rank for the game date when the snapshot has them.
    pub fn attach_identities(&mut self, games: &mut [CompleteGame]) -> usize {
        let mut attached = 0;
        for game in games.iter_mut() {
            for stat in &mut game.player_stats {
                let Some(record) = self.records.get(&stat.handle.to_lowercase()) else {
                    continue;
                };
                if !record.is_usable() {
                    continue;
                }
                let Some(id) = record.canonical_id.clone() else {
                    continue;
                };
                let confidence = record.confidence;
                if let Some(date) = game.game_date {
                    let rows = self.snapshot(date);
                    if let Some(row) = rows.iter().find(|row| row.user_id == id) {
                        stat.karma_amount = Some(row.amount);
                        stat.karma_rank = Some(row.rank);
                    }
                }
                stat.canonical_id = Some(id);
                stat.confidence = confidence;
                attached += 1;
            }
        }
        attached
    }

    fn summarize(&self, evidence: &[HandleEvidence], dates: &BTreeSet<NaiveDate>) -> ResolveSummary {
        let mut summary = ResolveSummary {
            handles: evidence.len(),
            snapshot_dates: dates.len(),
            snapshot_rows: dates.iter().map(|d| self.cached_snapshot(d).len()).sum(),
            history_fetches: self.histories.fetch_count(),
            fetch_failures: self.snapshots.failure_count() + self.histories.failure_count(),
            ..ResolveSummary::default()
        };
        for ev in evidence {
            let Some(record) = self.records.get(&ev.handle) else {
                summary.no_match += 1;
                continue;
            };
            if record.method == MatchMethod::OutsideKnownPopulation {
                summary.outside_population += 1;
            } else if record.is_usable() {
                summary.resolved += 1;
            }
            match record.verification {
                Verification::Verified => summary.verified += 1,
                Verification::Rejected => summary.rejected += 1,
                Verification::Unverified => {}
            }
            if record.uncertain {
                summary.uncertain += 1;
            }
            *summary
                .by_method
                .entry(method_label(record.method).to_string())
                .or_default() += 1;
            *summary
                .by_confidence
                .entry(confidence_label(record.confidence).to_string())
                .or_default() += 1;
        }
        summary
    }
}

pub fn method_label(method: MatchMethod) -> &'static str {
    match method {
        MatchMethod::Direct => "direct",
        MatchMethod::OutsideKnownPopulation => "outside_known_population",
        MatchMethod::UsernameExact => "username_exact",
        MatchMethod::UsernameFuzzy => "username_fuzzy",
        MatchMethod::RankPattern => "rank_pattern",
        MatchMethod::RankedHistory => "ranked_history",
    }
}

pub fn confidence_label(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
        Confidence::None => "none",
    }
}

/// Mean absolute gap between history ranks and expected ranks on shared days.
fn average_deviation(
    history: &[RankedDay],
    expected: &BTreeMap<NaiveDate, i64>,
) -> Option<(f64, usize)> {
    let by_day: HashMap<NaiveDate, i64> = history.iter().map(|d| (d.day, d.rank)).collect();
    let gaps: Vec<i64> = expected
        .iter()
        .filter_map(|(date, rank)| by_day.get(date).map(|h| (h - rank).abs()))
        .collect();
    if gaps.is_empty() {
        return None;
    }
    let total: i64 = gaps.iter().sum();
    Some((total as f64 / gaps.len() as f64, gaps.len()))
}

/// Walks the newest-first pages until they run out or predate the season.
/// A failure after the first page keeps what was already fetched.
fn fetch_full_history<H: RankedHistorySource>(
    source: &H,
    user_id: &str,
    config: &ResolverConfig,
) -> Result<Vec<RankedDay>> {
    let mut all: Vec<RankedDay> = Vec::new();
    let mut before: Option<NaiveDate> = None;
    loop {
        let page = match source.page(user_id, before) {
            Ok(page) => page,
            Err(err) if all.is_empty() => return Err(err),
            Err(err) => {
                warn!(user_id, error = %err, "history paging stopped early");
                break;
            }
        };
        let Some(oldest) = page.iter().map(|d| d.day).min() else {
            break;
        };
        if before.is_some_and(|cursor| oldest >= cursor) {
            break;
        }
        all.extend(page);
        if oldest < config.season_start {
            break;
        }
        before = Some(oldest);
        if !config.history_request_delay.is_zero() {
            thread::sleep(config.history_request_delay);
        }
    }
    Ok(all)
}
