use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::dates::{days_between, parse_timestamp};
use crate::model::{
    CompleteGame, GameKind, GameResult, GameType, LeaderboardScore, Lineup, SingleTeamResult,
    decide_winner,
};
use crate::patterns::{BACKFILL_MAX_OFFSET_DAYS, LINK_DAYS_BACK, LINK_WIDE_DAYS};
use crate::text_util::{alphanumeric_key, names_overlap, normalize_team_key};

/// Leaderboard rows per game date, keyed by lowercase team name.
pub type LeaderboardIndex = BTreeMap<NaiveDate, BTreeMap<String, LeaderboardScore>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub matched: usize,
    pub matched_wide: usize,
    pub swapped: usize,
    pub result_only: usize,
    pub lineup_only: usize,
    pub single_team_pairs: usize,
    pub backfilled: usize,
}

#[derive(Debug, Clone)]
pub struct LinkOutput {
    pub games: Vec<CompleteGame>,
    pub summary: LinkSummary,
}

/// Pairs singles into results, links results to lineups, then backfills
/// scores. Games come back sorted by (date, id).
pub fn link_games(
    lineups: &[Lineup],
    results: &[GameResult],
    singles: &[SingleTeamResult],
    leaderboard: &LeaderboardIndex,
) -> LinkOutput {
    let paired = pair_single_team_results(singles, lineups);
    let single_team_pairs = paired.len();

    let mut all_results = results.to_vec();
    all_results.extend(paired);

    let (mut games, mut summary) = link_results_to_lineups(lineups, &all_results);
    summary.single_team_pairs = single_team_pairs;
    summary.backfilled = backfill_scores(&mut games, leaderboard);
    games.sort_by(|a, b| (a.game_date, a.game_id).cmp(&(b.game_date, b.game_id)));

    LinkOutput { games, summary }
}

/// Exact case-insensitive match in either order, else containment in either
/// order.
pub fn teams_match(lineup_a: &str, lineup_b: &str, result_a: &str, result_b: &str) -> bool {
    let la = normalize_team_key(lineup_a);
    let lb = normalize_team_key(lineup_b);
    let ra = normalize_team_key(result_a);
    let rb = normalize_team_key(result_b);

    if (la == ra && lb == rb) || (la == rb && lb == ra) {
        return true;
    }
    (names_overlap(&la, &ra) && names_overlap(&lb, &rb))
        || (names_overlap(&la, &rb) && names_overlap(&lb, &ra))
}

/// Containment, or equality once punctuation and spacing are dropped.
pub fn fuzzy_team_match(a: &str, b: &str) -> bool {
    if names_overlap(a, b) {
        return true;
    }
    let a = alphanumeric_key(a);
    !a.is_empty() && a == alphanumeric_key(b)
}

fn team_pair_key(a: &str, b: &str) -> Option<(String, String)> {
    let a = normalize_team_key(a);
    let b = normalize_team_key(b);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    Some(if a <= b { (a, b) } else { (b, a) })
}

fn posted_key(posted_at: &str, post_id: i64) -> (Option<DateTime<Utc>>, i64) {
    (parse_timestamp(posted_at), post_id)
}

pub fn link_results_to_lineups(
    lineups: &[Lineup],
    results: &[GameResult],
) -> (Vec<CompleteGame>, LinkSummary) {
    let mut summary = LinkSummary::default();
    let mut games = Vec::with_capacity(results.len() + lineups.len());
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut next_id: u32 = 1;

    let mut by_date: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
    let mut by_teams: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for (idx, lineup) in lineups.iter().enumerate() {
        if let Some(date) = lineup.game_date {
            by_date.entry(date).or_default().push(idx);
        }
        if let Some(key) = team_pair_key(&lineup.team_a, &lineup.team_b) {
            by_teams.entry(key).or_default().push(idx);
        }
    }
    for bucket in by_date.values_mut() {
        bucket.sort_by_key(|&i| Reverse(posted_key(&lineups[i].posted_at, lineups[i].post_id)));
    }

    for result in results {
        let mut matched = find_in_date_window(result, lineups, &by_date, &consumed);
        if matched.is_none() {
            matched = find_in_wide_window(result, lineups, &by_teams, &consumed);
            if matched.is_some() {
                summary.matched_wide += 1;
            }
        }

        let game = match matched {
            Some(idx) => {
                consumed.insert(idx);
                summary.matched += 1;
                let game = merge_game(next_id, &lineups[idx], result);
                if game.swapped {
                    summary.swapped += 1;
                }
                game
            }
            None => {
                summary.result_only += 1;
                debug!(post_id = result.post_id, "result has no lineup");
                result_only_game(next_id, result)
            }
        };
        games.push(game);
        next_id += 1;
    }

    for (idx, lineup) in lineups.iter().enumerate() {
        if consumed.contains(&idx) {
            continue;
        }
        summary.lineup_only += 1;
        games.push(lineup_only_game(next_id, lineup));
        next_id += 1;
    }

    (games, summary)
}

fn find_in_date_window(
    result: &GameResult,
    lineups: &[Lineup],
    by_date: &HashMap<NaiveDate, Vec<usize>>,
    consumed: &HashSet<usize>,
) -> Option<usize> {
    let date = result.game_date?;
    (0..=LINK_DAYS_BACK).find_map(|back| {
        let bucket = by_date.get(&(date - Duration::days(back)))?;
        bucket.iter().copied().find(|i| {
            let lu = &lineups[*i];
            !consumed.contains(i)
                && teams_match(&lu.team_a, &lu.team_b, &result.team_a, &result.team_b)
        })
    })
}

fn find_in_wide_window(
    result: &GameResult,
    lineups: &[Lineup],
    by_teams: &BTreeMap<(String, String), Vec<usize>>,
    consumed: &HashSet<usize>,
) -> Option<usize> {
    let result_date = result.game_date?;
    let result_key = team_pair_key(&result.team_a, &result.team_b)?;

    let pick = |candidates: Vec<usize>| -> Option<usize> {
        let mut in_window: Vec<(i64, usize)> = candidates
            .into_iter()
            .filter(|i| !consumed.contains(i))
            .filter_map(|i| {
                let diff = days_between(result_date, lineups[i].game_date?).abs();
                (diff <= LINK_WIDE_DAYS).then_some((diff, i))
            })
            .collect();
        in_window.sort_by_key(|&(diff, i)| {
            (diff, Reverse(posted_key(&lineups[i].posted_at, lineups[i].post_id)))
        });
        in_window.first().map(|&(_, i)| i)
    };

    if let Some(idx) = by_teams.get(&result_key).cloned().and_then(|c| pick(c)) {
        return Some(idx);
    }

    let fuzzy: Vec<usize> = by_teams
        .iter()
        .filter(|((k0, k1), _)| {
            (fuzzy_team_match(k0, &result_key.0) && fuzzy_team_match(k1, &result_key.1))
                || (fuzzy_team_match(k0, &result_key.1) && fuzzy_team_match(k1, &result_key.0))
        })
        .flat_map(|(_, idxs)| idxs.iter().copied())
        .collect();
    pick(fuzzy)
}

fn lineup_is_swapped(lineup: &Lineup, result: &GameResult) -> bool {
    let la = normalize_team_key(&lineup.team_a);
    let ra = normalize_team_key(&result.team_a);
    let rb = normalize_team_key(&result.team_b);
    !la.is_empty() && la != ra && (rb.contains(&la) || la.contains(&rb))
}

/// The game keeps the result's orientation; a swapped lineup is flipped
/// before its side fields are copied.
fn merge_game(game_id: u32, lineup: &Lineup, result: &GameResult) -> CompleteGame {
    let swapped = lineup_is_swapped(lineup, result);
    let mut lineup = lineup.clone();
    if swapped {
        lineup.swap_sides();
    }
    let team_a = if lineup.team_a.is_empty() {
        result.team_a.clone()
    } else {
        lineup.team_a
    };
    let team_b = if lineup.team_b.is_empty() {
        result.team_b.clone()
    } else {
        lineup.team_b
    };

    CompleteGame {
        game_id,
        game_date: lineup.game_date.or(result.game_date),
        kind: GameKind::Full,
        game_type: GameType::from_flag(lineup.is_postseason || result.is_postseason),
        team_a,
        team_b,
        captain_a: lineup.captain_a,
        captain_b: lineup.captain_b,
        roster_a: lineup.roster_a,
        roster_b: lineup.roster_b,
        score_a: result.score_a,
        score_b: result.score_b,
        winner: result.winner,
        adjustment_a: result.adjustment_a,
        adjustment_b: result.adjustment_b,
        player_stats: result.player_stats.clone(),
        seed_a: lineup.seed_a.or(result.seed_a),
        seed_b: lineup.seed_b.or(result.seed_b),
        round_name: lineup.round_name.or_else(|| result.round_name.clone()),
        swapped,
        backfilled: false,
        lineup_post_id: Some(lineup.post_id),
        result_post_id: Some(result.post_id),
        lineup_thread_id: Some(lineup.thread_id),
        result_thread_id: Some(result.thread_id),
    }
}

fn result_only_game(game_id: u32, result: &GameResult) -> CompleteGame {
    CompleteGame {
        game_id,
        game_date: result.game_date,
        kind: GameKind::ResultOnly,
        game_type: GameType::from_flag(result.is_postseason),
        team_a: result.team_a.clone(),
        team_b: result.team_b.clone(),
        captain_a: None,
        captain_b: None,
        roster_a: Vec::new(),
        roster_b: Vec::new(),
        score_a: result.score_a,
        score_b: result.score_b,
        winner: result.winner,
        adjustment_a: result.adjustment_a,
        adjustment_b: result.adjustment_b,
        player_stats: result.player_stats.clone(),
        seed_a: result.seed_a,
        seed_b: result.seed_b,
        round_name: result.round_name.clone(),
        swapped: false,
        backfilled: false,
        lineup_post_id: None,
        result_post_id: Some(result.post_id),
        lineup_thread_id: None,
        result_thread_id: Some(result.thread_id),
    }
}

fn lineup_only_game(game_id: u32, lineup: &Lineup) -> CompleteGame {
    CompleteGame {
        game_id,
        game_date: lineup.game_date,
        kind: GameKind::LineupOnly,
        game_type: GameType::from_flag(lineup.is_postseason),
        team_a: lineup.team_a.clone(),
        team_b: lineup.team_b.clone(),
        captain_a: lineup.captain_a.clone(),
        captain_b: lineup.captain_b.clone(),
        roster_a: lineup.roster_a.clone(),
        roster_b: lineup.roster_b.clone(),
        score_a: None,
        score_b: None,
        winner: None,
        adjustment_a: None,
        adjustment_b: None,
        player_stats: Vec::new(),
        seed_a: lineup.seed_a,
        seed_b: lineup.seed_b,
        round_name: lineup.round_name.clone(),
        swapped: false,
        backfilled: false,
        lineup_post_id: Some(lineup.post_id),
        result_post_id: None,
        lineup_thread_id: Some(lineup.thread_id),
        result_thread_id: None,
    }
}

/// Two same-day single-team posts become one result when a lineup on that
/// day names both teams. The lineup decides which side is A.
pub fn pair_single_team_results(
    singles: &[SingleTeamResult],
    lineups: &[Lineup],
) -> Vec<GameResult> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&SingleTeamResult>> = BTreeMap::new();
    for single in singles {
        if let Some(date) = single.game_date {
            by_date.entry(date).or_default().push(single);
        }
    }

    let mut used: HashSet<i64> = HashSet::new();
    let mut paired = Vec::new();

    for (date, day_results) in &by_date {
        let day_lineups: Vec<&Lineup> = lineups
            .iter()
            .filter(|lu| lu.game_date == Some(*date))
            .filter(|lu| !lu.team_a.is_empty() && !lu.team_b.is_empty())
            .collect();

        for first in day_results {
            if used.contains(&first.post_id) {
                continue;
            }
            for lineup in &day_lineups {
                let (first_is_a, opponent) = if names_overlap(&first.team, &lineup.team_a) {
                    (true, &lineup.team_b)
                } else if names_overlap(&first.team, &lineup.team_b) {
                    (false, &lineup.team_a)
                } else {
                    continue;
                };
                let second = day_results.iter().find(|other| {
                    other.post_id != first.post_id
                        && !used.contains(&other.post_id)
                        && names_overlap(&other.team, opponent)
                });
                let Some(second) = second else {
                    continue;
                };
                used.insert(first.post_id);
                used.insert(second.post_id);
                let (a, b) = if first_is_a {
                    (*first, *second)
                } else {
                    (*second, *first)
                };
                paired.push(synthesize_result(a, b, lineup, *date));
                break;
            }
        }
    }
    paired
}

fn synthesize_result(
    a: &SingleTeamResult,
    b: &SingleTeamResult,
    lineup: &Lineup,
    date: NaiveDate,
) -> GameResult {
    GameResult {
        post_id: a.post_id,
        thread_id: a.thread_id,
        posted_at: a.posted_at.clone(),
        game_date: Some(date),
        team_a: lineup.team_a.clone(),
        team_b: lineup.team_b.clone(),
        score_a: Some(a.score),
        score_b: Some(b.score),
        winner: decide_winner(a.is_winner, b.is_winner, Some(a.score), Some(b.score)),
        adjustment_a: None,
        adjustment_b: None,
        seed_a: None,
        seed_b: None,
        round_name: None,
        is_postseason: false,
        player_stats: Vec::new(),
    }
}

pub fn build_leaderboard_index(rows: &[(NaiveDate, LeaderboardScore)]) -> LeaderboardIndex {
    let mut index = LeaderboardIndex::new();
    for (date, row) in rows {
        index
            .entry(*date)
            .or_default()
            .insert(normalize_team_key(&row.team), row.clone());
    }
    index
}

fn lookup_team<'a>(
    day: &'a BTreeMap<String, LeaderboardScore>,
    team: &str,
) -> Option<&'a LeaderboardScore> {
    let key = normalize_team_key(team);
    if key.is_empty() {
        return None;
    }
    day.get(&key).or_else(|| {
        day.iter()
            .find(|(k, _)| k.contains(&key) || key.contains(k.as_str()))
            .map(|(_, v)| v)
    })
}

/// Fills games that have neither score from leaderboard rows on the game date
/// or up to two days later. The earliest day with both teams wins.
pub fn backfill_scores(games: &mut [CompleteGame], index: &LeaderboardIndex) -> usize {
    let mut filled = 0;
    for game in games.iter_mut() {
        if !game.missing_scores() {
            continue;
        }
        let Some(date) = game.game_date else {
            continue;
        };
        for offset in 0..=BACKFILL_MAX_OFFSET_DAYS {
            let Some(day) = index.get(&(date + Duration::days(offset))) else {
                continue;
            };
            let (Some(a), Some(b)) = (lookup_team(day, &game.team_a), lookup_team(day, &game.team_b))
            else {
                continue;
            };
            if std::ptr::eq(a, b) {
                continue;
            }
            game.score_a = Some(a.score);
            game.score_b = Some(b.score);
            game.winner = decide_winner(a.is_winner, b.is_winner, game.score_a, game.score_b);
            game.backfilled = true;
            filled += 1;
            break;
        }
    }
    filled
}
