use crate::model::{GameResult, LeaderboardScore, PlayerStat, Post, Side, SingleTeamResult, decide_winner};
use crate::patterns::{
    ADJUSTMENT_HEADER_RE, ADJUSTMENT_LINE_RE, CAPTAIN_WINDOW_AFTER, CAPTAIN_WINDOW_BEFORE,
    LEADERBOARD_COLON_RE, LEADERBOARD_SCORE_RE, LOSS_INDICATOR_RE, MENTION_RE,
    PLAYER_RANK_ONLY_RE, PLAYER_STATS_RE, RESULT_FULL_RE, ROUND_NAME_RE,
    SINGLE_RECORD_FIRST_RE, SINGLE_RESULT_MAX_LINES, SINGLE_SCORE_FIRST_RE, VS_ANY_RE,
    WIN_INDICATOR_RE,
};
use crate::text_util::{byte_window, clean_team_name, is_separator_line, line_spans, parse_score};

#[derive(Debug, Clone, PartialEq)]
pub struct ResultLine {
    pub team: String,
    pub wins: u32,
    pub losses: u32,
    pub score: Option<f64>,
    pub seed: Option<u32>,
    /// `Some(true)` for a win glyph, `Some(false)` for a loss glyph.
    pub mark: Option<bool>,
}

pub fn parse_result_line(line: &str) -> Option<ResultLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let caps = RESULT_FULL_RE.captures(trimmed)?;
    let team = clean_team_name(&caps[3]);
    if team.is_empty() {
        return None;
    }
    let seed = caps
        .get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok());
    let trailing = caps.get(7).map_or("", |m| m.as_str());
    Some(ResultLine {
        team,
        wins: caps[4].parse().ok()?,
        losses: caps[5].parse().ok()?,
        score: parse_score(&caps[6]),
        seed,
        mark: outcome_mark(trailing),
    })
}

fn outcome_mark(trailing: &str) -> Option<bool> {
    if WIN_INDICATOR_RE.is_match(trailing) {
        Some(true)
    } else if LOSS_INDICATOR_RE.is_match(trailing) {
        Some(false)
    } else {
        None
    }
}

/// Builds a two-team result from a post already classified as one. Needs at
/// least two parsed team-record lines.
pub fn extract_result(post: &Post) -> Option<GameResult> {
    let text = post.text.as_str();
    let spans = line_spans(text);

    let mut round_name: Option<String> = None;
    let mut first_content_seen = false;
    let mut parsed: Vec<(usize, ResultLine)> = Vec::new();
    let mut adjustments: Vec<(String, f64)> = Vec::new();
    let mut in_adjustments = false;

    for (offset, raw) in &spans {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if !first_content_seen {
            first_content_seen = true;
            if ROUND_NAME_RE.is_match(line) && parse_result_line(line).is_none() {
                round_name = Some(line.to_string());
                continue;
            }
        }
        if is_separator_line(line) {
            continue;
        }
        if ADJUSTMENT_HEADER_RE.is_match(line) {
            in_adjustments = true;
            continue;
        }
        if let Some(result_line) = parse_result_line(line) {
            parsed.push((*offset, result_line));
            continue;
        }
        if in_adjustments || parsed.len() >= 2 {
            if let Some(caps) = ADJUSTMENT_LINE_RE.captures(line) {
                if let Some(value) = parse_score(&caps[2]) {
                    adjustments.push((caps[1].trim().to_string(), value));
                }
            }
        }
    }

    if parsed.len() < 2 {
        return None;
    }
    let mut lines = parsed.into_iter();
    let (a_offset, a) = lines.next()?;
    let (b_offset, b) = lines.next()?;

    let winner = decide_winner(a.mark, b.mark, a.score, b.score);
    let (adjustment_a, adjustment_b) = match_adjustments(&adjustments, &a.team, &b.team);
    let player_stats = extract_player_stats(text, Some((a_offset, b_offset)));
    let is_postseason = round_name.is_some() || a.seed.is_some() || b.seed.is_some();

    Some(GameResult {
        post_id: post.id,
        thread_id: post.thread_id,
        posted_at: post.created_at.clone(),
        game_date: post.game_date(),
        team_a: a.team,
        team_b: b.team,
        score_a: a.score,
        score_b: b.score,
        winner,
        adjustment_a,
        adjustment_b,
        seed_a: a.seed,
        seed_b: b.seed,
        round_name,
        is_postseason,
        player_stats,
    })
}

fn match_adjustments(
    adjustments: &[(String, f64)],
    team_a: &str,
    team_b: &str,
) -> (Option<f64>, Option<f64>) {
    let ta = team_a.to_lowercase();
    let tb = team_b.to_lowercase();
    let mut adj_a = None;
    let mut adj_b = None;
    for (name, value) in adjustments {
        let name = name.to_lowercase();
        if name.is_empty() {
            continue;
        }
        if ta.contains(&name) || name.contains(&ta) {
            adj_a = Some(*value);
        } else if tb.contains(&name) || name.contains(&tb) {
            adj_b = Some(*value);
        }
    }
    (adj_a, adj_b)
}

/// Per-mention `(score, Nth)` and `(Nth)` annotations in order of appearance.
/// With the byte offsets of the two team-record lines, mentions between them
/// belong to side A and mentions after the second to side B.
pub fn extract_player_stats(text: &str, team_lines: Option<(usize, usize)>) -> Vec<PlayerStat> {
    let mut found: Vec<(usize, PlayerStat)> = Vec::new();

    for caps in PLAYER_STATS_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let (Some(score), Ok(rank)) = (parse_score(&caps[2]), caps[4].parse::<i64>()) else {
            continue;
        };
        let window = byte_window(
            text,
            whole.start(),
            whole.end(),
            CAPTAIN_WINDOW_BEFORE,
            CAPTAIN_WINDOW_AFTER,
        );
        let mut stat = PlayerStat::new(&caps[1]);
        stat.score = Some(score);
        stat.rank = Some(rank);
        stat.is_captain = caps.get(3).is_some() || window.to_lowercase().contains("(c)");
        found.push((whole.start(), stat));
    }

    for caps in PLAYER_RANK_ONLY_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if found.iter().any(|(_, s)| s.handle == caps[1]) {
            continue;
        }
        let Ok(rank) = caps[2].parse::<i64>() else {
            continue;
        };
        let mut stat = PlayerStat::new(&caps[1]);
        stat.rank = Some(rank);
        stat.is_captain = whole.as_str().to_lowercase().contains("(c)");
        found.push((whole.start(), stat));
    }

    found.sort_by_key(|(offset, _)| *offset);

    if let Some((a_start, b_start)) = team_lines {
        let any_between = found
            .iter()
            .any(|(offset, _)| *offset >= a_start && *offset < b_start);
        for (offset, stat) in &mut found {
            stat.side = if *offset >= b_start && any_between {
                Some(Side::B)
            } else if *offset >= a_start && *offset < b_start {
                Some(Side::A)
            } else {
                None
            };
        }
    }

    found.into_iter().map(|(_, stat)| stat).collect()
}

/// One team's half of a game posted on its own: no mentions, no vs, at most
/// three lines and exactly one record line.
pub fn extract_single_team_result(post: &Post) -> Option<SingleTeamResult> {
    let text = post.text.trim();
    if text.is_empty() || MENTION_RE.is_match(text) || VS_ANY_RE.is_match(text) {
        return None;
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() > SINGLE_RESULT_MAX_LINES {
        return None;
    }

    let mut matches = lines.iter().filter_map(|ln| parse_single_team_line(ln));
    let (team, score, wins, losses, is_winner) = matches.next()?;
    if matches.next().is_some() {
        return None;
    }

    Some(SingleTeamResult {
        post_id: post.id,
        thread_id: post.thread_id,
        posted_at: post.created_at.clone(),
        game_date: post.game_date(),
        team,
        score,
        wins,
        losses,
        is_winner,
    })
}

type SingleLine = (String, f64, u32, u32, Option<bool>);

fn parse_single_team_line(line: &str) -> Option<SingleLine> {
    let line = line.trim();
    let (team, score, wins, losses, marker) =
        if let Some(caps) = SINGLE_RECORD_FIRST_RE.captures(line) {
            (
                caps[1].trim().to_string(),
                parse_score(&caps[4])?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
                caps.get(5).map(|m| m.as_str().to_string()),
            )
        } else {
            let caps = SINGLE_SCORE_FIRST_RE.captures(line)?;
            (
                caps[1].trim().to_string(),
                parse_score(&caps[2])?,
                caps[3].parse().ok()?,
                caps[4].parse().ok()?,
                caps.get(5).map(|m| m.as_str().to_string()),
            )
        };
    if team.is_empty() || score <= 0.0 {
        return None;
    }
    let is_winner = match marker.as_deref() {
        Some("✅") | Some("(W)") => Some(true),
        Some("❌") | Some("(L)") => Some(false),
        _ => None,
    };
    Some((team, score, wins, losses, is_winner))
}

/// Team scores from a "top team scores" style post, used to fill games that
/// never got a result post.
pub fn extract_leaderboard_scores(text: &str) -> Vec<LeaderboardScore> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = LEADERBOARD_SCORE_RE.captures(line) {
            let is_winner = match (caps.get(3).map(|m| m.as_str()), caps.get(4).map(|m| m.as_str())) {
                (Some("W"), _) | (_, Some("✅")) => Some(true),
                (Some("L"), _) | (_, Some("❌")) => Some(false),
                _ => None,
            };
            push_score(&mut rows, &caps[1], &caps[2], is_winner);
        } else if let Some(caps) = LEADERBOARD_COLON_RE.captures(line) {
            push_score(&mut rows, &caps[1], &caps[2], None);
        }
    }
    rows
}

fn push_score(rows: &mut Vec<LeaderboardScore>, team: &str, score: &str, is_winner: Option<bool>) {
    let team = clean_team_name(team);
    let Some(score) = parse_score(score) else {
        return;
    };
    if team.is_empty() || score <= 0.0 {
        return;
    }
    rows.push(LeaderboardScore {
        team,
        score,
        is_winner,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_names_match_by_containment() {
        let adj = vec![("outlaws".to_string(), -500.0), ("Jam".to_string(), 250.0)];
        assert_eq!(
            match_adjustments(&adj, "Jammers", "Outlaws"),
            (Some(250.0), Some(-500.0))
        );
    }

    #[test]
    fn stats_between_record_lines_go_to_side_a() {
        let text = "Jammers (3-1) - 34,565 ✅\n@amy (12,000, 1st)\nOutlaws (1-3) - 30,000 ❌\n@bo (9,000*1.5, 4th)";
        let b_start = text.find("Outlaws").unwrap_or(0);
        let stats = extract_player_stats(text, Some((0, b_start)));
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].side, Some(Side::A));
        assert_eq!(stats[1].side, Some(Side::B));
        assert!(stats[1].is_captain);
        assert!(!stats[0].is_captain);
    }

    #[test]
    fn single_line_marker_variants() {
        let parsed = parse_single_team_line("Empire: 32,943 (0-1) (L)").expect("parses");
        assert_eq!(parsed.0, "Empire");
        assert_eq!(parsed.4, Some(false));
        let parsed = parse_single_team_line("Gravediggers (2-0) 35,479 ✅").expect("parses");
        assert_eq!(parsed.1, 35479.0);
        assert_eq!(parsed.4, Some(true));
    }
}
