use crate::model::{Lineup, Post};
use crate::patterns::{
    CAPTAIN_EXPLICIT_RE, CAPTAIN_PLAIN_RE, EMOJI_CODE_RE, INLINE_VS_SCAN_LINES,
    LEADERBOARD_LINE_RE, RESULT_LINE_RE, ROUND_NAME_RE, ROUND_SCAN_LINES, SEED_SCAN_LINES,
    SEED_TEAM_RE, TEAM_LINE_MAX_CHARS, TEAM_RECORD_RE, TEAM_SCAN_LINES, VS_ANY_RE,
};
use crate::text_util::{
    clean_team_name, find_mentions, find_vs_line, is_mention_line, is_separator_line,
    join_lines, mention_handles, middle_separator, team_header_lines,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostseasonInfo {
    pub round_name: Option<String>,
    pub seed_a: Option<u32>,
    pub seed_b: Option<u32>,
}

impl PostseasonInfo {
    pub fn is_postseason(&self) -> bool {
        self.round_name.is_some() || self.seed_a.is_some() || self.seed_b.is_some()
    }
}

/// Builds a lineup from a post already classified as one. `context` is the
/// thread root text, which often carries the team names.
pub fn extract_lineup(post: &Post, context: &str) -> Option<Lineup> {
    let text = post.text.as_str();
    if text.trim().is_empty() {
        return None;
    }
    let combined = if context.is_empty() || context == text {
        text.to_string()
    } else {
        format!("{context}\n{text}")
    };

    let (team_a, team_b) = guess_teams(&combined);
    if team_a.is_none() && team_b.is_none() {
        return None;
    }
    let (roster_a, roster_b) = partition_mentions(text)?;
    let (captain_a, captain_b) = detect_captains(text, &roster_a, &roster_b);
    let postseason = detect_postseason_info(text);

    Some(Lineup {
        post_id: post.id,
        thread_id: post.thread_id,
        posted_at: post.created_at.clone(),
        game_date: post.game_date(),
        team_a: team_a.unwrap_or_default(),
        team_b: team_b.unwrap_or_default(),
        captain_a,
        captain_b,
        roster_a,
        roster_b,
        is_postseason: postseason.is_postseason(),
        seed_a: postseason.seed_a,
        seed_b: postseason.seed_b,
        round_name: postseason.round_name,
    })
}

pub fn guess_teams(text: &str) -> (Option<String>, Option<String>) {
    let lines: Vec<&str> = text.lines().collect();

    if let Some(pair) = first_two_teams(&lines, |ln| {
        RESULT_LINE_RE.captures(ln).map(|c| c[1].to_string())
    }) {
        return pair;
    }
    if let Some(pair) = first_two_teams(&lines, |ln| {
        LEADERBOARD_LINE_RE.captures(ln).map(|c| c[1].to_string())
    }) {
        return pair;
    }
    if let Some(pair) = inline_vs_teams(&lines) {
        return pair;
    }
    positional_teams(&lines)
}

fn first_two_teams(
    lines: &[&str],
    capture: impl Fn(&str) -> Option<String>,
) -> Option<(Option<String>, Option<String>)> {
    let mut found = Vec::with_capacity(2);
    for ln in lines {
        let Some(raw) = capture(ln.trim()) else {
            continue;
        };
        let team = clean_team_name(&raw);
        if !team.is_empty() {
            found.push(team);
        }
        if found.len() == 2 {
            let b = found.pop();
            let a = found.pop();
            return Some((a, b));
        }
    }
    None
}

fn inline_vs_teams(lines: &[&str]) -> Option<(Option<String>, Option<String>)> {
    for ln in lines.iter().take(INLINE_VS_SCAN_LINES) {
        let trimmed = ln.trim();
        if trimmed.contains('@') {
            continue;
        }
        let Some(m) = VS_ANY_RE.find(trimmed) else {
            continue;
        };
        let left = clean_team_name(&trimmed[..m.start()]);
        let right = clean_team_name(&trimmed[m.end()..]);
        if !left.is_empty() && !right.is_empty() {
            return Some((Some(left), Some(right)));
        }
    }
    None
}

fn positional_teams(lines: &[&str]) -> (Option<String>, Option<String>) {
    let divider = find_vs_line(lines).or_else(|| middle_separator(lines));
    if let Some(idx) = divider {
        let team_a = (idx.saturating_sub(TEAM_SCAN_LINES)..idx)
            .rev()
            .find_map(|i| team_line_name(lines[i]));
        let team_b = (idx + 1..lines.len().min(idx + 1 + TEAM_SCAN_LINES))
            .find_map(|i| team_line_name(lines[i]));
        if team_a.is_some() || team_b.is_some() {
            return (team_a, team_b);
        }
    }

    let headers = team_header_lines(lines);
    if headers.len() >= 2 {
        return (
            team_line_name(lines[headers[0]]),
            team_line_name(lines[headers[1]]),
        );
    }
    (None, None)
}

fn team_line_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_mention_line(trimmed) || is_separator_line(trimmed) {
        return None;
    }
    let raw = match TEAM_RECORD_RE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None if trimmed.chars().count() < TEAM_LINE_MAX_CHARS => trimmed.to_string(),
        None => return None,
    };
    let team = clean_team_name(&raw);
    (!team.is_empty()).then_some(team)
}

/// Splits the post's mentions into the two sides. `None` when no divider
/// yields any handle.
pub fn partition_mentions(text: &str) -> Option<(Vec<String>, Vec<String>)> {
    let lines: Vec<&str> = text.lines().collect();

    if let Some(idx) = find_vs_line(&lines) {
        let a = mention_handles(&join_lines(&lines[..idx]));
        let b = mention_handles(&join_lines(&lines[idx + 1..]));
        if !a.is_empty() || !b.is_empty() {
            return Some((a, b));
        }
    }

    if let Some(idx) = middle_separator(&lines) {
        let a = mention_handles(&join_lines(&lines[..idx]));
        let b = mention_handles(&join_lines(&lines[idx + 1..]));
        if !a.is_empty() && !b.is_empty() {
            return Some((a, b));
        }
    }

    let headers = team_header_lines(&lines);
    if headers.len() >= 2 {
        let a = mention_handles(&join_lines(&lines[headers[0]..headers[1]]));
        let b = mention_handles(&join_lines(&lines[headers[1]..]));
        if !a.is_empty() || !b.is_empty() {
            return Some((a, b));
        }
    }

    for ln in &lines {
        let Some(m) = VS_ANY_RE.find(ln) else {
            continue;
        };
        let a = mention_handles(&ln[..m.start()]);
        let b = mention_handles(&ln[m.end()..]);
        if !a.is_empty() || !b.is_empty() {
            return Some((a, b));
        }
    }
    None
}

/// Captain candidates in priority order: explicit `(c)`, a bare trailing `c`,
/// then handles whose trail up to the next mention or line end has nothing
/// alphanumeric once emoji codes are removed.
/// Each handle appears once.
pub fn captain_candidates(text: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let mut push = |handle: &str| {
        if !candidates.iter().any(|c| c == handle) {
            candidates.push(handle.to_string());
        }
    };

    for caps in CAPTAIN_EXPLICIT_RE.captures_iter(text) {
        push(&caps[1]);
    }
    for caps in CAPTAIN_PLAIN_RE.captures_iter(text) {
        push(&caps[1]);
    }

    let mentions = find_mentions(text);
    for (i, mention) in mentions.iter().enumerate() {
        let trail_end = mentions.get(i + 1).map_or(text.len(), |next| next.start);
        let trail = &text[mention.end..trail_end];
        if is_emoji_trail(trail) {
            push(&mention.handle);
        }
    }
    candidates
}

fn is_emoji_trail(trail: &str) -> bool {
    let until_next = trail.trim().split(['@', '\n']).next().unwrap_or("").trim();
    if until_next.is_empty() {
        return false;
    }
    let cleaned = EMOJI_CODE_RE.replace_all(until_next, "");
    !cleaned.chars().any(char::is_alphanumeric)
}

pub fn detect_captains(
    text: &str,
    roster_a: &[String],
    roster_b: &[String],
) -> (Option<String>, Option<String>) {
    let in_roster =
        |roster: &[String], handle: &str| roster.iter().any(|h| h.eq_ignore_ascii_case(handle));

    let mut captain_a: Option<String> = None;
    let mut captain_b: Option<String> = None;
    for candidate in captain_candidates(text) {
        if captain_a.is_none() && in_roster(roster_a, &candidate) {
            captain_a = Some(candidate);
        } else if captain_b.is_none() && in_roster(roster_b, &candidate) {
            captain_b = Some(candidate);
        }
    }
    (captain_a, captain_b)
}

pub fn detect_postseason_info(text: &str) -> PostseasonInfo {
    let lines: Vec<&str> = text.lines().collect();
    let round_name = lines
        .iter()
        .take(ROUND_SCAN_LINES)
        .map(|ln| ln.trim())
        .find(|ln| ROUND_NAME_RE.is_match(ln))
        .map(str::to_string);

    let Some(divider) = find_vs_line(&lines).or_else(|| middle_separator(&lines)) else {
        return PostseasonInfo {
            round_name,
            ..PostseasonInfo::default()
        };
    };

    let seed_a = (divider.saturating_sub(SEED_SCAN_LINES)..divider)
        .rev()
        .find_map(|i| seed_of(lines[i]));
    let seed_b = (divider + 1..lines.len().min(divider + 1 + SEED_SCAN_LINES))
        .find_map(|i| seed_of(lines[i]));

    PostseasonInfo {
        round_name,
        seed_a,
        seed_b,
    }
}

fn seed_of(line: &str) -> Option<u32> {
    let trimmed = line.trim();
    if is_mention_line(trimmed) {
        return None;
    }
    let caps = SEED_TEAM_RE.captures(trimmed)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trail_without_alphanumerics_marks_captain() {
        let cands = captain_candidates("@alice 👑\n@bob, @carol :crown:\n@dave");
        assert_eq!(cands, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn trail_with_words_or_nothing_is_not_a_marker() {
        assert!(captain_candidates("@alice is here\n@bob\n@carol").is_empty());
        assert!(captain_candidates("@alice :fire: now").is_empty());
    }

    #[test]
    fn explicit_outranks_implicit_order() {
        let cands = captain_candidates("@zed 🔥\n@Alice (C)\n@bob c\n");
        assert_eq!(cands, vec!["Alice", "bob", "zed"]);
    }

    #[test]
    fn seeds_scan_outward_from_vs_line() {
        let text = "Semifinals\n(2) Jammers\n@a\n@b\nvs\n(3) Outlaws\n@c\n@d";
        let info = detect_postseason_info(text);
        assert_eq!(info.round_name.as_deref(), Some("Semifinals"));
        assert_eq!(info.seed_a, Some(2));
        assert_eq!(info.seed_b, Some(3));
    }
}
