use crate::model::ContentKind;
use crate::patterns::{
    EXHIBITION_NEEDS_TOURNEY, EXHIBITION_PRIMARY, GOTD_MIN_MENTIONS, GOTD_RE, GROUPED_NUMBER_RE,
    LARGE_SCORE_RE, LINEUP_MIN_MENTIONS, LINEUPS_WORD_RE, MEDIAN_RE, RECORD_RE,
    RESULT_MIN_RECORDS, ROUND_NAME_RE, SEPARATED_LINEUP_MIN_MENTIONS, SEPARATOR_LINE_RE,
    TOP_SCORES_RE, TOURNEY_WORD_RE, VS_ANY_RE, WINLOSS_MARK_RE,
};
use crate::text_util::mention_count;

/// Labels a post by the first rule that fires: leaderboard, result, lineup,
/// otherwise `Other`.
pub fn classify(text: &str) -> ContentKind {
    if text.trim().is_empty() {
        return ContentKind::Other;
    }
    if TOP_SCORES_RE.is_match(text) || MEDIAN_RE.is_match(text) {
        return ContentKind::Leaderboard;
    }
    if looks_like_result(text) {
        return ContentKind::Result;
    }
    if looks_like_lineup(text) {
        return ContentKind::Lineup;
    }
    ContentKind::Other
}

fn looks_like_result(text: &str) -> bool {
    if WINLOSS_MARK_RE.is_match(text) && GROUPED_NUMBER_RE.is_match(text) {
        return true;
    }
    RECORD_RE.find_iter(text).count() >= RESULT_MIN_RECORDS && LARGE_SCORE_RE.is_match(text)
}

fn looks_like_lineup(text: &str) -> bool {
    let mentions = mention_count(text);
    let has_vs = VS_ANY_RE.is_match(text);
    let has_separator = SEPARATOR_LINE_RE.is_match(text);

    if (has_vs || LINEUPS_WORD_RE.is_match(text)) && mentions >= LINEUP_MIN_MENTIONS {
        return true;
    }
    if GOTD_RE.is_match(text) && mentions >= GOTD_MIN_MENTIONS {
        return true;
    }
    if ROUND_NAME_RE.is_match(text)
        && mentions >= LINEUP_MIN_MENTIONS
        && (has_vs || has_separator)
    {
        return true;
    }
    mentions >= SEPARATED_LINEUP_MIN_MENTIONS && has_separator
}

/// Side events (small-sided games, all-star and bracket tournaments) that do
/// not count toward league records.
pub fn is_exhibition(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if EXHIBITION_PRIMARY.iter().any(|re| re.is_match(text)) {
        return true;
    }
    TOURNEY_WORD_RE.is_match(text) && EXHIBITION_NEEDS_TOURNEY.iter().any(|re| re.is_match(text))
}
