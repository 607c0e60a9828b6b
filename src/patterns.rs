use std::sync::LazyLock;

use regex::Regex;

// Text patterns and linking thresholds shared by every stage.

pub const TEAM_LINE_MAX_CHARS: usize = 50;
pub const TEAM_NAME_MAX_CHARS: usize = 80;
pub const TEAM_SCAN_LINES: usize = 15;
pub const INLINE_VS_SCAN_LINES: usize = 12;
pub const ROUND_SCAN_LINES: usize = 5;
pub const SEED_SCAN_LINES: usize = 10;
pub const SINGLE_RESULT_MAX_LINES: usize = 3;
pub const CAPTAIN_WINDOW_BEFORE: usize = 10;
pub const CAPTAIN_WINDOW_AFTER: usize = 5;

pub const GOTD_MIN_MENTIONS: usize = 4;
pub const LINEUP_MIN_MENTIONS: usize = 2;
pub const SEPARATED_LINEUP_MIN_MENTIONS: usize = 6;
pub const RESULT_MIN_RECORDS: usize = 2;

pub const LINK_DAYS_BACK: i64 = 3;
pub const LINK_WIDE_DAYS: i64 = 7;
pub const BACKFILL_MAX_OFFSET_DAYS: i64 = 2;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

pub static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| re(r"@([A-Za-z0-9._]+)"));
pub static VS_ANY_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bvs\b\.?"));
pub static STANDALONE_VS_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^\s*vs\.?\s*$"));
pub static FRAMED_VS_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)^[-–—~]*\s*vs\.?\s*[-–—~]*$"));
pub static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| re(r"^[-–—~]{3,}$"));

// Comma-grouped numbers only ("34,565"), so ranks and records never count.
pub static GROUPED_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\b\d{1,3}(?:,\d{3})+\b"));
pub static LARGE_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\b\d{2},\d{3}\b|\b[3-9]\d{4}\b"));

pub static TOP_SCORES_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)top\s+team\s+scores"));
pub static MEDIAN_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bmedian\b"));
pub static WINLOSS_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"[✅❌🏆]|:check_mark_button|:cross_mark"));
pub static LINEUPS_WORD_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\blineups?\b"));
pub static RECORD_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\(\d+-\d+(?:-\d+)?\)"));
pub static GOTD_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bGOTD\b"));
pub static SEPARATOR_LINE_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?m)^[-–—~]{3,}\s*$"));

pub static ROUND_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(concat!(
        r"(?i)(RKL\s+Finals?|Finals?|Semi\s*-?\s*Finals?|Quarter\s*-?\s*Finals?|",
        r"Round\s+\d+|Playoffs?\s+Round\s+\d+|Wild\s*Card|Game\s+\d+)"
    ))
});
pub static SEED_TEAM_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*(?:\((\d+)\)|(\d+)\.?\s+)(.+?)(?:\s*\(\d+-\d+\))?\s*$"));

pub static TEAM_RECORD_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^(.+?)\s*\(\d+-\d+(?:-\d+)?\)"));
pub static RESULT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^(.+?)\s*\(\d+-\d+(?:-\d+)?\)\s*[-–:]?\s*\d[\d,]*(?:\.\d+)?\s*(?:✅|❌|:check_mark_button|:cross_mark)")
});
pub static LEADERBOARD_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\d+\.\s*(.+?)\s*\(\d+-\d+(?:-\d+)?\)\s*[-–]\s*\d[\d,]*"));

// Groups: 1 = "(N)" seed, 2 = "N." seed, 3 = team, 4 = wins, 5 = losses,
// 6 = score, 7 = trailing text.
pub static RESULT_FULL_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*(?:\((\d+)\)\s*|(\d+)\.\s*)?(.+?)\s*\((\d+)-(\d+)(?:-\d+)?\)\s*[-–:]?\s*(\d[\d,]*(?:\.\d+)?)\s*(.*)$")
});
pub static WIN_INDICATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"✅+|:check_mark_button|🏆|\(W\)"));
pub static LOSS_INDICATOR_RE: LazyLock<Regex> = LazyLock::new(|| re(r"❌|:cross_mark|\(L\)"));

pub static ADJUSTMENT_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)(advent\s+deduction|deduction|adjustment|penalty|bonus)"));
pub static ADJUSTMENT_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*([A-Za-z][A-Za-z0-9\s]*?)\s+([+-]?\d[\d,]*(?:\.\d+)?)\s*$"));

pub static CAPTAIN_EXPLICIT_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"@([A-Za-z0-9._]+)\s*\([cC]\)"));
pub static CAPTAIN_PLAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"@([A-Za-z0-9._]+)[ \t]+[cC](?:\s|$)"));
pub static EMOJI_CODE_RE: LazyLock<Regex> = LazyLock::new(|| re(r":[a-z_0-9]+:?"));

// "@handle (12,345, 7th)" and "@handle (12,345*1.5, 7th)".
pub static PLAYER_STATS_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)@([A-Za-z0-9._]+)\s*(?:\(c\)\s*)?\(\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(\*\s*1\.5|x\s*1\.5|1\.5\s*[x×])?\s*,\s*(\d+)\s*(?:st|nd|rd|th)?\s*\)")
});
pub static PLAYER_RANK_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)@([A-Za-z0-9._]+)\s*(?:\(c\)\s*)?\(\s*(\d+)\s*(?:st|nd|rd|th)\s*\)"));

// Single-team layouts: "Team (W-L) - score ✅" captures (team, wins, losses,
// score, marker); "Team: score (W-L)" captures (team, score, wins, losses, marker).
pub static SINGLE_RECORD_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*([A-Za-z][A-Za-z\s]*?)\s*\((\d+)-(\d+)\)\s*[-–:]?\s*(\d[\d,]*(?:\.\d+)?)\s*(✅|❌|\(W\)|\(L\))?\s*$")
});
pub static SINGLE_SCORE_FIRST_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*([A-Za-z][A-Za-z\s]*?):\s*(\d[\d,]*(?:\.\d+)?)\s*\((\d+)-(\d+)\)\s*(✅|❌|\(W\)|\(L\))?\s*$")
});

pub static LEADERBOARD_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"^\s*\d+\.\s*(.+?)\s*\(\d+-\d+\)\s*[-–:]\s*(\d[\d,]*(?:\.\d+)?)\s*(?:\(([WL])\)|(✅|❌))?")
});
pub static LEADERBOARD_COLON_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*([A-Za-z][A-Za-z\s]+?):\s*(\d[\d,]*(?:\.\d+)?)\s*\((\d+)-(\d+)\)"));

pub static CLEAN_LEADING_SEED_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\s*(?:\(\d+\)\s*|\d+\.\s*|\d+\s+)"));
pub static CLEAN_TRAILING_RECORD_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"\s*\(\d+-\d+(?:-\d+)?\)\s*$"));
pub static CLEAN_TRAILING_SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"\s*[-–]\s*[\d,]+\s*[✅❌]?\s*$"));

pub static EXHIBITION_PRIMARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b2v2\b",
        r"(?i)\b3v3\b",
        r"(?i)\b4v4\b",
        r"(?i)\b1v1\b",
        r"(?i)\bmarch\s*madness\b",
        r"(?i)\ball[\s-]*star\s*game\b",
        r"(?i)\brising\s*stars?\s*game\b",
        r"(?i)\bgm\s*game\b",
        r"(?i)\bexhibition\b",
    ]
    .iter()
    .map(|p| re(p))
    .collect()
});
pub static EXHIBITION_NEEDS_TOURNEY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:sweet\s*16|elite\s*8|final\s*four)\b",
        r"(?i)\bround\s*of\s*(?:64|32|16|8)\b",
    ]
    .iter()
    .map(|p| re(p))
    .collect()
});
pub static TOURNEY_WORD_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\btourne?y|tournament\b"));
