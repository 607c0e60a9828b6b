use crate::patterns::{
    CLEAN_LEADING_SEED_RE, CLEAN_TRAILING_RECORD_RE, CLEAN_TRAILING_SCORE_RE, FRAMED_VS_RE,
    MENTION_RE, SEPARATOR_RE, STANDALONE_VS_RE, TEAM_LINE_MAX_CHARS, TEAM_NAME_MAX_CHARS,
    TEAM_RECORD_RE,
};

const TEAM_NAME_TRIM: &[char] = &[' ', '\t', '\n', '\r', '-', '–', ':', '•', '~'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub handle: String,
    pub start: usize,
    pub end: usize,
}

pub fn find_mentions(text: &str) -> Vec<Mention> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Mention {
                handle: caps[1].to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

pub fn mention_handles(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub fn mention_count(text: &str) -> usize {
    MENTION_RE.find_iter(text).count()
}

/// Strips seeds, trailing records and trailing scores from a team label.
/// Repeats until nothing changes, so the result is a fixed point.
pub fn clean_team_name(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_once(raw: &str) -> String {
    let name = raw.trim();
    let name = CLEAN_LEADING_SEED_RE.replace(name, "");
    let name = CLEAN_TRAILING_RECORD_RE.replace(&name, "");
    let name = CLEAN_TRAILING_SCORE_RE.replace(&name, "");
    let name = name.trim_matches(TEAM_NAME_TRIM);
    let truncated: String = name.chars().take(TEAM_NAME_MAX_CHARS).collect();
    truncated.trim_matches(TEAM_NAME_TRIM).to_string()
}

pub fn parse_score(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn is_mention_line(line: &str) -> bool {
    line.trim_start().starts_with('@')
}

pub fn is_separator_line(line: &str) -> bool {
    SEPARATOR_RE.is_match(line.trim())
}

/// Index of the first standalone "vs" line, bare or framed by dashes.
pub fn find_vs_line(lines: &[&str]) -> Option<usize> {
    lines.iter().position(|ln| {
        let trimmed = ln.trim();
        STANDALONE_VS_RE.is_match(trimmed) || FRAMED_VS_RE.is_match(trimmed)
    })
}

/// The middle of two or more dashed separator lines.
pub fn middle_separator(lines: &[&str]) -> Option<usize> {
    let indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, ln)| is_separator_line(ln))
        .map(|(i, _)| i)
        .collect();
    if indices.len() < 2 {
        return None;
    }
    Some(indices[indices.len() / 2])
}

/// Short non-mention "Team (W-L)" header lines, in order.
pub fn team_header_lines(lines: &[&str]) -> Vec<usize> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, ln)| {
            let trimmed = ln.trim();
            !trimmed.is_empty()
                && !is_mention_line(trimmed)
                && trimmed.chars().count() <= TEAM_LINE_MAX_CHARS
                && TEAM_RECORD_RE.is_match(trimmed)
        })
        .map(|(i, _)| i)
        .collect()
}

pub fn join_lines(lines: &[&str]) -> String {
    lines.join("\n")
}

/// Byte offset of each line start, paired with the line itself.
pub fn line_spans(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for line in text.split('\n') {
        spans.push((offset, line.strip_suffix('\r').unwrap_or(line)));
        offset += line.len() + 1;
    }
    spans
}

/// Slice of `text` around `[start, end)`, widened by up to `before`/`after`
/// bytes and snapped inward to char boundaries.
pub fn byte_window(text: &str, start: usize, end: usize, before: usize, after: usize) -> &str {
    let mut lo = start.saturating_sub(before);
    while lo < start && !text.is_char_boundary(lo) {
        lo += 1;
    }
    let mut hi = (end + after).min(text.len());
    while hi > end && !text.is_char_boundary(hi) {
        hi -= 1;
    }
    text.get(lo..hi).unwrap_or("")
}

pub fn normalize_team_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn alphanumeric_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Case-insensitive equality or containment in either direction.
pub fn names_overlap(a: &str, b: &str) -> bool {
    let a = normalize_team_key(a);
    let b = normalize_team_key(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_team_name_strips_decorations() {
        assert_eq!(clean_team_name("(3) Gravediggers (5-2)"), "Gravediggers");
        assert_eq!(clean_team_name("2. Jammers (4-1) - 41,796 ✅"), "Jammers");
        assert_eq!(clean_team_name("  ~ Outlaws ~ "), "Outlaws");
    }

    #[test]
    fn clean_team_name_is_idempotent_on_stacked_noise() {
        for raw in [
            "1. 2. Voyage (1-7) (1-7)",
            "Empire - 32,943 - 1,000",
            "   ",
            "A team name that runs well past the eighty character cap and then keeps going - 5",
        ] {
            let once = clean_team_name(raw);
            assert_eq!(clean_team_name(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn parse_score_handles_grouping_and_garbage() {
        assert_eq!(parse_score("34,565"), Some(34565.0));
        assert_eq!(parse_score("41,796.5"), Some(41796.5));
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("abc"), None);
    }

    #[test]
    fn byte_window_respects_char_boundaries() {
        let text = "🔥🔥@alice (c)";
        let start = text.find('@').unwrap_or(0);
        let window = byte_window(text, start, start + 6, 3, 100);
        assert!(window.ends_with("(c)"));
        assert!(window.starts_with('@'));
    }

    #[test]
    fn middle_separator_picks_center() {
        let lines = ["Header", "---", "@a", "---", "@b", "---"];
        assert_eq!(middle_separator(&lines), Some(3));
        assert_eq!(middle_separator(&lines[..2]), None);
    }
}
