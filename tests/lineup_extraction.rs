use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rkl_recon::lineup_extract::{captain_candidates, detect_captains, extract_lineup, guess_teams};
use rkl_recon::model::Post;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn post(id: i64, created_at: &str, text: &str) -> Post {
    Post {
        id,
        thread_id: id,
        parent_id: None,
        created_at: created_at.to_string(),
        text: text.to_string(),
    }
}

fn names(handles: &[&str]) -> Vec<String> {
    handles.iter().map(|h| h.to_string()).collect()
}

#[test]
fn vs_layout_yields_teams_rosters_and_captains() {
    let lineup = extract_lineup(
        &post(1, "2025-03-04T23:30:00Z", &read_fixture("lineup_vs.txt")),
        "",
    )
    .expect("lineup should extract");
    assert_eq!(lineup.team_a, "Jammers");
    assert_eq!(lineup.team_b, "Outlaws");
    assert_eq!(lineup.roster_a, names(&["alice", "bob", "carol"]));
    assert_eq!(lineup.roster_b, names(&["dave", "erin", "frank"]));
    assert_eq!(lineup.captain_a.as_deref(), Some("alice"));
    assert_eq!(lineup.captain_b.as_deref(), Some("dave"));
    assert!(!lineup.is_postseason);
    assert_eq!(lineup.game_date, NaiveDate::from_ymd_opt(2025, 3, 4));
}

#[test]
fn separator_layout_reads_round_and_seeds() {
    let lineup = extract_lineup(
        &post(2, "2025-04-20T20:00:00Z", &read_fixture("lineup_separators.txt")),
        "",
    )
    .expect("lineup should extract");
    assert_eq!(lineup.team_a, "Jammers");
    assert_eq!(lineup.team_b, "Outlaws");
    assert_eq!(lineup.roster_a, names(&["amy", "ben"]));
    assert_eq!(lineup.roster_b, names(&["cal", "dee"]));
    assert_eq!(lineup.round_name.as_deref(), Some("Playoffs Round 1"));
    assert_eq!(lineup.seed_a, Some(2));
    assert_eq!(lineup.seed_b, Some(7));
    assert!(lineup.is_postseason);
}

#[test]
fn team_names_come_from_thread_context() {
    let reply = Post {
        id: 11,
        thread_id: 10,
        parent_id: Some(10),
        created_at: "2025-03-04T23:30:00Z".to_string(),
        text: "@a\n@b\nvs\n@c\n@d".to_string(),
    };
    let lineup = extract_lineup(&reply, "Jammers vs Outlaws").expect("context supplies teams");
    assert_eq!(lineup.team_a, "Jammers");
    assert_eq!(lineup.team_b, "Outlaws");
    assert_eq!(lineup.roster_a, names(&["a", "b"]));
    assert_eq!(lineup.roster_b, names(&["c", "d"]));
    assert_eq!(lineup.thread_id, 10);

    assert!(extract_lineup(&reply, "").is_none());
}

#[test]
fn rejects_lineups_without_mentions() {
    assert!(extract_lineup(&post(3, "2025-03-04T23:30:00Z", "Jammers vs Outlaws"), "").is_none());
    assert!(extract_lineup(&post(4, "2025-03-04T23:30:00Z", "   "), "").is_none());
}

#[test]
fn team_discovery_prefers_result_lines() {
    let (a, b) = guess_teams(&read_fixture("result_glyphs.txt"));
    assert_eq!(a.as_deref(), Some("TeamX"));
    assert_eq!(b.as_deref(), Some("TeamY"));

    let (a, b) = guess_teams("1. Empire (4-0) - 40,100\n2. Voyage (0-4) - 22,000");
    assert_eq!(a.as_deref(), Some("Empire"));
    assert_eq!(b.as_deref(), Some("Voyage"));
}

#[test]
fn explicit_captain_marker_ignores_emoji_and_case() {
    for text in [
        "@alice (c)",
        "🔥🔥 @alice (c) 🔥",
        "@ALICE (C)",
        "@Alice(c) :crown:",
    ] {
        let candidates = captain_candidates(text);
        assert!(
            candidates.iter().any(|c| c.eq_ignore_ascii_case("alice")),
            "no captain in {text:?}"
        );
    }
}

#[test]
fn punctuation_trail_is_an_implicit_captain() {
    let text = "Jammers\n@bob, @amy\nvs\nOutlaws\n@cal\n@dee -";
    assert_eq!(captain_candidates(text), names(&["bob", "dee"]));
    let (a, b) = detect_captains(text, &names(&["bob", "amy"]), &names(&["cal", "dee"]));
    assert_eq!(a.as_deref(), Some("bob"));
    assert_eq!(b.as_deref(), Some("dee"));
}

#[test]
fn captains_assigned_by_roster_membership() {
    let text = "@Bob (c)\n@amy\nvs\n@cal c\n@dee";
    let (a, b) = detect_captains(text, &names(&["bob", "amy"]), &names(&["cal", "dee"]));
    assert_eq!(a.as_deref(), Some("Bob"));
    assert_eq!(b.as_deref(), Some("cal"));

    let (a, b) = detect_captains("@x (c)", &names(&["amy"]), &names(&["cal"]));
    assert!(a.is_none() && b.is_none());
}
