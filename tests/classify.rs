use std::fs;
use std::path::PathBuf;

use rkl_recon::classify::{classify, is_exhibition};
use rkl_recon::model::ContentKind;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn leaderboard_wins_over_everything_else() {
    assert_eq!(classify(&read_fixture("leaderboard.txt")), ContentKind::Leaderboard);
    assert_eq!(
        classify("Median tonight was 31,000 ✅ (3-1) (2-2)"),
        ContentKind::Leaderboard
    );
}

#[test]
fn glyphs_with_grouped_numbers_are_results() {
    assert_eq!(classify(&read_fixture("result_glyphs.txt")), ContentKind::Result);
    assert_eq!(classify(&read_fixture("result_player_stats.txt")), ContentKind::Result);
}

#[test]
fn records_with_large_scores_are_results_without_glyphs() {
    assert_eq!(classify(&read_fixture("result_plain.txt")), ContentKind::Result);
    assert_eq!(
        classify("Jammers (3-1) 41250\nOutlaws (1-3) 39800"),
        ContentKind::Result
    );
}

#[test]
fn small_numbers_do_not_make_a_result() {
    assert_eq!(classify("Jammers (3-1)\nOutlaws (1-3)\nranks 12 and 40"), ContentKind::Other);
}

#[test]
fn lineup_variants() {
    assert_eq!(classify(&read_fixture("lineup_vs.txt")), ContentKind::Lineup);
    assert_eq!(classify(&read_fixture("lineup_separators.txt")), ContentKind::Lineup);
    assert_eq!(classify("Lineups are in\n@a @b"), ContentKind::Lineup);
    assert_eq!(classify("GOTD\n@a @b @c @d"), ContentKind::Lineup);
    assert_eq!(
        classify("@a\n@b\n@c\n---\n@d\n@e\n@f"),
        ContentKind::Lineup
    );
}

#[test]
fn thresholds_below_minimum_are_other() {
    assert_eq!(classify("GOTD\n@a @b @c"), ContentKind::Other);
    assert_eq!(classify("@a vs"), ContentKind::Other);
    assert_eq!(classify("@a\n@b\n---\n@c"), ContentKind::Other);
    assert_eq!(classify("   "), ContentKind::Other);
    assert_eq!(classify("gg everyone"), ContentKind::Other);
}

#[test]
fn exhibition_filter() {
    assert!(is_exhibition("2v2 exhibition tonight"));
    assert!(is_exhibition("All-Star Game lineups"));
    assert!(is_exhibition("Sweet 16 of the tourney"));
    assert!(is_exhibition("Round of 32 - tournament bracket"));
    assert!(!is_exhibition("Sweet 16 vibes"));
    assert!(!is_exhibition("Round 2\n@a vs @b"));
    assert!(!is_exhibition(""));
}
