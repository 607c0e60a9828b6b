use std::cell::Cell;
use std::rc::Rc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rkl_recon::config::ResolverConfig;
use rkl_recon::identity::{HandleEvidence, IdentityResolver, collect_evidence};
use rkl_recon::karma_source::{KarmaSource, StaticKarmaSource};
use rkl_recon::model::{
    CompleteGame, Confidence, GameKind, GameType, KarmaRow, MatchMethod, PlayerStat, RankedDay,
    Verification,
};
use rkl_recon::ranked_history::StaticHistorySource;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
}

fn row(d: u32, id: &str, name: &str, rank: i64) -> KarmaRow {
    KarmaRow {
        scrape_date: day(d),
        user_id: id.to_string(),
        username: name.to_string(),
        amount: 1000.0 - rank as f64,
        rank,
    }
}

fn history_day(d: u32, rank: i64) -> RankedDay {
    RankedDay {
        day: day(d),
        rank,
        karma: 0.0,
    }
}

fn evidence(handle: &str, ranks: &[(u32, i64)]) -> HandleEvidence {
    HandleEvidence {
        handle: handle.to_string(),
        known_id: None,
        appearances: ranks.iter().map(|(d, _)| day(*d)).collect(),
        expected_ranks: ranks.iter().map(|(d, r)| (day(*d), *r)).collect(),
    }
}

fn config() -> ResolverConfig {
    ResolverConfig {
        history_request_delay: Duration::ZERO,
        ..ResolverConfig::default()
    }
}

fn resolver(
    rows: Vec<KarmaRow>,
    history: StaticHistorySource,
) -> IdentityResolver<StaticKarmaSource, StaticHistorySource> {
    IdentityResolver::new(StaticKarmaSource::new(rows), history, config())
}

fn game(d: u32, stats: Vec<PlayerStat>) -> CompleteGame {
    CompleteGame {
        game_id: 1,
        game_date: Some(day(d)),
        kind: GameKind::ResultOnly,
        game_type: GameType::Regular,
        team_a: "Jammers".to_string(),
        team_b: "Outlaws".to_string(),
        captain_a: None,
        captain_b: None,
        roster_a: vec!["Amy".to_string()],
        roster_b: Vec::new(),
        score_a: None,
        score_b: None,
        winner: None,
        adjustment_a: None,
        adjustment_b: None,
        player_stats: stats,
        seed_a: None,
        seed_b: None,
        round_name: None,
        swapped: false,
        backfilled: false,
        lineup_post_id: None,
        result_post_id: Some(1),
        lineup_thread_id: None,
        result_thread_id: Some(1),
    }
}

fn stat(handle: &str, rank: i64) -> PlayerStat {
    let mut stat = PlayerStat::new(handle);
    stat.rank = Some(rank);
    stat
}

#[test]
fn fuzzy_matching_never_uses_ambiguous_usernames() {
    let mut foob = evidence("foob", &[]);
    foob.appearances.insert(day(4));
    let mut fooo = evidence("fooo", &[]);
    fooo.appearances.insert(day(4));
    let mut foo = evidence("foo", &[]);
    foo.appearances.insert(day(4));
    let mut near = evidence("foobarr", &[]);
    near.appearances.insert(day(4));
    let mut resolver = resolver_with_rows();
    let output = resolver
        .resolve_all(&[foob, fooo, foo, near])
        .expect("snapshot has rows");

    // "fooo" and "foo" are closest to the shared username "foo".
    for handle in ["foob", "fooo", "foo"] {
        assert!(
            resolver.record(handle).and_then(|r| r.canonical_id.clone()).is_none(),
            "{handle} should stay unresolved"
        );
    }
    let near = resolver.record("foobarr").expect("close to foobar");
    assert_eq!(near.canonical_id.as_deref(), Some("id3"));
    assert_eq!(near.method, MatchMethod::UsernameFuzzy);
    assert_eq!(near.confidence, Confidence::Medium);
    assert!(output.records.iter().all(|r| {
        r.canonical_id.as_deref() != Some("id1") && r.canonical_id.as_deref() != Some("id2")
    }));
    assert_eq!(output.summary.no_match, 3);
}

#[test]
fn fuzzy_ratio_tolerates_username_suffix() {
    let mut ev = evidence("dunkmaster", &[]);
    ev.appearances.insert(day(4));
    let mut resolver = resolver(vec![row(4, "u8", "dunkmaster23", 40)], StaticHistorySource::new(10));
    resolver.resolve_all(&[ev]).expect("resolves");
    let record = resolver.record("dunkmaster").expect("suffix match");
    assert_eq!(record.canonical_id.as_deref(), Some("u8"));
    assert_eq!(record.method, MatchMethod::UsernameFuzzy);
    assert_eq!(record.confidence, Confidence::Medium);
    assert_eq!(record.snapshot_ranks.get(&day(4)), Some(&40));
}

fn resolver_with_rows() -> IdentityResolver<StaticKarmaSource, StaticHistorySource> {
    resolver(
        vec![
            row(4, "id1", "foo", 1),
            row(4, "id2", "foo", 2),
            row(4, "id3", "foobar", 3),
        ],
        StaticHistorySource::new(10),
    )
}

#[test]
fn exact_username_match_is_case_insensitive() {
    let mut ev = evidence("dunkmaster", &[]);
    ev.appearances.insert(day(4));
    let mut resolver = resolver(
        vec![row(4, "u7", "DunkMaster", 12), row(4, "u8", "dunkmaster23", 40)],
        StaticHistorySource::new(10),
    );
    resolver.resolve_all(&[ev]).expect("resolves");
    let record = resolver.record("DunkMaster").expect("exact match");
    assert_eq!(record.canonical_id.as_deref(), Some("u7"));
    assert_eq!(record.method, MatchMethod::UsernameExact);
    assert_eq!(record.confidence, Confidence::High);
    assert_eq!(record.snapshot_ranks.get(&day(4)), Some(&12));
}

#[test]
fn high_confidence_records_are_never_replaced() {
    let mut ev = evidence("alice", &[(4, 300), (5, 310)]);
    ev.known_id = Some("u1".to_string());
    let rows = vec![
        row(4, "u1", "alice_real", 900),
        row(5, "u1", "alice_real", 905),
        row(4, "u9", "alice", 300),
        row(5, "u9", "alice", 310),
    ];
    let mut resolver = resolver(rows, StaticHistorySource::new(10));
    let out = resolver.resolve_all(&[ev]).expect("resolves");
    let record = resolver.record("alice").expect("direct record");
    assert_eq!(record.canonical_id.as_deref(), Some("u1"));
    assert_eq!(record.method, MatchMethod::Direct);
    assert_eq!(record.confidence, Confidence::High);
    assert_eq!(out.summary.by_method.get("direct"), Some(&1));
}

#[test]
fn known_id_missing_from_snapshots_is_outside_population() {
    let mut ev = evidence("olly", &[]);
    ev.appearances.insert(day(4));
    ev.known_id = Some("ghost".to_string());
    let mut resolver = resolver(vec![row(4, "u1", "olly", 5)], StaticHistorySource::new(10));
    let out = resolver.resolve_all(&[ev]).expect("resolves");
    let record = resolver.record("olly").expect("recorded");
    assert_eq!(record.method, MatchMethod::OutsideKnownPopulation);
    assert_eq!(record.confidence, Confidence::None);
    assert!(!record.is_usable());
    assert_eq!(out.summary.outside_population, 1);
    assert_eq!(out.summary.resolved, 0);
}

#[test]
fn known_id_without_snapshot_data_is_not_high() {
    let mut kim = evidence("kim", &[]);
    kim.appearances.insert(day(5));
    kim.known_id = Some("u3".to_string());
    let mut amy = evidence("amy", &[]);
    amy.appearances.insert(day(4));
    let mut resolver = resolver(
        vec![row(4, "u1", "amy", 5), row(4, "u2", "kim", 6)],
        StaticHistorySource::new(10),
    );
    resolver.resolve_all(&[kim, amy]).expect("day 4 has rows");
    let record = resolver.record("kim").expect("direct record");
    assert_eq!(record.canonical_id.as_deref(), Some("u3"));
    assert_eq!(record.method, MatchMethod::Direct);
    assert_eq!(record.confidence, Confidence::Medium);
    assert_eq!(record.verification, Verification::Unverified);
    assert!(record.snapshot_ranks.is_empty());
}

#[test]
fn unique_rank_pattern_survivor_is_high() {
    let rows = vec![
        row(4, "idK", "k_one", 42),
        row(5, "idK", "k_one", 44),
        row(4, "idX", "x_two", 200),
        row(5, "idX", "x_two", 10),
    ];
    let mut resolver = resolver(rows, StaticHistorySource::new(10));
    resolver
        .resolve_all(&[evidence("kim", &[(4, 40), (5, 45)])])
        .expect("resolves");
    let record = resolver.record("kim").expect("rank match");
    assert_eq!(record.canonical_id.as_deref(), Some("idK"));
    assert_eq!(record.method, MatchMethod::RankPattern);
    assert_eq!(record.confidence, Confidence::High);
    assert!(!record.uncertain);
}

#[test]
fn disjoint_rank_candidates_leave_handle_unresolved() {
    let rows = vec![
        row(4, "idA", "qwerty", 100),
        row(4, "idB", "asdfgh", 300),
        row(5, "idA", "qwerty", 900),
        row(5, "idB", "asdfgh", 500),
    ];
    let mut resolver = resolver(rows, StaticHistorySource::new(10));
    let out = resolver
        .resolve_all(&[evidence("zed", &[(4, 100), (5, 500)])])
        .expect("resolves");
    assert!(resolver.record("zed").is_none());
    assert_eq!(out.summary.no_match, 1);
    assert!(out.records.is_empty());
}

fn ambiguous_rank_rows() -> Vec<KarmaRow> {
    vec![
        row(4, "idP", "p_user", 52),
        row(5, "idP", "p_user", 61),
        row(4, "idQ", "q_user", 70),
        row(5, "idQ", "q_user", 80),
    ]
}

#[test]
fn uncertain_rank_match_rejected_by_history() {
    let mut history = StaticHistorySource::new(10);
    history.insert("idP", vec![history_day(4, 70), history_day(5, 61)]);
    let mut resolver = resolver(ambiguous_rank_rows(), history);
    let out = resolver
        .resolve_all(&[evidence("lee", &[(4, 50), (5, 60)])])
        .expect("resolves");

    let record = resolver.record("lee").expect("record is kept");
    assert_eq!(record.canonical_id.as_deref(), Some("idP"));
    assert_eq!(record.confidence, Confidence::Medium);
    assert!(record.uncertain);
    assert_eq!(record.candidate_count, Some(2));
    assert_eq!(record.verification, Verification::Rejected);
    assert!(!record.is_usable());
    assert_eq!(out.summary.rejected, 1);

    let mut games = vec![game(4, vec![stat("lee", 50)])];
    assert_eq!(resolver.attach_identities(&mut games), 0);
    assert!(games[0].player_stats[0].canonical_id.is_none());
}

#[test]
fn uncertain_rank_match_verified_by_history() {
    let mut history = StaticHistorySource::new(10);
    history.insert("idP", vec![history_day(4, 53), history_day(5, 61)]);
    let mut resolver = resolver(ambiguous_rank_rows(), history);
    let out = resolver
        .resolve_all(&[evidence("lee", &[(4, 50), (5, 60)])])
        .expect("resolves");
    let record = resolver.record("lee").expect("record");
    assert_eq!(record.verification, Verification::Verified);
    assert_eq!(out.summary.verified, 1);
    assert_eq!(out.summary.uncertain, 1);
}

#[test]
fn history_strategy_picks_lowest_average_deviation() {
    let mut history = StaticHistorySource::new(1);
    history.insert(
        "idM",
        vec![history_day(2, 90), history_day(3, 101), history_day(4, 104)],
    );
    history.insert("idN", vec![history_day(4, 140)]);
    let rows = vec![row(4, "idM", "m_one", 110), row(4, "idN", "n_two", 140)];
    let mut resolver = resolver(rows, history);
    let out = resolver
        .resolve_all(&[evidence("max", &[(4, 100)])])
        .expect("resolves");
    let record = resolver.record("max").expect("history match");
    assert_eq!(record.canonical_id.as_deref(), Some("idM"));
    assert_eq!(record.method, MatchMethod::RankedHistory);
    assert_eq!(record.confidence, Confidence::High);
    assert_eq!(out.summary.history_fetches, 2);
}

#[test]
fn no_snapshot_rows_for_any_date_is_fatal() {
    let mut resolver = resolver(Vec::new(), StaticHistorySource::new(10));
    let err = resolver.resolve_all(&[evidence("amy", &[(4, 10)])]);
    assert!(err.is_err());

    let mut empty = resolver_with_rows();
    let out = empty.resolve_all(&[]).expect("no evidence is fine");
    assert_eq!(out.summary.handles, 0);
}

struct CountingKarma {
    inner: StaticKarmaSource,
    calls: Rc<Cell<usize>>,
    failing: NaiveDate,
}

impl KarmaSource for CountingKarma {
    fn rows_for_date(&self, date: NaiveDate) -> Result<Vec<KarmaRow>> {
        self.calls.set(self.calls.get() + 1);
        if date == self.failing {
            return Err(anyhow!("snapshot service unavailable"));
        }
        self.inner.rows_for_date(date)
    }
}

#[test]
fn snapshots_fetched_once_and_failures_degrade() {
    let calls = Rc::new(Cell::new(0));
    let karma = CountingKarma {
        inner: StaticKarmaSource::new(vec![row(4, "u7", "dunkmaster", 12)]),
        calls: Rc::clone(&calls),
        failing: day(5),
    };
    let mut resolver = IdentityResolver::new(karma, StaticHistorySource::new(10), config());
    let evidence = vec![
        evidence("dunkmaster", &[(4, 12), (5, 14)]),
        evidence("other", &[(4, 500), (5, 510)]),
    ];
    let out = resolver.resolve_all(&evidence).expect("one date has rows");
    assert_eq!(out.summary.fetch_failures, 1);
    assert_eq!(out.summary.snapshot_dates, 2);
    assert!(resolver.record("dunkmaster").is_some());

    let mut games = vec![
        game(4, vec![stat("DunkMaster", 12)]),
        game(5, vec![stat("dunkmaster", 14)]),
    ];
    assert_eq!(resolver.attach_identities(&mut games), 2);
    assert_eq!(games[0].player_stats[0].karma_rank, Some(12));
    assert_eq!(games[1].player_stats[0].karma_rank, None);
    assert_eq!(calls.get(), 2);
}

#[test]
fn evidence_merges_rosters_stats_and_known_ids() {
    let mut with_id = stat("Bo", 7);
    with_id.canonical_id = Some("u42".to_string());
    let games = vec![
        game(4, vec![stat("amy", 12), with_id]),
        game(5, vec![stat("AMY", 15)]),
    ];
    let known = HashMap::from([("AMY".to_string(), "u1".to_string())]);
    let evidence = collect_evidence(&games, &known);
    assert_eq!(evidence.len(), 2);

    let amy = &evidence[0];
    assert_eq!(amy.handle, "amy");
    assert_eq!(amy.known_id.as_deref(), Some("u1"));
    assert_eq!(amy.appearances, BTreeSet::from([day(4), day(5)]));
    assert_eq!(amy.expected_ranks, BTreeMap::from([(day(4), 12), (day(5), 15)]));

    let bo = &evidence[1];
    assert_eq!(bo.handle, "bo");
    assert_eq!(bo.known_id.as_deref(), Some("u42"));
}
