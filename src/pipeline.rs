use std::collections::BTreeMap;
use std::env;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::classify::{classify, is_exhibition};
use crate::dates::parse_timestamp;
use crate::linker::{LinkOutput, build_leaderboard_index, link_games};
use crate::lineup_extract::extract_lineup;
use crate::model::{ContentKind, GameResult, LeaderboardScore, Lineup, Post, SingleTeamResult};
use crate::result_extract::{extract_leaderboard_scores, extract_result, extract_single_team_result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub posts: usize,
    pub threads: usize,
    pub exhibition_threads: usize,
    pub exhibition_posts: usize,
    pub leaderboard_posts: usize,
    pub result_posts: usize,
    pub lineup_posts: usize,
    pub other_posts: usize,
    pub lineups: usize,
    pub results: usize,
    pub rejected_lineups: usize,
    pub rejected_results: usize,
    pub single_team_results: usize,
    pub leaderboard_rows: usize,
}

impl RunSummary {
    fn absorb(&mut self, other: &RunSummary) {
        self.posts += other.posts;
        self.threads += other.threads;
        self.exhibition_threads += other.exhibition_threads;
        self.exhibition_posts += other.exhibition_posts;
        self.leaderboard_posts += other.leaderboard_posts;
        self.result_posts += other.result_posts;
        self.lineup_posts += other.lineup_posts;
        self.other_posts += other.other_posts;
        self.lineups += other.lineups;
        self.results += other.results;
        self.rejected_lineups += other.rejected_lineups;
        self.rejected_results += other.rejected_results;
        self.single_team_results += other.single_team_results;
        self.leaderboard_rows += other.leaderboard_rows;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub lineups: Vec<Lineup>,
    pub results: Vec<GameResult>,
    pub singles: Vec<SingleTeamResult>,
    pub leaderboard: Vec<(NaiveDate, LeaderboardScore)>,
    pub summary: RunSummary,
}

impl ParsedBatch {
    fn extend(&mut self, other: ParsedBatch) {
        self.lineups.extend(other.lineups);
        self.results.extend(other.results);
        self.singles.extend(other.singles);
        self.leaderboard.extend(other.leaderboard);
        self.summary.absorb(&other.summary);
    }
}

pub struct PipelineOutput {
    pub batch: ParsedBatch,
    pub link: LinkOutput,
}

/// Classifies and extracts every post, then links the records into games.
pub fn run_pipeline(posts: &[Post]) -> PipelineOutput {
    let batch = process_posts(posts);
    let leaderboard = build_leaderboard_index(&batch.leaderboard);
    let link = link_games(&batch.lineups, &batch.results, &batch.singles, &leaderboard);
    info!(
        games = link.games.len(),
        matched = link.summary.matched,
        result_only = link.summary.result_only,
        lineup_only = link.summary.lineup_only,
        "linked games"
    );
    PipelineOutput { batch, link }
}

/// Threads run in parallel; posts inside a thread run in timestamp order.
/// Output order does not depend on scheduling.
pub fn process_posts(posts: &[Post]) -> ParsedBatch {
    let threads = group_threads(posts);
    let pool = build_parse_pool();
    let per_thread: Vec<ParsedBatch> = with_parse_pool(&pool, || {
        threads
            .par_iter()
            .map(|thread| process_thread(thread))
            .collect()
    });

    let mut merged = ParsedBatch::default();
    for batch in per_thread {
        merged.extend(batch);
    }
    merged
        .lineups
        .sort_by_key(|lu| (parse_timestamp(&lu.posted_at), lu.post_id));
    merged
        .results
        .sort_by_key(|r| (parse_timestamp(&r.posted_at), r.post_id));
    merged
        .singles
        .sort_by_key(|s| (parse_timestamp(&s.posted_at), s.post_id));
    info!(
        posts = merged.summary.posts,
        threads = merged.summary.threads,
        lineups = merged.summary.lineups,
        results = merged.summary.results,
        singles = merged.summary.single_team_results,
        "parsed posts"
    );
    merged
}

fn group_threads(posts: &[Post]) -> Vec<Vec<&Post>> {
    let mut threads: BTreeMap<i64, Vec<&Post>> = BTreeMap::new();
    for post in posts {
        threads.entry(post.thread_id).or_default().push(post);
    }
    threads
        .into_values()
        .map(|mut thread| {
            thread.sort_by_key(|p| (parse_timestamp(&p.created_at), p.id));
            thread
        })
        .collect()
}

fn process_thread(thread: &[&Post]) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    batch.summary.threads = 1;
    batch.summary.posts = thread.len();

    let root_text = thread
        .iter()
        .find(|p| p.is_thread_root())
        .map_or("", |p| p.text.as_str());
    if is_exhibition(root_text) {
        batch.summary.exhibition_threads = 1;
        batch.summary.exhibition_posts = thread.len();
        return batch;
    }

    for post in thread {
        if is_exhibition(&post.text) {
            batch.summary.exhibition_posts += 1;
            continue;
        }
        process_post(post, root_text, &mut batch);
    }
    batch
}

fn process_post(post: &Post, root_text: &str, batch: &mut ParsedBatch) {
    let kind = classify(&post.text);
    let summary = &mut batch.summary;
    match kind {
        ContentKind::Leaderboard => {
            summary.leaderboard_posts += 1;
            let Some(date) = post.game_date() else {
                debug!(post_id = post.id, "leaderboard post without usable timestamp");
                return;
            };
            let rows = extract_leaderboard_scores(&post.text);
            summary.leaderboard_rows += rows.len();
            batch.leaderboard.extend(rows.into_iter().map(|row| (date, row)));
            return;
        }
        ContentKind::Lineup => {
            summary.lineup_posts += 1;
            let context = if post.is_thread_root() { "" } else { root_text };
            if let Some(lineup) = extract_lineup(post, context) {
                summary.lineups += 1;
                batch.lineups.push(lineup);
                return;
            }
        }
        ContentKind::Result => {
            summary.result_posts += 1;
            if let Some(result) = extract_result(post) {
                summary.results += 1;
                batch.results.push(result);
                return;
            }
        }
        ContentKind::Other => summary.other_posts += 1,
    }

    if let Some(single) = extract_single_team_result(post) {
        batch.summary.single_team_results += 1;
        batch.singles.push(single);
        return;
    }
    // Rejected only when the single-team reading fails too.
    match kind {
        ContentKind::Lineup => batch.summary.rejected_lineups += 1,
        ContentKind::Result => batch.summary.rejected_results += 1,
        ContentKind::Leaderboard | ContentKind::Other => {}
    }
}

fn build_parse_pool() -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(parse_parallelism())
        .build()
        .ok()
}

fn with_parse_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

fn parse_parallelism() -> usize {
    env::var("PARSE_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(6)
        .clamp(1, 32)
}
