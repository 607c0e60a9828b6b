use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use rkl_recon::cli::{arg_value, init_tracing, write_json};
use rkl_recon::comment_store;
use rkl_recon::model::Post;
use rkl_recon::pipeline::run_pipeline;

const DEFAULT_OUT_DIR: &str = "out";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let posts = load_input_posts()?;
    if posts.is_empty() {
        return Err(anyhow!("no posts to process"));
    }

    let out_dir = arg_value("--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let output = run_pipeline(&posts);
    write_json(&out_dir.join("lineups.json"), &output.batch.lineups)?;
    write_json(&out_dir.join("results.json"), &output.batch.results)?;
    write_json(&out_dir.join("games.json"), &output.link.games)?;
    write_json(
        &out_dir.join("summary.json"),
        &serde_json::json!({
            "parse": output.batch.summary,
            "link": output.link.summary,
        }),
    )?;

    let parse = &output.batch.summary;
    let link = &output.link.summary;
    println!("Reconstruction complete");
    println!("Output: {}", out_dir.display());
    println!(
        "Posts: {} in {} threads ({} exhibition threads skipped)",
        parse.posts, parse.threads, parse.exhibition_threads
    );
    println!(
        "Classified: lineup={} result={} leaderboard={} other={}",
        parse.lineup_posts, parse.result_posts, parse.leaderboard_posts, parse.other_posts
    );
    println!(
        "Extracted: lineups={} (rejected {}) results={} (rejected {}) singles={} leaderboard rows={}",
        parse.lineups,
        parse.rejected_lineups,
        parse.results,
        parse.rejected_results,
        parse.single_team_results,
        parse.leaderboard_rows
    );
    println!(
        "Games: {} matched={} (wide {}) swapped={} result_only={} lineup_only={} paired singles={} backfilled={}",
        output.link.games.len(),
        link.matched,
        link.matched_wide,
        link.swapped,
        link.result_only,
        link.lineup_only,
        link.single_team_pairs,
        link.backfilled
    );
    Ok(())
}

/// `--posts` alone reads a JSON export. With `--db` as well, the export is
/// upserted into the store first and the store becomes the source.
fn load_input_posts() -> Result<Vec<Post>> {
    let posts_path = arg_value("--posts").map(PathBuf::from);
    let db_path = arg_value("--db").map(PathBuf::from);
    let from = arg_value("--from");
    let to = arg_value("--to");

    match (posts_path, db_path) {
        (Some(posts_path), None) => {
            let posts = comment_store::load_posts_json(&posts_path)?;
            Ok(filter_range(posts, from.as_deref(), to.as_deref()))
        }
        (posts_path, Some(db_path)) => {
            let mut conn = comment_store::open_db(&db_path)?;
            if let Some(posts_path) = posts_path {
                let posts = comment_store::load_posts_json(&posts_path)?;
                let written = comment_store::insert_posts(&mut conn, &posts)?;
                println!("Imported {written} posts into {}", db_path.display());
            }
            comment_store::load_posts(&conn, from.as_deref(), to.as_deref())
        }
        (None, None) => Err(anyhow!("pass --posts <file.json> and/or --db <comments.sqlite>")),
    }
}

fn filter_range(posts: Vec<Post>, from: Option<&str>, to: Option<&str>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|p| from.is_none_or(|f| p.created_at.as_str() >= f))
        .filter(|p| to.is_none_or(|t| p.created_at.as_str() < t))
        .collect()
}
