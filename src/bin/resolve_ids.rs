use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use rkl_recon::cli::{arg_value, init_tracing, read_json, write_json};
use rkl_recon::config::{ResolverConfig, SourceConfig};
use rkl_recon::identity::{IdentityResolver, ResolveOutput, collect_evidence};
use rkl_recon::karma_source::{KarmaSource, StaticKarmaSource, SupabaseKarmaSource};
use rkl_recon::model::CompleteGame;
use rkl_recon::ranked_history::{RankedHistorySource, RealRankedDaysSource, StaticHistorySource};

const DEFAULT_OUT_DIR: &str = "out";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let games_path = arg_value("--games")
        .map(PathBuf::from)
        .context("--games <games.json> is required")?;
    let out_dir = arg_value("--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    let mut games: Vec<CompleteGame> = read_json(&games_path)?;
    let known_ids: HashMap<String, String> = match arg_value("--known") {
        Some(path) => read_json(Path::new(&path))?,
        None => HashMap::new(),
    };

    let sources = SourceConfig::from_env();
    let resolver_config = ResolverConfig::from_env();

    let karma: Box<dyn KarmaSource> = match arg_value("--karma-json") {
        Some(path) => Box::new(StaticKarmaSource::from_json_file(Path::new(&path))?),
        None => Box::new(SupabaseKarmaSource::from_config(&sources).map_err(|err| {
            anyhow!("{err}; pass --karma-json <export.json> to run offline")
        })?),
    };
    let history: Box<dyn RankedHistorySource> = if sources.real_auth_token.is_some() {
        Box::new(RealRankedDaysSource::from_config(&sources)?)
    } else {
        tracing::warn!("REAL_AUTH_TOKEN not set, ranked history strategy disabled");
        Box::new(StaticHistorySource::new(1))
    };

    let evidence = collect_evidence(&games, &known_ids);
    let mut resolver = IdentityResolver::new(karma, history, resolver_config);
    let ResolveOutput { records, summary } = resolver.resolve_all(&evidence)?;
    let attached = resolver.attach_identities(&mut games);

    write_json(&out_dir.join("identities.json"), &records)?;
    write_json(&out_dir.join("games_with_ids.json"), &games)?;
    write_json(&out_dir.join("identity_summary.json"), &summary)?;

    println!("Identity resolution complete");
    println!("Output: {}", out_dir.display());
    println!(
        "Handles: {} resolved={} no_match={} outside_population={}",
        summary.handles, summary.resolved, summary.no_match, summary.outside_population
    );
    println!(
        "Uncertain: {} verified={} rejected={}",
        summary.uncertain, summary.verified, summary.rejected
    );
    for (method, count) in &summary.by_method {
        println!("method {method}: {count}");
    }
    for (confidence, count) in &summary.by_confidence {
        println!("confidence {confidence}: {count}");
    }
    println!(
        "Snapshots: {} dates, {} rows; history fetches={} failures={}",
        summary.snapshot_dates,
        summary.snapshot_rows,
        summary.history_fetches,
        summary.fetch_failures
    );
    println!("Player stats with ids: {attached}");
    Ok(())
}
