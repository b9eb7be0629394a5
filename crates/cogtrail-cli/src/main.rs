//! `cogtrail` — reconstruct the timeline of French municipalities.
//!
//! Reads the INSEE registry snapshot, its modification history and the
//! population tables, replays every administrative event, and exports
//! the full interval history as CSV.
//!
//! # Usage
//!
//! ```
//! cogtrail --sources sources --output exports
//! cogtrail 2015-01-01 2016-01-01   # extra point-in-time snapshots
//! COGTRAIL_SOURCES=... cogtrail --config cogtrail.toml
//! ```

mod export;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use cogtrail_core::{
  actions::replay,
  graph::{chain_gaps, compute_ancestors},
  population::compute_populations,
  specials::apply_special_cases,
  store::Towns,
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
  name = "cogtrail",
  about = "Reconstruct the historical timeline of French municipalities"
)]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "cogtrail.toml")]
  config: PathBuf,

  /// Directory holding the INSEE source files.
  #[arg(long)]
  sources: Option<PathBuf>,

  /// Directory the exports are written to.
  #[arg(long)]
  output: Option<PathBuf>,

  /// Extra point-in-time snapshot exports (YYYY-MM-DD), one file each.
  dates: Vec<NaiveDate>,
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Shape of the optional TOML config file; every field has a default and
/// can be overridden by `COGTRAIL_*` environment variables or CLI flags.
#[derive(Deserialize, Debug)]
struct Settings {
  #[serde(default = "default_sources")]
  sources: PathBuf,
  #[serde(default = "default_output")]
  output:  PathBuf,
}

fn default_sources() -> PathBuf { PathBuf::from("sources") }

fn default_output() -> PathBuf { PathBuf::from("exports") }

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("COGTRAIL"))
    .build()
    .context("failed to read configuration")?;
  let mut settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  // CLI flags win over config file and environment.
  if let Some(sources) = cli.sources {
    settings.sources = sources;
  }
  if let Some(output) = cli.output {
    settings.output = output;
  }

  // Load.
  let snapshot =
    cogtrail_insee::load_towns(settings.sources.join("france2016.txt"))
      .context("loading towns snapshot")?;
  let history =
    cogtrail_insee::load_history(settings.sources.join("historiq2016.txt"))
      .context("loading modification history")?;
  let populations = cogtrail_insee::load_populations(&settings.sources)
    .context("loading population tables")?;
  tracing::info!(
    towns = snapshot.len(),
    records = history.len(),
    "sources loaded"
  );

  // Replay. Order matters throughout: generic rules, then the manual
  // overlay, then ancestors, then populations (which fall back on
  // ancestor sums).
  let mut towns = Towns::from_iter(snapshot);
  replay(&mut towns, &history).context("replaying history")?;
  apply_special_cases(&mut towns).context("applying special cases")?;
  let dangling = compute_ancestors(&mut towns);
  let gaps = chain_gaps(&towns).len();
  tracing::info!(
    intervals = towns.len(),
    dangling,
    gaps,
    "timeline reconstructed"
  );
  compute_populations(&populations, &mut towns);

  // Export.
  std::fs::create_dir_all(&settings.output).with_context(|| {
    format!("creating output directory {}", settings.output.display())
  })?;
  let full = settings.output.join("towns.csv");
  export::write_full(&full, &towns)?;
  export::write_head(&full, 100)?;
  for date in cli.dates {
    let snapshot_path =
      settings.output.join(format!("towns_{date}.csv"));
    export::write_valid_at(
      &snapshot_path,
      &towns,
      date.and_time(NaiveTime::MIN),
    )?;
    tracing::info!(date = %date, path = %snapshot_path.display(), "snapshot written");
  }
  tracing::info!(path = %full.display(), "export written");

  Ok(())
}
