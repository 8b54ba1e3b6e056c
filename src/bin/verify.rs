// src/bin/verify.rs

use anyhow::{bail, Context, Result};
use clap::Parser;
use contract_rents::{
    aggregate::{enabled, PlaceYearAvailability, CONSOLIDATED_STEM, PLACE_YEAR_FILE},
    config::PipelineConfig,
    output,
    schema::NormalizedRecord,
};
use glob::glob;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(about = "Cross-check normalized, consolidated and lookup artifacts")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();
    let config = PipelineConfig::load(args.config.as_deref())?;

    // 1) Sum rows over every per-year normalized CSV
    let pattern = config
        .normalized_dir()
        .join("contract_rent_*_masterfile.csv")
        .to_string_lossy()
        .into_owned();
    let normalized_paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .collect();
    if normalized_paths.is_empty() {
        bail!("No normalized tables found under '{}'", pattern);
    }
    let mut total_normalized = 0usize;
    for path in &normalized_paths {
        let rows: Vec<NormalizedRecord> = output::read_csv(path)?;
        total_normalized += rows.len();
    }
    info!(files = normalized_paths.len(), rows = total_normalized, "normalized tables");

    // 2) Consolidated CSV and Parquet
    let consolidated_dir = config.consolidated_dir();
    let consolidated: Vec<NormalizedRecord> =
        output::read_csv(consolidated_dir.join(format!("{}.csv", CONSOLIDATED_STEM)))?;
    let parquet_path = consolidated_dir.join(format!("{}.parquet", CONSOLIDATED_STEM));
    let file = File::open(&parquet_path)
        .with_context(|| format!("Failed to open Parquet '{}'", parquet_path.display()))?;
    let reader = SerializedFileReader::new(file)
        .with_context(|| format!("Failed to read Parquet '{}'", parquet_path.display()))?;
    let total_parquet = reader.metadata().file_metadata().num_rows() as usize;

    // 3) Availability lookup against the years actually present per place
    let lookup: PlaceYearAvailability =
        output::read_json(config.lookups_dir().join(PLACE_YEAR_FILE))?;
    let mut observed: BTreeMap<&str, BTreeSet<i32>> = BTreeMap::new();
    for r in &consolidated {
        observed.entry(r.place.as_str()).or_default().insert(r.year);
    }
    let mismatched: Vec<&String> = lookup
        .iter()
        .filter(|(place, options)| {
            enabled(options) != observed.get(place.as_str()).cloned().unwrap_or_default()
        })
        .map(|(place, _)| place)
        .collect();
    let missing_places = observed
        .keys()
        .filter(|p| !lookup.contains_key(**p))
        .count();

    // 4) Print summary table
    //
    // delta = count(artifact) - count(normalized)
    let delta_csv = consolidated.len() as isize - total_normalized as isize;
    let delta_parquet = total_parquet as isize - total_normalized as isize;

    println!("\n{: <25} {:>15} {:>15}", "Artifact", "Rows", "Delta vs years");
    println!("{:-<57}", "");
    println!("{: <25} {:>15} {:>15}", "normalized (per year)", total_normalized, 0);
    println!("{: <25} {:>15} {:>15}", "consolidated csv", consolidated.len(), delta_csv);
    println!("{: <25} {:>15} {:>15}", "consolidated parquet", total_parquet, delta_parquet);
    println!(
        "\n{: <25} {:>15} {:>15}",
        "availability places",
        lookup.len(),
        mismatched.len() + missing_places
    );

    if delta_csv != 0 || delta_parquet != 0 || !mismatched.is_empty() || missing_places > 0 {
        bail!(
            "verification failed: {} mismatched places {:?}, {} places missing from lookup",
            mismatched.len(),
            mismatched,
            missing_places
        );
    }
    Ok(())
}
