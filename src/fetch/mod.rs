// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

pub mod acs;

pub use acs::{AcsBatch, AcsClient, AcsRow};

use crate::config::PipelineConfig;
use crate::geometry::{load_geometry, GeometryIndex};
use crate::history::{History, FETCHED};
use crate::output;
use crate::process::utils::tract_label;

/// Turn the API rows of one year into raw-extract columns and rows.
///
/// Tracts are tagged with the place their geometry was assigned to; a tract
/// that belongs to no place is not part of any place's map and is dropped.
/// Rows come out sorted by GEO_ID.
pub fn build_raw_extract(
    year: i32,
    estimate_columns: &[String],
    mut rows: Vec<AcsRow>,
    geometry: &GeometryIndex,
) -> (Vec<String>, Vec<Vec<String>>) {
    let mut headers: Vec<String> = ["YEAR", "PLACE", "GEO_ID", "NAME"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    headers.extend(estimate_columns.iter().cloned());

    rows.sort_by(|a, b| a.geo_id.cmp(&b.geo_id));
    let total = rows.len();
    let out: Vec<Vec<String>> = rows
        .into_iter()
        .filter_map(|row| {
            let place = geometry.place(&row.geo_id)?.to_string();
            let mut cells = vec![year.to_string(), place, row.geo_id.clone(), tract_label(&row.name)];
            cells.extend(
                estimate_columns
                    .iter()
                    .map(|c| row.estimates.get(c).cloned().flatten().unwrap_or_default()),
            );
            Some(cells)
        })
        .collect();

    let dropped = total - out.len();
    if dropped > 0 {
        info!(year, dropped, "tracts outside every place dropped");
    }
    if total > 0 && out.is_empty() {
        warn!(year, "geometry assigns no tract to a place; raw extract is empty");
    }
    (headers, out)
}

/// Fetch every county batch of `year` and write its raw extract.
/// Returns the number of rows written.
pub async fn collect_year(client: &AcsClient, config: &PipelineConfig, year: i32) -> Result<usize> {
    let geometry = load_geometry(config.geometry_path(year), year)?;

    let mut rows = Vec::new();
    for county in &config.county_fips {
        let batch = AcsBatch {
            year,
            state: config.state_fips.clone(),
            county: county.clone(),
        };
        rows.extend(client.fetch_batch(&batch).await?);
    }

    let (headers, cells) = build_raw_extract(year, &client.estimate_columns(), rows, &geometry);
    let path = config.raw_path(year);
    output::write_csv_rows(&path, &headers, &cells)
        .with_context(|| format!("writing raw extract for {}", year))?;
    info!(year, rows = cells.len(), path = %path.display(), "wrote raw extract");
    Ok(cells.len())
}

/// Collect every configured year, skipping years already in the history
/// unless `force` is set. Stops at the first failing year; earlier years stay
/// on disk and in the history.
pub async fn collect_all(config: &PipelineConfig, force: bool) -> Result<()> {
    let key = config.api_key()?;
    let client = AcsClient::new(Client::new(), config, key);
    let history = History::new(&config.dirs.history)?;
    let done = history.years_with_event(FETCHED)?;

    for year in config.years() {
        if !force && done.contains(&year) && config.raw_path(year).is_file() {
            info!(year, "already fetched; skipping");
            continue;
        }
        let rows = collect_year(&client, config, year)
            .await
            .with_context(|| format!("collecting {}", year))?;
        history.record_event(year, FETCHED, rows as u64)?;
    }
    Ok(())
}
