// src/aggregate/mod.rs

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

pub mod availability;
pub mod centers;

pub use availability::{
    enabled, place_year_availability, year_place_availability, PlaceYearAvailability,
    Universe, YearPlaceAvailability,
};
pub use centers::geo_centers;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{self, columnar};
use crate::process::normalized_csv_path;
use crate::reference::{load_reference, PlaceCatalog};
use crate::schema::{GeoCenter, NormalizedRecord};

pub const CONSOLIDATED_STEM: &str = "contract_rent_masterfile";
pub const PLACE_YEAR_FILE: &str = "place_year_options.json";
pub const YEAR_PLACE_FILE: &str = "year_place_options.json";
pub const CENTERS_STEM: &str = "geo_centers";

/// Everything the aggregator produces from one set of per-year tables.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub consolidated: Vec<NormalizedRecord>,
    pub place_years: PlaceYearAvailability,
    pub year_places: YearPlaceAvailability,
    pub centers: Vec<GeoCenter>,
}

/// Concatenate per-year tables and sort by (YEAR, GEO_ID). No rows are
/// removed; the key is already unique.
pub fn consolidate(tables: Vec<Vec<NormalizedRecord>>) -> Vec<NormalizedRecord> {
    let mut all: Vec<NormalizedRecord> = tables.into_iter().flatten().collect();
    all.sort_by(|a, b| (a.year, &a.geo_id).cmp(&(b.year, &b.geo_id)));
    all
}

pub fn aggregate(
    tables: Vec<Vec<NormalizedRecord>>,
    config: &PipelineConfig,
    catalog: &PlaceCatalog,
) -> Aggregate {
    let consolidated = consolidate(tables);
    let universe = Universe::new(config.years(), catalog, &consolidated);
    let place_years = place_year_availability(&consolidated, &universe);
    let year_places = year_place_availability(&consolidated, &universe, catalog);
    availability::check_declared_ranges(&place_years, catalog);
    let centers = geo_centers(&consolidated);
    info!(
        rows = consolidated.len(),
        places = universe.places.len(),
        years = universe.years.len(),
        centers = centers.len(),
        "aggregated"
    );
    Aggregate {
        consolidated,
        place_years,
        year_places,
        centers,
    }
}

/// Read back every configured year's normalized CSV. A missing year is fatal.
pub fn load_normalized_tables(config: &PipelineConfig) -> Result<Vec<Vec<NormalizedRecord>>> {
    config
        .years()
        .map(|year| {
            let path = normalized_csv_path(config, year);
            if !path.is_file() {
                return Err(PipelineError::MissingSource {
                    kind: "normalized table",
                    year,
                    path,
                }
                .into());
            }
            output::read_csv::<NormalizedRecord, _>(&path)
        })
        .collect()
}

/// The place catalog named by the config, or an empty one.
pub fn load_catalog(config: &PipelineConfig) -> Result<PlaceCatalog> {
    match &config.reference {
        Some(path) => load_reference(path),
        None => Ok(PlaceCatalog::default()),
    }
}

/// Write the consolidated table and the lookup tables.
pub fn write_artifacts(config: &PipelineConfig, agg: &Aggregate) -> Result<Vec<PathBuf>> {
    let consolidated_dir = config.consolidated_dir();
    let lookups_dir = config.lookups_dir();

    let (csv_path, json_path) =
        output::write_records(&consolidated_dir, CONSOLIDATED_STEM, &agg.consolidated)?;
    let parquet_path = consolidated_dir.join(format!("{}.parquet", CONSOLIDATED_STEM));
    columnar::write_parquet(&parquet_path, &agg.consolidated)
        .context("writing consolidated parquet")?;

    let place_year_path = lookups_dir.join(PLACE_YEAR_FILE);
    output::write_json(&place_year_path, &agg.place_years)?;
    let year_place_path = lookups_dir.join(YEAR_PLACE_FILE);
    output::write_json(&year_place_path, &agg.year_places)?;
    let (centers_csv, centers_json) =
        output::write_records(&lookups_dir, CENTERS_STEM, &agg.centers)?;

    let written = vec![
        csv_path,
        json_path,
        parquet_path,
        place_year_path,
        year_place_path,
        centers_csv,
        centers_json,
    ];
    for p in &written {
        info!(path = %p.display(), "wrote artifact");
    }
    Ok(written)
}

/// Aggregate the normalized tables already on disk.
pub fn aggregate_all(config: &PipelineConfig) -> Result<Aggregate> {
    let tables = load_normalized_tables(config)?;
    let catalog = load_catalog(config)?;
    let agg = aggregate(tables, config, &catalog);
    write_artifacts(config, &agg)?;
    Ok(agg)
}
