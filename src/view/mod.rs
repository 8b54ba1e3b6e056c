// src/view/mod.rs

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::aggregate::{
    enabled, PlaceYearAvailability, YearPlaceAvailability, CENTERS_STEM, CONSOLIDATED_STEM,
    PLACE_YEAR_FILE, YEAR_PLACE_FILE,
};
use crate::config::PipelineConfig;
use crate::output;
use crate::schema::{AvailabilityOption, GeoCenter, GeoPoint, NormalizedRecord};

pub const NO_TRACT_TITLE: &str = "Please click on a tract.";

/// The three display strings shown for one tract-year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentDisplay {
    pub median: String,
    pub p25: String,
    pub p75: String,
}

impl From<&NormalizedRecord> for RentDisplay {
    fn from(r: &NormalizedRecord) -> Self {
        Self {
            median: r.median.clone(),
            p25: r.p25.clone(),
            p75: r.p75.clone(),
        }
    }
}

/// Data behind the choropleth of one place in one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub title: String,
    pub geojson_url: String,
    pub locations: Vec<String>,
    pub z: Vec<Option<f64>>,
    pub names: Vec<String>,
    pub displays: Vec<RentDisplay>,
    pub center: Option<GeoPoint>,
    /// GEO_IDs of the selected tract, outlined on top of the choropleth.
    pub highlight: Vec<String>,
}

/// Time series of one tract's median rent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotView {
    pub title: String,
    pub years: Vec<i32>,
    pub medians: Vec<Option<f64>>,
    pub displays: Vec<RentDisplay>,
}

/// Read-only context built once from the aggregator's artifacts.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    records: Vec<NormalizedRecord>,
    place_years: PlaceYearAvailability,
    year_places: YearPlaceAvailability,
    centers: BTreeMap<(i32, String), GeoPoint>,
    geometry_base_url: String,
}

impl Dashboard {
    pub fn new(
        records: Vec<NormalizedRecord>,
        place_years: PlaceYearAvailability,
        year_places: YearPlaceAvailability,
        centers: Vec<GeoCenter>,
        geometry_base_url: impl Into<String>,
    ) -> Self {
        Self {
            records,
            place_years,
            year_places,
            centers: centers
                .into_iter()
                .map(|c| ((c.year, c.place.clone()), c.point()))
                .collect(),
            geometry_base_url: geometry_base_url.into(),
        }
    }

    pub fn load(config: &PipelineConfig) -> Result<Self> {
        let consolidated = config
            .consolidated_dir()
            .join(format!("{}.csv", CONSOLIDATED_STEM));
        let lookups = config.lookups_dir();

        let records: Vec<NormalizedRecord> =
            output::read_csv(&consolidated).context("loading consolidated table")?;
        let place_years = output::read_json(lookups.join(PLACE_YEAR_FILE))?;
        let year_places = output::read_json(lookups.join(YEAR_PLACE_FILE))?;
        let centers: Vec<GeoCenter> =
            output::read_json(lookups.join(format!("{}.json", CENTERS_STEM)))?;
        debug!(rows = records.len(), centers = centers.len(), "dashboard loaded");

        Ok(Self::new(
            records,
            place_years,
            year_places,
            centers,
            config.geometry_base_url.clone(),
        ))
    }

    /// Year options for `place`; empty for an unknown place.
    pub fn year_options(&self, place: &str) -> &[AvailabilityOption<i32>] {
        self.place_years
            .get(place)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Place options for `year`; empty for an unknown year.
    pub fn place_options(&self, year: i32) -> &[AvailabilityOption<String>] {
        self.year_places
            .get(&year)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Tract names of `place` in `year`, in GEO_ID order.
    pub fn tract_options(&self, place: &str, year: i32) -> Vec<String> {
        self.rows(place, year).map(|r| r.name.clone()).collect()
    }

    pub fn map_view(&self, place: &str, year: i32, tract: Option<&str>) -> MapView {
        let rows: Vec<&NormalizedRecord> = self.rows(place, year).collect();
        let highlight = match tract {
            Some(t) => rows
                .iter()
                .filter(|r| r.name == t)
                .map(|r| r.geo_id.clone())
                .collect(),
            None => Vec::new(),
        };
        MapView {
            title: map_title(place, year),
            geojson_url: geometry_url(&self.geometry_base_url, place, year),
            locations: rows.iter().map(|r| r.geo_id.clone()).collect(),
            z: rows.iter().map(|r| r.median_estimate).collect(),
            names: rows.iter().map(|r| r.name.clone()).collect(),
            displays: rows.iter().map(|r| RentDisplay::from(*r)).collect(),
            center: self.centers.get(&(year, place.to_string())).copied(),
            highlight,
        }
    }

    /// `None` until a tract is selected, or when the tract has no rows.
    pub fn plot_view(&self, place: &str, tract: Option<&str>) -> Option<PlotView> {
        let tract = tract?;
        let mut rows: Vec<&NormalizedRecord> = self
            .records
            .iter()
            .filter(|r| r.place == place && r.name == tract)
            .collect();
        rows.sort_by_key(|r| r.year);
        let first = rows.first()?.year;
        let last = rows.last()?.year;
        Some(PlotView {
            title: format!("Median Contract Rents, {} to {}", first, last),
            years: rows.iter().map(|r| r.year).collect(),
            medians: rows.iter().map(|r| r.median_estimate).collect(),
            displays: rows.iter().map(|r| RentDisplay::from(*r)).collect(),
        })
    }

    fn rows<'a>(&'a self, place: &'a str, year: i32) -> impl Iterator<Item = &'a NormalizedRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| r.year == year && r.place == place)
    }
}

/// Most recent enabled year, if any.
pub fn default_year(options: &[AvailabilityOption<i32>]) -> Option<i32> {
    enabled(options).into_iter().next_back()
}

pub fn map_title(place: &str, year: i32) -> String {
    format!("Median Contract Rents in {} by Census Tract, {}", place, year)
}

pub fn plot_title(place: &str, tract: Option<&str>) -> String {
    match tract {
        Some(t) => format!("{}, {}", place, t),
        None => NO_TRACT_TITLE.to_string(),
    }
}

/// Per-place geometry file for the map.
pub fn geometry_url(base: &str, place: &str, year: i32) -> String {
    let compact: String = place.chars().filter(|c| !c.is_whitespace()).collect();
    format!(
        "{}/{}/contract_rent_mastergeometry_{}_{}.json",
        base.trim_end_matches('/'),
        year,
        year,
        compact
    )
}
