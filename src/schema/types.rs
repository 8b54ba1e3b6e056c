// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// One row of a per-year raw extract as it sits on disk.
///
/// Numeric and derived columns are read as text so that a malformed cell
/// degrades to null instead of rejecting the whole file. The derived columns
/// are only present when the file has already been normalized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceRow {
    #[serde(rename = "YEAR")]
    pub year: i32,
    #[serde(rename = "PLACE", alias = "ABBREV_NAME")]
    pub place: String,
    #[serde(rename = "GEO_ID")]
    pub geo_id: String,
    #[serde(rename = "NAME", alias = "TRACT")]
    pub name: String,
    #[serde(rename = "B25058_001E", default)]
    pub median: Option<String>,
    #[serde(rename = "B25057_001E", default)]
    pub p25: Option<String>,
    #[serde(rename = "B25059_001E", default)]
    pub p75: Option<String>,
    #[serde(rename = "INTPTLAT", default)]
    pub lat: Option<String>,
    #[serde(rename = "INTPTLON", default)]
    pub lon: Option<String>,
    #[serde(rename = "Median", default)]
    pub median_display: Option<String>,
    #[serde(rename = "25th", default)]
    pub p25_display: Option<String>,
    #[serde(rename = "75th", default)]
    pub p75_display: Option<String>,
}

/// One tract-year of the normalized table. Field order is the column order
/// of every CSV artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(rename = "YEAR")]
    pub year: i32,
    #[serde(rename = "PLACE")]
    pub place: String,
    #[serde(rename = "GEO_ID")]
    pub geo_id: String,
    #[serde(rename = "NAME")]
    pub name: String,
    /// Raw median estimate, kept for the map's color scale.
    #[serde(rename = "B25058_001E")]
    pub median_estimate: Option<f64>,
    #[serde(rename = "INTPTLAT")]
    pub lat: Option<f64>,
    #[serde(rename = "INTPTLON")]
    pub lon: Option<f64>,
    /// Constant 1, used by the map to highlight a selected tract.
    pub dummy: u8,
    #[serde(rename = "Median")]
    pub median: String,
    #[serde(rename = "75th")]
    pub p75: String,
    #[serde(rename = "25th")]
    pub p25: String,
}

impl NormalizedRecord {
    pub fn centroid(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }
}

/// A rounded (latitude, longitude) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Map center of one place in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCenter {
    #[serde(rename = "YEAR")]
    pub year: i32,
    #[serde(rename = "PLACE")]
    pub place: String,
    #[serde(rename = "LAT")]
    pub lat: f64,
    #[serde(rename = "LON")]
    pub lon: f64,
}

impl GeoCenter {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// A dropdown option, disabled when there is no data behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityOption<V> {
    pub label: String,
    pub value: V,
    #[serde(default)]
    pub disabled: bool,
}
