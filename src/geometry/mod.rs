// src/geometry/mod.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::HashMap, fs::File, io::BufReader, path::Path};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::process::utils::parse_coordinate;

/// Per-tract metadata pulled from one year's geometry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TractGeometry {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Place the tract was assigned to when the geometry was built.
    pub place: Option<String>,
}

/// GEO_ID → tract metadata for one year.
#[derive(Debug, Clone, Default)]
pub struct GeometryIndex {
    tracts: HashMap<String, TractGeometry>,
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

impl GeometryIndex {
    pub fn from_tracts(tracts: impl IntoIterator<Item = (String, TractGeometry)>) -> Self {
        Self {
            tracts: tracts.into_iter().collect(),
        }
    }

    /// Parse a GeoJSON FeatureCollection. Only feature properties are read;
    /// the shapes themselves are served to the map untouched.
    pub fn from_geojson_str(text: &str) -> serde_json::Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        Ok(Self::from_collection(collection))
    }

    fn from_collection(collection: FeatureCollection) -> Self {
        let mut tracts = HashMap::with_capacity(collection.features.len());
        for props in collection.features.into_iter().filter_map(|f| f.properties) {
            let Some(geo_id) = props.get("GEO_ID").and_then(value_as_string) else {
                debug!("geometry feature without GEO_ID skipped");
                continue;
            };
            let lat = props.get("INTPTLAT").and_then(value_as_coordinate);
            let lon = props.get("INTPTLON").and_then(value_as_coordinate);
            let place = props
                .get("PLACE")
                .or_else(|| props.get("ABBREV_NAME"))
                .and_then(value_as_string)
                .filter(|p| !p.is_empty());
            tracts.insert(geo_id, TractGeometry { lat, lon, place });
        }
        Self { tracts }
    }

    pub fn get(&self, geo_id: &str) -> Option<&TractGeometry> {
        self.tracts.get(geo_id)
    }

    /// Centroid for `geo_id`, if the tract is present and carries both coordinates.
    pub fn centroid(&self, geo_id: &str) -> Option<(f64, f64)> {
        self.get(geo_id).and_then(|t| t.lat.zip(t.lon))
    }

    pub fn place(&self, geo_id: &str) -> Option<&str> {
        self.get(geo_id).and_then(|t| t.place.as_deref())
    }

    pub fn len(&self) -> usize {
        self.tracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracts.is_empty()
    }
}

/// Load `contract_rent_mastergeometry_{year}.json`. A missing or unreadable
/// file is fatal for the year.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_geometry<P: AsRef<Path>>(path: P, year: i32) -> Result<GeometryIndex> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::MissingSource {
            kind: "geometry file",
            year,
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = File::open(path).with_context(|| format!("opening geometry {:?}", path))?;
    let collection: FeatureCollection =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| PipelineError::MalformedSource {
            kind: "geometry file",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let index = GeometryIndex::from_collection(collection);
    info!(year, tracts = index.len(), "loaded geometry");
    Ok(index)
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_coordinate(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_coordinate(Some(s.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": null,
             "properties": {"GEO_ID": "1400000US06037570301", "INTPTLAT": "+34.0000000", "INTPTLON": "-118.0000000", "PLACE": "Long Beach"}},
            {"type": "Feature", "geometry": null,
             "properties": {"GEO_ID": "1400000US06037570302", "INTPTLAT": 34.1, "INTPTLON": -118.2}},
            {"type": "Feature", "geometry": null,
             "properties": {"GEO_ID": "1400000US06037570303", "INTPTLAT": null}},
            {"type": "Feature", "geometry": null, "properties": {"NAME": "no id"}}
        ]
    }"#;

    #[test]
    fn indexes_by_geo_id() -> Result<()> {
        let idx = GeometryIndex::from_geojson_str(SAMPLE)?;
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.centroid("1400000US06037570301"), Some((34.0, -118.0)));
        assert_eq!(idx.centroid("1400000US06037570302"), Some((34.1, -118.2)));
        assert_eq!(idx.centroid("1400000US06037570303"), None);
        assert_eq!(idx.place("1400000US06037570301"), Some("Long Beach"));
        assert_eq!(idx.place("1400000US06037570302"), None);
        assert_eq!(idx.centroid("missing"), None);
        Ok(())
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempdir().unwrap();
        let err = load_geometry(dir.path().join("nope.json"), 2015).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingSource { year: 2015, .. })
        ));
    }

    #[test]
    fn malformed_file_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json")?;
        let err = load_geometry(&path, 2015).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MalformedSource { .. })
        ));
        Ok(())
    }
}
