// src/process/mod.rs
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{
    collections::HashSet,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub mod derive;
pub mod utils;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::geometry::{load_geometry, GeometryIndex};
use crate::output;
use crate::schema::{NormalizedRecord, SourceRow, DERIVED_COLUMNS, MEDIAN_COLUMN, P25_COLUMN, P75_COLUMN};
use derive::{display_rent, is_display_string};
use utils::{parse_coordinate, parse_estimate};

/// One year's extract as read from disk.
#[derive(Debug)]
pub struct SourceTable {
    pub year: i32,
    /// Column names from the header row, in file order.
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

impl SourceTable {
    /// Parse CSV text. `origin` is only used in error messages.
    pub fn from_reader<R: Read>(reader: R, year: i32, origin: &Path) -> Result<Self> {
        let malformed = |reason: String| PipelineError::MalformedSource {
            kind: "source table",
            path: origin.to_path_buf(),
            reason,
        };

        let mut rdr = ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in rdr.deserialize::<SourceRow>().enumerate() {
            let row = result.map_err(|e| malformed(format!("record {}: {}", idx, e)))?;
            rows.push(row);
        }

        let table = Self {
            year,
            headers,
            rows,
        };
        if !table.is_normalized() {
            for col in [MEDIAN_COLUMN, P25_COLUMN, P75_COLUMN] {
                if !table.has_column(col) {
                    return Err(malformed(format!("missing estimate column {}", col)).into());
                }
            }
        }
        Ok(table)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// The display columns are already present, so deriving them again must
    /// not touch the table.
    pub fn is_normalized(&self) -> bool {
        DERIVED_COLUMNS.iter().all(|c| self.has_column(c))
    }
}

/// Load `contract_rent_masterfile_{year}.csv`. Missing or unparseable files
/// are fatal for the run.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_source_table<P: AsRef<Path>>(path: P, year: i32) -> Result<SourceTable> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::MissingSource {
            kind: "source table",
            year,
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = File::open(path).with_context(|| format!("opening source table {:?}", path))?;
    let table = SourceTable::from_reader(file, year, path)?;
    info!(year, rows = table.rows.len(), normalized = table.is_normalized(), "loaded source table");
    Ok(table)
}

/// Left-join `table` against `geometry` on GEO_ID and derive the display
/// columns. Returns one record per input row, in input order.
///
/// A table that already carries the display columns is passed through
/// unchanged.
pub fn normalize_table(table: &SourceTable, geometry: &GeometryIndex) -> Vec<NormalizedRecord> {
    if table.is_normalized() {
        debug!(year = table.year, "table already normalized; passing through");
        return table.rows.iter().map(passthrough).collect();
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(table.rows.len());
    let mut misses = 0usize;
    let mut off_year = 0usize;

    let records: Vec<NormalizedRecord> = table
        .rows
        .iter()
        .map(|row| {
            if !seen.insert(row.geo_id.as_str()) {
                warn!(year = row.year, geo_id = %row.geo_id, "duplicate GEO_ID in source table");
            }
            if row.year != table.year {
                off_year += 1;
            }
            let centroid = geometry.centroid(&row.geo_id);
            if centroid.is_none() {
                misses += 1;
                warn!(year = row.year, geo_id = %row.geo_id, "no centroid in geometry; keeping row with null coordinates");
            }
            derive_record(row, centroid)
        })
        .collect();

    if off_year > 0 {
        warn!(year = table.year, rows = off_year, "rows carry a YEAR other than the file's year");
    }
    info!(year = table.year, rows = records.len(), join_misses = misses, "normalized table");
    records
}

fn derive_record(row: &SourceRow, centroid: Option<(f64, f64)>) -> NormalizedRecord {
    let median = parse_estimate(row.median.as_deref());
    let p25 = parse_estimate(row.p25.as_deref());
    let p75 = parse_estimate(row.p75.as_deref());
    NormalizedRecord {
        year: row.year,
        place: row.place.clone(),
        geo_id: row.geo_id.clone(),
        name: row.name.clone(),
        median_estimate: median,
        lat: centroid.map(|c| c.0),
        lon: centroid.map(|c| c.1),
        dummy: 1,
        median: display_rent(median, row.year),
        p75: display_rent(p75, row.year),
        p25: display_rent(p25, row.year),
    }
}

fn passthrough(row: &SourceRow) -> NormalizedRecord {
    let median = parse_estimate(row.median.as_deref());
    // An empty display cell is re-derived; anything else is kept verbatim.
    let keep = |shown: &Option<String>, raw: &Option<String>| match shown.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => {
            if !is_display_string(s) {
                debug!(geo_id = %row.geo_id, value = s, "unrecognized display string kept as is");
            }
            s.to_string()
        }
        _ => display_rent(parse_estimate(raw.as_deref()), row.year),
    };
    NormalizedRecord {
        year: row.year,
        place: row.place.clone(),
        geo_id: row.geo_id.clone(),
        name: row.name.clone(),
        median_estimate: median,
        lat: parse_coordinate(row.lat.as_deref()),
        lon: parse_coordinate(row.lon.as_deref()),
        dummy: 1,
        median: keep(&row.median_display, &row.median),
        p75: keep(&row.p75_display, &row.p75),
        p25: keep(&row.p25_display, &row.p25),
    }
}

/// File stem of a year's normalized artifacts.
pub fn normalized_stem(year: i32) -> String {
    format!("contract_rent_{}_masterfile", year)
}

pub fn normalized_csv_path(config: &PipelineConfig, year: i32) -> PathBuf {
    config
        .normalized_dir()
        .join(format!("{}.csv", normalized_stem(year)))
}

/// Normalize one configured year end to end: load the raw extract and the
/// geometry, join, derive, and write the CSV and JSON artifacts.
pub fn normalize_year(config: &PipelineConfig, year: i32) -> Result<Vec<NormalizedRecord>> {
    let table = load_source_table(config.raw_path(year), year)?;
    let records = if table.is_normalized() {
        normalize_table(&table, &GeometryIndex::default())
    } else {
        let geometry = load_geometry(config.geometry_path(year), year)?;
        normalize_table(&table, &geometry)
    };
    let (csv_path, json_path) =
        output::write_records(config.normalized_dir(), &normalized_stem(year), &records)
            .with_context(|| format!("writing normalized table for {}", year))?;
    info!(year, csv = %csv_path.display(), json = %json_path.display(), "wrote normalized table");
    Ok(records)
}

/// Normalize every configured year, in order. The first failing year aborts
/// the run; years already written stay on disk.
pub fn normalize_all(config: &PipelineConfig) -> Result<Vec<Vec<NormalizedRecord>>> {
    config.years().map(|year| normalize_year(config, year)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TractGeometry;
    use crate::output::read_csv;
    use std::fs;
    use tempfile::tempdir;

    const RAW_2014: &str = "\
YEAR,PLACE,GEO_ID,NAME,B25057_001E,B25058_001E,B25059_001E
2014,Long Beach,g1,Census Tract 1,900,1200,1500
2014,Long Beach,g2,Census Tract 2,,2001,2001
2014,Long Beach,g3,Census Tract 3,800,abc,1100.0
";

    fn geometry() -> GeometryIndex {
        GeometryIndex::from_tracts([
            (
                "g1".to_string(),
                TractGeometry {
                    lat: Some(34.0),
                    lon: Some(-118.0),
                    place: None,
                },
            ),
            (
                "g2".to_string(),
                TractGeometry {
                    lat: Some(34.1),
                    lon: Some(-118.2),
                    place: None,
                },
            ),
        ])
    }

    fn table(text: &str, year: i32) -> Result<SourceTable> {
        SourceTable::from_reader(text.as_bytes(), year, Path::new("test.csv"))
    }

    #[test]
    fn derives_display_columns() -> Result<()> {
        let records = normalize_table(&table(RAW_2014, 2014)?, &geometry());
        assert_eq!(records.len(), 3);

        let r1 = &records[0];
        assert_eq!((r1.median.as_str(), r1.p25.as_str(), r1.p75.as_str()), ("$1200", "$900", "$1500"));
        assert_eq!(r1.median_estimate, Some(1200.0));
        assert_eq!(r1.dummy, 1);

        let r2 = &records[1];
        assert_eq!(r2.p25, "Not Available!");
        assert_eq!(r2.median, "Not available. Exceeds $2000!");
        assert_eq!(r2.p75, "Not available. Exceeds $2000!");

        // malformed cell degrades to null
        let r3 = &records[2];
        assert_eq!(r3.median_estimate, None);
        assert_eq!(r3.median, "Not Available!");
        assert_eq!(r3.p75, "$1100");
        Ok(())
    }

    #[test]
    fn join_miss_keeps_row_with_null_centroid() -> Result<()> {
        let records = normalize_table(&table(RAW_2014, 2014)?, &geometry());
        assert_eq!(records[0].centroid(), Some((34.0, -118.0)));
        assert_eq!(records[2].geo_id, "g3");
        assert_eq!(records[2].lat, None);
        assert_eq!(records[2].lon, None);
        Ok(())
    }

    #[test]
    fn renormalizing_is_a_no_op() -> Result<()> {
        let dir = tempdir()?;
        let first = normalize_table(&table(RAW_2014, 2014)?, &geometry());
        let path = dir.path().join("normalized.csv");
        output::write_csv(&path, &first)?;

        let again = load_source_table(&path, 2014)?;
        assert!(again.is_normalized());
        let second = normalize_table(&again, &GeometryIndex::default());
        assert_eq!(second, first);
        assert!(second.iter().all(|r| !r.median.starts_with("$$")));
        Ok(())
    }

    #[test]
    fn post_2014_cap() -> Result<()> {
        let raw = "\
YEAR,ABBREV_NAME,GEO_ID,TRACT,B25057_001E,B25058_001E,B25059_001E
2015,Pasadena,g9,Census Tract 9,2001,3501,-666666666
";
        let records = normalize_table(&table(raw, 2015)?, &GeometryIndex::default());
        assert_eq!(records[0].place, "Pasadena");
        assert_eq!(records[0].name, "Census Tract 9");
        assert_eq!(records[0].p25, "$2001");
        assert_eq!(records[0].median, "Not available. Exceeds $3500!");
        assert_eq!(records[0].p75, "Not Available!");
        Ok(())
    }

    #[test]
    fn missing_estimate_column_is_malformed() {
        let raw = "YEAR,PLACE,GEO_ID,NAME,B25058_001E\n2015,A,g1,T1,1000\n";
        let err = table(raw, 2015).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MalformedSource { .. })
        ));
    }

    #[test]
    fn missing_year_file_is_fatal() {
        let cfg = PipelineConfig {
            dirs: crate::config::DirConfig {
                raw: PathBuf::from("/definitely/not/here"),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = normalize_year(&cfg, 2012).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingSource { year: 2012, .. })
        ));
    }

    #[test]
    fn normalize_year_writes_artifacts() -> Result<()> {
        let dir = tempdir()?;
        let cfg = PipelineConfig {
            start_year: 2014,
            end_year: 2014,
            dirs: crate::config::DirConfig {
                raw: dir.path().join("raw"),
                geometry: dir.path().join("geo"),
                output: dir.path().join("out"),
                history: dir.path().join("history"),
            },
            ..Default::default()
        };
        fs::create_dir_all(&cfg.dirs.raw)?;
        fs::create_dir_all(&cfg.dirs.geometry)?;
        fs::write(cfg.raw_path(2014), RAW_2014)?;
        fs::write(
            cfg.geometry_path(2014),
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":null,"properties":{"GEO_ID":"g1","INTPTLAT":"+34.0","INTPTLON":"-118.0"}}
            ]}"#,
        )?;

        let records = normalize_all(&cfg)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 3);

        let on_disk: Vec<NormalizedRecord> = read_csv(normalized_csv_path(&cfg, 2014))?;
        assert_eq!(on_disk, records[0]);
        assert!(cfg
            .normalized_dir()
            .join("contract_rent_2014_masterfile.json")
            .is_file());
        Ok(())
    }
}
