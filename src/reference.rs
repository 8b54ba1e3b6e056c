// src/reference.rs

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};

use crate::error::PipelineError;

/// One line of the place reference file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceReference {
    /// Display name, e.g. `La Cañada Flintridge`.
    #[serde(rename = "CITY")]
    pub city: String,
    /// Key used by the data, e.g. `La Canada Flintridge`.
    #[serde(rename = "ABBREV_NAME")]
    pub abbrev_name: String,
    #[serde(rename = "INITIAL_YEAR")]
    pub initial_year: i32,
    #[serde(rename = "RECENT_YEAR")]
    pub recent_year: i32,
}

/// Place labels and declared year ranges, keyed by `ABBREV_NAME`.
#[derive(Debug, Clone, Default)]
pub struct PlaceCatalog {
    places: BTreeMap<String, PlaceReference>,
}

impl PlaceCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = PlaceReference>) -> Self {
        Self {
            places: entries
                .into_iter()
                .map(|p| (p.abbrev_name.clone(), p))
                .collect(),
        }
    }

    /// Label shown for `place`; falls back to the key itself.
    pub fn label<'a>(&'a self, place: &'a str) -> &'a str {
        self.places
            .get(place)
            .map(|p| p.city.as_str())
            .unwrap_or(place)
    }

    pub fn get(&self, place: &str) -> Option<&PlaceReference> {
        self.places.get(place)
    }

    pub fn places(&self) -> impl Iterator<Item = &str> {
        self.places.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

/// Read a `CITY|ABBREV_NAME|INITIAL_YEAR|RECENT_YEAR` file.
pub fn load_reference<P: AsRef<Path>>(path: P) -> Result<PlaceCatalog> {
    let path = path.as_ref();
    let malformed = |reason: String| PipelineError::MalformedSource {
        kind: "reference file",
        path: path.to_path_buf(),
        reason,
    };

    let mut rdr = ReaderBuilder::new()
        .delimiter(b'|')
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))
        .with_context(|| format!("opening reference {:?}", path))?;

    let mut entries = Vec::new();
    for (idx, rec) in rdr.deserialize::<PlaceReference>().enumerate() {
        let entry = rec.map_err(|e| malformed(format!("record {}: {}", idx, e)))?;
        if entry.initial_year > entry.recent_year {
            return Err(malformed(format!(
                "{} has INITIAL_YEAR {} after RECENT_YEAR {}",
                entry.abbrev_name, entry.initial_year, entry.recent_year
            ))
            .into());
        }
        entries.push(entry);
    }
    Ok(PlaceCatalog::from_entries(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_pipe_separated_reference() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reference.txt");
        fs::write(
            &path,
            "CITY|ABBREV_NAME|INITIAL_YEAR|RECENT_YEAR\n\
             Long Beach|Long Beach|2010|2023\n\
             La Cañada Flintridge|La Canada Flintridge|2012|2023\n",
        )?;
        let catalog = load_reference(&path)?;
        assert_eq!(catalog.places().collect::<Vec<_>>(), vec!["La Canada Flintridge", "Long Beach"]);
        assert_eq!(catalog.label("La Canada Flintridge"), "La Cañada Flintridge");
        assert_eq!(catalog.label("Unknown"), "Unknown");
        assert_eq!(catalog.get("Long Beach").map(|p| p.initial_year), Some(2010));
        Ok(())
    }

    #[test]
    fn inverted_range_is_malformed() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reference.txt");
        fs::write(&path, "CITY|ABBREV_NAME|INITIAL_YEAR|RECENT_YEAR\nA|A|2020|2010\n")?;
        let err = load_reference(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MalformedSource { .. })
        ));
        Ok(())
    }
}
