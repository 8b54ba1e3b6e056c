// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::PipelineError;

/// Environment variable holding the Census API key.
pub const API_KEY_VAR: &str = "CENSUS_API_KEY";

/// Everything a pipeline run needs to know, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_year: i32,
    pub end_year: i32,
    /// ACS table codes; each contributes its `<code>_001E` estimate column.
    pub topics: Vec<String>,
    pub state_fips: String,
    pub county_fips: Vec<String>,
    pub api_base: String,
    pub dirs: DirConfig,
    /// Pipe-separated place reference file. Optional.
    pub reference: Option<PathBuf>,
    /// Base URL the map view uses to address per-place geometry files.
    pub geometry_base_url: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirConfig {
    pub raw: PathBuf,
    pub geometry: PathBuf,
    pub output: PathBuf,
    pub history: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_year: 2010,
            end_year: 2023,
            topics: vec!["B25057".into(), "B25058".into(), "B25059".into()],
            state_fips: "06".into(),
            county_fips: vec!["037".into()],
            api_base: "https://api.census.gov/data".into(),
            dirs: DirConfig::default(),
            reference: None,
            geometry_base_url: "assets".into(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("data/masterfiles"),
            geometry: PathBuf::from("assets"),
            output: PathBuf::from("data/output"),
            history: PathBuf::from("data/history"),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << shift))
    }
}

impl PipelineConfig {
    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .map_err(|e| PipelineError::Configuration(format!("reading {}: {}", p.display(), e)))?;
                serde_yaml::from_str::<PipelineConfig>(&text)
                    .map_err(|e| PipelineError::Configuration(format!("parsing {}: {}", p.display(), e)))?
            }
            None => PipelineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_year > self.end_year {
            return Err(PipelineError::Configuration(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            ))
            .into());
        }
        if self.topics.is_empty() {
            return Err(PipelineError::Configuration("no ACS topics configured".into()).into());
        }
        if self.retry.attempts == 0 {
            return Err(PipelineError::Configuration("retry.attempts must be at least 1".into()).into());
        }
        Ok(())
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    /// The API key, required only by the collector.
    pub fn api_key(&self) -> Result<String> {
        env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PipelineError::Configuration(format!("{} must be set", API_KEY_VAR)))
            .context("loading API credential")
    }

    pub fn raw_path(&self, year: i32) -> PathBuf {
        self.dirs
            .raw
            .join(format!("contract_rent_masterfile_{}.csv", year))
    }

    pub fn geometry_path(&self, year: i32) -> PathBuf {
        self.dirs
            .geometry
            .join(format!("contract_rent_mastergeometry_{}.json", year))
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.dirs.output.join("normalized")
    }

    pub fn consolidated_dir(&self) -> PathBuf {
        self.dirs.output.join("consolidated")
    }

    pub fn lookups_dir(&self) -> PathBuf {
        self.dirs.output.join("lookups")
    }
}
