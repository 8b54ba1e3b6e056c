// src/history/mod.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use glob::glob;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::BTreeSet,
    fs,
    fs::File,
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, warn};

/// Event name for a year whose raw extract was written by the collector.
pub const FETCHED: &str = "fetched";

/// Per-year collection history, one single-row Parquet file per event.
///
/// Files are named `acs_<year>_<event>_<ts>.parquet`, so the set of years
/// that reached an event can be recovered from filenames alone.
pub struct History {
    history_dir: PathBuf,
}

impl History {
    /// Open the history at `history_dir`, creating the directory if needed.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating history directory {:?}", &history_dir))?;
        Ok(Self { history_dir })
    }

    /// Record `event` for `year` with the number of rows involved.
    pub fn record_event(&self, year: i32, event: &str, rows: u64) -> Result<PathBuf> {
        let ts = Utc::now().timestamp_micros();
        let filename = format!("acs_{}_{}_{}.parquet", year, event, ts);
        let path = self.history_dir.join(filename);

        let schema = Arc::new(Schema::new(vec![
            Field::new("year", DataType::Int32, false),
            Field::new("event", DataType::Utf8, false),
            Field::new("rows", DataType::UInt64, false),
            Field::new(
                "event_time",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ]));

        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int32Array::from(vec![year])),
            Arc::new(StringArray::from(vec![event.to_string()])),
            Arc::new(UInt64Array::from(vec![rows])),
            Arc::new(TimestampMicrosecondArray::from(vec![ts])),
        ];
        let batch = RecordBatch::try_new(schema.clone(), columns)
            .context("building history record batch")?;

        let file =
            File::create(&path).with_context(|| format!("creating history file {:?}", &path))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("creating Arrow writer for history")?;
        writer.write(&batch).context("writing history batch")?;
        writer.close().context("closing history writer")?;
        debug!(year, event, rows, "recorded history event");
        Ok(path)
    }

    /// Years that have at least one `event` recorded.
    pub fn years_with_event(&self, event: &str) -> Result<BTreeSet<i32>> {
        let mut years = BTreeSet::new();
        let pattern = format!("{}/acs_*_{}_*.parquet", self.history_dir.display(), event);
        for entry in glob(&pattern)? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("cannot read history entry: {}", e);
                    continue;
                }
            };
            // stem = "acs_<year>_<event>_<ts>"
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(rest) = stem.strip_prefix("acs_") else {
                continue;
            };
            if let Some(idx) = rest.find(&format!("_{}_", event)) {
                if let Ok(year) = rest[..idx].parse::<i32>() {
                    years.insert(year);
                }
            }
        }
        Ok(years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::file::reader::FileReader;
    use parquet::file::serialized_reader::SerializedFileReader;
    use tempfile::tempdir;

    #[test]
    fn records_and_recovers_years() -> Result<()> {
        let tmp = tempdir()?;
        let history = History::new(tmp.path().join("history"))?;
        assert!(history.years_with_event(FETCHED)?.is_empty());

        let path = history.record_event(2015, FETCHED, 2_345)?;
        history.record_event(2012, FETCHED, 10)?;
        history.record_event(2013, "normalized", 10)?;

        let years: Vec<i32> = history.years_with_event(FETCHED)?.into_iter().collect();
        assert_eq!(years, vec![2012, 2015]);

        let reader = SerializedFileReader::new(File::open(path)?)?;
        assert_eq!(reader.metadata().file_metadata().num_rows(), 1);
        Ok(())
    }
}
