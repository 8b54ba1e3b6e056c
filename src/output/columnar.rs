// src/output/columnar.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, Int32Array, StringArray, UInt8Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use std::{fs, fs::File, path::Path, sync::Arc};

use crate::schema::NormalizedRecord;

/// Arrow schema mirroring the CSV columns of a normalized table.
pub fn normalized_schema() -> Schema {
    Schema::new(vec![
        Field::new("YEAR", DataType::Int32, false),
        Field::new("PLACE", DataType::Utf8, false),
        Field::new("GEO_ID", DataType::Utf8, false),
        Field::new("NAME", DataType::Utf8, false),
        Field::new("B25058_001E", DataType::Float64, true),
        Field::new("INTPTLAT", DataType::Float64, true),
        Field::new("INTPTLON", DataType::Float64, true),
        Field::new("dummy", DataType::UInt8, false),
        Field::new("Median", DataType::Utf8, false),
        Field::new("75th", DataType::Utf8, false),
        Field::new("25th", DataType::Utf8, false),
    ])
}

pub fn to_record_batch(records: &[NormalizedRecord]) -> Result<RecordBatch> {
    let schema = Arc::new(normalized_schema());
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from_iter_values(records.iter().map(|r| r.year))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.place.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.geo_id.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.name.as_str()))),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.median_estimate).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(records.iter().map(|r| r.lat).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(records.iter().map(|r| r.lon).collect::<Vec<_>>())),
        Arc::new(UInt8Array::from_iter_values(records.iter().map(|r| r.dummy))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.median.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.p75.as_str()))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.p25.as_str()))),
    ];
    RecordBatch::try_new(schema, columns).context("building normalized record batch")
}

/// Write the table as a single Snappy-compressed Parquet file.
pub fn write_parquet<P: AsRef<Path>>(path: P, records: &[NormalizedRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let batch = to_record_batch(records)?;
    let file = File::create(path).with_context(|| format!("creating parquet file {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing Arrow writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use parquet::file::reader::FileReader;
    use parquet::file::serialized_reader::SerializedFileReader;
    use tempfile::tempdir;

    fn record(year: i32, geo_id: &str, lat: Option<f64>) -> NormalizedRecord {
        NormalizedRecord {
            year,
            place: "Long Beach".into(),
            geo_id: geo_id.into(),
            name: "Census Tract 1".into(),
            median_estimate: Some(1200.0),
            lat,
            lon: lat.map(|_| -118.0),
            dummy: 1,
            median: "$1200".into(),
            p75: "$1500".into(),
            p25: "$900".into(),
        }
    }

    #[test]
    fn batch_keeps_nulls() -> Result<()> {
        let batch = to_record_batch(&[record(2015, "a", Some(34.0)), record(2016, "b", None)])?;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 11);
        let lat = batch
            .column(5)
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("lat column is f64");
        assert!(lat.is_valid(0));
        assert!(lat.is_null(1));
        Ok(())
    }

    #[test]
    fn parquet_row_count() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.parquet");
        let records: Vec<_> = (0..5).map(|i| record(2020, &format!("g{}", i), Some(34.0))).collect();
        write_parquet(&path, &records)?;
        let reader = SerializedFileReader::new(File::open(&path)?)?;
        assert_eq!(reader.metadata().file_metadata().num_rows(), 5);
        Ok(())
    }
}
