// src/output/mod.rs

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

pub mod columnar;

/// Write `rows` as CSV, header taken from the serde field names.
///
/// Written to a dot-prefixed temp file beside `path`, then renamed over it, so
/// a reader never sees a half-written artifact.
pub fn write_csv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    atomic_write(path, |file| {
        let mut wtr = csv::Writer::from_writer(file);
        for row in rows {
            wtr.serialize(row)
                .with_context(|| format!("serializing CSV row for {:?}", path))?;
        }
        wtr.flush()?;
        Ok(())
    })?;
    debug!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

/// Write a table whose columns are only known at runtime.
pub fn write_csv_rows<P: AsRef<Path>>(path: P, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let path = path.as_ref();
    atomic_write(path, |file| {
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(headers)?;
        for row in rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    })?;
    debug!(path = %path.display(), rows = rows.len(), "wrote csv");
    Ok(())
}

/// Pretty-printed JSON with a trailing newline, same temp-then-rename dance.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    atomic_write(path, |file| {
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, value)
            .with_context(|| format!("serializing JSON for {:?}", path))?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    })?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}

/// Write the same records as `<stem>.csv` and `<stem>.json` under `dir`.
pub fn write_records<T: Serialize>(
    dir: impl AsRef<Path>,
    stem: &str,
    rows: &[T],
) -> Result<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    let csv_path = dir.join(format!("{}.csv", stem));
    let json_path = dir.join(format!("{}.json", stem));
    write_csv(&csv_path, rows)?;
    write_json(&json_path, rows)?;
    Ok((csv_path, json_path))
}

pub fn read_csv<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("opening {:?}", path))?;
    rdr.deserialize::<T>()
        .enumerate()
        .map(|(idx, rec)| rec.with_context(|| format!("CSV parse error in {:?} at record {}", path, idx)))
        .collect()
}

pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
    serde_json::from_reader(std::io::BufReader::new(file)).with_context(|| format!("parsing {:?}", path))
}

fn atomic_write<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("creating directory {:?}", dir))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no file name in {:?}", path))?;
    let tmp_path = dir.join(format!(".{}.tmp", file_name));

    let tmp = File::create(&tmp_path).with_context(|| format!("creating {:?}", tmp_path))?;
    write(tmp)?;

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        value: Option<f64>,
    }

    #[test]
    fn csv_and_json_agree() -> Result<()> {
        let dir = tempdir()?;
        let rows = vec![
            Row {
                name: "a".into(),
                value: Some(1.5),
            },
            Row {
                name: "b".into(),
                value: None,
            },
        ];
        let (csv_path, json_path) = write_records(dir.path().join("nested"), "rows", &rows)?;

        let from_csv: Vec<Row> = read_csv(&csv_path)?;
        let from_json: Vec<Row> = read_json(&json_path)?;
        assert_eq!(from_csv, rows);
        assert_eq!(from_json, rows);

        // no temp files left behind
        let leftovers = fs::read_dir(dir.path().join("nested"))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        Ok(())
    }
}
