// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions of a pipeline run.
///
/// Recoverable conditions (a tract with no centroid, an unparseable estimate)
/// never surface here; they degrade to nulls and are logged where they occur.
/// These values sit at the root of the `anyhow` chain so callers can
/// `downcast_ref::<PipelineError>()` to tell the kinds apart.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credential or an invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A declared input for a configured year does not exist.
    #[error("missing {kind} for year {year}: {}", path.display())]
    MissingSource {
        kind: &'static str,
        year: i32,
        path: PathBuf,
    },

    /// A declared input exists but cannot be parsed.
    #[error("malformed {kind} {}: {reason}", path.display())]
    MalformedSource {
        kind: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// The statistics API kept failing after every retry.
    #[error("source unavailable for batch {batch} after {attempts} attempts: {reason}")]
    SourceUnavailable {
        batch: String,
        attempts: usize,
        reason: String,
    },
}
