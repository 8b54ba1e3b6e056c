pub mod types;

pub use types::{AvailabilityOption, GeoCenter, GeoPoint, NormalizedRecord, SourceRow};

/// Median contract rent estimate.
pub const MEDIAN_COLUMN: &str = "B25058_001E";
/// 25th percentile contract rent estimate.
pub const P25_COLUMN: &str = "B25057_001E";
/// 75th percentile contract rent estimate.
pub const P75_COLUMN: &str = "B25059_001E";

/// Display columns added by normalization. Their presence marks a table as
/// already normalized.
pub const DERIVED_COLUMNS: [&str; 3] = ["Median", "25th", "75th"];

/// Estimate column name for an ACS topic code, e.g. `B25058` → `B25058_001E`.
pub fn estimate_column(topic: &str) -> String {
    format!("{}_001E", topic)
}
