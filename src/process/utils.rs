use tracing::debug;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a rent estimate cell.
///
/// Empty cells, `nan`/`null`, text that is not a number, and the negative
/// annotation codes the Census API uses for "no estimate" (`-666666666` and
/// friends) all come back as `None`.
pub fn parse_estimate(raw: Option<&str>) -> Option<f64> {
    let cleaned = clean_str(raw?);
    if cleaned.is_empty() || is_null_token(&cleaned) {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        Ok(v) => {
            debug!(value = v, "annotated or non-finite estimate treated as null");
            None
        }
        Err(_) => {
            debug!(cell = %cleaned, "unparseable estimate treated as null");
            None
        }
    }
}

/// Parse a latitude/longitude cell. TIGER files write these with an explicit
/// sign, e.g. `+34.0522342`.
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    let cleaned = clean_str(raw?);
    if cleaned.is_empty() || is_null_token(&cleaned) {
        return None;
    }
    cleaned
        .trim_start_matches('+')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// `Census Tract 5703.01, Los Angeles County, California` → `Census Tract 5703.01`.
/// Newer vintages separate with `;` instead of `,`.
pub fn tract_label(name: &str) -> String {
    name.split([',', ';'])
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn is_null_token(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "nan" | "null" | "none" | "n/a")
}
