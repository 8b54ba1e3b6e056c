use std::collections::BTreeMap;

use crate::schema::{GeoCenter, NormalizedRecord};

/// Decimal places kept on every center coordinate.
pub const CENTER_PRECISION: i32 = 5;

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Mean centroid of every (year, place), sorted by year then place.
///
/// Rows without a centroid are left out of the mean; a (year, place) with no
/// centroid at all gets no center.
pub fn geo_centers(records: &[NormalizedRecord]) -> Vec<GeoCenter> {
    let mut sums: BTreeMap<(i32, &str), (f64, f64, usize)> = BTreeMap::new();
    for r in records {
        if let Some((lat, lon)) = r.centroid() {
            let entry = sums.entry((r.year, r.place.as_str())).or_insert((0.0, 0.0, 0));
            entry.0 += lat;
            entry.1 += lon;
            entry.2 += 1;
        }
    }
    sums.into_iter()
        .map(|((year, place), (lat, lon, n))| GeoCenter {
            year,
            place: place.to_string(),
            lat: round_to(lat / n as f64, CENTER_PRECISION),
            lon: round_to(lon / n as f64, CENTER_PRECISION),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(year: i32, place: &str, centroid: Option<(f64, f64)>) -> NormalizedRecord {
        NormalizedRecord {
            year,
            place: place.into(),
            geo_id: "g".into(),
            name: "Census Tract".into(),
            median_estimate: Some(1000.0),
            lat: centroid.map(|c| c.0),
            lon: centroid.map(|c| c.1),
            dummy: 1,
            median: "$1000".into(),
            p75: "$1000".into(),
            p25: "$1000".into(),
        }
    }

    #[test]
    fn mean_of_two_centroids() {
        let centers = geo_centers(&[
            rec(2020, "Long Beach", Some((34.0, -118.0))),
            rec(2020, "Long Beach", Some((34.1, -118.2))),
        ]);
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[0].lat, 34.05);
        assert_eq!(centers[0].lon, -118.10);
    }

    #[test]
    fn null_centroids_are_skipped() {
        let centers = geo_centers(&[
            rec(2020, "Bell", Some((33.9, -118.1))),
            rec(2020, "Bell", None),
            rec(2020, "Carson", None),
        ]);
        assert_eq!(centers.len(), 1);
        assert_eq!(centers[0].place, "Bell");
        assert_eq!((centers[0].lat, centers[0].lon), (33.9, -118.1));
    }

    #[test]
    fn centers_are_per_year() {
        let centers = geo_centers(&[
            rec(2011, "Bell", Some((33.0, -118.0))),
            rec(2010, "Bell", Some((34.0, -117.0))),
        ]);
        assert_eq!(
            centers.iter().map(|c| c.year).collect::<Vec<_>>(),
            vec![2010, 2011]
        );
        assert_eq!(centers[0].lat, 34.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(34.123456789, 5), 34.12346);
        assert_eq!(round_to(-118.000004, 5), -118.0);
    }
}
