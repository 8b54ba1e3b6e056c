use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::reference::PlaceCatalog;
use crate::schema::{AvailabilityOption, NormalizedRecord};

/// Place → one option per year of the full range, disabled where the place has no rows.
pub type PlaceYearAvailability = BTreeMap<String, Vec<AvailabilityOption<i32>>>;

/// Year → one option per known place, disabled where the year has no rows for it.
pub type YearPlaceAvailability = BTreeMap<i32, Vec<AvailabilityOption<String>>>;

/// Every year and every place the lookups must cover, sorted.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub years: BTreeSet<i32>,
    pub places: BTreeSet<String>,
}

impl Universe {
    /// Configured years plus catalog places, widened by whatever the data holds.
    pub fn new(
        years: impl IntoIterator<Item = i32>,
        catalog: &PlaceCatalog,
        records: &[NormalizedRecord],
    ) -> Self {
        let mut u = Self {
            years: years.into_iter().collect(),
            places: catalog.places().map(String::from).collect(),
        };
        for r in records {
            u.years.insert(r.year);
            u.places.insert(r.place.clone());
        }
        u
    }
}

fn observed(records: &[NormalizedRecord]) -> BTreeSet<(&str, i32)> {
    records.iter().map(|r| (r.place.as_str(), r.year)).collect()
}

pub fn place_year_availability(
    records: &[NormalizedRecord],
    universe: &Universe,
) -> PlaceYearAvailability {
    let seen = observed(records);
    universe
        .places
        .iter()
        .map(|place| {
            let options = universe
                .years
                .iter()
                .map(|&year| AvailabilityOption {
                    label: year.to_string(),
                    value: year,
                    disabled: !seen.contains(&(place.as_str(), year)),
                })
                .collect();
            (place.clone(), options)
        })
        .collect()
}

pub fn year_place_availability(
    records: &[NormalizedRecord],
    universe: &Universe,
    catalog: &PlaceCatalog,
) -> YearPlaceAvailability {
    let seen = observed(records);
    universe
        .years
        .iter()
        .map(|&year| {
            let options = universe
                .places
                .iter()
                .map(|place| AvailabilityOption {
                    label: catalog.label(place).to_string(),
                    value: place.clone(),
                    disabled: !seen.contains(&(place.as_str(), year)),
                })
                .collect();
            (year, options)
        })
        .collect()
}

/// Enabled values of one option list.
pub fn enabled<V: Clone + Ord>(options: &[AvailabilityOption<V>]) -> BTreeSet<V> {
    options
        .iter()
        .filter(|o| !o.disabled)
        .map(|o| o.value.clone())
        .collect()
}

/// Log places whose observed years fall outside the range the reference declares.
pub fn check_declared_ranges(availability: &PlaceYearAvailability, catalog: &PlaceCatalog) {
    for (place, options) in availability {
        let Some(reference) = catalog.get(place) else {
            continue;
        };
        let declared = reference.initial_year..=reference.recent_year;
        let outside: Vec<i32> = enabled(options)
            .into_iter()
            .filter(|y| !declared.contains(y))
            .collect();
        if !outside.is_empty() {
            warn!(place = %place, ?outside, ?declared, "data outside the declared year range");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::PlaceReference;

    fn rec(year: i32, place: &str, geo_id: &str) -> NormalizedRecord {
        NormalizedRecord {
            year,
            place: place.into(),
            geo_id: geo_id.into(),
            name: format!("Census Tract {}", geo_id),
            median_estimate: None,
            lat: None,
            lon: None,
            dummy: 1,
            median: "Not Available!".into(),
            p75: "Not Available!".into(),
            p25: "Not Available!".into(),
        }
    }

    fn catalog() -> PlaceCatalog {
        PlaceCatalog::from_entries([PlaceReference {
            city: "Avalon City".into(),
            abbrev_name: "Avalon".into(),
            initial_year: 2010,
            recent_year: 2012,
        }])
    }

    #[test]
    fn missing_years_are_disabled_not_omitted() {
        let records = vec![
            rec(2010, "Carson", "a"),
            rec(2012, "Carson", "a"),
            rec(2012, "Carson", "b"),
            rec(2011, "Bell", "c"),
        ];
        let universe = Universe::new(2010..=2012, &catalog(), &records);
        let by_place = place_year_availability(&records, &universe);

        assert_eq!(by_place.keys().collect::<Vec<_>>(), vec!["Avalon", "Bell", "Carson"]);
        let carson = &by_place["Carson"];
        assert_eq!(carson.len(), 3);
        assert_eq!(
            carson.iter().map(|o| (o.value, o.disabled)).collect::<Vec<_>>(),
            vec![(2010, false), (2011, true), (2012, false)]
        );
        assert_eq!(enabled(carson), BTreeSet::from([2010, 2012]));

        // place with no rows at all is an empty set, not an error
        assert!(enabled(&by_place["Avalon"]).is_empty());
        assert_eq!(by_place["Avalon"].len(), 3);
    }

    #[test]
    fn inverse_view_uses_catalog_labels() {
        let records = vec![rec(2010, "Carson", "a"), rec(2010, "Avalon", "z")];
        let cat = catalog();
        let universe = Universe::new(2010..=2011, &cat, &records);
        let by_year = year_place_availability(&records, &universe, &cat);

        let y2010 = &by_year[&2010];
        assert_eq!(y2010[0].label, "Avalon City");
        assert_eq!(y2010[1].label, "Carson");
        assert_eq!(enabled(y2010), BTreeSet::from(["Avalon".to_string(), "Carson".to_string()]));
        assert!(enabled(&by_year[&2011]).is_empty());
    }

    #[test]
    fn availability_matches_rows_exactly() {
        let records: Vec<_> = [(2010, "P"), (2013, "P"), (2013, "Q"), (2015, "Q")]
            .iter()
            .map(|&(y, p)| rec(y, p, "g"))
            .collect();
        let universe = Universe::new(2010..=2015, &PlaceCatalog::default(), &records);
        let by_place = place_year_availability(&records, &universe);
        for (place, options) in &by_place {
            let expected: BTreeSet<i32> = records
                .iter()
                .filter(|r| &r.place == place)
                .map(|r| r.year)
                .collect();
            assert_eq!(enabled(options), expected);
        }
    }
}
