//! Display strings for the three rent estimates.
//!
//! ACS top-codes contract rent: through the 2014 data year the highest bin is
//! "$2000 or more" and an estimate in that bin is published as 2001; from 2015
//! on the bin is "$3500 or more", published as 3501.

/// Last data year that uses the $2000 top code.
pub const CAP_REVISION_YEAR: i32 = 2014;

pub const NOT_AVAILABLE: &str = "Not Available!";

/// Top-code in force for a data year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentCap {
    /// Threshold shown to users.
    pub threshold: u32,
    /// Value the survey publishes for estimates above the threshold.
    pub sentinel: u32,
}

impl RentCap {
    pub fn for_year(year: i32) -> Self {
        if year <= CAP_REVISION_YEAR {
            Self {
                threshold: 2000,
                sentinel: 2001,
            }
        } else {
            Self {
                threshold: 3500,
                sentinel: 3501,
            }
        }
    }

    pub fn exceeded_text(&self) -> String {
        format!("Not available. Exceeds ${}!", self.threshold)
    }

    fn is_sentinel(&self, value: f64) -> bool {
        value == f64::from(self.sentinel)
    }
}

/// Display string for one estimate of one data year.
pub fn display_rent(value: Option<f64>, year: i32) -> String {
    let Some(v) = value else {
        return NOT_AVAILABLE.to_string();
    };
    let cap = RentCap::for_year(year);
    if cap.is_sentinel(v) {
        cap.exceeded_text()
    } else {
        format_dollars(v)
    }
}

/// `1200.0` → `$1200`. Fractional amounts round to the nearest dollar.
pub fn format_dollars(value: f64) -> String {
    format!("${}", value.round() as i64)
}

/// True when `s` is already one of the strings `display_rent` produces.
pub fn is_display_string(s: &str) -> bool {
    s == NOT_AVAILABLE
        || (s.starts_with("Not available. Exceeds $") && s.ends_with('!'))
        || s.strip_prefix('$')
            .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_not_available_in_every_year() {
        for year in [2010, 2014, 2015, 2023] {
            assert_eq!(display_rent(None, year), "Not Available!");
        }
    }

    #[test]
    fn ordinary_values_are_dollars() {
        assert_eq!(display_rent(Some(1200.0), 2012), "$1200");
        assert_eq!(display_rent(Some(1200.0), 2020), "$1200");
        assert_eq!(display_rent(Some(1200.4), 2020), "$1200");
        assert_eq!(display_rent(Some(2000.0), 2010), "$2000");
    }

    #[test]
    fn cap_boundary_between_2014_and_2015() {
        assert_eq!(
            display_rent(Some(2001.0), 2014),
            "Not available. Exceeds $2000!"
        );
        assert_eq!(
            display_rent(Some(3501.0), 2015),
            "Not available. Exceeds $3500!"
        );
        // the other bracket's sentinel is an ordinary amount
        assert_eq!(display_rent(Some(2001.0), 2015), "$2001");
        assert_eq!(display_rent(Some(3501.0), 2014), "$3501");
    }

    #[test]
    fn derivation_is_pure() {
        for v in [None, Some(950.0), Some(2001.0), Some(3501.0)] {
            for y in [2013, 2014, 2015, 2016] {
                assert_eq!(display_rent(v, y), display_rent(v, y));
                assert!(is_display_string(&display_rent(v, y)));
            }
        }
    }

    #[test]
    fn display_string_detection() {
        assert!(is_display_string("$1200"));
        assert!(!is_display_string("1200"));
        assert!(!is_display_string("$"));
        assert!(!is_display_string("$$1200"));
    }
}
