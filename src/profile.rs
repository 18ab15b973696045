//! Altitude-ordered profile series and the per-run profile collection.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDateTime;

/// One vertical profile: `(altitude, value)` pairs for a single variable,
/// time context and data source, sorted ascending by altitude and restricted
/// to the requested altitude window.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub points: Vec<(f64, f64)>,
}

impl Profile {
    /// Builds a profile from raw pairs: drops non-finite samples, applies the
    /// altitude window and sorts bottom-up. `alt_bot = None` means "from the
    /// surface", i.e. the lowest level the data provides.
    pub fn from_points(mut points: Vec<(f64, f64)>, alt_bot: Option<f64>, alt_top: f64) -> Self {
        points.retain(|(alt, val)| alt.is_finite() && val.is_finite());
        points.retain(|(alt, _)| *alt <= alt_top && alt_bot.map_or(true, |bot| *alt >= bot));
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        Profile { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Min and max of the values, if any.
    pub fn value_extent(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, &(_, val)| match acc {
            None => Some((val, val)),
            Some((lo, hi)) => Some((lo.min(val), hi.max(val))),
        })
    }

    /// Min and max of the altitudes, if any.
    pub fn altitude_extent(&self) -> Option<(f64, f64)> {
        match (self.points.first(), self.points.last()) {
            (Some(&(lo, _)), Some(&(hi, _))) => Some((lo, hi)),
            _ => None,
        }
    }

    /// Value at the level closest to `altitude` (nearest match, no
    /// interpolation).
    pub fn nearest_value(&self, altitude: f64) -> Option<f64> {
        self.points
            .iter()
            .min_by(|a, b| {
                let da = (a.0 - altitude).abs();
                let db = (b.0 - altitude).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .map(|&(_, val)| val)
    }
}

/// Model profiles per leadtime (hours after init).
pub type LeadtimeProfiles = BTreeMap<i64, Profile>;

/// Observation profiles per valid timestamp.
pub type TimestampProfiles = BTreeMap<NaiveDateTime, Profile>;

/// Everything one run extracts, keyed by variable short name. Built once by
/// the extractor and retriever, then read-only for the plot composer.
#[derive(Debug, Default)]
pub struct ProfileSet {
    pub model: BTreeMap<String, LeadtimeProfiles>,
    pub observation: BTreeMap<String, TimestampProfiles>,
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_filter_and_sort_bottom_up() {
        // model levels are stored top-down
        let raw = vec![(3000.0, 1.0), (1500.0, 2.0), (500.0, 3.0), (100.0, 4.0)];
        let profile = Profile::from_points(raw, Some(200.0), 2000.0);

        assert_eq!(profile.points, vec![(500.0, 3.0), (1500.0, 2.0)]);
        let alts: Vec<f64> = profile.points.iter().map(|p| p.0).collect();
        assert!(alts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn should_keep_surface_level_without_lower_bound() {
        let raw = vec![(490.0, 1.0), (800.0, 2.0), (2500.0, 3.0)];
        let profile = Profile::from_points(raw, None, 2000.0);

        assert_eq!(profile.len(), 2);
        assert_eq!(profile.points[0].0, 490.0);
    }

    #[test]
    fn should_drop_non_finite_samples() {
        let raw = vec![(500.0, f64::NAN), (800.0, 2.0), (f64::INFINITY, 3.0)];
        let profile = Profile::from_points(raw, None, 2000.0);

        assert_eq!(profile.points, vec![(800.0, 2.0)]);
    }

    #[test]
    fn should_compute_extents() {
        let profile = Profile::from_points(vec![(500.0, -1.0), (800.0, 4.0)], None, 2000.0);

        assert_eq!(profile.value_extent(), Some((-1.0, 4.0)));
        assert_eq!(profile.altitude_extent(), Some((500.0, 800.0)));
        assert_eq!(Profile::default().value_extent(), None);
    }

    #[test]
    fn should_match_nearest_altitude() {
        let profile = Profile::from_points(vec![(500.0, 1.0), (800.0, 2.0)], None, 2000.0);

        assert_eq!(profile.nearest_value(600.0), Some(1.0));
        assert_eq!(profile.nearest_value(700.0), Some(2.0));
        assert_eq!(Profile::default().nearest_value(700.0), None);
    }
}
