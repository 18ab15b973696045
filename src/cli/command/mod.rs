pub mod profiles;

use chrono::{Duration, NaiveDateTime};
pub use profiles::profiles;

/// Valid time of a forecast: init date plus leadtime hours.
pub fn validtime_from_leadtime(date: &NaiveDateTime, leadtime: i64) -> NaiveDateTime {
    *date + Duration::hours(leadtime)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn should_compute_valid_time() {
        let date = NaiveDate::from_ymd_opt(2021, 11, 18)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let valid = validtime_from_leadtime(&date, 13);
        assert_eq!(valid.format("%Y%m%d%H%M").to_string(), "202111190100");
    }
}
