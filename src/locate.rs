//! Resolve a location to a grid column of the reference grid.
//!
//! The reference grid file supplies per-column coordinates and the
//! geometric height of the model levels. The column is resolved once per
//! run and the same index is reused for every extraction.

use std::path::Path;

use anyhow::Result;
use log::debug;

use crate::error::ProfileError;
use crate::extract::{open_grib, read_param_column, GribFile};
use crate::variables::GribParam;

/// Either geographic coordinates or an explicit column index (known from a
/// previous run).
#[derive(Debug, Clone, Copy)]
pub enum LocationQuery {
    LatLon { lat: f64, lon: f64 },
    Index(usize),
}

/// A resolved grid column: its index, coordinates and height levels.
#[derive(Debug, Clone)]
pub struct GridColumn {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub altitudes: Vec<f64>,
}

/// Geometric height of the model levels in the reference grid file.
const HEIGHT_PARAM: GribParam = GribParam::new(0, 3, 6);

/// Resolves `query` against the reference grid file.
///
/// An unreadable grid or missing coordinate/height messages is fatal: no
/// profile can be anchored without a resolved column.
pub fn resolve(query: &LocationQuery, grid_path: &Path) -> Result<GridColumn> {
    let file =
        open_grib(grid_path).map_err(|e| ProfileError::GridUnavailable(format!("{:#}", e)))?;

    let (lats, lons) = read_coordinates(&file)?;

    let index = match *query {
        LocationQuery::Index(ind) => {
            if ind >= lats.len() {
                return Err(ProfileError::IndexOutOfRange {
                    ind,
                    ncolumns: lats.len(),
                }
                .into());
            }
            ind
        }
        LocationQuery::LatLon { lat, lon } => {
            let ind = nearest_column(&lats, &lons, lat, lon);
            debug!(
                "nearest column to ({:.5}, {:.5}) is {} at ({:.5}, {:.5})",
                lat, lon, ind, lats[ind], lons[ind]
            );
            ind
        }
    };

    let altitudes = read_heights(&file, index)?;

    Ok(GridColumn {
        index,
        latitude: lats[index],
        longitude: lons[index],
        altitudes,
    })
}

/// Per-column coordinates, taken from the grid of the first message.
fn read_coordinates(file: &GribFile) -> Result<(Vec<f64>, Vec<f64>)> {
    let Some((_pos, submessage)) = file.iter().next() else {
        return Err(ProfileError::GridUnavailable("grid file has no messages".to_string()).into());
    };

    let latlons = submessage
        .latlons()
        .map_err(|e| ProfileError::GridUnavailable(format!("grid coordinates: {}", e)))?;

    let mut lats = Vec::new();
    let mut lons = Vec::new();
    for (lat, lon) in latlons {
        lats.push(lat as f64);
        lons.push(normalize_lon(lon as f64));
    }
    if lats.is_empty() {
        return Err(ProfileError::GridUnavailable("grid has no points".to_string()).into());
    }

    Ok((lats, lons))
}

fn read_heights(file: &GribFile, index: usize) -> Result<Vec<f64>> {
    match read_param_column(file, HEIGHT_PARAM, index) {
        Ok(Some(values)) => Ok(values),
        Ok(None) => Err(ProfileError::GridUnavailable(format!(
            "no height messages (parameter {})",
            HEIGHT_PARAM
        ))
        .into()),
        Err(e) => {
            Err(ProfileError::GridUnavailable(format!("reading heights: {:#}", e)).into())
        }
    }
}

/// Maps `[0, 360)` longitudes onto `(-180, 180]` so grid coordinates and
/// query coordinates share one convention.
fn normalize_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Index of the column closest to `(lat, lon)`: planar distance with
/// cos-latitude scaling of the longitude difference. Ties go to the lowest
/// index.
fn nearest_column(lats: &[f64], lons: &[f64], lat: f64, lon: f64) -> usize {
    let coslat = lat.to_radians().cos();
    let mut best = (0, f64::INFINITY);

    for (i, (&la, &lo)) in lats.iter().zip(lons.iter()).enumerate() {
        let dlat = la - lat;
        let dlon = (lo - lon) * coslat;
        let d2 = dlat * dlat + dlon * dlon;
        if d2 < best.1 {
            best = (i, d2);
        }
    }

    best.0
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_find_nearest_column() {
        let lats = [46.0, 46.8, 47.2];
        let lons = [6.0, 6.9, 8.1];

        assert_eq!(nearest_column(&lats, &lons, 46.81, 6.94), 1);
        assert_eq!(nearest_column(&lats, &lons, 47.5, 8.5), 2);
    }

    #[test]
    fn should_resolve_deterministically() {
        let lats = [46.0, 46.8, 47.2];
        let lons = [6.0, 6.9, 8.1];

        let a = nearest_column(&lats, &lons, 46.5, 6.5);
        let b = nearest_column(&lats, &lons, 46.5, 6.5);
        assert_eq!(a, b);
    }

    #[test]
    fn should_break_ties_with_lowest_index() {
        // two columns at the identical position
        let lats = [46.8, 46.8, 47.0];
        let lons = [6.9, 6.9, 7.0];

        assert_eq!(nearest_column(&lats, &lons, 46.8, 6.9), 0);
    }

    #[test]
    fn should_normalize_longitudes() {
        assert_eq!(normalize_lon(6.94), 6.94);
        assert!((normalize_lon(353.06) + 6.94).abs() < 1e-9);
        assert_eq!(normalize_lon(180.0), 180.0);
    }

    #[test]
    fn should_fail_on_unreadable_grid() {
        let query = LocationQuery::Index(0);
        let err = resolve(&query, Path::new("/no/such/grid")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProfileError>(),
            Some(ProfileError::GridUnavailable(_))
        ));
    }
}
