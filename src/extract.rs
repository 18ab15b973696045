//! Extract vertical profiles from gridded model output.
//!
//! Model output is GRIB2, one subfolder per init date and one file per
//! leadtime (`lfff<DD><HH>0000`). A parameter's vertical column is spread
//! over one message per model level; only the value at the resolved column
//! index is kept from each message, and each file is opened, read and
//! released before the next leadtime.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use grib::Grib2SubmessageDecoder;
use log::{debug, warn};

use crate::locate::GridColumn;
use crate::profile::{LeadtimeProfiles, Profile};
use crate::variables::{self, GribParam, VariableSpec};

/// Level types carrying model-level data: hybrid level/layer and the
/// generalized vertical coordinate used by ICON.
const MODEL_LEVEL_TYPES: &[u8] = &[105, 110, 118, 150];

pub(crate) type GribFile = grib::Grib2<grib::SeekableGrib2Reader<BufReader<File>>>;

/// Extracts one profile per (variable, leadtime) at the resolved column.
///
/// A file or parameter missing for one leadtime yields an empty profile for
/// that entry and a warning; it never aborts the remaining extractions.
pub fn extract(
    folder: &Path,
    date: &NaiveDateTime,
    leadtimes: &[i64],
    specs: &[&'static VariableSpec],
    column: &GridColumn,
    alt_bot: Option<f64>,
    alt_top: f64,
) -> Result<BTreeMap<String, LeadtimeProfiles>> {
    let mut profiles: BTreeMap<String, LeadtimeProfiles> = specs
        .iter()
        .map(|spec| (spec.short_name.to_string(), LeadtimeProfiles::new()))
        .collect();

    for &leadtime in leadtimes {
        let path = model_file_path(folder, date, leadtime);
        debug!("reading model output {}", path.display());

        let file = match open_grib(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("leadtime +{}h: {:#}", leadtime, e);
                None
            }
        };

        for spec in specs {
            let profile = match &file {
                Some(file) => extract_field(file, spec, column, alt_bot, alt_top)?,
                None => Profile::default(),
            };
            if let Some(entry) = profiles.get_mut(spec.short_name) {
                entry.insert(leadtime, profile);
            }
        }
        // file handle dropped before the next leadtime is opened
    }

    Ok(profiles)
}

/// Path of the model output file for one leadtime:
/// `<folder>/<YYMMDDHH>/lfff<DD><HH>0000`.
pub fn model_file_path(folder: &Path, date: &NaiveDateTime, leadtime: i64) -> PathBuf {
    let name = format!("lfff{:02}{:02}0000", leadtime / 24, leadtime % 24);
    folder.join(date.format("%y%m%d%H").to_string()).join(name)
}

pub(crate) fn open_grib(path: &Path) -> Result<GribFile> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    grib::from_reader(BufReader::new(file))
        .with_context(|| format!("cannot parse {}", path.display()))
}

fn extract_field(
    file: &GribFile,
    spec: &VariableSpec,
    column: &GridColumn,
    alt_bot: Option<f64>,
    alt_top: f64,
) -> Result<Profile> {
    let Some(param) = spec.model_param else {
        // observation-only variables are rejected upstream; be safe anyway
        return Ok(Profile::default());
    };

    let raw = match read_param_column(file, param, column.index) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            warn!("variable `{}`: parameter {} not in file", spec.short_name, param);
            return Ok(Profile::default());
        }
        Err(e) => {
            warn!("variable `{}`: reading parameter {} failed: {:#}", spec.short_name, param, e);
            return Ok(Profile::default());
        }
    };

    let Some(pairs) = pair_levels(&column.altitudes, &raw) else {
        warn!(
            "variable `{}`: {} levels do not match {} grid heights",
            spec.short_name,
            raw.len(),
            column.altitudes.len()
        );
        return Ok(Profile::default());
    };

    let points = pairs
        .into_iter()
        .map(|(alt, val)| (alt, variables::convert(spec, val)))
        .collect();
    Ok(Profile::from_points(points, alt_bot, alt_top))
}

/// Reads one vertical column of a parameter: its value at `index` on every
/// model level, ordered from model top downwards. Returns `None` if no
/// message in the file carries the parameter on model levels.
pub(crate) fn read_param_column(
    file: &GribFile,
    param: GribParam,
    index: usize,
) -> Result<Option<Vec<f64>>> {
    let mut levels: Vec<(f64, f64)> = Vec::new();

    for (_pos, submessage) in file.iter() {
        if submessage.indicator().discipline != param.discipline {
            continue;
        }
        let prod = submessage.prod_def();
        if prod.parameter_category() != Some(param.category)
            || prod.parameter_number() != Some(param.number)
        {
            continue;
        }
        let Some((surface, _)) = prod.fixed_surfaces() else {
            continue;
        };
        if !MODEL_LEVEL_TYPES.contains(&surface.surface_type) {
            continue;
        }
        let level = surface.value();

        let decoder = Grib2SubmessageDecoder::from(submessage)?;
        let mut values = decoder.dispatch()?;
        let Some(value) = values.nth(index) else {
            return Err(anyhow!(
                "column {} is beyond the grid of parameter {} on level {}",
                index,
                param,
                level
            ));
        };
        levels.push((level, value as f64));
    }

    if levels.is_empty() {
        return Ok(None);
    }
    // level 1 is the model top; ascending level number is descending altitude
    levels.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    Ok(Some(levels.into_iter().map(|(_, value)| value).collect()))
}

/// Pairs per-level values with the column's height levels. Height arrays one
/// element longer than the field are half-level interfaces; adjacent
/// interfaces are averaged to full levels.
pub(crate) fn pair_levels(altitudes: &[f64], values: &[f64]) -> Option<Vec<(f64, f64)>> {
    if altitudes.len() == values.len() {
        Some(altitudes.iter().copied().zip(values.iter().copied()).collect())
    } else if altitudes.len() == values.len() + 1 {
        Some(
            altitudes
                .windows(2)
                .map(|w| 0.5 * (w[0] + w[1]))
                .zip(values.iter().copied())
                .collect(),
        )
    } else {
        None
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn should_build_model_file_path() {
        let date = NaiveDate::from_ymd_opt(2021, 11, 18)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let path = model_file_path(&PathBuf::from("/data/icon"), &date, 11);
        assert_eq!(path, PathBuf::from("/data/icon/21111812/lfff00110000"));

        let path = model_file_path(&PathBuf::from("/data/icon"), &date, 33);
        assert_eq!(path, PathBuf::from("/data/icon/21111812/lfff01090000"));
    }

    #[test]
    fn should_report_missing_model_file() {
        let err = open_grib(&PathBuf::from("/no/such/lfff00000000")).err().unwrap();
        assert!(format!("{:#}", err).contains("cannot open"));
    }

    #[test]
    fn should_pair_full_levels() {
        let pairs = pair_levels(&[3000.0, 2000.0, 1000.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(pairs, vec![(3000.0, 1.0), (2000.0, 2.0), (1000.0, 3.0)]);
    }

    #[test]
    fn should_average_half_levels() {
        let pairs = pair_levels(&[3000.0, 2000.0, 1000.0], &[1.0, 2.0]).unwrap();
        assert_eq!(pairs, vec![(2500.0, 1.0), (1500.0, 2.0)]);
    }

    #[test]
    fn should_reject_mismatched_levels() {
        assert!(pair_levels(&[3000.0, 2000.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pair_levels(&[3000.0], &[1.0, 2.0, 3.0]).is_none());
    }
}
