//! Retrieve observational profiles from the data warehouse service.
//!
//! The service is queried per timestamp with the platform device code, the
//! station and the registry's instrument codes, and answers with a small
//! CSV table: an `altitude` column followed by one column per requested
//! code. Missing samples are empty cells or the warehouse fill value.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::error::ProfileError;
use crate::profile::{Profile, TimestampProfiles};
use crate::variables::{Platform, VariableSpec};

/// Warehouse fill value; anything this large is a missing sample.
const FILL_THRESHOLD: f64 = 9.0e6;

/// Retrieves one profile per (variable, timestamp) for `station`.
///
/// Instrument codes are resolved up front so an unobservable variable fails
/// before any query is issued. A failed query for one timestamp yields
/// empty profiles for that timestamp and a warning.
pub async fn retrieve(
    base_url: &str,
    platform: Platform,
    station: &str,
    specs: &[&'static VariableSpec],
    timestamps: &[NaiveDateTime],
    alt_bot: Option<f64>,
    alt_top: f64,
) -> Result<BTreeMap<String, TimestampProfiles>> {
    let codes = instrument_codes(platform, specs)?;

    let mut profiles: BTreeMap<String, TimestampProfiles> = specs
        .iter()
        .map(|spec| (spec.short_name.to_string(), TimestampProfiles::new()))
        .collect();

    for &timestamp in timestamps {
        let records = match query(base_url, platform, station, &codes, timestamp).await {
            Ok(records) => records,
            Err(e) => {
                warn!("no {} observation for {}: {:#}", platform, timestamp, e);
                Vec::new()
            }
        };

        for (i, spec) in specs.iter().enumerate() {
            let profile = profile_from_records(&records, i, spec, alt_bot, alt_top);
            if let Some(entry) = profiles.get_mut(spec.short_name) {
                entry.insert(timestamp, profile);
            }
        }
    }

    Ok(profiles)
}

/// Resolves the platform-specific code for every variable, failing with
/// `VariableNotObservable` for variables the platform cannot measure.
pub fn instrument_codes(
    platform: Platform,
    specs: &[&VariableSpec],
) -> Result<Vec<String>, ProfileError> {
    specs
        .iter()
        .map(|spec| {
            spec.instrument_code(platform)
                .map(str::to_string)
                .ok_or_else(|| ProfileError::VariableNotObservable {
                    variable: spec.short_name.to_string(),
                    platform: platform.to_string(),
                })
        })
        .collect()
}

async fn query(
    base_url: &str,
    platform: Platform,
    station: &str,
    codes: &[String],
    timestamp: NaiveDateTime,
) -> Result<Vec<ObsRecord>> {
    let url = format!(
        "{}/retrieve?device={}&station={}&parameters={}&timestamp={}",
        base_url.trim_end_matches('/'),
        platform.query_code(),
        station,
        codes.join(","),
        timestamp.format("%Y%m%d%H%M")
    );
    debug!("querying {}", url);

    let response = reqwest::get(&url).await?;
    if !response.status().is_success() {
        bail!("query failed with status {}", response.status());
    }
    let body = response.text().await?;

    parse_response(&body, codes.len())
}

/// One warehouse row: an altitude and one optional value per requested code.
#[derive(Debug, Clone)]
pub(crate) struct ObsRecord {
    pub altitude: f64,
    pub values: Vec<Option<f64>>,
}

impl ObsRecord {
    fn from_line(line: &str, ncodes: usize) -> Result<Self> {
        let mut fields = line.split(',');
        let altitude = fields
            .next()
            .ok_or_else(|| anyhow!("empty line"))?
            .trim()
            .parse::<f64>()?;

        let mut values: Vec<Option<f64>> = fields.map(parse_and_filter).collect();
        if values.len() != ncodes {
            bail!("expected {} value columns, found {}", ncodes, values.len());
        }
        // fill altitudes invalidate the whole row
        if !altitude.is_finite() || altitude.abs() >= FILL_THRESHOLD {
            values = vec![None; ncodes];
        }

        Ok(ObsRecord { altitude, values })
    }
}

fn parse_and_filter(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() < FILL_THRESHOLD)
}

pub(crate) fn parse_response(body: &str, ncodes: usize) -> Result<Vec<ObsRecord>> {
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());

    let header = lines.next().ok_or_else(|| anyhow!("empty response"))?;
    if !header.trim_start().starts_with("altitude") {
        bail!("unexpected response header `{}`", header.trim());
    }

    lines.map(|line| ObsRecord::from_line(line, ncodes)).collect()
}

fn profile_from_records(
    records: &[ObsRecord],
    column: usize,
    spec: &VariableSpec,
    alt_bot: Option<f64>,
    alt_top: f64,
) -> Profile {
    let mut points: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| r.values.get(column).copied().flatten().map(|v| (r.altitude, v)))
        .collect();

    if spec.is_averaged {
        points = mean_reduce(points);
    }

    Profile::from_points(points, alt_bot, alt_top)
}

/// Averages values that share an altitude (repeated raw samples).
pub(crate) fn mean_reduce(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut reduced: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    let mut count = 0.0;
    for (alt, val) in points {
        match reduced.last_mut() {
            Some(last) if last.0 == alt => {
                last.1 = (last.1 * count + val) / (count + 1.0);
                count += 1.0;
            }
            _ => {
                reduced.push((alt, val));
                count = 1.0;
            }
        }
    }
    reduced
}

// -- Tests -------------------------------------------------------------------
