//! Compose profile figures and write them to disk.
//!
//! Layout follows the variable count: one variable fills a single panel,
//! two variables share one figure side by side, three or more get one
//! figure each. Within a panel, leadtimes multiplex as separate series
//! colored from the variable's colormap; observation timestamps overlay as
//! dashed black series.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDateTime;
use log::warn;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::cli::OutputFormat;
use crate::profile::{Profile, ProfileSet};
use crate::variables::{LineStyle, VariableSpec};

const FIGURE_SIZE: (u32, u32) = (640, 800);
const MARGIN_FRAC: f64 = 0.05;
const CLOUD_COLOR: RGBColor = RGBColor(160, 160, 160);

#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub outpath: PathBuf,
    pub date: NaiveDateTime,
    pub location: String,
    pub model_name: String,
    pub leadtimes: Vec<i64>,
    pub alt_bot: Option<f64>,
    pub alt_top: f64,
    pub add_clouds: bool,
    pub relhum_thresh: f64,
    pub xmin: Vec<f64>,
    pub xmax: Vec<f64>,
    pub xrange_fix: bool,
    pub datatypes: Vec<OutputFormat>,
    pub appendix: Option<String>,
    pub show_grid: bool,
    pub show_marker: bool,
    pub zeroline: bool,
}

/// Renders all figures for the requested variables, one artifact per
/// requested output format. Returns the written paths.
pub fn compose(
    specs: &[&'static VariableSpec],
    set: &ProfileSet,
    opts: &PlotOptions,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for group in figure_groups(specs) {
        for &format in &opts.datatypes {
            let path = figure_path(&group, opts, format);
            render(&group, set, opts, format, &path)?;
            written.push(path);
        }
    }

    Ok(written)
}

/// Figure layout state machine: exactly two variables share one figure,
/// any other count gets one figure per variable.
pub(crate) fn figure_groups(
    specs: &[&'static VariableSpec],
) -> Vec<Vec<(usize, &'static VariableSpec)>> {
    let indexed: Vec<(usize, &'static VariableSpec)> =
        specs.iter().copied().enumerate().collect();

    match indexed.len() {
        2 => vec![indexed],
        _ => indexed.into_iter().map(|entry| vec![entry]).collect(),
    }
}

fn figure_path(
    group: &[(usize, &'static VariableSpec)],
    opts: &PlotOptions,
    format: OutputFormat,
) -> PathBuf {
    let vars: Vec<&str> = group.iter().map(|(_, spec)| spec.short_name).collect();
    let leadtimes: Vec<String> = opts.leadtimes.iter().map(|lt| lt.to_string()).collect();
    let appendix = opts
        .appendix
        .as_deref()
        .map(|a| format!("_{}", a))
        .unwrap_or_default();

    let name = format!(
        "profiles_{}_{}_{}_{}h{}.{}",
        opts.date.format("%y%m%d%H"),
        opts.location,
        vars.join("-"),
        leadtimes.join("-"),
        appendix,
        format.extension()
    );
    opts.outpath.join(name)
}

fn render(
    group: &[(usize, &'static VariableSpec)],
    set: &ProfileSet,
    opts: &PlotOptions,
    format: OutputFormat,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        OutputFormat::Svg => {
            let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
            draw_figure(root, group, set, opts)
        }
        // BitMapBackend picks the encoder from the file extension
        _ => {
            let root = BitMapBackend::new(path, FIGURE_SIZE).into_drawing_area();
            draw_figure(root, group, set, opts)
        }
    }
}

fn draw_figure<DB>(
    root: DrawingArea<DB, Shift>,
    group: &[(usize, &'static VariableSpec)],
    set: &ProfileSet,
    opts: &PlotOptions,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let panels = root.split_evenly((1, group.len()));
    for (panel, &(var_index, spec)) in panels.iter().zip(group.iter()) {
        draw_panel(panel, var_index, spec, set, opts)?;
    }

    root.present()?;
    Ok(())
}

fn draw_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    var_index: usize,
    spec: &'static VariableSpec,
    set: &ProfileSet,
    opts: &PlotOptions,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let model = set.model.get(spec.short_name);
    let obs = set.observation.get(spec.short_name);

    let extent = data_extent(model, obs);
    if extent.is_none() {
        warn!("variable `{}`: no data to plot", spec.short_name);
    }
    let (xmin, xmax) = x_bounds(spec, var_index, extent, opts);
    let (ybot, ytop) = y_bounds(model, obs, opts);

    let caption = format!(
        "{} {}, {}",
        opts.model_name,
        opts.date.format("%d.%m.%Y %H UTC"),
        opts.location
    );
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18))
        .margin(12)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(xmin..xmax, ybot..ytop)?;

    let x_desc = if spec.unit.is_empty() {
        spec.long_name.to_string()
    } else {
        format!("{} ({})", spec.long_name, spec.unit)
    };
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(x_desc).y_desc("Altitude (m asl)");
    if !opts.show_grid {
        mesh.disable_mesh();
    }
    mesh.draw()?;

    // cloud shading first, series draw on top of it
    if opts.add_clouds {
        for (lo, hi) in cloud_bands(spec, set, opts) {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(xmin, lo), (xmax, hi)],
                CLOUD_COLOR.mix(0.35).filled(),
            )))?;
        }
    }

    if opts.zeroline && xmin < 0.0 && xmax > 0.0 {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, ybot), (0.0, ytop)],
            BLACK.stroke_width(1),
        )))?;
    }

    if let Some(model) = model {
        let count = model.len();
        for (k, (&leadtime, profile)) in model.iter().enumerate() {
            if profile.is_empty() {
                continue;
            }
            let t = if count > 1 { k as f64 / (count - 1) as f64 } else { 0.5 };
            let color = spec.colormap.sample(t);
            let series: Vec<(f64, f64)> =
                profile.points.iter().map(|&(alt, val)| (val, alt)).collect();

            let style = color.stroke_width(2);
            match spec.linestyle {
                LineStyle::Solid => {
                    chart
                        .draw_series(LineSeries::new(series.iter().copied(), style))?
                        .label(format!("+{}h", leadtime))
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                        });
                }
                LineStyle::Dashed => {
                    chart
                        .draw_series(DashedLineSeries::new(series.iter().copied(), 6, 3, style))?
                        .label(format!("+{}h", leadtime))
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                        });
                }
            }

            if opts.show_marker {
                chart.draw_series(
                    series.iter().map(|&point| Circle::new(point, 3, color.filled())),
                )?;
            }
        }
    }

    if let Some(obs) = obs {
        for (&timestamp, profile) in obs.iter() {
            if profile.is_empty() {
                continue;
            }
            let series: Vec<(f64, f64)> =
                profile.points.iter().map(|&(alt, val)| (val, alt)).collect();

            chart
                .draw_series(DashedLineSeries::new(
                    series.iter().copied(),
                    5,
                    4,
                    BLACK.stroke_width(2),
                ))?
                .label(format!("RS {}", timestamp.format("%d.%m. %H UTC")))
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], BLACK.stroke_width(2))
                });
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.4))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    Ok(())
}

/// Value extent over every non-empty series of the panel.
fn data_extent(
    model: Option<&crate::profile::LeadtimeProfiles>,
    obs: Option<&crate::profile::TimestampProfiles>,
) -> Option<(f64, f64)> {
    let mut extent: Option<(f64, f64)> = None;
    let mut merge = |e: Option<(f64, f64)>| {
        if let Some((lo, hi)) = e {
            extent = match extent {
                None => Some((lo, hi)),
                Some((a, b)) => Some((a.min(lo), b.max(hi))),
            };
        }
    };

    if let Some(model) = model {
        for profile in model.values() {
            merge(profile.value_extent());
        }
    }
    if let Some(obs) = obs {
        for profile in obs.values() {
            merge(profile.value_extent());
        }
    }
    extent
}

/// X-axis policy: the registry's fixed range when `--xrange-fix` is set,
/// else explicit per-variable bounds, else the data extent with a margin.
pub(crate) fn x_bounds(
    spec: &VariableSpec,
    var_index: usize,
    data_extent: Option<(f64, f64)>,
    opts: &PlotOptions,
) -> (f64, f64) {
    if opts.xrange_fix {
        if let (Some(lo), Some(hi)) = (spec.min_value, spec.max_value) {
            return (lo, hi);
        }
    }

    let (mut lo, mut hi) = match data_extent {
        Some((lo, hi)) if lo < hi => {
            let margin = (hi - lo) * MARGIN_FRAC;
            (lo - margin, hi + margin)
        }
        Some((lo, _)) => (lo - 0.5, lo + 0.5),
        None => (0.0, 1.0),
    };

    if let Some(xmin) = opts.xmin.get(var_index) {
        lo = *xmin;
    }
    if let Some(xmax) = opts.xmax.get(var_index) {
        hi = *xmax;
    }
    if lo >= hi {
        hi = lo + 1.0;
    }
    (lo, hi)
}

fn y_bounds(
    model: Option<&crate::profile::LeadtimeProfiles>,
    obs: Option<&crate::profile::TimestampProfiles>,
    opts: &PlotOptions,
) -> (f64, f64) {
    let bottom = opts.alt_bot.unwrap_or_else(|| {
        let mut lowest = f64::INFINITY;
        let mut visit = |profile: &Profile| {
            if let Some((lo, _)) = profile.altitude_extent() {
                lowest = lowest.min(lo);
            }
        };
        if let Some(model) = model {
            model.values().for_each(&mut visit);
        }
        if let Some(obs) = obs {
            obs.values().for_each(&mut visit);
        }
        if lowest.is_finite() {
            lowest
        } else {
            0.0
        }
    });
    (bottom, opts.alt_top)
}

/// Altitude bands to shade as cloud, derived from the relative humidity
/// profiles in the set. Observation humidity is preferred; without it the
/// model humidity of each leadtime is used.
fn cloud_bands(
    primary: &VariableSpec,
    set: &ProfileSet,
    opts: &PlotOptions,
) -> Vec<(f64, f64)> {
    let humidity: Vec<&Profile> = match set.observation.get("rel_hum") {
        Some(obs) => obs.values().filter(|p| !p.is_empty()).collect(),
        None => set
            .model
            .get("rel_hum")
            .map(|model| model.values().filter(|p| !p.is_empty()).collect())
            .unwrap_or_default(),
    };

    // align onto the primary variable's altitude grid where available
    let grid = first_profile(primary, set);

    let mut bands = Vec::new();
    for relhum in humidity {
        let reference = grid.filter(|p| !p.is_empty()).unwrap_or(relhum);
        bands.extend(cloud_spans(reference, relhum, opts.relhum_thresh));
    }
    bands
}

fn first_profile<'a>(spec: &VariableSpec, set: &'a ProfileSet) -> Option<&'a Profile> {
    if let Some(obs) = set.observation.get(spec.short_name) {
        if let Some(profile) = obs.values().find(|p| !p.is_empty()) {
            return Some(profile);
        }
    }
    set.model
        .get(spec.short_name)
        .and_then(|model| model.values().find(|p| !p.is_empty()))
}

/// Contiguous altitude spans of `reference` whose nearest humidity level
/// reaches `thresh`.
pub(crate) fn cloud_spans(
    reference: &Profile,
    relhum: &Profile,
    thresh: f64,
) -> Vec<(f64, f64)> {
    let mut spans = Vec::new();
    let mut current: Option<(f64, f64)> = None;

    for &(alt, _) in &reference.points {
        let cloudy = relhum
            .nearest_value(alt)
            .map_or(false, |rh| rh >= thresh);
        match (cloudy, current.as_mut()) {
            (true, Some(span)) => span.1 = alt,
            (true, None) => current = Some((alt, alt)),
            (false, _) => {
                if let Some(span) = current.take() {
                    spans.push(span);
                }
            }
        }
    }
    if let Some(span) = current {
        spans.push(span);
    }
    spans
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use tempfile::TempDir;

    use crate::profile::LeadtimeProfiles;
    use crate::variables::lookup;

    use super::*;

    fn options(outpath: PathBuf) -> PlotOptions {
        PlotOptions {
            outpath,
            date: NaiveDate::from_ymd_opt(2021, 11, 18)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            location: "pay".to_string(),
            model_name: "icon-1".to_string(),
            leadtimes: vec![6, 12],
            alt_bot: None,
            alt_top: 2000.0,
            add_clouds: false,
            relhum_thresh: 98.0,
            xmin: vec![],
            xmax: vec![],
            xrange_fix: false,
            datatypes: vec![OutputFormat::Png],
            appendix: None,
            show_grid: false,
            show_marker: false,
            zeroline: false,
        }
    }

    fn profile(points: &[(f64, f64)]) -> Profile {
        Profile::from_points(points.to_vec(), None, 10_000.0)
    }

    #[test]
    fn should_split_three_variables_into_three_figures() {
        let specs = [lookup("temp").unwrap(), lookup("qc").unwrap(), lookup("qv").unwrap()];
        let groups = figure_groups(&specs);

        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn should_combine_exactly_two_variables() {
        let specs = [lookup("temp").unwrap(), lookup("qc").unwrap()];
        let groups = figure_groups(&specs);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].0, 0);
        assert_eq!(groups[0][1].0, 1);
    }

    #[test]
    fn should_plot_single_variable_in_one_figure() {
        let specs = [lookup("temp").unwrap()];
        assert_eq!(figure_groups(&specs).len(), 1);
    }

    #[test]
    fn should_prefer_fixed_range_over_explicit_xmin() {
        let temp = lookup("temp").unwrap();
        let mut opts = options(PathBuf::new());
        opts.xrange_fix = true;
        opts.xmin = vec![-10.0];

        let bounds = x_bounds(temp, 0, Some((-20.0, 30.0)), &opts);
        assert_eq!(bounds, (-3.0, 5.0));
    }

    #[test]
    fn should_apply_explicit_bounds_over_data_extent() {
        let temp = lookup("temp").unwrap();
        let mut opts = options(PathBuf::new());
        opts.xmin = vec![-10.0];
        opts.xmax = vec![12.0];

        let bounds = x_bounds(temp, 0, Some((-2.0, 4.0)), &opts);
        assert_eq!(bounds, (-10.0, 12.0));
    }

    #[test]
    fn should_pad_data_extent() {
        let temp = lookup("temp").unwrap();
        let opts = options(PathBuf::new());

        let (lo, hi) = x_bounds(temp, 0, Some((0.0, 10.0)), &opts);
        assert_eq!((lo, hi), (-0.5, 10.5));
    }

    #[test]
    fn should_fall_back_without_data() {
        let temp = lookup("temp").unwrap();
        let opts = options(PathBuf::new());

        assert_eq!(x_bounds(temp, 0, None, &opts), (0.0, 1.0));
    }

    #[test]
    fn should_derive_cloud_spans_from_humidity() {
        let reference = profile(&[
            (500.0, 1.0),
            (600.0, 1.0),
            (700.0, 1.0),
            (800.0, 1.0),
            (900.0, 1.0),
        ]);
        let relhum = profile(&[
            (500.0, 50.0),
            (600.0, 99.0),
            (700.0, 98.5),
            (800.0, 60.0),
            (900.0, 99.0),
        ]);

        let spans = cloud_spans(&reference, &relhum, 98.0);
        assert_eq!(spans, vec![(600.0, 700.0), (900.0, 900.0)]);
    }

    #[test]
    fn should_not_shade_dry_profile() {
        let reference = profile(&[(500.0, 1.0), (600.0, 1.0)]);
        let relhum = profile(&[(500.0, 50.0), (600.0, 60.0)]);

        assert!(cloud_spans(&reference, &relhum, 98.0).is_empty());
    }

    #[test]
    fn should_render_remaining_series_when_one_leadtime_is_empty() {
        let tmp = TempDir::new().unwrap();
        let temp = lookup("temp").unwrap();

        let mut leadtimes = LeadtimeProfiles::new();
        leadtimes.insert(6, profile(&[(500.0, 2.0), (1000.0, -1.0), (1500.0, -4.0)]));
        leadtimes.insert(12, Profile::default());

        let mut set = ProfileSet::default();
        set.model = BTreeMap::from([("temp".to_string(), leadtimes)]);

        let opts = options(tmp.path().to_path_buf());
        let written = compose(&[temp], &set, &opts).unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].exists());
        assert_eq!(
            written[0].file_name().unwrap().to_str().unwrap(),
            "profiles_21111812_pay_temp_6-12h.png"
        );
    }

    #[test]
    fn should_write_one_artifact_per_format() {
        let tmp = TempDir::new().unwrap();
        let temp = lookup("temp").unwrap();

        let mut leadtimes = LeadtimeProfiles::new();
        leadtimes.insert(0, profile(&[(500.0, 2.0), (1000.0, -1.0)]));
        let mut set = ProfileSet::default();
        set.model = BTreeMap::from([("temp".to_string(), leadtimes)]);

        let mut opts = options(tmp.path().to_path_buf());
        opts.leadtimes = vec![0];
        opts.datatypes = vec![OutputFormat::Png, OutputFormat::Svg];

        let written = compose(&[temp], &set, &opts).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }
}
