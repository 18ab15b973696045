//! Command line interface.

pub mod command;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{command, Args, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plot vertical profiles of model variables, optionally with
    /// radiosonde overlays
    Profiles(ProfilesArgs),
}

#[derive(Args, Debug)]
pub struct ProfilesArgs {
    /// Init date of the model run: YYMMDDHH
    #[arg(long, value_parser = parse_init_date)]
    pub date: NaiveDateTime,

    /// Main folder with model output; contains one subfolder per init date
    #[arg(long)]
    pub folder: PathBuf,

    /// Variable short name(s); repeat the flag for multiple variables
    #[arg(long = "var", required = true)]
    pub var: Vec<String>,

    /// Reference grid file with coordinates and the model level heights
    #[arg(long)]
    pub grid: PathBuf,

    /// Leadtime(s) in hours shown in one plot
    #[arg(long = "leadtime", default_values_t = vec![0i64])]
    pub leadtime: Vec<i64>,

    /// Latitude of location
    #[arg(long, default_value_t = 46.81281)]
    pub lat: f64,

    /// Longitude of location
    #[arg(long, default_value_t = 6.94363)]
    pub lon: f64,

    /// Grid column index of location (known from previous runs)
    #[arg(long)]
    pub ind: Option<usize>,

    /// Name of location
    #[arg(long, default_value = "pay")]
    pub loc: String,

    /// NWP model name
    #[arg(long, default_value = "icon-1")]
    pub model: String,

    /// Altitude bottom; default: surface
    #[arg(long)]
    pub alt_bot: Option<f64>,

    /// Altitude top
    #[arg(long, default_value_t = 2000.0)]
    pub alt_top: f64,

    /// Add a radiosounding for the given leadtime(s)
    #[arg(long = "add-rs")]
    pub add_rs: Vec<i64>,

    /// Shade cloud layers
    #[arg(long)]
    pub add_clouds: bool,

    /// Relative humidity threshold for cloud shading
    #[arg(long, default_value_t = 98.0)]
    pub relhum_thresh: f64,

    /// Base URL of the observation data warehouse service
    #[arg(long, default_value = "http://wdp-service.meteoswiss.ch/dwh")]
    pub obs_url: String,

    /// Folder where the plots are saved
    #[arg(long, default_value = ".")]
    pub outpath: PathBuf,

    /// Output format(s) of the figures
    #[arg(long = "datatypes", value_enum, default_values_t = vec![OutputFormat::Png])]
    pub datatypes: Vec<OutputFormat>,

    /// String appended to the output filename
    #[arg(long)]
    pub appendix: Option<String>,

    /// Show grid lines on the plot
    #[arg(long)]
    pub show_grid: bool,

    /// Add point markers to model series
    #[arg(long)]
    pub show_marker: bool,

    /// Draw a vertical line at x = 0
    #[arg(long)]
    pub zeroline: bool,

    /// Use the registry's fixed x-range; overrides --xmin and --xmax
    #[arg(long)]
    pub xrange_fix: bool,

    /// Minimum x-axis value, one per variable
    #[arg(long = "xmin")]
    pub xmin: Vec<f64>,

    /// Maximum x-axis value, one per variable
    #[arg(long = "xmax")]
    pub xmax: Vec<f64>,

    /// Output details on what is happening
    #[arg(long)]
    pub verbose: bool,
}

/// Output format of the rendered figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Png,
    Svg,
    Jpeg,
    Bmp,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Bmp => "bmp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

fn parse_init_date(s: &str) -> Result<NaiveDateTime, String> {
    if s.len() != 8 {
        return Err(format!("`{}` is not a YYMMDDHH date", s));
    }
    let date = NaiveDate::parse_from_str(&s[..6], "%y%m%d").map_err(|e| e.to_string())?;
    let hour: u32 = s[6..8].parse().map_err(|_| format!("invalid hour `{}`", &s[6..8]))?;
    date.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| format!("invalid hour {}", hour))
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_parse_init_date() {
        let date = parse_init_date("21111812").unwrap();
        assert_eq!(date.format("%Y-%m-%d %H:%M").to_string(), "2021-11-18 12:00");
    }

    #[test]
    fn should_reject_malformed_init_date() {
        assert!(parse_init_date("2021-11-18").is_err());
        assert!(parse_init_date("21111825").is_err());
        assert!(parse_init_date("211118").is_err());
    }
}
