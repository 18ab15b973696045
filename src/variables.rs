//! Variable registry: per-variable metadata driving extraction, retrieval
//! and plotting.
//!
//! One record per supported variable. The table is the single source of
//! truth for naming, units, value transformations and line appearance; both
//! the model-side and the observation-side pipeline go through it. Values
//! read from model output are converted with `value * scale + offset` so a
//! profile always carries physical display units (e.g. temperature in °C no
//! matter whether it came from the model in K or from an instrument already
//! in °C).

use std::fmt;

use plotters::style::RGBColor;

use crate::error::ProfileError;

/// Observation platform kind, selecting which instrument code applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Radiosonde,
    Station2m,
}

impl Platform {
    /// Device code used in data warehouse queries.
    pub fn query_code(&self) -> &'static str {
        match self {
            Platform::Radiosonde => "rs",
            Platform::Station2m => "2m",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Radiosonde => write!(f, "radiosonde"),
            Platform::Station2m => write!(f, "2-meter station"),
        }
    }
}

/// GRIB2 parameter identity: discipline, parameter category, parameter
/// number. Local-use numbers (>= 192) follow the model's code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GribParam {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
}

impl GribParam {
    pub const fn new(discipline: u8, category: u8, number: u8) -> Self {
        GribParam {
            discipline,
            category,
            number,
        }
    }
}

impl fmt::Display for GribParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.discipline, self.category, self.number)
    }
}

/// Line style for model series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
}

/// Two-point color gradient, sampled to color one series per leadtime.
#[derive(Debug, Clone, Copy)]
pub struct Colormap {
    pub start: RGBColor,
    pub end: RGBColor,
}

impl Colormap {
    /// Linear sample at `t` in `[0, 1]`.
    pub fn sample(&self, t: f64) -> RGBColor {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        RGBColor(
            mix(self.start.0, self.end.0),
            mix(self.start.1, self.end.1),
            mix(self.start.2, self.end.2),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VariableSpec {
    pub short_name: &'static str,
    pub long_name: &'static str,
    /// Display unit after conversion; may be empty for dimensionless values.
    pub unit: &'static str,
    /// Parameter identity in gridded model output; `None` for
    /// observation-only variables.
    pub model_param: Option<GribParam>,
    /// Fixed plotting bounds, used when `--xrange-fix` is set.
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Data warehouse parameter id per observation platform. A platform
    /// missing here means the variable cannot be observed there.
    pub instrument_codes: &'static [(Platform, &'static str)],
    pub color: RGBColor,
    pub marker: char,
    pub linestyle: LineStyle,
    pub colormap: Colormap,
    /// Affine unit conversion applied to raw model values.
    pub scale: f64,
    pub offset: f64,
    /// Whether repeated raw samples at one altitude are mean-reduced.
    pub is_averaged: bool,
}

impl VariableSpec {
    /// Instrument code for `platform`, if the variable is observable there.
    pub fn instrument_code(&self, platform: Platform) -> Option<&'static str> {
        self.instrument_codes
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, code)| *code)
    }
}

const BLACK: RGBColor = RGBColor(0, 0, 0);
const YELLOWGREEN: RGBColor = RGBColor(154, 205, 50);
const SEAGREEN: RGBColor = RGBColor(46, 139, 87);
const GOLDENROD: RGBColor = RGBColor(218, 165, 32);
const DARKBLUE: RGBColor = RGBColor(0, 0, 139);
const SKYBLUE: RGBColor = RGBColor(135, 206, 235);
const ORANGERED: RGBColor = RGBColor(255, 69, 0);

const VIRIDIS: Colormap = Colormap {
    start: RGBColor(68, 1, 84),
    end: RGBColor(253, 231, 37),
};
const VLAG: Colormap = Colormap {
    start: RGBColor(59, 76, 192),
    end: RGBColor(180, 4, 38),
};
const GOLDENROD_LIGHT: Colormap = Colormap {
    start: RGBColor(255, 250, 230),
    end: GOLDENROD,
};

const BASE: VariableSpec = VariableSpec {
    short_name: "",
    long_name: "",
    unit: "",
    model_param: None,
    min_value: None,
    max_value: None,
    instrument_codes: &[],
    color: BLACK,
    marker: 'o',
    linestyle: LineStyle::Solid,
    colormap: VIRIDIS,
    scale: 1.0,
    offset: 0.0,
    is_averaged: false,
};

/// The registry. Built at compile time, immutable for the process lifetime.
pub static REGISTRY: &[VariableSpec] = &[
    VariableSpec {
        short_name: "altitude",
        long_name: "Altitude",
        unit: "m asl",
        min_value: Some(0.0),
        max_value: Some(5000.0),
        instrument_codes: &[(Platform::Radiosonde, "742")],
        ..BASE
    },
    VariableSpec {
        short_name: "cbh",
        long_name: "Cloud base height",
        unit: "m",
        min_value: Some(0.0),
        max_value: Some(2000.0),
        instrument_codes: &[(Platform::Station2m, "1541")],
        scale: 0.3048,
        ..BASE
    },
    VariableSpec {
        short_name: "clc",
        long_name: "Cloud cover",
        unit: "",
        model_param: Some(GribParam::new(0, 6, 22)),
        min_value: Some(-0.05),
        max_value: Some(1.05),
        color: YELLOWGREEN,
        ..BASE
    },
    VariableSpec {
        short_name: "ddt_t_rad_lw",
        long_name: "T-tend LW radiation",
        unit: "K/h",
        model_param: Some(GribParam::new(0, 5, 192)),
        min_value: Some(-3.0),
        max_value: Some(3.0),
        color: SEAGREEN,
        colormap: VLAG,
        scale: 3600.0,
        ..BASE
    },
    VariableSpec {
        short_name: "ddt_t_rad_sw",
        long_name: "T-tend SW radiation",
        unit: "K/h",
        model_param: Some(GribParam::new(0, 4, 192)),
        min_value: Some(-3.0),
        max_value: Some(3.0),
        color: GOLDENROD,
        colormap: GOLDENROD_LIGHT,
        scale: 3600.0,
        ..BASE
    },
    VariableSpec {
        short_name: "dewp_temp",
        long_name: "Dew point temperature",
        unit: "°C",
        min_value: Some(-5.0),
        max_value: Some(15.0),
        instrument_codes: &[(Platform::Radiosonde, "747")],
        ..BASE
    },
    VariableSpec {
        short_name: "hor_vis",
        long_name: "Horizontal visibility",
        unit: "m",
        min_value: Some(0.0),
        max_value: Some(5000.0),
        instrument_codes: &[(Platform::Station2m, "1547")],
        ..BASE
    },
    VariableSpec {
        short_name: "qc",
        long_name: "Cloud water",
        unit: "g/kg",
        model_param: Some(GribParam::new(0, 1, 22)),
        min_value: Some(-0.01),
        max_value: Some(0.07),
        color: DARKBLUE,
        scale: 1000.0,
        ..BASE
    },
    VariableSpec {
        short_name: "qc_dia",
        long_name: "Diagnostic cloud water",
        unit: "g/kg",
        model_param: Some(GribParam::new(0, 1, 212)),
        min_value: Some(-0.01),
        max_value: Some(0.07),
        color: DARKBLUE,
        scale: 1000.0,
        ..BASE
    },
    VariableSpec {
        short_name: "qi_dia",
        long_name: "Diagnostic cloud ice",
        unit: "g/kg",
        model_param: Some(GribParam::new(0, 1, 213)),
        min_value: Some(-0.01),
        max_value: Some(0.07),
        color: DARKBLUE,
        scale: 1000.0,
        ..BASE
    },
    VariableSpec {
        short_name: "qv",
        long_name: "Specific humidity",
        unit: "g/kg",
        model_param: Some(GribParam::new(0, 1, 0)),
        min_value: Some(0.0),
        max_value: Some(6.0),
        color: SKYBLUE,
        scale: 1000.0,
        ..BASE
    },
    VariableSpec {
        short_name: "qv_dia",
        long_name: "Diagnostic humidity",
        unit: "g/kg",
        model_param: Some(GribParam::new(0, 1, 211)),
        min_value: Some(-0.01),
        max_value: Some(0.07),
        color: DARKBLUE,
        scale: 1000.0,
        ..BASE
    },
    VariableSpec {
        short_name: "rel_hum",
        long_name: "Relative humidity",
        unit: "%",
        model_param: Some(GribParam::new(0, 1, 1)),
        min_value: Some(0.0),
        max_value: Some(100.0),
        instrument_codes: &[(Platform::Radiosonde, "746")],
        ..BASE
    },
    VariableSpec {
        short_name: "temp",
        long_name: "Temperature",
        unit: "°C",
        model_param: Some(GribParam::new(0, 0, 0)),
        min_value: Some(-3.0),
        max_value: Some(5.0),
        instrument_codes: &[(Platform::Radiosonde, "745"), (Platform::Station2m, "91")],
        color: ORANGERED,
        offset: -273.0,
        ..BASE
    },
    VariableSpec {
        short_name: "ver_vis",
        long_name: "Vertical visibility",
        unit: "m",
        min_value: Some(0.0),
        max_value: Some(1000.0),
        instrument_codes: &[(Platform::Station2m, "6199")],
        scale: 0.3048,
        ..BASE
    },
    VariableSpec {
        short_name: "wind_dir",
        long_name: "Wind direction",
        unit: "°",
        min_value: Some(0.0),
        max_value: Some(360.0),
        instrument_codes: &[(Platform::Radiosonde, "743")],
        ..BASE
    },
    VariableSpec {
        short_name: "wind_vel",
        long_name: "Wind velocity",
        unit: "m/s",
        min_value: Some(0.0),
        max_value: Some(30.0),
        instrument_codes: &[(Platform::Radiosonde, "748")],
        ..BASE
    },
];

/// Looks up a variable by short name.
pub fn lookup(short_name: &str) -> Result<&'static VariableSpec, ProfileError> {
    REGISTRY
        .iter()
        .find(|spec| spec.short_name == short_name)
        .ok_or_else(|| ProfileError::UnknownVariable(short_name.to_string()))
}

/// Converts a raw model value to display units.
pub fn convert(spec: &VariableSpec, raw: f64) -> f64 {
    raw * spec.scale + spec.offset
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_have_names_and_units_for_all_entries() {
        for spec in REGISTRY {
            assert!(!spec.short_name.is_empty());
            assert!(!spec.long_name.is_empty(), "{}", spec.short_name);
            // unit may legitimately be empty only for dimensionless cloud cover
            if spec.short_name != "clc" {
                assert!(!spec.unit.is_empty(), "{}", spec.short_name);
            }
        }
    }

    #[test]
    fn should_look_up_registered_variable() {
        let spec = lookup("qv").unwrap();
        assert_eq!(spec.long_name, "Specific humidity");
        assert_eq!(spec.model_param, Some(GribParam::new(0, 1, 0)));
        assert_eq!(spec.scale, 1000.0);
    }

    #[test]
    fn should_fail_lookup_of_unregistered_variable() {
        let err = lookup("pressure").unwrap_err();
        assert!(matches!(err, ProfileError::UnknownVariable(ref name) if name == "pressure"));
    }

    #[test]
    fn should_convert_kelvin_to_celsius() {
        let spec = lookup("temp").unwrap();
        assert_eq!(spec.scale, 1.0);
        assert_eq!(spec.offset, -273.0);
        assert!((convert(spec, 293.15) - 20.15).abs() < 1e-12);
    }

    #[test]
    fn should_convert_with_scale_only() {
        let spec = lookup("qc").unwrap();
        assert!((convert(spec, 0.000012) - 0.012).abs() < 1e-12);
    }

    #[test]
    fn should_find_instrument_code_per_platform() {
        let temp = lookup("temp").unwrap();
        assert_eq!(temp.instrument_code(Platform::Radiosonde), Some("745"));
        assert_eq!(temp.instrument_code(Platform::Station2m), Some("91"));

        let clc = lookup("clc").unwrap();
        assert_eq!(clc.instrument_code(Platform::Radiosonde), None);
    }

    #[test]
    fn should_format_grib_param() {
        assert_eq!(GribParam::new(0, 1, 22).to_string(), "0.1.22");
    }

    #[test]
    fn should_sample_colormap_endpoints() {
        assert_eq!(VIRIDIS.sample(0.0).0, 68);
        assert_eq!(VIRIDIS.sample(1.0).0, 253);
        let mid = VIRIDIS.sample(0.5);
        assert!(mid.0 > 68 && mid.0 < 253);
    }
}
