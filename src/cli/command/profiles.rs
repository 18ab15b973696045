//! The `profiles` command: extract, retrieve and plot vertical profiles.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDateTime;
use log::info;

use crate::{
    cli::{create_spinner, ProfilesArgs},
    error::ProfileError,
    extract,
    locate::{self, LocationQuery},
    plot::{self, PlotOptions},
    profile::ProfileSet,
    retrieve,
    variables::{self, Platform, VariableSpec},
};

use super::validtime_from_leadtime;

pub async fn profiles(args: &ProfilesArgs) -> Result<Vec<PathBuf>> {
    let specs = resolve_variables(&args.var)?;
    check_options(args)?;

    // the column is resolved once; every extraction reuses the same index
    let query = match args.ind {
        Some(ind) => LocationQuery::Index(ind),
        None => LocationQuery::LatLon {
            lat: args.lat,
            lon: args.lon,
        },
    };
    let column = locate::resolve(&query, &args.grid)?;
    info!(
        "location `{}` resolved to grid column {} ({:.4} N, {:.4} E)",
        args.loc, column.index, column.latitude, column.longitude
    );

    let mut set = ProfileSet::default();

    let relhum = variables::lookup("rel_hum")?;
    let mut model_vars = specs.clone();
    if args.add_clouds
        && args.add_rs.is_empty()
        && !model_vars.iter().any(|s| s.short_name == "rel_hum")
    {
        // no sounding requested: model humidity drives the cloud shading
        model_vars.push(relhum);
    }

    let bar = create_spinner("Extracting model profiles...".to_string());
    set.model = extract::extract(
        &args.folder,
        &args.date,
        &args.leadtime,
        &model_vars,
        &column,
        args.alt_bot,
        args.alt_top,
    )?;
    bar.finish_with_message("Model profiles extracted");

    if !args.add_rs.is_empty() {
        let mut obs_vars = vec![specs[0]];
        if args.add_clouds && specs[0].short_name != "rel_hum" {
            obs_vars.push(relhum);
        }
        let timestamps: Vec<NaiveDateTime> = args
            .add_rs
            .iter()
            .map(|&lt| validtime_from_leadtime(&args.date, lt))
            .collect();

        let bar = create_spinner("Retrieving radiosonde observations...".to_string());
        set.observation = retrieve::retrieve(
            &args.obs_url,
            Platform::Radiosonde,
            &args.loc,
            &obs_vars,
            &timestamps,
            args.alt_bot,
            args.alt_top,
        )
        .await?;
        bar.finish_with_message("Observations retrieved");
    }

    let opts = PlotOptions {
        outpath: args.outpath.clone(),
        date: args.date,
        location: args.loc.clone(),
        model_name: args.model.clone(),
        leadtimes: args.leadtime.clone(),
        alt_bot: args.alt_bot,
        alt_top: args.alt_top,
        add_clouds: args.add_clouds,
        relhum_thresh: args.relhum_thresh,
        xmin: args.xmin.clone(),
        xmax: args.xmax.clone(),
        xrange_fix: args.xrange_fix,
        datatypes: args.datatypes.clone(),
        appendix: args.appendix.clone(),
        show_grid: args.show_grid,
        show_marker: args.show_marker,
        zeroline: args.zeroline,
    };
    plot::compose(&specs, &set, &opts)
}

/// Resolves the requested short names against the registry; every selected
/// variable must be registered and extractable from model output.
fn resolve_variables(names: &[String]) -> Result<Vec<&'static VariableSpec>> {
    names
        .iter()
        .map(|name| {
            let spec = variables::lookup(name)?;
            if spec.model_param.is_none() {
                return Err(ProfileError::VariableNotInModel(name.clone()).into());
            }
            Ok(spec)
        })
        .collect()
}

/// The observation overlay is defined for a single primary variable only.
fn check_options(args: &ProfilesArgs) -> Result<()> {
    if (!args.add_rs.is_empty() || args.add_clouds) && args.var.len() >= 2 {
        return Err(ProfileError::IncompatibleOptions(
            "--add-rs/--add-clouds require a single --var".to_string(),
        )
        .into());
    }
    Ok(())
}

// -- Tests -------------------------------------------------------------------
