//! Command-line surface: argument definitions and command dispatch.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use polars::prelude::*;
use tracing::info;

use crate::artifacts::{AppContext, ArtifactPaths};
use crate::drift::{DriftHook, LogDrift, SilentDrift};
use crate::features::{
    amenity_groups, available_amenities, build_feature_record, display_label, PropertyRequest,
    DEFAULT_AREA, DEFAULT_BEDROOMS, DEFAULT_DIST_TO_METRO,
};
use crate::model::predict_value;

/// Fair value estimates for residential property.
#[derive(Parser, Debug)]
#[command(name = "property-valuation")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub artifacts: ArtifactArgs,

    /// Log a warning whenever an input does not match the training columns
    #[arg(long, global = true, env = "VALUATION_DRIFT_LOG")]
    pub drift_log: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to find the model, reference dataset and training columns.
#[derive(Args, Debug, Clone)]
pub struct ArtifactArgs {
    /// Directory holding the default-named artifacts
    #[arg(long, global = true, default_value = ".")]
    #[arg(env = "VALUATION_ARTIFACTS_DIR")]
    pub artifacts_dir: PathBuf,

    /// Model file (overrides the artifacts directory)
    #[arg(long, global = true, env = "VALUATION_MODEL")]
    pub model: Option<PathBuf>,

    /// Reference dataset CSV (overrides the artifacts directory)
    #[arg(long, global = true, env = "VALUATION_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Training columns JSON (overrides the artifacts directory)
    #[arg(long, global = true, env = "VALUATION_SCHEMA")]
    pub schema: Option<PathBuf>,
}

impl ArtifactArgs {
    pub fn paths(&self) -> ArtifactPaths {
        let mut paths = ArtifactPaths::in_dir(&self.artifacts_dir);
        if let Some(model) = &self.model {
            paths.model = model.clone();
        }
        if let Some(dataset) = &self.dataset {
            paths.dataset = dataset.clone();
        }
        if let Some(schema) = &self.schema {
            paths.schema = schema.clone();
        }
        paths
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate the value of a property
    Predict(PredictArgs),

    /// List the locations available in the reference dataset
    Locations,

    /// List the amenity toggles, in two display groups
    Amenities,

    /// Write a seeded sample of listing coordinates as CSV
    Map(MapArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Location, one of the values printed by `locations`
    #[arg(long, short = 'l')]
    pub location: String,

    /// Area in square feet
    #[arg(long, short = 'a', default_value_t = DEFAULT_AREA)]
    pub area: f64,

    /// Number of bedrooms
    #[arg(long, short = 'b', default_value_t = DEFAULT_BEDROOMS)]
    pub bedrooms: u32,

    /// Distance to the nearest metro station in kilometres
    #[arg(long, short = 'd', default_value_t = DEFAULT_DIST_TO_METRO)]
    pub dist_to_metro: f64,

    /// Selected amenity (repeatable, or comma separated)
    #[arg(long = "amenity", value_delimiter = ',')]
    pub amenities: Vec<String>,

    /// Accept a location absent from the reference dataset
    #[arg(long)]
    pub allow_unknown_location: bool,

    /// Print the assembled feature record before predicting
    #[arg(long)]
    pub show_features: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MapArgs {
    /// Output CSV path; stdout when omitted
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Number of rows to sample
    #[arg(long, default_value_t = 1000)]
    pub size: usize,

    /// Sampling seed
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

pub fn run(cli: Cli) -> Result<()> {
    let paths = cli.artifacts.paths();
    let ctx = AppContext::load(&paths).context("cannot start the valuation engine")?;

    let hook = drift_hook(cli.drift_log);

    match cli.command {
        Commands::Predict(args) => predict(&ctx, args, hook),
        Commands::Locations => {
            for location in ctx.reference().locations() {
                println!("{location}");
            }
            Ok(())
        }
        Commands::Amenities => {
            let amenities = available_amenities(ctx.reference());
            let (left, right) = amenity_groups(&amenities);
            for (title, group) in [("Group 1", left), ("Group 2", right)] {
                println!("{title}:");
                for name in group {
                    println!("  {name:<22}{}", display_label(name));
                }
            }
            Ok(())
        }
        Commands::Map(args) => map(&ctx, args),
    }
}

pub(crate) fn drift_hook(log: bool) -> &'static dyn DriftHook {
    if log {
        &LogDrift
    } else {
        &SilentDrift
    }
}

/// Turns CLI arguments into a request: every offered amenity gets an explicit
/// flag, and names the dataset does not offer are rejected.
pub fn request_from_args(ctx: &AppContext, args: &PredictArgs) -> Result<PropertyRequest> {
    let offered = available_amenities(ctx.reference());
    let is_offered = |name: &str| offered.iter().any(|o| *o == name);
    let is_selected = |name: &str| args.amenities.iter().any(|a| a == name);

    if let Some(unknown) = args.amenities.iter().find(|a| !is_offered(a)) {
        let offered = offered.join(", ");
        bail!("unknown amenity `{}`; offered: {}", unknown, offered);
    }

    if !args.allow_unknown_location && !ctx.reference().has_location(&args.location) {
        bail!(
            "unknown location `{}`; run `locations` to list the available ones",
            args.location
        );
    }

    let amenities: BTreeMap<String, bool> = offered
        .iter()
        .map(|name| (name.to_string(), is_selected(name)))
        .collect();

    let request = PropertyRequest {
        location: args.location.clone(),
        area: args.area,
        bedrooms: args.bedrooms,
        dist_to_metro_km: args.dist_to_metro,
        amenities,
    };
    request.validate()?;

    Ok(request)
}

fn predict(ctx: &AppContext, args: PredictArgs, hook: &dyn DriftHook) -> Result<()> {
    let request = request_from_args(ctx, &args)?;

    if args.show_features {
        let record = build_feature_record(&request, ctx.reference(), ctx.columns(), &SilentDrift);
        println!("{}", record.to_frame()?);
    }

    let valuation = predict_value(ctx, &request, hook)?;
    info!(log_price = valuation.log_price, "prediction complete");
    println!("{valuation}");

    Ok(())
}

fn map(ctx: &AppContext, args: MapArgs) -> Result<()> {
    let mut sample = ctx.reference().sample_coordinates(args.size, args.seed)?;

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            CsvWriter::new(&mut file).finish(&mut sample)?;
            info!("Wrote {} rows to {}", sample.height(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            CsvWriter::new(&mut handle).finish(&mut sample)?;
            handle.flush()?;
        }
    }

    Ok(())
}
