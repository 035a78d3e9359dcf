use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use eoflow_core::config::{parse_bands, parse_composite, parse_upsample, CliConfigOverrides};
use std::path::PathBuf;

/// eoflow - Sentinel-2 tile materialization
#[derive(Parser, Debug)]
#[command(name = "eoflow")]
#[command(about = "Materialize satellite revisits into composited training chips", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Materialize one tile of a run
    Materialize(MaterializeArgs),

    /// Merge the tile indices of a run into a dataset index
    Merge(MergeArgs),

    /// Show the footprint of a grid tile
    Tile(TileArgs),

    /// Show the resolved dataset specification and where each value came from
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct MaterializeArgs {
    /// Run store holding tiles.json, revisits.json and dataspec.json
    #[arg(long, env = "RUN_STORE")]
    pub run_store: String,

    /// Position of the tile to materialize in tiles.json
    #[arg(long, env = "CLOUD_RUN_TASK_INDEX")]
    pub task_index: usize,

    /// Scope artifacts to {dataset_store}/{run_id}
    #[arg(long)]
    pub run_id: Option<String>,

    #[command(flatten)]
    pub spec: SpecArgs,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Run store holding tiles.json and dataspec.json
    #[arg(long, env = "RUN_STORE")]
    pub run_store: String,

    /// Run the tile indices were materialized under
    #[arg(long)]
    pub run_id: Option<String>,

    #[command(flatten)]
    pub spec: SpecArgs,
}

#[derive(Args, Debug)]
pub struct TileArgs {
    /// Tile code, e.g. 30UXC
    pub code: String,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Run store whose dataspec.json is the base layer
    #[arg(long)]
    pub run_store: Option<String>,

    #[command(flatten)]
    pub spec: SpecArgs,
}

/// Dataset specification file and per-key overrides
#[derive(Args, Debug, Default)]
pub struct SpecArgs {
    /// Specification file (JSON, or TOML with a .toml extension). Overrides the run store's
    /// dataspec.json.
    #[arg(long)]
    pub dataspec: Option<PathBuf>,

    /// Dataset store root
    #[arg(long)]
    pub dataset_store: Option<String>,

    /// Root of the granule imagery
    #[arg(long)]
    pub source_store: Option<String>,

    /// Chip size in pixels
    #[arg(long)]
    pub chipsize: Option<usize>,

    /// Composite strategy (FIRST or LAST)
    #[arg(long)]
    pub composite: Option<String>,

    /// Upsample kernel (nearest, bilinear, bicubic, lanczos)
    #[arg(long)]
    pub upsample: Option<String>,

    /// Comma-separated band list, e.g. B02,B03,B04
    #[arg(long)]
    pub bands: Option<String>,
}

impl SpecArgs {
    /// Parse the overrides given on the command line
    pub fn overrides(&self) -> Result<CliConfigOverrides> {
        Ok(CliConfigOverrides {
            dataset_store: self.dataset_store.clone(),
            source_store: self.source_store.clone(),
            chipsize: self.chipsize,
            composite: self.composite.as_deref().map(parse_composite).transpose()?,
            upsample: self.upsample.as_deref().map(parse_upsample).transpose()?,
            bands: self.bands.as_deref().map(parse_bands).transpose()?,
        })
    }
}
