//! Module describing all possible commands and sub-commands to the `tripctl` main driver
//!
//! We have one main command:
//!
//! - `replay`
//!
//! `replay` feeds a recorded trip (CSV file of position fixes) through the navigation engine,
//! exactly as a device would, and prints what the engine reports along the way.  Route
//! recalculations go either to a directions site from `sources.hcl` or, with `--offline`, to a
//! straight-line estimate.
//!
//! The other commands are helpers:
//!
//! - `route` fetches a single route and prints its steps,
//! - `decode` decodes an encoded polyline,
//! - `encode` does the reverse,
//! - `distance` gives distance & bearing between two points,
//! - `list sites` shows the configured directions sites,
//! - `completion` is here just to configure the various shells completion system.
//!

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, Parser, ValueEnum};
use clap_complete::shells::Shell;

use commute_common::Coordinate;
use commute_engine::Role;
use commute_sources::TravelMode;

/// CLI options
#[derive(Parser)]
#[command(disable_version_flag = true)]
#[clap(name = crate_name!(), about = crate_description!())]
#[clap(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// Directions sites file (default is sources.hcl in the configuration directory).
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Engine settings file (default is engine.hcl in the configuration directory).
    #[clap(short = 'E', long)]
    pub engine_config: Option<PathBuf>,
    /// Hierarchical logging output.
    #[clap(long)]
    pub tree: bool,
    /// Also log into hourly files in this directory.
    #[clap(long)]
    pub log_file: Option<String>,
    /// Sub-commands (see below).
    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

// ------

/// All sub-commands:
///
/// `replay [--from LAT,LON] --to LAT,LON [--role ROLE] [--site NAME | --offline] [--pace MS] FILE`
/// `route --from LAT,LON --to LAT,LON [--site NAME] [--mode MODE]`
/// `decode POLYLINE`
/// `encode LAT,LON...`
/// `distance LAT,LON LAT,LON`
/// `list sites`
/// `completion SHELL`
/// `version`
///
#[derive(Debug, Parser)]
pub enum SubCommand {
    /// Generate Completion stuff
    Completion(ComplOpts),
    /// Decode an encoded polyline
    Decode(DecodeOpts),
    /// Distance and bearing between two points
    Distance(DistanceOpts),
    /// Encode points into a polyline
    Encode(EncodeOpts),
    /// List configured things
    List(ListOpts),
    /// Replay a recorded trip through the navigation engine
    Replay(ReplayOpts),
    /// Fetch one route
    Route(RouteOpts),
    /// List all package versions
    Version,
}

// ------

/// Options for replaying a recorded trip.
///
#[derive(Debug, Parser)]
pub struct ReplayOpts {
    /// Starting point, default is the first recorded fix.
    #[clap(short = 'f', long, allow_hyphen_values = true)]
    pub from: Option<Coordinate>,
    /// Destination.
    #[clap(short = 't', long, allow_hyphen_values = true)]
    pub to: Coordinate,
    /// Which side of the trip we are on.
    #[clap(short = 'r', long, default_value = "driver")]
    pub role: Role,
    /// Directions site to use.
    #[clap(short = 's', long, default_value = "google")]
    pub site: String,
    /// Straight-line routes, no network.
    #[clap(long)]
    pub offline: bool,
    /// Wait this many milliseconds between two fixes.
    #[clap(short = 'p', long)]
    pub pace: Option<u64>,
    /// Print snapshots as JSON.
    #[clap(short = 'j', long)]
    pub json: bool,
    /// CSV file with `timestamp,latitude,longitude,speed,heading`.
    pub file: PathBuf,
}

// ------

/// Options for fetching a single route.
///
#[derive(Debug, Parser)]
pub struct RouteOpts {
    #[clap(short = 'f', long, allow_hyphen_values = true)]
    pub from: Coordinate,
    #[clap(short = 't', long, allow_hyphen_values = true)]
    pub to: Coordinate,
    /// Directions site to use.
    #[clap(short = 's', long, default_value = "google")]
    pub site: String,
    #[clap(short = 'm', long, default_value = "driving")]
    pub mode: TravelMode,
}

// ------

#[derive(Debug, Parser)]
pub struct DecodeOpts {
    /// Encoded polyline, quote it.
    pub polyline: String,
}

// ------

#[derive(Debug, Parser)]
pub struct EncodeOpts {
    /// Points, in order.
    #[clap(required = true, allow_hyphen_values = true)]
    pub points: Vec<Coordinate>,
}

// ------

#[derive(Debug, Parser)]
pub struct DistanceOpts {
    #[clap(allow_hyphen_values = true)]
    pub from: Coordinate,
    #[clap(allow_hyphen_values = true)]
    pub to: Coordinate,
}

// ------

/// Options to generate completion files at runtime
///
#[derive(Debug, Parser)]
pub struct ComplOpts {
    #[clap(value_parser)]
    pub shell: Shell,
}

// ------

/// All `list` sub-commands:
///
/// `list sites`
///
#[derive(Debug, Parser)]
pub struct ListOpts {
    #[clap(value_parser)]
    pub cmd: ListSubCommand,
}

/// These are the sub-commands for `list`
///
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, ValueEnum)]
pub enum ListSubCommand {
    /// List all directions sites from `sources.hcl`
    Sites,
}
