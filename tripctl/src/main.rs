//! `tripctl` drives the commute-rs navigation engine from the command line.
//!
//! See `cli.rs` for the commands.
//!

use std::io;

use clap::{crate_authors, crate_description, crate_version, CommandFactory, Parser};
use clap_complete::generate;
use eyre::Result;
use tracing::{info, trace};

use commute_common::init_logging;

use crate::cli::{ListSubCommand, Opts, SubCommand};
use crate::cmds::{decode, distance, encode, fetch_route, list_sites, replay_trip};

mod cli;
mod cmds;

/// Binary name, using a different binary name
pub const NAME: &str = env!("CARGO_BIN_NAME");
/// Binary version
pub const VERSION: &str = crate_version!();
/// Authors
pub const AUTHORS: &str = crate_authors!();

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();

    // Initialise logging early
    //
    init_logging(NAME, opts.tree, opts.log_file.clone())?;
    trace!("Logging initialised.");

    let cfn = opts.config.as_deref();
    let efn = opts.engine_config.as_deref();

    match &opts.subcmd {
        // Handle `replay file`
        //
        SubCommand::Replay(ropts) => {
            trace!("replay");

            banner();
            replay_trip(cfn, efn, ropts).await?;
        }

        // Handle `route`
        //
        SubCommand::Route(ropts) => {
            trace!("route");

            let str = fetch_route(cfn, ropts).await?;
            println!("{str}");
        }

        SubCommand::Decode(dopts) => {
            println!("{}", decode(dopts)?);
        }

        SubCommand::Encode(eopts) => {
            println!("{}", encode(eopts)?);
        }

        SubCommand::Distance(dopts) => {
            println!("{}", distance(dopts)?);
        }

        // Standalone completion generation
        //
        // NOTE: you can generate UNIX shells completion on Windows and vice-versa.  Not worth
        //       trying to limit depending on the OS.
        //
        SubCommand::Completion(copts) => {
            let generator = copts.shell;
            generate(generator, &mut Opts::command(), NAME, &mut io::stdout());
        }

        // Standalone `list` command
        //
        SubCommand::List(lopts) => match lopts.cmd {
            ListSubCommand::Sites => {
                info!("Listing all sites:");

                let str = list_sites(cfn)?;
                println!("{str}");
            }
        },

        // Standalone `version` command
        //
        SubCommand::Version => {
            println!("{}", version());
            println!("Modules: ");
            println!("\t{}", commute_common::version());
            println!("\t{}", commute_sources::version());
            println!("\t{}", commute_engine::version());
        }
    }
    Ok(())
}

/// Return our version number
///
#[inline]
pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}

/// Display banner
///
fn banner() {
    eprintln!(
        r##"
{}/{} by {}
{}
"##,
        NAME,
        VERSION,
        AUTHORS,
        crate_description!()
    )
}
