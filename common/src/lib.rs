//! This library is there to share some common code amongst all commute-rs modules.
//!
//! - geodesy on WGS84 coordinates (distance, bearing) in [`location`]
//! - encoded polyline codec in [`polyline`]
//! - versioned HCL configuration files
//! - logging initialisation
//!

mod config;
mod error;
mod location;
mod logging;
mod macros;
mod polyline;

use clap::{crate_name, crate_version};
pub use config::*;
pub use error::*;
pub use location::*;
pub use logging::*;
pub use polyline::*;

const NAME: &str = crate_name!();
const VERSION: &str = crate_version!();

pub fn version() -> String {
    format!("{}/{}", NAME, VERSION)
}
