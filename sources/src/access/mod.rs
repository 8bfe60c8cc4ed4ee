//! Sub-module for the different directions providers.
//!

pub use directions::*;
pub use offline::*;

mod directions;
mod offline;
