//! Module to deal with the different directions providers we can ask for a route.
//!
//! The different submodules deal with the differences between providers:
//!
//! - configuration and credentials (`sources.hcl`)
//! - the wire format of each API
//!
//! Everything is behind the `RouteProvider` trait so the navigation engine does not care which
//! provider is used.
//!

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use commute_common::Coordinate;

// Re-export these modules for a shorter import path.
//
pub use access::*;
pub use error::*;
pub use route::*;
pub use site::*;

mod access;
mod error;
mod html;
mod route;
mod site;

#[macro_use]
mod macros;

/// How we travel, passed as-is to the provider.
///
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

/// This trait enables us to manage different directions providers under a single interface.
///
/// Implementations must report every failure as a `RouteError`, never panic: callers treat them
/// all as transient.
///
#[async_trait]
pub trait RouteProvider: Debug + Send + Sync {
    /// Return provider's name
    fn name(&self) -> String;
    /// Get a route from `origin` to `destination`
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Route, RouteError>;
}

pub fn version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
