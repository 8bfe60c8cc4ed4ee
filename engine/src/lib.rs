//! Library implementing live navigation for a trip.
//!
//! The [`NavigationEngine`] takes position fixes from a [`PositionSource`], keeps the route up to
//! date through a [`DirectionsThrottle`] over any `RouteProvider` and derives the trip telemetry
//! (distance, speeds, ETA, next step) in a [`TripSession`].  Callers observe it through
//! [`TripSnapshot`]s and [`EngineEvent`]s.
//!
//! The engine does not render anything and does not persist anything.
//!

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use clock::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use position::*;
pub use session::*;
pub use snapshot::*;
pub use stats::*;
pub use throttle::*;

mod clock;
mod config;
mod engine;
mod error;
mod position;
mod session;
mod snapshot;
mod stats;
mod throttle;

const NAME: &str = env!("CARGO_PKG_NAME");
const EVERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> String {
    format!("{}/{}", NAME, EVERSION)
}

/// A panic while holding one of our locks leaves plain data behind, keep going with it.
///
#[inline]
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
