//! Where position fixes come from.
//!
//! A `PositionSource` hides the platform location service: permissions, a foreground watch
//! delivering fixes to a callback, and a background tracking task whose lifetime is not tied
//! to the foreground one.
//!
//! Only `SimulatedSource` lives here; a device integration implements the same trait.
//!

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use commute_common::Coordinate;

use crate::NavError;

pub use filter::*;
pub use simulated::*;

mod filter;
mod simulated;

/// Which location permission we are talking about.  Both are independent.
///
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionKind {
    Foreground,
    Background,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

/// One position report from the device.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Degrees from North, [0, 360)
    pub heading_deg: Option<f64>,
    /// Meters per second, >= 0
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        PositionFix {
            coordinate,
            heading_deg: None,
            speed_mps: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    /// Devices report -1 or garbage for "unknown", turn these into `None`.
    ///
    pub fn normalised(mut self) -> Self {
        self.speed_mps = self.speed_mps.filter(|s| s.is_finite() && *s >= 0.);
        self.heading_deg = self
            .heading_deg
            .filter(|h| h.is_finite() && (0. ..=360.).contains(h))
            .map(|h| h % 360.);
        self
    }
}

/// Parameters of the foreground watch.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Minimum move between two delivered fixes
    pub min_distance_m: f64,
    /// Minimum time between two delivered fixes
    pub min_interval_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        WatchOptions {
            min_distance_m: 3.,
            min_interval_ms: 1_400,
        }
    }
}

/// Identity of the background tracking task, title & body are shown to the user by the
/// platform while it runs.
///
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct BackgroundConfig {
    pub task_name: String,
    pub title: String,
    pub body: String,
}

/// What a watch calls for every delivered fix.
///
pub type FixCallback = Arc<dyn Fn(PositionFix) + Send + Sync>;

/// A running foreground watch.  Fixes are delivered until it is removed or dropped.
///
pub struct WatchHandle {
    id: u64,
    dispose: Option<Box<dyn FnOnce(u64) + Send + Sync>>,
}

impl WatchHandle {
    pub fn new(id: u64, dispose: impl FnOnce(u64) + Send + Sync + 'static) -> Self {
        WatchHandle {
            id,
            dispose: Some(Box::new(dispose)),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop the watch now.
    ///
    pub fn remove(self) {
        drop(self)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose(self.id);
        }
    }
}

impl Debug for WatchHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("id", &self.id).finish()
    }
}

/// Platform location service.
///
pub trait PositionSource: Debug + Send + Sync {
    /// Ask the user (if needed) and return the resulting state.
    fn request_permission(&self, kind: PermissionKind) -> PermissionState;
    /// Current state, never prompts.
    fn permission(&self, kind: PermissionKind) -> PermissionState;
    /// Last known position.
    fn current_fix(&self) -> Result<PositionFix, NavError>;
    /// Start delivering filtered fixes to `callback`.
    fn watch(&self, options: WatchOptions, callback: FixCallback)
        -> Result<WatchHandle, NavError>;
    /// Start the background task, a no-op if already running.
    fn start_background_tracking(&self, config: &BackgroundConfig) -> Result<(), NavError>;
    /// Stop the background task, a no-op if not running.
    fn stop_background_tracking(&self);
    fn is_background_tracking(&self) -> bool;
    /// Number of live watches.
    fn active_watchers(&self) -> usize;
}
