//! Engine configuration, per role.
//!
//! The same engine serves both the driver and the commuter side, they only differ by the
//! settings below.  These are read from `engine.hcl`:
//!
//! ```hcl
//! version = 1
//!
//! role "commuter" {
//!   refetch_interval_secs = 10
//!   background {
//!     task_name = "commuter-location-tracking"
//!     title     = "Ride in progress"
//!     body      = "Your ride is being tracked for your safety."
//!   }
//! }
//! ```
//!

use std::collections::BTreeMap;
use std::path::Path;

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use commute_common::{ConfigFile, IntoConfig, Versioned};
use commute_sources::TravelMode;

use crate::{BackgroundConfig, WatchOptions, ARRIVAL_THRESHOLD_M, MIN_REFETCH_SECS};

/// Default size of the event channel
const EVENT_CAPACITY: usize = 64;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    Driver,
    Commuter,
}

/// Everything the engine needs to know.
///
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineConfig {
    pub role: Role,
    /// Passed as-is to the directions provider
    pub mode: TravelMode,
    /// Minimum time between two route recalculations
    pub refetch_interval_secs: u64,
    /// Distance to destination under which we have arrived
    pub arrival_threshold_m: f64,
    pub watch: WatchOptions,
    pub background: BackgroundConfig,
    /// Size of the event channel
    pub event_capacity: usize,
}

impl EngineConfig {
    /// Built-in defaults.
    ///
    pub fn for_role(role: Role) -> Self {
        let background = match role {
            Role::Driver => BackgroundConfig {
                task_name: "driver-location-tracking".to_string(),
                title: "Trip in progress".to_string(),
                body: "Your location is shared with your passengers.".to_string(),
            },
            Role::Commuter => BackgroundConfig {
                task_name: "commuter-location-tracking".to_string(),
                title: "Ride in progress".to_string(),
                body: "Your ride is being tracked for your safety.".to_string(),
            },
        };
        EngineConfig {
            role,
            mode: TravelMode::Driving,
            refetch_interval_secs: MIN_REFETCH_SECS,
            arrival_threshold_m: ARRIVAL_THRESHOLD_M,
            watch: WatchOptions::default(),
            background,
            event_capacity: EVENT_CAPACITY,
        }
    }

    /// Reject values the engine cannot work with.
    ///
    pub fn validate(&self) -> Result<()> {
        if !(self.arrival_threshold_m.is_finite() && self.arrival_threshold_m > 0.) {
            return Err(eyre!(
                "{}: bad arrival_threshold_m {}",
                self.role,
                self.arrival_threshold_m
            ));
        }
        if !(self.watch.min_distance_m.is_finite() && self.watch.min_distance_m >= 0.) {
            return Err(eyre!(
                "{}: bad watch.min_distance_m {}",
                self.role,
                self.watch.min_distance_m
            ));
        }
        if self.event_capacity == 0 {
            return Err(eyre!("{}: event_capacity must not be 0", self.role));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::for_role(Role::default())
    }
}

/// One `role` block, every setting is optional.
///
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoleConfig {
    pub mode: Option<TravelMode>,
    pub refetch_interval_secs: Option<u64>,
    pub arrival_threshold_m: Option<f64>,
    pub watch: Option<WatchOptions>,
    pub background: Option<BackgroundConfig>,
    pub event_capacity: Option<usize>,
}

/// On-disk structure for `engine.hcl`
///
#[derive(Debug, Default, Deserialize)]
pub struct EngineFile {
    pub version: usize,
    #[serde(default)]
    pub role: BTreeMap<String, RoleConfig>,
}

impl Versioned for EngineFile {
    fn version(&self) -> usize {
        self.version
    }
}

impl IntoConfig for EngineFile {
    const FILENAME: &'static str = "engine.hcl";
    const VERSION: usize = 1;
}

impl EngineFile {
    /// Load either the given file, the user's default file or, failing that, the embedded
    /// default.
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<EngineFile> {
        match fname {
            Some(fname) => Ok(ConfigFile::<EngineFile>::load(Some(fname))?.into_inner()),
            None => match ConfigFile::<EngineFile>::load(None) {
                Ok(cfg) => Ok(cfg.into_inner()),
                Err(e) => {
                    debug!("no user engine file ({e}), using defaults");
                    Self::parse(include_str!("engine.hcl"))
                }
            },
        }
    }

    pub fn parse(data: &str) -> Result<EngineFile> {
        ConfigFile::<EngineFile>::parse(data)
    }

    /// Settings for `role`, file values over built-in defaults.
    ///
    pub fn config(&self, role: Role) -> Result<EngineConfig> {
        let mut cfg = EngineConfig::for_role(role);
        if let Some(rc) = self.role.get(&role.to_string()) {
            let rc = rc.clone();
            cfg.mode = rc.mode.unwrap_or(cfg.mode);
            cfg.refetch_interval_secs = rc
                .refetch_interval_secs
                .unwrap_or(cfg.refetch_interval_secs);
            cfg.arrival_threshold_m = rc.arrival_threshold_m.unwrap_or(cfg.arrival_threshold_m);
            cfg.watch = rc.watch.unwrap_or(cfg.watch);
            cfg.background = rc.background.unwrap_or(cfg.background);
            cfg.event_capacity = rc.event_capacity.unwrap_or(cfg.event_capacity);
        }
        debug!("{role} = {cfg:?}");
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::str::FromStr;

    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;

    #[test_pretty_log::test]
    fn test_embedded_default() -> Result<()> {
        let f = EngineFile::parse(include_str!("engine.hcl"))?;

        assert_eq!(2, f.role.len());
        assert_eq!(EngineConfig::for_role(Role::Driver), f.config(Role::Driver)?);
        assert_eq!(
            EngineConfig::for_role(Role::Commuter),
            f.config(Role::Commuter)?
        );
        Ok(())
    }

    #[test]
    fn test_partial_role() -> Result<()> {
        let data = r##"
version = 1

role "commuter" {
  mode = "transit"
  refetch_interval_secs = 10
  watch {
    min_distance_m = 10.0
  }
}
"##;
        let f = EngineFile::parse(data)?;
        let cfg = f.config(Role::Commuter)?;

        assert_eq!(Role::Commuter, cfg.role);
        assert_eq!(TravelMode::Transit, cfg.mode);
        assert_eq!(10, cfg.refetch_interval_secs);
        assert_eq!(10., cfg.watch.min_distance_m);
        assert_eq!(1_400, cfg.watch.min_interval_ms);
        assert_eq!("commuter-location-tracking", cfg.background.task_name);

        // not in the file
        assert_eq!(EngineConfig::for_role(Role::Driver), f.config(Role::Driver)?);
        Ok(())
    }

    #[test]
    fn test_bad_version() {
        assert!(EngineFile::parse("version = 2\n").is_err());
    }

    #[test]
    fn test_load_file() -> Result<()> {
        let mut fh = NamedTempFile::new()?;
        fh.write_all(b"version = 1\nrole \"driver\" {\n  arrival_threshold_m = 30\n}\n")?;

        let f = EngineFile::load(Some(fh.path()))?;
        assert_eq!(30., f.config(Role::Driver)?.arrival_threshold_m);
        Ok(())
    }

    #[rstest]
    #[case("arrival_threshold_m = -5")]
    #[case("arrival_threshold_m = 0")]
    #[case("event_capacity = 0")]
    #[case("watch {\n    min_distance_m = -1.0\n  }")]
    fn test_bad_values(#[case] line: &str) -> Result<()> {
        let data = format!("version = 1\nrole \"driver\" {{\n  {line}\n}}\n");
        let f = EngineFile::parse(&data)?;

        assert!(f.config(Role::Driver).is_err());
        // other role untouched
        assert!(f.config(Role::Commuter).is_ok());
        Ok(())
    }

    #[rstest]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    #[case(-0.5)]
    fn test_bad_threshold(#[case] threshold: f64) {
        let rc = RoleConfig {
            arrival_threshold_m: Some(threshold),
            ..RoleConfig::default()
        };
        let f = EngineFile {
            version: 1,
            role: BTreeMap::from([("commuter".to_string(), rc)]),
        };

        assert!(f.config(Role::Commuter).is_err());
    }

    #[rstest]
    #[case("driver", Role::Driver)]
    #[case("commuter", Role::Commuter)]
    fn test_role_from_str(#[case] s: &str, #[case] exp: Role) {
        assert_eq!(exp, Role::from_str(s).unwrap());
        assert_eq!(s, exp.to_string());
    }
}
