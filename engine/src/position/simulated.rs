//! A `PositionSource` fed from memory.
//!
//! Fixes are pushed one by one or replayed from a recording; permissions are answered from what
//! was configured at creation.  Watches, filters and the background task behave like the
//! platform ones so the engine can not tell the difference.
//!
//! Recordings are CSV files with the following header:
//!
//! ```text
//! timestamp,latitude,longitude,speed,heading
//! 2024-05-02T07:30:00Z,14.5995,120.9842,8.3,45
//! 2024-05-02T07:30:02Z,14.6001,120.9848,,
//! ```
//!

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use eyre::{eyre, Result};
use serde::Deserialize;
use tracing::{debug, info, trace};

use commute_common::Coordinate;

use crate::{
    lock, BackgroundConfig, FixCallback, FixFilter, NavError, PermissionKind, PermissionState,
    PositionFix, PositionSource, WatchHandle, WatchOptions,
};

/// One line of a recording.
///
#[derive(Debug, Deserialize)]
struct FixRecord {
    timestamp: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    speed: Option<f64>,
    heading: Option<f64>,
}

/// Read a recording from anything.
///
#[tracing::instrument(skip(rdr))]
pub fn read_fixes<R: Read>(rdr: R) -> Result<Vec<PositionFix>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(rdr);

    let fixes = rdr
        .deserialize::<FixRecord>()
        .enumerate()
        .map(|(n, rec)| -> Result<PositionFix> {
            let rec = rec?;
            let coordinate = Coordinate::new(rec.latitude, rec.longitude)
                .map_err(|e| eyre!("record {}: {e}", n + 1))?;
            Ok(PositionFix {
                coordinate,
                heading_deg: rec.heading,
                speed_mps: rec.speed,
                timestamp: rec.timestamp,
            }
            .normalised())
        })
        .collect::<Result<Vec<_>>>()?;
    debug!("{} fixes read", fixes.len());
    Ok(fixes)
}

/// Read a recording from a file.
///
#[tracing::instrument]
pub fn load_fixes(path: &Path) -> Result<Vec<PositionFix>> {
    let fh = File::open(path).map_err(|e| eyre!("Can not open {path:?}: {e}"))?;
    read_fixes(fh)
}

struct Watcher {
    filter: FixFilter,
    callback: FixCallback,
}

struct SimState {
    /// What the user answers when asked
    answers: [PermissionState; 2],
    /// What has been answered so far
    granted: [PermissionState; 2],
    watchers: BTreeMap<u64, Watcher>,
    next_id: u64,
    background: Option<BackgroundConfig>,
    last: Option<PositionFix>,
    background_fixes: usize,
}

#[inline]
fn slot(kind: PermissionKind) -> usize {
    match kind {
        PermissionKind::Foreground => 0,
        PermissionKind::Background => 1,
    }
}

/// In-memory position source.  Clones share the same state.
///
#[derive(Clone)]
pub struct SimulatedSource {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedSource {
    /// Everything gets granted when asked.
    ///
    pub fn new() -> Self {
        Self::with_answers(PermissionState::Granted, PermissionState::Granted)
    }

    /// Set what the user answers for each kind of permission.
    ///
    pub fn with_answers(foreground: PermissionState, background: PermissionState) -> Self {
        SimulatedSource {
            state: Arc::new(Mutex::new(SimState {
                answers: [foreground, background],
                granted: [PermissionState::Undetermined; 2],
                watchers: BTreeMap::new(),
                next_id: 1,
                background: None,
                last: None,
                background_fixes: 0,
            })),
        }
    }

    /// Deliver one fix to every watcher whose filter lets it through.  Returns how many got it.
    ///
    /// Callbacks run outside of our lock so they can call back into the source.
    ///
    #[tracing::instrument(skip(self))]
    pub fn push(&self, fix: PositionFix) -> usize {
        let fix = fix.normalised();
        let callbacks = {
            let mut st = lock(&self.state);
            st.last = Some(fix);
            if st.background.is_some() {
                st.background_fixes += 1;
            }
            st.watchers
                .values_mut()
                .filter_map(|w| w.filter.accept(&fix).then(|| w.callback.clone()))
                .collect::<Vec<_>>()
        };
        trace!("delivering to {} watcher(s)", callbacks.len());
        callbacks.iter().for_each(|cb| cb(fix));
        callbacks.len()
    }

    /// Push a whole sequence, sleeping `pace` between two fixes if set.  Returns the number of
    /// fixes pushed.
    ///
    pub async fn replay<I>(&self, fixes: I, pace: Option<Duration>) -> usize
    where
        I: IntoIterator<Item = PositionFix>,
    {
        let mut count = 0;
        for fix in fixes {
            self.push(fix);
            count += 1;
            if let Some(pace) = pace {
                tokio::time::sleep(pace).await;
            }
        }
        info!("{count} fixes replayed");
        count
    }

    /// Configuration of the running background task.
    ///
    pub fn background_config(&self) -> Option<BackgroundConfig> {
        lock(&self.state).background.clone()
    }

    /// Fixes seen while the background task was running.
    ///
    pub fn background_fixes(&self) -> usize {
        lock(&self.state).background_fixes
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SimulatedSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let st = lock(&self.state);
        f.debug_struct("SimulatedSource")
            .field("granted", &st.granted)
            .field("watchers", &st.watchers.len())
            .field("background", &st.background)
            .finish()
    }
}

impl PositionSource for SimulatedSource {
    #[tracing::instrument(skip(self))]
    fn request_permission(&self, kind: PermissionKind) -> PermissionState {
        let mut st = lock(&self.state);
        let i = slot(kind);
        if st.granted[i] == PermissionState::Undetermined {
            st.granted[i] = st.answers[i];
            debug!("{kind} permission is now {}", st.granted[i]);
        }
        st.granted[i]
    }

    fn permission(&self, kind: PermissionKind) -> PermissionState {
        lock(&self.state).granted[slot(kind)]
    }

    fn current_fix(&self) -> Result<PositionFix, NavError> {
        let st = lock(&self.state);
        if st.granted[slot(PermissionKind::Foreground)] != PermissionState::Granted {
            return Err(NavError::PermissionDenied(PermissionKind::Foreground));
        }
        st.last.ok_or(NavError::NoFix)
    }

    #[tracing::instrument(skip(self, callback))]
    fn watch(
        &self,
        options: WatchOptions,
        callback: FixCallback,
    ) -> Result<WatchHandle, NavError> {
        let mut st = lock(&self.state);
        if st.granted[slot(PermissionKind::Foreground)] != PermissionState::Granted {
            return Err(NavError::PermissionDenied(PermissionKind::Foreground));
        }

        let id = st.next_id;
        st.next_id += 1;
        st.watchers.insert(
            id,
            Watcher {
                filter: FixFilter::new(options),
                callback,
            },
        );
        debug!("watch #{id} started");

        let state = Arc::downgrade(&self.state);
        Ok(WatchHandle::new(id, move |id| {
            if let Some(state) = state.upgrade() {
                lock(&state).watchers.remove(&id);
                debug!("watch #{id} removed");
            }
        }))
    }

    #[tracing::instrument(skip(self))]
    fn start_background_tracking(&self, config: &BackgroundConfig) -> Result<(), NavError> {
        let mut st = lock(&self.state);
        if st.granted[slot(PermissionKind::Background)] != PermissionState::Granted {
            return Err(NavError::PermissionDenied(PermissionKind::Background));
        }
        if st.background.is_none() {
            info!("background task {} started", config.task_name);
            st.background = Some(config.clone());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn stop_background_tracking(&self) {
        if let Some(bg) = lock(&self.state).background.take() {
            info!("background task {} stopped", bg.task_name);
        }
    }

    fn is_background_tracking(&self) -> bool {
        lock(&self.state).background.is_some()
    }

    fn active_watchers(&self) -> usize {
        lock(&self.state).watchers.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Duration as ChronoDuration;

    use super::*;

    const RECORDING: &str = "\
timestamp,latitude,longitude,speed,heading
2024-05-02T07:30:00Z,10.0,123.0,,
2024-05-02T07:30:10Z, 10.0009 ,123.0,10.0,0
2024-05-02T07:30:20Z,10.0018,123.0,-1,720
";

    fn bg() -> BackgroundConfig {
        BackgroundConfig {
            task_name: "test-task".to_string(),
            title: "Test".to_string(),
            body: "Testing".to_string(),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, FixCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_read_fixes() {
        let fixes = read_fixes(RECORDING.as_bytes()).unwrap();

        assert_eq!(3, fixes.len());
        assert_eq!(None, fixes[0].speed_mps);
        assert_eq!(Some(10.), fixes[1].speed_mps);
        assert_eq!(Some(0.), fixes[1].heading_deg);
        assert_eq!(10.0009, fixes[1].coordinate.latitude);
        // normalised
        assert_eq!(None, fixes[2].speed_mps);
        assert_eq!(None, fixes[2].heading_deg);
        assert_eq!(
            ChronoDuration::seconds(20),
            fixes[2].timestamp - fixes[0].timestamp
        );
    }

    #[test]
    fn test_read_fixes_bad_coordinate() {
        let data = "timestamp,latitude,longitude,speed,heading\n2024-05-02T07:30:00Z,95.0,123.0,,\n";
        let r = read_fixes(data.as_bytes());
        assert!(r.is_err());
        assert!(r.unwrap_err().to_string().starts_with("record 1"));
    }

    #[test]
    fn test_read_fixes_bad_timestamp() {
        let data = "timestamp,latitude,longitude,speed,heading\nyesterday,10.0,123.0,,\n";
        assert!(read_fixes(data.as_bytes()).is_err());
    }

    #[test]
    fn test_permissions_independent() {
        let src = SimulatedSource::with_answers(PermissionState::Granted, PermissionState::Denied);

        assert_eq!(
            PermissionState::Undetermined,
            src.permission(PermissionKind::Foreground)
        );
        assert_eq!(
            PermissionState::Granted,
            src.request_permission(PermissionKind::Foreground)
        );
        assert_eq!(
            PermissionState::Denied,
            src.request_permission(PermissionKind::Background)
        );
        assert_eq!(
            Err(NavError::PermissionDenied(PermissionKind::Background)),
            src.start_background_tracking(&bg())
        );
        assert!(!src.is_background_tracking());
    }

    #[test]
    fn test_watch_needs_permission() {
        let src = SimulatedSource::new();
        let (_, cb) = counter();

        let r = src.watch(WatchOptions::default(), cb);
        assert!(matches!(
            r,
            Err(NavError::PermissionDenied(PermissionKind::Foreground))
        ));
        assert_eq!(0, src.active_watchers());
    }

    #[test]
    fn test_watch_push_and_drop() {
        let src = SimulatedSource::new();
        src.request_permission(PermissionKind::Foreground);

        let (count, cb) = counter();
        let h = src.watch(WatchOptions::default(), cb).unwrap();
        assert_eq!(1, src.active_watchers());

        let fixes = read_fixes(RECORDING.as_bytes()).unwrap();
        assert_eq!(1, src.push(fixes[0]));
        assert_eq!(1, src.push(fixes[1]));
        // same fix again, filtered
        assert_eq!(0, src.push(fixes[1]));
        assert_eq!(2, count.load(Ordering::SeqCst));
        assert_eq!(Ok(fixes[1]), src.current_fix());

        drop(h);
        assert_eq!(0, src.active_watchers());
        assert_eq!(0, src.push(fixes[2]));
        assert_eq!(2, count.load(Ordering::SeqCst));
    }

    #[test]
    fn test_current_fix_none_yet() {
        let src = SimulatedSource::new();
        src.request_permission(PermissionKind::Foreground);
        assert_eq!(Err(NavError::NoFix), src.current_fix());
    }

    #[test]
    fn test_background_idempotent() {
        let src = SimulatedSource::new();
        src.request_permission(PermissionKind::Background);

        assert!(src.start_background_tracking(&bg()).is_ok());
        assert!(src.start_background_tracking(&bg()).is_ok());
        assert!(src.is_background_tracking());
        assert_eq!(Some(bg()), src.background_config());

        src.stop_background_tracking();
        src.stop_background_tracking();
        assert!(!src.is_background_tracking());
    }

    #[tokio::test]
    async fn test_replay() {
        let src = SimulatedSource::new();
        src.request_permission(PermissionKind::Foreground);
        src.request_permission(PermissionKind::Background);
        src.start_background_tracking(&bg()).unwrap();

        let (count, cb) = counter();
        let _h = src.watch(WatchOptions::default(), cb).unwrap();

        let fixes = read_fixes(RECORDING.as_bytes()).unwrap();
        let n = src
            .replay(fixes, Some(Duration::from_millis(1)))
            .await;

        assert_eq!(3, n);
        assert_eq!(3, count.load(Ordering::SeqCst));
        assert_eq!(3, src.background_fixes());
    }
}
