//! The navigation engine, what the driver and commuter screens talk to.
//!
//! `NavigationEngine` owns the `TripSession` and wires together:
//!
//! - the `PositionSource` foreground watch, feeding `on_external_fix()`,
//! - the background tracking task, started with the trip and stopped with it,
//! - the `DirectionsThrottle`, whose fetches run on spawned tasks and never block the fix path.
//!
//! Everything observable goes out as `EngineEvent` on a broadcast channel, `snapshot()` can be
//! called at any time.
//!
//! Fixes, fetch results and user commands can interleave in any order: every one of them goes
//! through the session lock and checks the state first.  A fetch result is only applied to the
//! trip it was started for.
//!
//! The watch handle lives with the session, so installing and removing it happens in the same
//! critical section as the state transition it belongs to.  State events are sent from inside
//! that section too and reach subscribers in transition order.
//!
//! Lock order is session, then position source.  A `PositionSource` must not call a watch
//! callback from within `watch()`.
//!

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use commute_common::{Coordinate, Place};
use commute_sources::{Route, RouteError, RouteProvider};

use crate::{
    lock, Clock, DirectionsThrottle, EngineConfig, FixCallback, FixOutcome, NavError,
    PermissionKind, PermissionState, PositionFix, PositionSource, Stats, SystemClock,
    TripSession, TripSnapshot, TripState, WatchHandle,
};

/// What subscribers get.
///
#[derive(Clone, Debug)]
pub enum EngineEvent {
    StateChanged(TripState),
    Snapshot(TripSnapshot),
    RouteUpdated(Route),
    /// Sent once per trip
    Arrived(TripSnapshot),
    /// Something went wrong but navigation goes on
    Advisory(NavError),
}

#[derive(Debug)]
struct Core {
    session: TripSession,
    stats: Stats,
    watch: Option<WatchHandle>,
}

#[derive(Debug)]
struct Inner {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    source: Arc<dyn PositionSource>,
    throttle: DirectionsThrottle,
    core: Mutex<Core>,
    /// Route fetches spawned and not yet applied
    pending: AtomicUsize,
    events: broadcast::Sender<EngineEvent>,
    runtime: Handle,
}

/// Cheap to clone, all clones drive the same trip.
///
#[derive(Clone, Debug)]
pub struct NavigationEngine {
    inner: Arc<Inner>,
}

impl NavigationEngine {
    /// Create an idle engine on the wall clock.  Must be called from within a tokio runtime.
    ///
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn PositionSource>,
        provider: Arc<dyn RouteProvider>,
    ) -> Result<Self, NavError> {
        Self::with_clock(config, source, provider, Arc::new(SystemClock))
    }

    #[tracing::instrument(skip(source, provider, clock))]
    pub fn with_clock(
        config: EngineConfig,
        source: Arc<dyn PositionSource>,
        provider: Arc<dyn RouteProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NavError> {
        let runtime = Handle::try_current().map_err(|_| NavError::NoRuntime)?;
        let throttle = DirectionsThrottle::new(
            provider,
            clock.clone(),
            config.mode,
            config.refetch_interval_secs,
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        info!(
            "{} engine using {} for directions",
            config.role,
            throttle.provider_name()
        );
        Ok(NavigationEngine {
            inner: Arc::new(Inner {
                core: Mutex::new(Core {
                    session: TripSession::new(config.arrival_threshold_m),
                    stats: Stats::default(),
                    watch: None,
                }),
                config,
                clock,
                source,
                throttle,
                pending: AtomicUsize::new(0),
                events,
                runtime,
            }),
        })
    }

    #[inline]
    fn core(&self) -> MutexGuard<'_, Core> {
        lock(&self.inner.core)
    }

    fn emit(&self, event: EngineEvent) {
        if self.inner.events.send(event).is_err() {
            trace!("no subscriber");
        }
    }

    /// Get all future events.
    ///
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Start a trip, restarting if one is in progress.  Returns the trip number.
    ///
    /// Only a refused foreground permission is an error, a background tracking failure is sent
    /// as an advisory.
    ///
    #[tracing::instrument(skip(self))]
    pub fn start(&self, origin: Place, destination: Place) -> Result<u64, NavError> {
        let source = &self.inner.source;

        if source.request_permission(PermissionKind::Foreground) != PermissionState::Granted {
            warn!("foreground location refused");
            return Err(NavError::PermissionDenied(PermissionKind::Foreground));
        }

        let engine = Arc::downgrade(&self.inner);
        let callback: FixCallback = Arc::new(move |fix| {
            if let Some(inner) = engine.upgrade() {
                NavigationEngine { inner }.on_external_fix(fix);
            }
        });

        let now = self.inner.clock.now();
        let (from, to) = (origin.coordinate, destination.coordinate);
        let (trip, snapshot) = {
            let mut core = self.core();
            self.teardown(&mut core);

            core.stats = Stats::default();
            let trip = core.session.start(origin, destination, now);

            match source.watch(self.inner.config.watch, callback) {
                Ok(handle) => core.watch = Some(handle),
                Err(e) => {
                    core.session.reset();
                    return Err(e);
                }
            }
            self.emit(EngineEvent::StateChanged(TripState::Navigating));
            self.ensure_background();
            (trip, core.session.snapshot(now))
        };

        if self.inner.throttle.try_acquire(true) {
            self.spawn_fetch(trip, from, to);
        }
        self.emit(EngineEvent::Snapshot(snapshot));
        Ok(trip)
    }

    /// Start background tracking unless the source already does it.
    ///
    fn ensure_background(&self) {
        let source = &self.inner.source;

        if source.is_background_tracking() {
            trace!("background tracking already running");
            return;
        }
        let res = match source.request_permission(PermissionKind::Background) {
            PermissionState::Granted => {
                source.start_background_tracking(&self.inner.config.background)
            }
            _ => Err(NavError::PermissionDenied(PermissionKind::Background)),
        };
        if let Err(e) = res {
            warn!("no background tracking: {e}");
            self.emit(EngineEvent::Advisory(e));
        }
    }

    /// Drop the watch and stop background tracking, whatever the state.  Called with the
    /// session lock held.
    ///
    fn teardown(&self, core: &mut Core) {
        if let Some(handle) = core.watch.take() {
            debug!("removing watch #{}", handle.id());
            handle.remove();
        }
        self.inner.source.stop_background_tracking();
    }

    /// Feed one fix, this is what the watch calls.
    ///
    #[tracing::instrument(skip(self))]
    pub fn on_external_fix(&self, fix: PositionFix) -> FixOutcome {
        let fix = fix.normalised();
        let now = self.inner.clock.now();

        let (outcome, snapshot, fetch) = {
            let mut core = self.core();
            core.stats.fixes += 1;

            let outcome = core.session.update_fix(fix, now);
            let mut fetch = None;
            let snapshot = match outcome {
                FixOutcome::Ignored => {
                    core.stats.ignored += 1;
                    None
                }
                FixOutcome::Stale => {
                    core.stats.stale += 1;
                    None
                }
                FixOutcome::Accepted { .. } => {
                    core.stats.accepted += 1;
                    if self.inner.throttle.try_acquire(false) {
                        fetch = core
                            .session
                            .destination()
                            .map(|d| (core.session.trip(), d.coordinate));
                    } else {
                        core.stats.skipped += 1;
                    }
                    Some(core.session.snapshot(now))
                }
                FixOutcome::Arrived => {
                    core.stats.accepted += 1;
                    info!("arrived: {}", core.stats);
                    self.teardown(&mut core);

                    let snapshot = core.session.snapshot(now);
                    self.emit(EngineEvent::StateChanged(TripState::Arrived));
                    self.emit(EngineEvent::Arrived(snapshot.clone()));
                    Some(snapshot)
                }
            };
            (outcome, snapshot, fetch)
        };

        if let Some(snapshot) = snapshot {
            self.emit(EngineEvent::Snapshot(snapshot));
        }
        if let Some((trip, to)) = fetch {
            self.spawn_fetch(trip, fix.coordinate, to);
        }
        outcome
    }

    /// Ask for a new route now, bypassing the throttle.
    ///
    #[tracing::instrument(skip(self))]
    pub fn request_route(&self) -> Result<(), NavError> {
        let (trip, from, to) = {
            let core = self.core();
            let session = &core.session;
            if session.state() != TripState::Navigating {
                return Err(NavError::NotNavigating);
            }
            let from = session.last_fix().map(|f| f.coordinate);
            let to = session.destination().map(|d| d.coordinate);
            match (from, to) {
                (Some(from), Some(to)) => (session.trip(), from, to),
                _ => return Err(NavError::NoFix),
            }
        };
        self.inner.throttle.try_acquire(true);
        self.spawn_fetch(trip, from, to);
        Ok(())
    }

    fn spawn_fetch(&self, trip: u64, from: Coordinate, to: Coordinate) {
        trace!("fetching route for trip #{trip}");

        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let engine = self.clone();
        self.inner.runtime.spawn(async move {
            let res = engine.inner.throttle.fetch(from, to).await;
            engine.apply_route(trip, res);
            engine.inner.pending.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Number of route fetches still in flight.
    ///
    pub fn pending_routes(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Install a fetched route if it is still for the current trip.
    ///
    fn apply_route(&self, trip: u64, res: Result<Route, RouteError>) {
        let now = self.inner.clock.now();
        let mut core = self.core();

        if core.session.state() != TripState::Navigating || core.session.trip() != trip {
            core.stats.discarded += 1;
            debug!("route for trip #{trip} discarded");
            return;
        }
        match res {
            Ok(mut route) => {
                // ETA is relative to the engine clock, not to the provider host one
                route.fetched_at = now;
                core.session.route_recalculated(route.clone());
                core.stats.fetched += 1;
                let snapshot = core.session.snapshot(now);
                drop(core);

                debug!("new route, {} steps", route.steps.len());
                self.emit(EngineEvent::RouteUpdated(route));
                self.emit(EngineEvent::Snapshot(snapshot));
            }
            Err(e) => {
                core.stats.failed += 1;
                drop(core);

                warn!("route not updated: {e}");
                self.emit(EngineEvent::Advisory(e.into()));
            }
        }
    }

    /// Stop the trip without arriving and go back to idle.  Returns `false` if there was no trip
    /// to cancel.
    ///
    #[tracing::instrument(skip(self))]
    pub fn cancel(&self) -> bool {
        let now = self.inner.clock.now();
        let mut core = self.core();
        self.teardown(&mut core);

        let done = core.session.cancel(now);
        if done {
            info!("cancelled: {}", core.stats);
            core.session.reset();
            self.emit(EngineEvent::StateChanged(TripState::Cancelled));
            self.emit(EngineEvent::StateChanged(TripState::Idle));
        }
        done
    }

    /// End the trip as arrived, wherever we are.  Returns `false` if there was no trip.
    ///
    #[tracing::instrument(skip(self))]
    pub fn end_trip(&self) -> bool {
        let now = self.inner.clock.now();
        let mut core = self.core();
        self.teardown(&mut core);

        if !core.session.arrive(now) {
            return false;
        }
        info!("ended: {}", core.stats);
        self.emit(EngineEvent::StateChanged(TripState::Arrived));
        self.emit(EngineEvent::Arrived(core.session.snapshot(now)));
        true
    }

    /// Back to idle.  Safe to call any number of times.
    ///
    #[tracing::instrument(skip(self))]
    pub fn reset(&self) {
        let mut core = self.core();
        self.teardown(&mut core);

        if core.session.reset() {
            self.emit(EngineEvent::StateChanged(TripState::Idle));
        }
    }

    pub fn snapshot(&self) -> TripSnapshot {
        let now = self.inner.clock.now();
        self.core().session.snapshot(now)
    }

    pub fn state(&self) -> TripState {
        self.core().session.state()
    }

    /// Route currently in use.
    ///
    pub fn route(&self) -> Option<Route> {
        self.core().session.route().cloned()
    }

    /// Counters for the current (or last) trip.
    ///
    pub fn stats(&self) -> Stats {
        self.core().stats.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }
}
