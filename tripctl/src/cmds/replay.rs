//! Replay a recorded trip through the navigation engine.
//!
//! The engine runs on a `ManualClock` set to each fix timestamp before it is pushed, so elapsed
//! time, speeds and the route throttle behave as they did during the recording, whatever the
//! replay pace.
//!

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Result};
use tabled::builder::Builder;
use tabled::settings::Style;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tracing::{info, trace, warn};

use commute_common::{format_duration, Place};
use commute_engine::{
    load_fixes, EngineEvent, EngineFile, ManualClock, NavigationEngine, SimulatedSource, Stats,
    TripSnapshot, TripState,
};
use commute_sources::{RouteProvider, Sites, StraightLine};

use crate::cli::ReplayOpts;

/// How long we wait for in-flight routes once the fixes are exhausted
const ROUTE_WAIT: Duration = Duration::from_secs(10);

#[tracing::instrument]
pub async fn replay_trip(
    cfn: Option<&Path>,
    efn: Option<&Path>,
    opts: &ReplayOpts,
) -> Result<()> {
    let fixes = load_fixes(&opts.file)?;
    let first = fixes
        .first()
        .ok_or_else(|| eyre!("No fix in {:?}", opts.file))?;

    let config = EngineFile::load(efn)?.config(opts.role)?;
    let provider: Arc<dyn RouteProvider> = if opts.offline {
        Arc::new(StraightLine)
    } else {
        Sites::load(cfn)?.get(&opts.site)?.provider()?
    };

    let clock = ManualClock::new(first.timestamp);
    let source = SimulatedSource::new();
    let engine = NavigationEngine::with_clock(
        config,
        Arc::new(source.clone()),
        provider,
        Arc::new(clock.clone()),
    )?;
    let mut rx = engine.subscribe();

    let origin = Place::new("start", opts.from.unwrap_or(first.coordinate));
    let destination = Place::new("destination", opts.to);
    let trip = engine.start(origin, destination)?;
    info!("Trip #{trip} started, {} fixes to replay", fixes.len());

    let pace = opts.pace.map(Duration::from_millis);
    for fix in fixes {
        if engine.state() != TripState::Navigating {
            break;
        }
        clock.set(fix.timestamp);
        let n = source.push(fix);
        trace!("fix at {} delivered to {n}", fix.timestamp);

        match pace {
            Some(pace) => tokio::time::sleep(pace).await,
            None => tokio::task::yield_now().await,
        }
        print_events(&mut rx, opts.json)?;
    }

    // Let in-flight routes land before we look at the end state
    //
    let landed = tokio::time::timeout(ROUTE_WAIT, async {
        while engine.pending_routes() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if landed.is_err() {
        warn!(
            "{} route request(s) still pending after {ROUTE_WAIT:?}",
            engine.pending_routes()
        );
    }
    print_events(&mut rx, opts.json)?;

    let snapshot = engine.snapshot();
    let stats = engine.stats();
    if snapshot.state == TripState::Navigating {
        warn!("Recording ended before arrival");
    }
    engine.reset();

    println!("{}", summary(&snapshot, &stats));
    Ok(())
}

/// Print everything the engine said since last time.
///
fn print_events(rx: &mut Receiver<EngineEvent>, json: bool) -> Result<()> {
    loop {
        match rx.try_recv() {
            Ok(event) => print_event(&event, json)?,
            Err(TryRecvError::Lagged(n)) => warn!("{n} events lost"),
            Err(_) => return Ok(()),
        }
    }
}

fn print_event(event: &EngineEvent, json: bool) -> Result<()> {
    match event {
        EngineEvent::Snapshot(snap) => {
            if json {
                println!("{}", serde_json::to_string(snap)?);
            } else {
                println!("{snap}");
            }
        }
        EngineEvent::RouteUpdated(route) => println!(
            "route: {} in {}, {} steps",
            route.distance_text,
            route.duration_text,
            route.steps.len()
        ),
        EngineEvent::StateChanged(state) => println!("state: {state}"),
        EngineEvent::Arrived(snap) => println!(
            "arrived after {} and {:.2} km",
            format_duration(snap.elapsed_seconds),
            snap.distance_km
        ),
        EngineEvent::Advisory(e) => eprintln!("warning: {e}"),
    }
    Ok(())
}

/// Final table.
///
fn summary(snap: &TripSnapshot, stats: &Stats) -> String {
    let mut builder = Builder::default();
    builder.push_record(vec!["Trip", "Value"]);

    let rows = vec![
        ("State", snap.state.to_string()),
        ("Elapsed", format_duration(snap.elapsed_seconds)),
        ("Distance", format!("{:.2} km", snap.distance_km)),
        ("Average speed", format!("{:.1} km/h", snap.average_speed_kmh)),
        ("Fixes", stats.fixes.to_string()),
        ("Accepted", stats.accepted.to_string()),
        ("Stale", stats.stale.to_string()),
        ("Routes", stats.fetched.to_string()),
        ("Route errors", stats.failed.to_string()),
        ("Discarded", stats.discarded.to_string()),
        ("Throttled", stats.skipped.to_string()),
    ];
    rows.into_iter().for_each(|(k, v)| {
        builder.push_record(vec![k.to_string(), v]);
    });

    builder.build().with(Style::modern()).to_string()
}
