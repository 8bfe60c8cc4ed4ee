//! Fetch a single route and show it.
//!

use std::path::Path;

use eyre::Result;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::info;

use commute_sources::{Route, RouteProvider, Sites};

use crate::cli::RouteOpts;

#[tracing::instrument]
pub async fn fetch_route(cfn: Option<&Path>, opts: &RouteOpts) -> Result<String> {
    let sites = Sites::load(cfn)?;
    let provider = sites.get(&opts.site)?.provider()?;

    info!("Asking {} for a route", provider.name());
    let route = provider.fetch_route(opts.from, opts.to, opts.mode).await?;
    Ok(route_table(&route))
}

/// Steps of a route as a table, with the totals at the top.
///
pub fn route_table(route: &Route) -> String {
    let mut builder = Builder::default();
    builder.push_record(vec!["#", "Maneuver", "Instruction", "Road", "Distance"]);

    route.steps.iter().enumerate().for_each(|(i, step)| {
        builder.push_record(vec![
            (i + 1).to_string(),
            step.maneuver.to_string(),
            step.instruction.clone(),
            step.road_name.clone(),
            step.distance_text.clone(),
        ]);
    });

    let table = builder.build().with(Style::modern()).to_string();
    format!(
        "{} ({} m), {} ({} s), {} points\n{table}",
        route.distance_text,
        route.distance_meters,
        route.duration_text,
        route.duration_seconds,
        route.polyline.len()
    )
}
