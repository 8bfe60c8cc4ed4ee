//! Google Directions-compatible site
//!
//! Phases:
//! 1. GET `{base_url}{directions}` with origin, destination, mode and key in the query string
//! 2. check both the HTTP status and the `status` field of the JSON answer
//! 3. take the first route, decode its overview polyline and its first leg's steps
//!
//! A polyline that does not decode is not fatal: the route is kept with a straight line between
//! origin and destination as geometry so the caller still has something to display.
//!
//! This implement the `RouteProvider` trait described in `lib`.
//!

use async_trait::async_trait;
use chrono::Utc;
use clap::{crate_name, crate_version};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, trace, warn};

use commute_common::{decode_polyline, Coordinate};

use crate::html::strip_html;
use crate::{
    http_get, ManeuverKind, Route, RouteError, RouteProvider, RouteStep, Site, SiteError,
    TravelMode,
};

/// Name of the route to use in the site definition
const DIRECTIONS: &str = "directions";

/// The only good status
const STATUS_OK: &str = "OK";

// ----- Wire format

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<&LatLng> for Coordinate {
    fn from(value: &LatLng) -> Self {
        Coordinate {
            latitude: value.lat,
            longitude: value.lng,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TextValue {
    #[serde(default)]
    text: String,
    #[serde(default)]
    value: u64,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    start_location: LatLng,
    end_location: Option<LatLng>,
    #[serde(default)]
    distance: TextValue,
    #[serde(default)]
    html_instructions: String,
    #[serde(default)]
    maneuver: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLeg {
    #[serde(default)]
    duration: TextValue,
    #[serde(default)]
    distance: TextValue,
    #[serde(default)]
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct OverviewPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    overview_polyline: OverviewPolyline,
    #[serde(default)]
    legs: Vec<WireLeg>,
}

#[derive(Debug, Deserialize)]
struct Answer {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<WireRoute>,
}

impl From<&WireStep> for RouteStep {
    fn from(s: &WireStep) -> Self {
        RouteStep {
            start: (&s.start_location).into(),
            end: s.end_location.as_ref().map(Coordinate::from),
            distance_text: s.distance.text.clone(),
            instruction: strip_html(&s.html_instructions),
            maneuver: ManeuverKind::from_provider(s.maneuver.as_deref().unwrap_or_default()),
            road_name: s.name.clone().unwrap_or_default(),
        }
    }
}

// -----

/// This describe a directions site
///
#[derive(Clone, Debug)]
pub struct Directions {
    /// Site name from the configuration
    pub site: String,
    /// Base site url taken from config
    pub base_url: String,
    /// Add this to `base_url` to get directions
    pub get: String,
    /// Auth data
    pub api_key: Option<String>,
    /// reqwest async client
    pub client: Client,
}

impl Directions {
    #[tracing::instrument]
    pub fn new() -> Self {
        trace!("directions::new");

        Directions {
            site: String::new(),
            base_url: String::new(),
            get: String::new(),
            api_key: None,
            client: Client::new(),
        }
    }

    /// Load our site details from what is in the configuration file
    ///
    #[tracing::instrument(skip(self))]
    pub fn load(&mut self, site: &Site) -> Result<&mut Self, SiteError> {
        trace!("directions::load({})", site.name);

        self.site = site.name.clone();
        self.base_url = site.base_url.clone();
        self.get = site
            .route(DIRECTIONS)
            .ok_or_else(|| SiteError::MissingRoute(DIRECTIONS.to_string(), site.name.clone()))?
            .clone();
        self.api_key = site.api_key();
        Ok(self)
    }

    /// Turn the provider answer into a `Route`.
    ///
    #[tracing::instrument(skip(body))]
    pub fn parse(
        body: &str,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Route, RouteError> {
        let answer: Answer =
            serde_json::from_str(body).map_err(|e| RouteError::Network(e.to_string()))?;

        if answer.status != STATUS_OK {
            return Err(RouteError::Provider {
                message: answer.error_message.unwrap_or_default(),
                status: answer.status,
            });
        }

        let route = answer.routes.first().ok_or(RouteError::EmptyRoute)?;
        let leg = route.legs.first().ok_or(RouteError::EmptyRoute)?;

        let polyline = match decode_polyline(&route.overview_polyline.points) {
            Ok(pts) if !pts.is_empty() => pts,
            Ok(_) => vec![origin, destination],
            Err(e) => {
                warn!("{e}, using a straight line");
                vec![origin, destination]
            }
        };

        let steps = leg.steps.iter().map(RouteStep::from).collect::<Vec<_>>();
        debug!("{} points, {} steps", polyline.len(), steps.len());

        Ok(Route {
            polyline,
            steps,
            duration_seconds: leg.duration.value,
            duration_text: leg.duration.text.clone(),
            distance_meters: leg.distance.value,
            distance_text: leg.distance.text.clone(),
            fetched_at: Utc::now(),
        })
    }
}

impl Default for Directions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteProvider for Directions {
    fn name(&self) -> String {
        self.site.clone()
    }

    /// Fetch a route, everything not `OK` is reported as a `RouteError`.
    ///
    #[tracing::instrument(skip(self))]
    async fn fetch_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Route, RouteError> {
        let url = format!("{}{}", self.base_url, self.get);
        trace!("Fetching directions through {}…", url);

        let mut query = vec![
            ("origin", origin.to_string()),
            ("destination", destination.to_string()),
            ("mode", mode.to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key", key.clone()));
        }

        let resp = http_get!(self, url, &query)
            .await
            .map_err(|e| RouteError::Network(e.to_string()))?;
        debug!("raw resp={:?}", &resp);

        // Check status
        //
        let code = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RouteError::Network(e.to_string()))?;

        match code {
            StatusCode::OK => Directions::parse(&body, origin, destination),
            code => Err(RouteError::Provider {
                status: code.as_u16().to_string(),
                message: body,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn origin() -> Coordinate {
        Coordinate::new(38.5, -120.2).unwrap()
    }

    fn destination() -> Coordinate {
        Coordinate::new(43.252, -126.453).unwrap()
    }

    fn answer_ok(points: &str) -> String {
        json!({
            "status": "OK",
            "routes": [{
                "overview_polyline": { "points": points },
                "legs": [{
                    "duration": { "text": "12 mins", "value": 720 },
                    "distance": { "text": "5.4 km", "value": 5400 },
                    "steps": [
                        {
                            "start_location": { "lat": 38.5, "lng": -120.2 },
                            "end_location": { "lat": 40.7, "lng": -120.95 },
                            "distance": { "text": "0.3 km", "value": 300 },
                            "html_instructions": "Head <b>north</b> on <b>Main St</b>",
                            "name": "Main St"
                        },
                        {
                            "start_location": { "lat": 40.7, "lng": -120.95 },
                            "end_location": { "lat": 43.252, "lng": -126.453 },
                            "distance": { "text": "5.1 km", "value": 5100 },
                            "html_instructions": "Turn <b>left</b>",
                            "maneuver": "turn-left"
                        }
                    ]
                }]
            }]
        })
        .to_string()
    }

    fn setup_directions(server: &MockServer) -> Directions {
        Directions {
            site: "mock".to_string(),
            base_url: server.base_url(),
            get: "/maps/api/directions/json".to_string(),
            api_key: Some("KEY".to_string()),
            client: Client::new(),
        }
    }

    #[test]
    fn test_parse_ok() {
        let r = Directions::parse(
            &answer_ok("_p~iF~ps|U_ulLnnqC_mqNvxq`@"),
            origin(),
            destination(),
        )
        .unwrap();

        assert_eq!(3, r.polyline.len());
        assert_eq!(2, r.steps.len());
        assert_eq!(720, r.duration_seconds);
        assert_eq!("12 mins", r.duration_text);
        assert_eq!(5400, r.distance_meters);
        assert_eq!("Head north on Main St", r.steps[0].instruction);
        assert_eq!("Main St", r.steps[0].road_name);
        assert_eq!(ManeuverKind::Continue, r.steps[0].maneuver);
        assert_eq!(ManeuverKind::TurnLeft, r.steps[1].maneuver);
    }

    #[test]
    fn test_parse_malformed_polyline_falls_back() {
        let r = Directions::parse(&answer_ok("_p~iF~ps|"), origin(), destination()).unwrap();
        assert_eq!(vec![origin(), destination()], r.polyline);
    }

    #[test]
    fn test_parse_huge_duration() {
        let body = answer_ok("_p~iF~ps|U_ulLnnqC_mqNvxq`@")
            .replace("\"value\":720", "\"value\":10000000000000");
        let r = Directions::parse(&body, origin(), destination()).unwrap();

        assert_eq!(10_000_000_000_000, r.duration_seconds);
        assert_eq!(None, r.eta());
    }

    #[test]
    fn test_parse_provider_error() {
        let body = json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid.",
            "routes": []
        })
        .to_string();

        let r = Directions::parse(&body, origin(), destination());
        assert_eq!(
            Err(RouteError::Provider {
                status: "REQUEST_DENIED".to_string(),
                message: "The provided API key is invalid.".to_string()
            }),
            r
        );
    }

    #[test]
    fn test_parse_empty_route() {
        let body = json!({"status": "OK", "routes": []}).to_string();
        assert_eq!(
            Err(RouteError::EmptyRoute),
            Directions::parse(&body, origin(), destination())
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            Directions::parse("<html>", origin(), destination()),
            Err(RouteError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_route() {
        let server = MockServer::start_async().await;
        let body = answer_ok("_p~iF~ps|U_ulLnnqC_mqNvxq`@");

        let m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/maps/api/directions/json")
                    .query_param("origin", "38.5,-120.2")
                    .query_param("destination", "43.252,-126.453")
                    .query_param("mode", "driving")
                    .query_param("key", "KEY");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(&body);
            })
            .await;

        let site = setup_directions(&server);
        let r = site
            .fetch_route(origin(), destination(), TravelMode::Driving)
            .await;

        m.assert_async().await;
        let r = r.unwrap();
        assert_eq!(2, r.steps.len());
    }

    #[tokio::test]
    async fn test_fetch_route_http_error() {
        let server = MockServer::start_async().await;

        let m = server
            .mock_async(|when, then| {
                when.method(GET).path("/maps/api/directions/json");
                then.status(502).body("bad gateway");
            })
            .await;

        let site = setup_directions(&server);
        let r = site
            .fetch_route(origin(), destination(), TravelMode::Walking)
            .await;

        m.assert_async().await;
        assert_eq!(
            Err(RouteError::Provider {
                status: "502".to_string(),
                message: "bad gateway".to_string()
            }),
            r
        );
    }

    #[tokio::test]
    async fn test_fetch_route_no_server() {
        let site = Directions {
            site: "nowhere".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            get: "/".to_string(),
            api_key: None,
            client: Client::new(),
        };
        let r = site
            .fetch_route(origin(), destination(), TravelMode::Driving)
            .await;
        assert!(matches!(r, Err(RouteError::Network(_))));
    }
}
