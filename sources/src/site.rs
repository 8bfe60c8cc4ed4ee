//!  Module that defines what is a site (directions API endpoint).
//!
//! This is used to configure the list of possible directions providers through `sources.hcl`.
//!
//! Sites are either anonymous or use an API key passed in the query string.  The key can be
//! overridden at runtime with the `COMMUTE_API_KEY` environment variable so it does not have to
//! live in the file.
//!
//! You can define a set of possible routes for a site depending on how the API is designed,
//! the directions client uses the `directions` one.
//!

use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use eyre::Result;
use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumString};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{debug, trace};

use commute_common::{ConfigFile, IntoConfig, Versioned};

use crate::{Directions, RouteProvider, SiteError, StraightLine};

/// Environment variable overriding any configured API key
pub const API_KEY_ENV: &str = "COMMUTE_API_KEY";

/// Kind of API a site speaks.
///
#[derive(Clone, Copy, Debug, Default, EnumString, Eq, PartialEq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum Format {
    /// Google Directions-compatible JSON API
    #[default]
    Google,
    /// No network at all, straight lines
    Offline,
}

/// Describe the possible ways to authenticate oneself
///
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Auth {
    /// Nothing special, no auth
    #[default]
    Anon,
    /// Using an API key supplied through the URL
    Key { api_key: String },
}

impl Display for Auth {
    /// Obfuscate the keys
    ///
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let auth = match self {
            Auth::Key { .. } => Auth::Key {
                api_key: "HIDDEN".to_string(),
            },
            Auth::Anon => Auth::Anon,
        };
        write!(f, "{:?}", auth)
    }
}

/// Describe what a site is and associated credentials.
///
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Site {
    /// Name of the site, filled from the block label
    #[serde(default)]
    pub name: String,
    /// Type of API
    pub format: String,
    /// Base URL (to avoid repeating)
    #[serde(default)]
    pub base_url: String,
    /// Credentials
    pub auth: Option<Auth>,
    /// Different URLs available
    pub routes: Option<BTreeMap<String, String>>,
}

impl Site {
    /// Return the site format
    ///
    pub fn format(&self) -> Result<Format, SiteError> {
        Format::from_str(&self.format)
            .map_err(|_| SiteError::UnknownFormat(self.format.clone(), self.name.clone()))
    }

    /// Return the list of routes
    ///
    pub fn list(&self) -> Vec<&String> {
        match &self.routes {
            Some(routes) => routes.keys().collect::<Vec<_>>(),
            _ => vec![],
        }
    }

    /// Check whether site has the mentioned route
    ///
    pub fn has(&self, meth: &str) -> bool {
        match &self.routes {
            Some(routes) => routes.contains_key(meth),
            _ => false,
        }
    }

    /// Retrieve a route
    ///
    pub fn route(&self, key: &str) -> Option<&String> {
        match &self.routes {
            Some(routes) => routes.get(key),
            _ => None,
        }
    }

    /// API key, the environment wins over the file.
    ///
    pub fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        match &self.auth {
            Some(Auth::Key { api_key }) => Some(api_key.clone()),
            _ => None,
        }
    }

    /// Build the provider matching this site.
    ///
    #[tracing::instrument(skip(self), fields(site = %self.name))]
    pub fn provider(&self) -> Result<Arc<dyn RouteProvider>, SiteError> {
        trace!("site::provider");
        match self.format()? {
            Format::Google => {
                let mut d = Directions::new();
                d.load(self)?;
                Ok(Arc::new(d))
            }
            Format::Offline => Ok(Arc::new(StraightLine::default())),
        }
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let auth = self.auth.clone().unwrap_or_default();
        write!(
            f,
            "{{ format={} url={} auth={} routes={:?} }}",
            self.format, self.base_url, auth, self.routes
        )
    }
}

/// On-disk structure for `sources.hcl`
///
#[derive(Debug, Default, Deserialize)]
pub struct Sites {
    /// Version number for safety
    pub version: usize,
    /// All sites by name
    #[serde(default)]
    pub site: BTreeMap<String, Site>,
}

impl Versioned for Sites {
    fn version(&self) -> usize {
        self.version
    }
}

impl IntoConfig for Sites {
    const FILENAME: &'static str = "sources.hcl";
    const VERSION: usize = 1;
}

impl Sites {
    /// Load either the given file, the user's default file or, failing that, the embedded
    /// default.
    ///
    #[tracing::instrument]
    pub fn load(fname: Option<&Path>) -> Result<Sites> {
        let sites = match fname {
            Some(fname) => ConfigFile::<Sites>::load(Some(fname))?.into_inner(),
            None => match ConfigFile::<Sites>::load(None) {
                Ok(cfg) => cfg.into_inner(),
                Err(e) => {
                    debug!("no user sources file ({e}), using defaults");
                    ConfigFile::<Sites>::parse(include_str!("sources.hcl"))?
                }
            },
        };
        Ok(sites.named())
    }

    /// Copy block labels into each site name.
    ///
    fn named(mut self) -> Self {
        self.site
            .iter_mut()
            .for_each(|(name, site)| site.name = name.clone());
        self
    }

    /// Parse a string, used by tests and for the embedded default.
    ///
    pub fn parse(data: &str) -> Result<Sites> {
        Ok(ConfigFile::<Sites>::parse(data)?.named())
    }

    #[inline]
    pub fn get(&self, name: &str) -> Result<&Site, SiteError> {
        self.site
            .get(name)
            .ok_or_else(|| SiteError::UnknownSite(name.to_string()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.site.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.site.is_empty()
    }

    /// List all sites as a table, keys hidden.
    ///
    #[tracing::instrument(skip(self))]
    pub fn list(&self) -> String {
        let header = vec!["Name", "Format", "URL", "Auth", "Routes"];

        let mut builder = Builder::default();
        builder.push_record(header);

        self.site.iter().for_each(|(name, site)| {
            let auth = site.auth.clone().unwrap_or_default().to_string();
            let routes = site
                .list()
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            builder.push_record(vec![
                name.clone(),
                site.format.clone(),
                site.base_url.clone(),
                auth,
                routes,
            ]);
        });

        let allf = builder.build().with(Style::modern()).to_string();
        format!("List all directions sites:\n{allf}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_default() -> Sites {
        Sites::parse(include_str!("sources.hcl")).unwrap()
    }

    #[test_pretty_log::test]
    fn test_site_loading() {
        let s = set_default();

        assert!(!s.is_empty());
        assert_eq!(2, s.len());

        let g = s.get("google").unwrap();
        assert_eq!("google", g.name);
        assert_eq!(Format::Google, g.format().unwrap());
        assert_eq!(
            Some(Auth::Key {
                api_key: "SOMETHING".to_string()
            }),
            g.auth
        );
    }

    #[test]
    fn test_site_unknown() {
        let s = set_default();
        assert!(matches!(s.get("bar"), Err(SiteError::UnknownSite(_))));
    }

    #[test_pretty_log::test]
    fn test_site_route() {
        let s = set_default();
        let g = s.get("google").unwrap();

        assert!(g.has("directions"));
        assert_eq!(vec!["directions"], g.list());
        assert_eq!(
            Some(&"/maps/api/directions/json".to_string()),
            g.route("directions")
        );
        assert!(g.route("places").is_none());
    }

    #[test]
    fn test_site_offline_is_anon() {
        let s = set_default();
        let o = s.get("offline").unwrap();

        assert_eq!(Format::Offline, o.format().unwrap());
        assert!(o.auth.is_none());
        assert!(o.provider().is_ok());
    }

    #[test]
    fn test_site_bad_format() {
        let site = Site {
            name: "foo".to_string(),
            format: "osrm".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            site.format(),
            Err(SiteError::UnknownFormat(_, _))
        ));
    }

    #[test]
    fn test_auth_hidden() {
        let a = Auth::Key {
            api_key: "secret".to_string(),
        };
        assert!(!a.to_string().contains("secret"));
        assert!(set_default().list().contains("HIDDEN"));
    }

    #[test]
    fn test_bad_version() {
        assert!(Sites::parse("version = 42\n").is_err());
    }
}
