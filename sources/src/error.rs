use thiserror::Error;

/// Failures of a directions provider.
///
/// All of them are recoverable from the point of view of a running trip: the previous route stays
/// valid and the next throttled tick will try again.
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("Provider returned {status}: {message}")]
    Provider { status: String, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider returned no route")]
    EmptyRoute,
}

/// Errors in the site configuration.
///
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("No such site {0}")]
    UnknownSite(String),
    #[error("Unknown format {0} for site {1}")]
    UnknownFormat(String, String),
    #[error("No route {0} defined for site {1}")]
    MissingRoute(String, String),
    #[error("No API key for site {0}")]
    NoAPIKey(String),
}
