use thiserror::Error;

use commute_sources::RouteError;

use crate::PermissionKind;

/// Everything the navigation engine can report.
///
/// None of these are fatal to the process: permission and route errors are advisory and
/// navigation goes on with whatever state we already have.
///
#[derive(Clone, Debug, Error, PartialEq)]
pub enum NavError {
    #[error("Permission denied for {0} location")]
    PermissionDenied(PermissionKind),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider error {0}: {1}")]
    Provider(String, String),
    #[error("No route between origin and destination")]
    EmptyRoute,
    #[error("No position fix available")]
    NoFix,
    #[error("No tokio runtime available")]
    NoRuntime,
    #[error("No trip in progress")]
    NotNavigating,
}

impl From<RouteError> for NavError {
    fn from(value: RouteError) -> Self {
        match value {
            RouteError::Provider { status, message } => NavError::Provider(status, message),
            RouteError::Network(s) => NavError::Network(s),
            RouteError::EmptyRoute => NavError::EmptyRoute,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(RouteError::EmptyRoute, NavError::EmptyRoute)]
    #[case(RouteError::Network("timeout".into()), NavError::Network("timeout".into()))]
    #[case(
        RouteError::Provider { status: "OVER_QUERY_LIMIT".into(), message: "slow down".into() },
        NavError::Provider("OVER_QUERY_LIMIT".into(), "slow down".into())
    )]
    fn test_from_route_error(#[case] e: RouteError, #[case] exp: NavError) {
        assert_eq!(exp, NavError::from(e));
    }

    #[test]
    fn test_permission_message() {
        let e = NavError::PermissionDenied(PermissionKind::Background);
        assert_eq!("Permission denied for background location", e.to_string());
    }
}
