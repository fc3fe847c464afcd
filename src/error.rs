//! Error types for route tracking
//!
//! Off-route is deliberately not represented here: a fix that falls outside
//! the snap threshold is the ordinary `Invalid` route state, recoverable on
//! the next fix. Errors are reserved for data that cannot be tracked at all.

use thiserror::Error;

/// Main error type for butterfly-nav operations
#[derive(Debug, Error)]
pub enum Error {
    /// Route description failed structural validation at load time.
    /// Recoverable: the tracker keeps no partial state and the caller may
    /// supply a corrected route.
    #[error("malformed route: {0}")]
    MalformedRoute(String),

    /// No maneuver contains a supposedly on-route shape index. Indicates
    /// inconsistent route data; fatal for the current leg and never retried.
    #[error("no maneuver contains shape index {shape_index} (search hint {hint})")]
    IndexResolutionFailure { hint: usize, shape_index: usize },
}

/// Convenience result type for butterfly-nav operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_route_display() {
        let err = Error::MalformedRoute("trip has no legs".to_string());
        assert_eq!(err.to_string(), "malformed route: trip has no legs");
    }

    #[test]
    fn test_index_resolution_failure_display() {
        let err = Error::IndexResolutionFailure {
            hint: 2,
            shape_index: 7,
        };
        assert_eq!(
            err.to_string(),
            "no maneuver contains shape index 7 (search hint 2)"
        );
    }
}
