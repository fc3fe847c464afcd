//! Route states and per-fix status output

use serde::{Deserialize, Serialize};

/// Tracker state relative to the loaded route.
///
/// `Invalid` and `Initialized` are entry/reset states; `Tracking` is the
/// steady state; the transition states are transient annotations emitted
/// alongside normal tracking progress and do not gate further movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteState {
    /// No route loaded, route failed to load, or the last fix was off route
    Invalid,
    /// Route loaded, no fix processed yet
    Initialized,
    /// On route
    Tracking,
    /// On route, with a maneuver's pre-transition instruction due now
    PreTransition,
    /// On route, with a maneuver's post-transition instruction due now
    PostTransition,
    /// On route, with a maneuver alert due now
    TransitionAlert,
}

/// A single position observation. Only the coordinates are consumed; any
/// heading or accuracy the positioning layer has is not used for tracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixLocation {
    pub lon: f64,
    pub lat: f64,
}

/// Status produced for one fix. `progress` is populated for every state
/// except `Invalid`; degraded or partially populated results are never
/// returned.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationStatus {
    pub route_state: RouteState,
    pub progress: Option<TripProgress>,
}

impl NavigationStatus {
    pub(crate) fn invalid() -> NavigationStatus {
        NavigationStatus {
            route_state: RouteState::Invalid,
            progress: None,
        }
    }
}

/// Tracking fields for an on-route fix
#[derive(Debug, Clone, Serialize)]
pub struct TripProgress {
    /// Snapped longitude
    pub lon: f64,
    /// Snapped latitude
    pub lat: f64,
    pub leg_index: usize,
    pub maneuver_index: usize,
    /// Remaining distance to the leg end, in the trip's declared units
    pub remaining_leg_length: f64,
    /// Remaining time to the leg end, seconds
    pub remaining_leg_time: u32,
    /// Remaining distance within the current maneuver, in the trip's units
    pub remaining_maneuver_length: f64,
    /// Remaining time within the current maneuver, seconds
    pub remaining_maneuver_time: u32,
    /// Maneuver whose instruction should be announced, set when a transition
    /// state applies
    pub instruction_maneuver_index: Option<usize>,
}
