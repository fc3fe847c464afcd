//! On-route tracking — snap fixes to a loaded route and report progress
//!
//! The tracker owns one route at a time and is driven by two calls:
//! [`Tracker::set_route`] (or [`Tracker::new`]) once per route, and
//! [`Tracker::on_location_changed`] once per incoming fix. Loading decodes
//! the current leg's shape and precomputes, in a single backward pass, the
//! remaining distance/time from every shape point to the leg end. Each fix
//! then only pays for a nearby-segment projection plus a constant-time
//! partial-segment correction on top of the precomputed suffix values.
//!
//! All state lives in the `Tracker` value; callers run one instance per
//! active trip and serialize access to it. Nothing here blocks or spawns.

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::geometry::{
    approx_equal, closest_point, haversine_m, Point, KM_PER_METER, KM_PER_MILE, METERS_PER_KM,
    MILES_PER_KM,
};
use crate::polyline;
use crate::route::{Leg, Maneuver, Route};
use crate::status::{FixLocation, NavigationStatus, RouteState, TripProgress};

/// Snap distance beyond which a fix is treated as off route (meters)
const OFF_ROUTE_THRESHOLD_M: f64 = 50.0;

/// Distance from the leg start within which the first on-route fix still
/// counts as "at the origin" for the start-maneuver instruction (meters)
const CLOSE_TO_ORIGIN_THRESHOLD_M: f64 = 20.0;

/// Time floor when deriving maneuver speed, so zero-duration maneuvers do
/// not divide by zero (seconds)
const MIN_MANEUVER_TIME_S: f64 = 0.000_028;

/// Remaining distance/time from one shape point to the leg end
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RemainingValues {
    /// Distance in the trip's declared units
    pub length: f64,
    /// Time in seconds
    pub time: u32,
}

/// Which of a maneuver's instructions have already been announced.
///
/// Each flag is set at most once per maneuver and only cleared by a route
/// (re)load. Only `pre_transition` currently has a producer; the other three
/// are reserved for the post-transition and alert announcements.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsedInstructions {
    pub pre_transition: bool,
    pub post_transition: bool,
    pub initial_transition_alert: bool,
    pub final_transition_alert: bool,
}

/// Real-time route tracker for one active trip.
#[derive(Debug)]
pub struct Tracker {
    route: Route,
    kilometer_units: bool,

    route_state: RouteState,
    leg_index: usize,
    maneuver_index: usize,
    current_shape_index: usize,

    /// Decoded point sequence for the current leg
    shape: Vec<Point>,
    /// Average speed per maneuver, units per second
    maneuver_speeds: Vec<f64>,
    /// Suffix table parallel to `shape`
    remaining_leg_values: Vec<RemainingValues>,
    /// One record per maneuver in the current leg
    used_instructions: Vec<UsedInstructions>,
}

impl Tracker {
    /// Load a route description and prepare tracking state for its first leg.
    pub fn new(route_json: &str) -> Result<Tracker> {
        let route = Route::from_json(route_json)?;
        let kilometer_units = route.has_kilometer_units();

        let leg_index = 0;
        let leg = &route.trip.legs[leg_index];
        let shape = polyline::decode(&leg.shape)?;
        if shape.len() < 2 {
            return Err(Error::MalformedRoute(
                "leg shape has fewer than two points".to_string(),
            ));
        }
        let last_shape_index = shape.len() - 1;
        let last_maneuver_end = leg
            .maneuvers
            .last()
            .map(|m| m.end_shape_index)
            .unwrap_or(0);
        if last_maneuver_end != last_shape_index {
            return Err(Error::MalformedRoute(format!(
                "last maneuver ends at shape index {last_maneuver_end}, \
                 shape ends at {last_shape_index}"
            )));
        }

        let maneuver_speeds = maneuver_speeds(&leg.maneuvers);
        let remaining_leg_values =
            remaining_leg_values(&leg.maneuvers, &shape, &maneuver_speeds, kilometer_units)?;
        let used_instructions = vec![UsedInstructions::default(); leg.maneuvers.len()];

        debug!(
            "route loaded: {} leg(s), leg 0 has {} maneuvers over {} shape points, units={}",
            route.trip.legs.len(),
            leg.maneuvers.len(),
            shape.len(),
            if kilometer_units { "km" } else { "mi" }
        );

        Ok(Tracker {
            route,
            kilometer_units,
            route_state: RouteState::Initialized,
            leg_index,
            maneuver_index: 0,
            current_shape_index: 0,
            shape,
            maneuver_speeds,
            remaining_leg_values,
            used_instructions,
        })
    }

    /// Replace the loaded route. All tracking state is rebuilt from scratch;
    /// nothing carries over from the previous route. On failure the error is
    /// propagated and the tracker drops to `Invalid` until a well-formed
    /// route is supplied.
    pub fn set_route(&mut self, route_json: &str) -> Result<()> {
        match Tracker::new(route_json) {
            Ok(tracker) => {
                *self = tracker;
                Ok(())
            }
            Err(e) => {
                self.route_state = RouteState::Invalid;
                Err(e)
            }
        }
    }

    /// The loaded route description
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn route_state(&self) -> RouteState {
        self.route_state
    }

    pub fn has_kilometer_units(&self) -> bool {
        self.kilometer_units
    }

    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    pub fn maneuver_index(&self) -> usize {
        self.maneuver_index
    }

    pub fn current_shape_index(&self) -> usize {
        self.current_shape_index
    }

    /// Precomputed remaining distance/time from each shape point of the
    /// current leg to the leg end. Entry `last` is exactly zero; both
    /// components are non-increasing toward the destination.
    pub fn remaining_leg_values(&self) -> &[RemainingValues] {
        &self.remaining_leg_values
    }

    /// Process one position fix and report tracking status.
    ///
    /// Off-route fixes are not errors: they produce an `Invalid` status and
    /// tracking resumes automatically once a fix snaps back within threshold.
    /// An `Err` means the route data is internally inconsistent
    /// ([`Error::IndexResolutionFailure`]); retrying the same fix cannot
    /// succeed, so the caller decides whether to drop the fix or abort.
    pub fn on_location_changed(&mut self, fix: &FixLocation) -> Result<NavigationStatus> {
        let prev_route_state = self.route_state;

        let mut status = self.snap_to_route(fix)?;
        if status.route_state == RouteState::Invalid {
            return Ok(status);
        }

        // First on-route fix after load, still at the leg origin: announce
        // the start maneuver exactly once.
        if starting_navigation(prev_route_state, self.route_state)
            && self.close_to_origin(&status)
            && self.maneuver_index == 0
            && !self.used_instructions[0].pre_transition
        {
            self.route_state = RouteState::PreTransition;
            status.route_state = RouteState::PreTransition;
            if let Some(progress) = status.progress.as_mut() {
                progress.instruction_maneuver_index = Some(0);
            }
            self.used_instructions[0].pre_transition = true;
        }

        // Pre-transition for upcoming maneuvers, post-transition and
        // transition alerts need their timing thresholds defined before they
        // can be wired up here; the used-instruction flags for them already
        // exist.

        Ok(status)
    }

    /// Snap a fix to the route shape and assemble the tracking status.
    fn snap_to_route(&mut self, fix: &FixLocation) -> Result<NavigationStatus> {
        let fix_pt = Point {
            lon: fix.lon,
            lat: fix.lat,
        };
        let closest = closest_point(fix_pt, &self.shape, self.current_shape_index).ok_or(
            Error::IndexResolutionFailure {
                hint: self.current_shape_index,
                shape_index: self.current_shape_index,
            },
        )?;

        trace!(
            "fix ({:.6},{:.6}) snapped at distance {:.1}m, segment {}",
            fix.lon,
            fix.lat,
            closest.distance_m,
            closest.segment_index
        );

        if closest.distance_m > OFF_ROUTE_THRESHOLD_M {
            self.route_state = RouteState::Invalid;
            return Ok(NavigationStatus::invalid());
        }

        let closest_pt = closest.point;
        self.current_shape_index = closest.segment_index;

        // If the projection landed on the next shape vertex, advance to it so
        // the partial-segment correction below is exactly zero.
        let mut snapped_to_shape_point = false;
        if !self.is_destination_shape_index(self.current_shape_index)
            && approx_equal(closest_pt, self.shape[self.current_shape_index + 1])
        {
            self.current_shape_index += 1;
            snapped_to_shape_point = true;
        }

        let at_destination = self.is_destination_shape_index(self.current_shape_index);
        let remaining_index = if snapped_to_shape_point || at_destination {
            self.current_shape_index
        } else {
            self.current_shape_index + 1
        };

        let mut partial_length = 0.0;
        if !snapped_to_shape_point && !at_destination {
            let km = haversine_m(closest_pt, self.shape[remaining_index]) * KM_PER_METER;
            partial_length = if self.kilometer_units {
                km
            } else {
                km * MILES_PER_KM
            };
        }

        self.maneuver_index = self.find_maneuver_index(self.maneuver_index, self.current_shape_index)?;
        let maneuver_end_shape_index =
            self.leg().maneuvers[self.maneuver_index].end_shape_index;

        let remaining = self.remaining_leg_values[remaining_index];
        let remaining_leg_length = remaining.length + partial_length;
        let remaining_leg_time = remaining.time
            + (partial_length / self.maneuver_speeds[self.maneuver_index]).round() as u32;

        let at_maneuver_end = self.remaining_leg_values[maneuver_end_shape_index];

        self.route_state = RouteState::Tracking;
        Ok(NavigationStatus {
            route_state: RouteState::Tracking,
            progress: Some(TripProgress {
                lon: closest_pt.lon,
                lat: closest_pt.lat,
                leg_index: self.leg_index,
                maneuver_index: self.maneuver_index,
                remaining_leg_length,
                remaining_leg_time,
                remaining_maneuver_length: remaining_leg_length - at_maneuver_end.length,
                remaining_maneuver_time: remaining_leg_time - at_maneuver_end.time,
                instruction_maneuver_index: None,
            }),
        })
    }

    /// Forward maneuver search: first maneuver at or after `begin_search_index`
    /// whose shape-index range contains `shape_index`.
    pub fn find_maneuver_index(&self, begin_search_index: usize, shape_index: usize) -> Result<usize> {
        find_maneuver_index(
            &self.leg().maneuvers,
            begin_search_index,
            shape_index,
            self.shape.len() - 1,
        )
    }

    /// Backward maneuver search, scanning down from `rbegin_search_index`.
    pub fn rfind_maneuver_index(&self, rbegin_search_index: usize, shape_index: usize) -> Result<usize> {
        rfind_maneuver_index(
            &self.leg().maneuvers,
            rbegin_search_index,
            shape_index,
            self.shape.len() - 1,
        )
    }

    fn leg(&self) -> &Leg {
        &self.route.trip.legs[self.leg_index]
    }

    fn is_destination_shape_index(&self, idx: usize) -> bool {
        idx == self.shape.len() - 1
    }

    /// How far (in meters) along the leg the snapped position is from the
    /// leg origin, compared against the close-to-origin threshold.
    fn close_to_origin(&self, status: &NavigationStatus) -> bool {
        match (self.remaining_leg_values.first(), &status.progress) {
            (Some(origin), Some(progress)) => {
                let travelled_m =
                    self.units_to_meters(origin.length - progress.remaining_leg_length);
                travelled_m <= CLOSE_TO_ORIGIN_THRESHOLD_M
            }
            _ => false,
        }
    }

    fn units_to_meters(&self, units: f64) -> f64 {
        let km = if self.kilometer_units {
            units
        } else {
            units * KM_PER_MILE
        };
        km * METERS_PER_KM
    }
}

/// Whether this fix is the first on-route fix after a route load
fn starting_navigation(prev: RouteState, curr: RouteState) -> bool {
    prev == RouteState::Initialized && curr == RouteState::Tracking
}

/// Average speed for each maneuver, in units per second, floored so a
/// zero-duration maneuver cannot divide by zero.
fn maneuver_speeds(maneuvers: &[Maneuver]) -> Vec<f64> {
    maneuvers
        .iter()
        .map(|m| {
            let time = if m.time == 0 {
                MIN_MANEUVER_TIME_S
            } else {
                f64::from(m.time)
            };
            m.length / time
        })
        .collect()
}

/// One backward pass over the shape building the suffix table of remaining
/// distance/time from each shape point to the leg end. The maneuver lookup is
/// seeded with the previous result, so the whole pass is linear.
fn remaining_leg_values(
    maneuvers: &[Maneuver],
    shape: &[Point],
    speeds: &[f64],
    kilometer_units: bool,
) -> Result<Vec<RemainingValues>> {
    let mut values = vec![RemainingValues::default(); shape.len()];
    let last_shape_index = shape.len() - 1;

    let mut maneuver_speed_index = speeds.len() - 1;
    let mut total_length = 0.0;
    let mut total_time: u32 = 0;

    for i in (0..last_shape_index).rev() {
        let km = haversine_m(shape[i], shape[i + 1]) * KM_PER_METER;
        let length = if kilometer_units {
            km
        } else {
            km * MILES_PER_KM
        };

        // Maneuver containing the earlier endpoint of this segment
        maneuver_speed_index =
            rfind_maneuver_index(maneuvers, maneuver_speed_index, i, last_shape_index)?;

        total_length += length;
        total_time += (length / speeds[maneuver_speed_index]).round() as u32;
        values[i] = RemainingValues {
            length: total_length,
            time: total_time,
        };
    }

    Ok(values)
}

/// Scan maneuvers upward from `begin_search_index` for the one whose
/// `[begin, end)` range contains `shape_index`. The destination maneuver is a
/// special case: its range does not cleanly contain the final shape index.
fn find_maneuver_index(
    maneuvers: &[Maneuver],
    begin_search_index: usize,
    shape_index: usize,
    last_shape_index: usize,
) -> Result<usize> {
    let not_found = Error::IndexResolutionFailure {
        hint: begin_search_index,
        shape_index,
    };
    let Some(destination_maneuver_index) = maneuvers.len().checked_sub(1) else {
        return Err(not_found);
    };
    if begin_search_index > destination_maneuver_index {
        return Err(not_found);
    }

    if shape_index == last_shape_index {
        return Ok(destination_maneuver_index);
    }

    for (i, maneuver) in maneuvers
        .iter()
        .enumerate()
        .skip(begin_search_index)
    {
        if shape_index >= maneuver.begin_shape_index && shape_index < maneuver.end_shape_index {
            return Ok(i);
        }
    }
    Err(not_found)
}

/// Scan maneuvers downward from `rbegin_search_index` for the one whose
/// `[begin, end)` range contains `shape_index`. The scan stops explicitly at
/// index zero; the destination special case applies only when the search
/// already starts at the destination maneuver.
fn rfind_maneuver_index(
    maneuvers: &[Maneuver],
    rbegin_search_index: usize,
    shape_index: usize,
    last_shape_index: usize,
) -> Result<usize> {
    let not_found = Error::IndexResolutionFailure {
        hint: rbegin_search_index,
        shape_index,
    };
    let Some(destination_maneuver_index) = maneuvers.len().checked_sub(1) else {
        return Err(not_found);
    };
    if rbegin_search_index > destination_maneuver_index {
        return Err(not_found);
    }

    if shape_index == last_shape_index && rbegin_search_index == destination_maneuver_index {
        return Ok(destination_maneuver_index);
    }

    let mut i = rbegin_search_index;
    loop {
        let maneuver = &maneuvers[i];
        if shape_index >= maneuver.begin_shape_index && shape_index < maneuver.end_shape_index {
            return Ok(i);
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }
    Err(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polyline;
    use serde_json::json;

    /// Mean earth radius used by the haversine implementation
    const EARTH_RADIUS_M: f64 = 6_371_008.8;

    /// Points spaced `spacing_m` apart along a meridian, starting at
    /// (4.35, 50.0)
    fn meridian_shape(count: usize, spacing_m: f64) -> Vec<Point> {
        let d_lat = (spacing_m / EARTH_RADIUS_M).to_degrees();
        (0..count)
            .map(|i| Point {
                lon: 4.35,
                lat: 50.0 + i as f64 * d_lat,
            })
            .collect()
    }

    /// The reference leg: 4 points at 1 km spacing, maneuver 0 over shape
    /// [0,2) (length 2 km, 100 s), maneuver 1 over [2,3] to the destination
    /// (length 1 km, 50 s). Both maneuvers average 0.02 km/s.
    fn two_maneuver_route(units: &str) -> String {
        let shape = meridian_shape(4, 1000.0);
        json!({
            "trip": {
                "units": units,
                "legs": [{
                    "shape": polyline::encode(&shape),
                    "maneuvers": [
                        {
                            "begin_shape_index": 0,
                            "end_shape_index": 2,
                            "length": 2.0,
                            "time": 100,
                            "instruction": "Head north."
                        },
                        {
                            "begin_shape_index": 2,
                            "end_shape_index": 3,
                            "length": 1.0,
                            "time": 50,
                            "instruction": "You have arrived."
                        }
                    ]
                }]
            }
        })
        .to_string()
    }

    fn tracker() -> Tracker {
        Tracker::new(&two_maneuver_route("kilometers")).unwrap()
    }

    #[test]
    fn test_load_initializes_state() {
        let t = tracker();
        assert_eq!(t.route_state(), RouteState::Initialized);
        assert_eq!(t.leg_index(), 0);
        assert_eq!(t.maneuver_index(), 0);
        assert_eq!(t.current_shape_index(), 0);
        assert!(t.has_kilometer_units());
    }

    #[test]
    fn test_miles_units_derived_from_trip() {
        let t = Tracker::new(&two_maneuver_route("miles")).unwrap();
        assert!(!t.has_kilometer_units());
    }

    #[test]
    fn test_remaining_values_reference_table() {
        let t = tracker();
        let values = t.remaining_leg_values();
        assert_eq!(values.len(), 4);

        assert_eq!(values[3], RemainingValues { length: 0.0, time: 0 });
        assert!((values[2].length - 1.0).abs() < 0.01);
        assert_eq!(values[2].time, 50);
        assert!((values[1].length - 2.0).abs() < 0.01);
        assert_eq!(values[1].time, 100);
        assert!((values[0].length - 3.0).abs() < 0.01);
        assert_eq!(values[0].time, 150);
    }

    #[test]
    fn test_remaining_values_monotonic() {
        let t = tracker();
        for pair in t.remaining_leg_values().windows(2) {
            assert!(pair[0].length >= pair[1].length);
            assert!(pair[0].time >= pair[1].time);
        }
    }

    #[test]
    fn test_zero_time_maneuver_speed_floored() {
        let speeds = maneuver_speeds(&[Maneuver {
            begin_shape_index: 0,
            end_shape_index: 1,
            length: 1.0,
            time: 0,
            instruction: None,
        }]);
        assert!(speeds[0].is_finite());
        assert!(speeds[0] > 0.0);
    }

    #[test]
    fn test_find_maneuver_index() {
        let t = tracker();
        assert_eq!(t.find_maneuver_index(0, 0).unwrap(), 0);
        assert_eq!(t.find_maneuver_index(0, 1).unwrap(), 0);
        assert_eq!(t.find_maneuver_index(0, 2).unwrap(), 1);
        // Destination shape index short-circuits to the destination maneuver
        assert_eq!(t.find_maneuver_index(0, 3).unwrap(), 1);
        assert_eq!(t.find_maneuver_index(1, 3).unwrap(), 1);
    }

    #[test]
    fn test_find_maneuver_index_bad_hint() {
        let t = tracker();
        assert!(matches!(
            t.find_maneuver_index(2, 0),
            Err(Error::IndexResolutionFailure { hint: 2, .. })
        ));
    }

    #[test]
    fn test_find_maneuver_index_hint_past_target() {
        let t = tracker();
        // Forward search never looks below its hint
        assert!(t.find_maneuver_index(1, 0).is_err());
    }

    #[test]
    fn test_rfind_maneuver_index() {
        let t = tracker();
        assert_eq!(t.rfind_maneuver_index(1, 2).unwrap(), 1);
        assert_eq!(t.rfind_maneuver_index(1, 1).unwrap(), 0);
        assert_eq!(t.rfind_maneuver_index(1, 0).unwrap(), 0);
        assert_eq!(t.rfind_maneuver_index(0, 0).unwrap(), 0);
        // Destination special case requires the search to start there
        assert_eq!(t.rfind_maneuver_index(1, 3).unwrap(), 1);
        assert!(t.rfind_maneuver_index(0, 3).is_err());
    }

    #[test]
    fn test_locator_hint_independence() {
        let t = tracker();
        // Any valid hint at or below (forward) / at or above (backward) the
        // containing maneuver resolves to the same index
        for (shape_index, expected) in [(0, 0), (1, 0), (2, 1), (3, 1)] {
            for hint in 0..=expected {
                assert_eq!(
                    t.find_maneuver_index(hint, shape_index).unwrap(),
                    expected,
                    "forward from hint {hint} for shape index {shape_index}"
                );
            }
            let rstart = if shape_index == 3 { 1 } else { expected };
            for hint in rstart..=1 {
                assert_eq!(
                    t.rfind_maneuver_index(hint, shape_index).unwrap(),
                    expected,
                    "backward from hint {hint} for shape index {shape_index}"
                );
            }
        }
    }

    #[test]
    fn test_malformed_shape_too_short() {
        let doc = json!({
            "trip": {
                "legs": [{
                    "shape": polyline::encode(&meridian_shape(1, 1000.0)),
                    "maneuvers": [{
                        "begin_shape_index": 0,
                        "end_shape_index": 0,
                        "length": 0.0,
                        "time": 0
                    }]
                }]
            }
        });
        assert!(matches!(
            Tracker::new(&doc.to_string()),
            Err(Error::MalformedRoute(_))
        ));
    }

    #[test]
    fn test_malformed_maneuvers_not_covering_shape() {
        let shape = meridian_shape(4, 1000.0);
        let doc = json!({
            "trip": {
                "legs": [{
                    "shape": polyline::encode(&shape),
                    "maneuvers": [{
                        "begin_shape_index": 0,
                        "end_shape_index": 2,
                        "length": 2.0,
                        "time": 100
                    }]
                }]
            }
        });
        let err = Tracker::new(&doc.to_string()).unwrap_err();
        assert!(err.to_string().contains("last maneuver ends"));
    }

    #[test]
    fn test_set_route_resets_state() {
        let route_json = two_maneuver_route("kilometers");
        let mut t = Tracker::new(&route_json).unwrap();

        // Drive the tracker forward: fix at the origin, then near the end
        let shape = meridian_shape(4, 1000.0);
        t.on_location_changed(&FixLocation {
            lon: shape[0].lon,
            lat: shape[0].lat,
        })
        .unwrap();
        t.on_location_changed(&FixLocation {
            lon: shape[3].lon,
            lat: shape[3].lat,
        })
        .unwrap();
        assert!(t.current_shape_index() > 0);
        assert_eq!(t.maneuver_index(), 1);

        t.set_route(&route_json).unwrap();
        assert_eq!(t.route_state(), RouteState::Initialized);
        assert_eq!(t.current_shape_index(), 0);
        assert_eq!(t.maneuver_index(), 0);

        // Used-instruction flags were rebuilt: the origin announcement fires again
        let status = t
            .on_location_changed(&FixLocation {
                lon: shape[0].lon,
                lat: shape[0].lat,
            })
            .unwrap();
        assert_eq!(status.route_state, RouteState::PreTransition);
    }

    #[test]
    fn test_set_route_failure_goes_invalid() {
        let mut t = tracker();
        assert!(t.set_route("{}").is_err());
        assert_eq!(t.route_state(), RouteState::Invalid);
    }
}
