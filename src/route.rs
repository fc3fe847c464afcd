//! Route description model
//!
//! Serde model of the trip document produced by the route-computation
//! service: one trip with one or more legs, each leg an encoded shape plus
//! the ordered maneuvers partitioning that shape.
//!
//! Validation here is purely structural (leg/maneuver presence, contiguous
//! shape-index ranges). Checks that need the decoded shape, such as the last
//! maneuver ending on the final shape point, happen when the tracker loads a
//! leg.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A route description as received from the route-computation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub trip: Trip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Declared distance unit: `"miles"` selects imperial, anything else
    /// (including absence) selects kilometers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    pub legs: Vec<Leg>,
}

/// One origin-to-destination segment of a multi-leg route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    /// Encoded polyline for the leg's path
    pub shape: String,
    pub maneuvers: Vec<Maneuver>,
}

/// One instruction-bearing sub-segment of a leg's shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maneuver {
    /// Half-open range `[begin_shape_index, end_shape_index)` over the leg's
    /// decoded point sequence. The destination maneuver's end equals the
    /// final shape index.
    pub begin_shape_index: usize,
    pub end_shape_index: usize,
    /// Length in the trip's declared units
    pub length: f64,
    /// Estimated duration in seconds
    pub time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

impl Route {
    /// Parse and structurally validate a route description.
    pub fn from_json(route_json: &str) -> Result<Route> {
        let route: Route = serde_json::from_str(route_json)
            .map_err(|e| Error::MalformedRoute(format!("route description failed to parse: {e}")))?;
        route.validate()?;
        Ok(route)
    }

    /// Whether the trip's declared unit is kilometers (anything but "miles")
    pub fn has_kilometer_units(&self) -> bool {
        self.trip.units.as_deref() != Some("miles")
    }

    fn validate(&self) -> Result<()> {
        if self.trip.legs.is_empty() {
            return Err(Error::MalformedRoute("trip has no legs".to_string()));
        }
        for (leg_index, leg) in self.trip.legs.iter().enumerate() {
            if leg.maneuvers.is_empty() {
                return Err(Error::MalformedRoute(format!(
                    "leg {leg_index} has no maneuvers"
                )));
            }
            if leg.maneuvers[0].begin_shape_index != 0 {
                return Err(Error::MalformedRoute(format!(
                    "leg {leg_index}: first maneuver does not begin at shape index 0"
                )));
            }
            for (i, m) in leg.maneuvers.iter().enumerate() {
                if m.begin_shape_index > m.end_shape_index {
                    return Err(Error::MalformedRoute(format!(
                        "leg {leg_index}, maneuver {i}: begin shape index {} exceeds end {}",
                        m.begin_shape_index, m.end_shape_index
                    )));
                }
            }
            for (i, pair) in leg.maneuvers.windows(2).enumerate() {
                if pair[1].begin_shape_index != pair[0].end_shape_index {
                    return Err(Error::MalformedRoute(format!(
                        "leg {leg_index}: maneuver {} does not begin where maneuver {i} ends",
                        i + 1
                    )));
                }
            }
        }
        Ok(())
    }
}
