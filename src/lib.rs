//! butterfly-nav — real-time route tracking for turn-by-turn navigation
//!
//! Given a precomputed route description and a stream of position fixes,
//! [`Tracker`] reports where the traveler is along the route, how far and how
//! long remains to the destination and to the next maneuver, and when an
//! upcoming-maneuver instruction is due.
//!
//! The crate does not compute routes and owns no transport: it is an
//! in-process library fed by whatever produced the route and whatever
//! delivers fixes.
//!
//! # Example
//!
//! ```no_run
//! use butterfly_nav::{FixLocation, RouteState, Tracker};
//!
//! # fn main() -> butterfly_nav::Result<()> {
//! # let route_json = "";
//! let mut tracker = Tracker::new(route_json)?;
//! let status = tracker.on_location_changed(&FixLocation { lon: 4.3517, lat: 50.8466 })?;
//! match status.route_state {
//!     RouteState::Invalid => println!("off route"),
//!     _ => {
//!         let progress = status.progress.unwrap();
//!         println!(
//!             "{:.2} remaining, next maneuver in {}s",
//!             progress.remaining_leg_length, progress.remaining_maneuver_time
//!         );
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod geometry;
pub mod polyline;
pub mod route;
pub mod status;
pub mod tracker;

pub use error::{Error, Result};
pub use geometry::Point;
pub use route::Route;
pub use status::{FixLocation, NavigationStatus, RouteState, TripProgress};
pub use tracker::{RemainingValues, Tracker, UsedInstructions};
