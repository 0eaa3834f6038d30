//! TOPTW route optimization engine.
//!
//! Plans a single-day visit itinerary through a set of geolocated points of
//! interest, maximizing a weighted utility score under time, budget,
//! opening-hours and routing constraints (a Team Orienteering Problem with
//! Time Windows). The engine is a pure computation core: callers supply the
//! candidate POIs, a [`DistanceOracle`](oracle::DistanceOracle) and a
//! [`Constraints`](poi::Constraints) value, and receive back an ordered
//! route with a detailed timeline.

pub mod aco;
pub mod error;
pub mod evaluator;
pub mod ga;
pub mod hours;
pub mod oracle;
pub mod oracle_haversine;
pub mod oracle_keyed;
pub mod oracle_public;
pub mod orchestrator;
pub mod poi;
pub mod rng;
pub mod weights;

pub use error::Error;
pub use orchestrator::{Orchestrator, OrchestratorResult};
pub use poi::{Constraints, Poi, Timeline, TimelineEntry, TransportProfile, UserPace, Weekday};
pub use weights::OptimizationWeights;
