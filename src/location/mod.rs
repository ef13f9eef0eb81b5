//! Position value types and the location source boundary

pub mod coordinate;
pub mod replay;
pub mod source;

pub use coordinate::{Coordinate, LocationSample};
pub use replay::{load_track_toml, parse_track_toml, ReplayLocationSource};
pub use source::{
    AlwaysSatisfied, LocationListener, LocationSource, PreconditionStatus, Preconditions,
};
