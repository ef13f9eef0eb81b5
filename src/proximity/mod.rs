//! Proximity detection and the location pipeline that feeds it

pub mod detector;
pub mod monitor;

pub use detector::{ProximityDetector, ProximityTimer};
pub use monitor::{NearbyEvent, ProximityMonitor, DEFAULT_MAP_CENTER};
