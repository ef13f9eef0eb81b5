//! POI Quest - location-triggered mini-games for a walking tour

pub mod catalog;
pub mod core;
pub mod location;
pub mod proximity;
pub mod puzzle;
