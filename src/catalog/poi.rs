//! Point of interest record

use serde::{Deserialize, Serialize};

use crate::core::types::{GameKind, PoiId};
use crate::location::coordinate::Coordinate;

/// Default trigger radius when a record does not specify one (meters)
pub const DEFAULT_TRIGGER_RADIUS_METERS: f64 = 50.0;

/// Default dwell time when a record does not specify one (seconds)
pub const DEFAULT_MIN_TIME_TO_TRIGGER_SECONDS: u32 = 5;

/// A named place with trigger geometry and the content it unlocks
///
/// The record itself is immutable once in a catalog; the `reached` flag
/// lives in `PoiCatalog`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: PoiId,
    pub name: String,
    pub description: String,
    pub narrative_titles: Vec<String>,
    pub narrative_texts: Vec<String>,
    pub coordinate: Coordinate,
    /// Strictly positive
    pub trigger_radius_meters: f64,
    pub min_time_to_trigger_seconds: u32,
    pub game_kind: GameKind,
    pub image_ref: String,
}

impl PointOfInterest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            id: PoiId::new(id),
            name: name.into(),
            description: String::new(),
            narrative_titles: Vec::new(),
            narrative_texts: Vec::new(),
            coordinate,
            trigger_radius_meters: DEFAULT_TRIGGER_RADIUS_METERS,
            min_time_to_trigger_seconds: DEFAULT_MIN_TIME_TO_TRIGGER_SECONDS,
            game_kind: GameKind::Puzzle,
            image_ref: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_trigger(mut self, radius_meters: f64, min_time_seconds: u32) -> Self {
        self.trigger_radius_meters = radius_meters;
        self.min_time_to_trigger_seconds = min_time_seconds;
        self
    }

    pub fn with_game(mut self, game_kind: GameKind, image_ref: impl Into<String>) -> Self {
        self.game_kind = game_kind;
        self.image_ref = image_ref.into();
        self
    }

    pub fn with_narrative(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.narrative_titles.push(title.into());
        self.narrative_texts.push(text.into());
        self
    }

    /// Distance from `position` to this POI in meters
    pub fn distance_from(&self, position: &Coordinate) -> f64 {
        self.coordinate.distance_to(position)
    }

    /// Whether `position` lies inside the trigger radius (boundary included)
    pub fn is_user_nearby(&self, position: &Coordinate) -> bool {
        self.distance_from(position) <= self.trigger_radius_meters
    }

    /// Dwell requirement in milliseconds
    pub fn min_dwell_millis(&self) -> u64 {
        u64::from(self.min_time_to_trigger_seconds) * 1000
    }
}
