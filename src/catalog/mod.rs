//! Point of interest catalog
//!
//! The catalog is built once at startup and never changes shape. The only
//! mutable part is the per-POI `reached` flag, which is an atomic so the
//! proximity path can set it while UI readers poll it.

pub mod poi;

pub use poi::PointOfInterest;

use ahash::AHashMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::error::{QuestError, Result};
use crate::core::types::{GameKind, PoiId};
use crate::location::coordinate::Coordinate;
use poi::{DEFAULT_MIN_TIME_TO_TRIGGER_SECONDS, DEFAULT_TRIGGER_RADIUS_METERS};

/// Immutable POI list with per-entry reached flags
#[derive(Debug, Default)]
pub struct PoiCatalog {
    pois: Vec<PointOfInterest>,
    reached: Vec<AtomicBool>,
    index: AHashMap<PoiId, usize>,
}

impl PoiCatalog {
    /// Build a catalog, rejecting duplicate ids and invalid trigger geometry
    pub fn new(pois: Vec<PointOfInterest>) -> Result<Self> {
        let mut index = AHashMap::with_capacity(pois.len());
        for (i, poi) in pois.iter().enumerate() {
            validate_poi(poi)?;
            if index.insert(poi.id.clone(), i).is_some() {
                return Err(QuestError::DuplicatePoi(poi.id.clone()));
            }
        }

        let reached = pois.iter().map(|_| AtomicBool::new(false)).collect();
        Ok(Self {
            pois,
            reached,
            index,
        })
    }

    /// Built-in tour of Saint-Omer
    pub fn with_defaults() -> Self {
        let pois = vec![
            PointOfInterest::new("poi_0", "Ma maison", Coordinate::new(50.736942, 2.251044))
                .with_description("Un haut lieu de la tech du secteur audomarois")
                .with_trigger(5.0, 6)
                .with_game(GameKind::Quiz, ""),
            PointOfInterest::new("poi_1", "La Grand-Place", Coordinate::new(50.750067, 2.251813))
                .with_description(
                    "Le centre névralgique de la cité audomaroise, on y retrouve le fameux \
                     Moulin à café, ancien Hôtel de ville aujourd'hui devenu un théâtre.",
                )
                .with_trigger(20.0, 10)
                .with_game(GameKind::Puzzle, "poi_moulin")
                .with_narrative("Le Moulin à café", "Ancien hôtel de ville devenu théâtre."),
            PointOfInterest::new("poi_2", "La Cathédrale", Coordinate::new(50.747345, 2.252833))
                .with_description("Notre-Dame de Saint-Omer est une église catholique datant de 1879.")
                .with_trigger(40.0, 8)
                .with_game(GameKind::Puzzle, "poi_cathedrale"),
            PointOfInterest::new("poi_3", "Le Jardin Public", Coordinate::new(50.749609, 2.249382))
                .with_description(
                    "Mêlant nature, animaux, architecture et activités diverses, ce parc est \
                     un incontournable de la ville !",
                )
                .with_trigger(50.0, 10)
                .with_game(GameKind::Puzzle, "poi_jp"),
            PointOfInterest::new("poi_4", "Musée Sandelin", Coordinate::new(50.748989, 2.25441))
                .with_description(
                    "Le musée de l'hôtel Sandelin est un musée d'art et de l'histoire de la \
                     ville datant de 1904.",
                )
                .with_trigger(25.0, 10)
                .with_game(GameKind::Puzzle, "poi_sandelin"),
            PointOfInterest::new("poi_5", "La Gare", Coordinate::new(50.753598, 2.266739))
                .with_description(
                    "Ce bâtiment abrite aujourd'hui encore une gare en fonctionnement ainsi \
                     que la Station, un espace communautaire autour de projets innovants.",
                )
                .with_trigger(25.0, 10)
                .with_game(GameKind::Puzzle, "poi_gare"),
            PointOfInterest::new("poi_6", "Abbaye Saint-Bertin", Coordinate::new(50.750633, 2.263839))
                .with_description(
                    "Aujourd'hui en ruines, ce monument historique est une ancienne abbaye \
                     bénédictine datant du VIIème siècle.",
                )
                .with_trigger(45.0, 10)
                .with_game(GameKind::Puzzle, "poi_stbertin"),
        ];

        // Static data above is known-good
        Self::new(pois).unwrap_or_default()
    }

    /// Load a catalog from a TOML file
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a catalog from a TOML string of `[[pois]]` tables
    pub fn parse_toml(content: &str) -> Result<Self> {
        let toml_data: TomlCatalog = toml::from_str(content)?;
        Self::new(toml_data.pois.into_iter().map(TomlPoi::into_poi).collect())
    }

    pub fn get(&self, id: &PoiId) -> Option<&PointOfInterest> {
        self.index.get(id).map(|&i| &self.pois[i])
    }

    /// All POIs in catalog order (the detector's evaluation order)
    pub fn all(&self) -> &[PointOfInterest] {
        &self.pois
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointOfInterest> {
        self.pois.iter()
    }

    pub fn len(&self) -> usize {
        self.pois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    /// Flip `reached` to true. Returns true only for the call that flipped it.
    pub fn mark_reached(&self, id: &PoiId) -> Result<bool> {
        let flag = self.flag(id)?;
        let first = !flag.swap(true, Ordering::AcqRel);
        if first {
            tracing::info!("Point of interest {} reached", id);
        }
        Ok(first)
    }

    pub fn is_reached(&self, id: &PoiId) -> bool {
        self.flag(id)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Explicitly clear a reached flag so the POI counts as new again
    pub fn clear_reached(&self, id: &PoiId) -> Result<()> {
        self.flag(id)?.store(false, Ordering::Release);
        Ok(())
    }

    pub fn reached_ids(&self) -> Vec<PoiId> {
        self.pois
            .iter()
            .zip(&self.reached)
            .filter(|(_, flag)| flag.load(Ordering::Acquire))
            .map(|(poi, _)| poi.id.clone())
            .collect()
    }

    fn flag(&self, id: &PoiId) -> Result<&AtomicBool> {
        self.index
            .get(id)
            .map(|&i| &self.reached[i])
            .ok_or_else(|| QuestError::PoiNotFound(id.clone()))
    }
}

fn validate_poi(poi: &PointOfInterest) -> Result<()> {
    if poi.id.as_str().is_empty() {
        return Err(QuestError::InvalidPoi("empty id".into()));
    }
    if !poi.trigger_radius_meters.is_finite() || poi.trigger_radius_meters <= 0.0 {
        return Err(QuestError::InvalidPoi(format!(
            "{}: trigger radius must be positive, got {}",
            poi.id, poi.trigger_radius_meters
        )));
    }
    if !poi.coordinate.is_valid() {
        return Err(QuestError::InvalidPoi(format!(
            "{}: invalid coordinate ({}, {})",
            poi.id, poi.coordinate.latitude, poi.coordinate.longitude
        )));
    }
    if poi.narrative_titles.len() != poi.narrative_texts.len() {
        return Err(QuestError::InvalidPoi(format!(
            "{}: {} narrative titles for {} texts",
            poi.id,
            poi.narrative_titles.len(),
            poi.narrative_texts.len()
        )));
    }
    Ok(())
}

/// TOML representation of a catalog file
#[derive(Debug, Deserialize)]
struct TomlCatalog {
    pois: Vec<TomlPoi>,
}

/// TOML representation of a single POI
#[derive(Debug, Deserialize)]
struct TomlPoi {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    latitude: f64,
    longitude: f64,
    #[serde(default = "default_radius")]
    trigger_radius_meters: f64,
    #[serde(default = "default_dwell")]
    min_time_to_trigger_seconds: u32,
    #[serde(default)]
    game: GameKind,
    #[serde(default)]
    image: String,
    #[serde(default)]
    narrative: Vec<TomlNarrative>,
}

#[derive(Debug, Deserialize)]
struct TomlNarrative {
    title: String,
    text: String,
}

fn default_radius() -> f64 {
    DEFAULT_TRIGGER_RADIUS_METERS
}

fn default_dwell() -> u32 {
    DEFAULT_MIN_TIME_TO_TRIGGER_SECONDS
}

impl TomlPoi {
    fn into_poi(self) -> PointOfInterest {
        let mut poi = PointOfInterest::new(
            self.id,
            self.name,
            Coordinate::new(self.latitude, self.longitude),
        )
        .with_description(self.description)
        .with_trigger(self.trigger_radius_meters, self.min_time_to_trigger_seconds)
        .with_game(self.game, self.image);
        for entry in self.narrative {
            poi = poi.with_narrative(entry.title, entry.text);
        }
        poi
    }
}
