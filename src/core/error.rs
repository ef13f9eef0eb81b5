use thiserror::Error;

use crate::core::types::PoiId;

#[derive(Error, Debug)]
pub enum QuestError {
    #[error("Image load error: {0}")]
    ImageLoad(String),

    #[error("Degenerate layout: cell size {cell_width}x{cell_height}")]
    DegenerateLayout { cell_width: f32, cell_height: f32 },

    #[error("Invalid location sample: {0}")]
    InvalidSample(String),

    #[error("Invalid piece order: {0}")]
    InvalidOrder(String),

    #[error("Puzzle is not ready")]
    NotReady,

    #[error("Duplicate point of interest: {0}")]
    DuplicatePoi(PoiId),

    #[error("Point of interest not found: {0}")]
    PoiNotFound(PoiId),

    #[error("Invalid point of interest: {0}")]
    InvalidPoi(String),

    #[error("Location updates unavailable: {0}")]
    LocationUnavailable(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, QuestError>;
