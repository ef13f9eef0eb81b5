//! Runtime configuration with documented defaults
//!
//! Tunables for the location pipeline and the puzzle board live here.
//! The library takes a `QuestConfig` (or one of its sections) explicitly;
//! the global accessor exists for binaries that load one file at startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::error::{QuestError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuestConfig {
    pub location: LocationConfig,
    pub puzzle: PuzzleConfig,
}

/// Location update tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Desired interval between fixes (milliseconds)
    ///
    /// Sources treat this as a hint; the detector makes no assumption
    /// about the actual rate.
    pub update_interval_ms: u64,

    /// Hard lower bound between two delivered fixes (milliseconds)
    ///
    /// Enforced by the source, never by the detector.
    pub min_update_interval_ms: u64,

    /// Capacity of the queue between source and detector
    ///
    /// When full, new samples are dropped. Detection is O(POIs) so the
    /// queue only fills if the consumer is stalled.
    pub channel_capacity: usize,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 5000,
            min_update_interval_ms: 2000,
            channel_capacity: 16,
        }
    }
}

/// Puzzle board tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PuzzleConfig {
    /// Gap between cells, in layout units
    pub item_spacing: f32,

    /// Column count before the landscape (+1) / portrait (-1) adjustment
    pub base_column_count: u32,

    /// Pixels per layout unit
    ///
    /// Viewport sizes arrive in layout units; slicing happens in pixels.
    pub density: f32,

    /// When set, every generated piece is also written here as a PNG
    pub spill_dir: Option<PathBuf>,

    /// Fixed shuffle seed for reproducible boards
    pub seed: Option<u64>,
}

impl Default for PuzzleConfig {
    fn default() -> Self {
        Self {
            item_spacing: 4.0,
            base_column_count: 4,
            density: 1.0,
            spill_dir: None,
            seed: None,
        }
    }
}

impl QuestConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a config from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: QuestConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a TOML file
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let location = &self.location;
        if location.min_update_interval_ms > location.update_interval_ms {
            return Err(QuestError::Config(format!(
                "min_update_interval_ms ({}) should be <= update_interval_ms ({})",
                location.min_update_interval_ms, location.update_interval_ms
            )));
        }
        if location.channel_capacity == 0 {
            return Err(QuestError::Config("channel_capacity must be at least 1".into()));
        }

        let puzzle = &self.puzzle;
        if !puzzle.item_spacing.is_finite() || puzzle.item_spacing < 0.0 {
            return Err(QuestError::Config(format!(
                "item_spacing ({}) must be a non-negative number",
                puzzle.item_spacing
            )));
        }
        if !puzzle.density.is_finite() || puzzle.density <= 0.0 {
            return Err(QuestError::Config(format!(
                "density ({}) must be positive",
                puzzle.density
            )));
        }
        if puzzle.base_column_count == 0 {
            return Err(QuestError::Config("base_column_count must be at least 1".into()));
        }

        Ok(())
    }
}

// === GLOBAL CONFIG ACCESS ===

use std::sync::OnceLock;

static CONFIG: OnceLock<QuestConfig> = OnceLock::new();

/// Get the global config (initializes with defaults if not set)
pub fn config() -> &'static QuestConfig {
    CONFIG.get_or_init(QuestConfig::default)
}

/// Set the global config (can only be called once)
///
/// Returns Err if config was already set.
pub fn set_config(config: QuestConfig) -> std::result::Result<(), QuestConfig> {
    CONFIG.set(config)
}
