pub mod config;
pub mod error;
pub mod types;

pub use config::{LocationConfig, PuzzleConfig, QuestConfig};
pub use error::{QuestError, Result};
pub use types::{GameKind, PoiId, Timestamp};
