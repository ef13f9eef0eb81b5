//! On-disk copies of puzzle pieces
//!
//! Some collaborators want file paths rather than pixel buffers. Files are
//! named per generation so a superseded board never deletes its successor's
//! files, and they are removed when the owning `PieceFiles` is dropped.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::core::error::Result;
use crate::puzzle::piece::GridPosition;

/// Files written for one generated board
#[derive(Debug, Default)]
pub struct PieceFiles {
    paths: Vec<PathBuf>,
}

impl PieceFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `image` as `piece_{generation}_{row}_{col}.png` under `dir`
    pub fn write(
        &mut self,
        dir: &Path,
        generation: u64,
        position: GridPosition,
        image: &RgbaImage,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "piece_{}_{}_{}.png",
            generation, position.row, position.col
        ));
        image.save(&path)?;
        self.paths.push(path.clone());
        Ok(path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for PieceFiles {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}
