//! Puzzle pieces and their grid positions

use image::RgbaImage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Row/column of a cell in a row-major grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridPosition {
    pub row: u32,
    pub col: u32,
}

impl GridPosition {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Position of sequence index `index` in a grid of `columns`
    pub fn from_index(index: usize, columns: u32) -> Self {
        let columns = columns.max(1) as usize;
        Self {
            row: (index / columns) as u32,
            col: (index % columns) as u32,
        }
    }

    pub fn to_index(&self, columns: u32) -> usize {
        self.row as usize * columns as usize + self.col as usize
    }
}

/// One tile of a sliced image
///
/// Pixel data is shared, so reordering clones only handles.
#[derive(Debug, Clone)]
pub struct PuzzlePiece {
    pub title: String,
    pub image: Arc<RgbaImage>,
    pub correct_position: GridPosition,
    /// PNG copy on disk, when spilling is enabled
    pub file: Option<PathBuf>,
}

impl PuzzlePiece {
    pub fn new(image: RgbaImage, correct_position: GridPosition, columns: u32) -> Self {
        Self {
            title: piece_title(correct_position, columns),
            image: Arc::new(image),
            correct_position,
            file: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl PartialEq for PuzzlePiece {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.correct_position == other.correct_position
    }
}

impl Eq for PuzzlePiece {}

/// "Piece N", numbered from 1 in row-major order
pub fn piece_title(position: GridPosition, columns: u32) -> String {
    format!("Piece {}", position.to_index(columns) + 1)
}

/// True iff every piece sits at its correct row-major index
pub fn is_solved_order(pieces: &[PuzzlePiece], columns: u32) -> bool {
    pieces
        .iter()
        .enumerate()
        .all(|(i, piece)| piece.correct_position == GridPosition::from_index(i, columns))
}
