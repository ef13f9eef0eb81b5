//! Image puzzle: layout, slicing, shuffling and the board state machine

pub mod generator;
pub mod grid;
pub mod image_source;
pub mod layout;
pub mod piece;
pub mod session;
pub mod spill;

pub use generator::{slice_pieces, GeneratedPuzzle, PuzzleGenerator, PuzzleRequest};
pub use grid::{apply_move, moved, MoveEvent, ReorderableGrid};
pub use image_source::{DirectoryImageSource, ImageSource, MemoryImageSource};
pub use layout::{column_count, compute_layout, GridLayout};
pub use piece::{is_solved_order, piece_title, GridPosition, PuzzlePiece};
pub use session::{PuzzleSession, PuzzleState};
pub use spill::PieceFiles;
