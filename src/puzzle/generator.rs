//! Puzzle generation: layout, resample, slice, shuffle
//!
//! Lengths in a `PuzzleRequest` are layout units. They are multiplied by
//! the configured density to get pixels for resampling and slicing, and the
//! returned layout is converted back to layout units.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

use crate::core::config::PuzzleConfig;
use crate::core::error::{QuestError, Result};
use crate::puzzle::layout::{compute_layout, GridLayout};
use crate::puzzle::piece::{is_solved_order, GridPosition, PuzzlePiece};
use crate::puzzle::spill::PieceFiles;

/// Inputs that fully determine a board (apart from the shuffle)
#[derive(Debug, Clone, PartialEq)]
pub struct PuzzleRequest {
    pub image_ref: String,
    pub available_width: f32,
    pub available_height: f32,
    pub spacing: f32,
    pub base_column_count: u32,
}

impl PuzzleRequest {
    /// Request with spacing and base columns taken from `config`
    pub fn new(
        image_ref: impl Into<String>,
        available_width: f32,
        available_height: f32,
        config: &PuzzleConfig,
    ) -> Self {
        Self {
            image_ref: image_ref.into(),
            available_width,
            available_height,
            spacing: config.item_spacing,
            base_column_count: config.base_column_count,
        }
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_base_columns(mut self, base_column_count: u32) -> Self {
        self.base_column_count = base_column_count;
        self
    }
}

/// A freshly generated board
#[derive(Debug)]
pub struct GeneratedPuzzle {
    /// In layout units
    pub layout: GridLayout,
    /// Scrambled order
    pub pieces: Vec<PuzzlePiece>,
    /// Present when spilling is enabled; deleting it removes the files
    pub files: Option<PieceFiles>,
}

/// Turns images into shuffled piece sequences
#[derive(Debug)]
pub struct PuzzleGenerator {
    rng: ChaCha8Rng,
    density: f32,
    spill_dir: Option<PathBuf>,
}

impl PuzzleGenerator {
    /// Generator seeded from `config.seed`, or from entropy when unset
    pub fn new(config: &PuzzleConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            rng,
            density: config.density,
            spill_dir: config.spill_dir.clone(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Generate a board; spilled files (if any) are tagged generation 0
    pub fn generate(&mut self, image: &DynamicImage, request: &PuzzleRequest) -> Result<GeneratedPuzzle> {
        self.generate_tagged(image, request, 0)
    }

    /// Generate a board, tagging spilled files with `generation`
    pub fn generate_tagged(
        &mut self,
        image: &DynamicImage,
        request: &PuzzleRequest,
        generation: u64,
    ) -> Result<GeneratedPuzzle> {
        let density = if self.density.is_finite() && self.density > 0.0 {
            self.density
        } else {
            1.0
        };

        let pixel_layout = compute_layout(
            image.width(),
            image.height(),
            request.available_width * density,
            request.available_height * density,
            request.spacing * density,
            request.base_column_count,
        )?;

        let resized = resample(image, &pixel_layout)?;
        let mut pieces = slice_pieces(&resized, &pixel_layout);
        self.shuffle(&mut pieces, pixel_layout.columns);

        let files = match &self.spill_dir {
            Some(dir) => Some(spill(&mut pieces, dir, generation)?),
            None => None,
        };

        tracing::debug!(
            "Generated {}x{} puzzle from {}x{} image ({} pieces)",
            pixel_layout.columns,
            pixel_layout.rows,
            image.width(),
            image.height(),
            pieces.len()
        );

        Ok(GeneratedPuzzle {
            layout: pixel_layout.scaled(1.0 / density),
            pieces,
            files,
        })
    }

    /// Uniform permutation that is not already the solved order
    ///
    /// A one-piece board cannot be scrambled and is returned as is.
    fn shuffle(&mut self, pieces: &mut [PuzzlePiece], columns: u32) {
        if pieces.len() < 2 {
            return;
        }
        loop {
            pieces.shuffle(&mut self.rng);
            if !is_solved_order(pieces, columns) {
                return;
            }
        }
    }
}

/// Scale the image to exactly the pixel size of all cells combined
fn resample(image: &DynamicImage, layout: &GridLayout) -> Result<RgbaImage> {
    let width = (layout.columns as f32 * layout.cell_width).round() as u32;
    let height = (layout.rows as f32 * layout.cell_height).round() as u32;
    if width < layout.columns || height < layout.rows {
        return Err(QuestError::DegenerateLayout {
            cell_width: layout.cell_width,
            cell_height: layout.cell_height,
        });
    }
    Ok(image.resize_exact(width, height, FilterType::Lanczos3).to_rgba8())
}

/// Cut `resized` into a row-major grid of pieces
///
/// Piece edges sit at `k * size / count`, so the pieces tile the image
/// with no gaps or overlaps even when the cell size is fractional.
pub fn slice_pieces(resized: &RgbaImage, layout: &GridLayout) -> Vec<PuzzlePiece> {
    let (width, height) = resized.dimensions();
    let columns = layout.columns.max(1);
    let rows = layout.rows.max(1);

    let mut pieces = Vec::with_capacity(layout.piece_count());
    for row in 0..rows {
        let y0 = edge(row, height, rows);
        let y1 = edge(row + 1, height, rows);
        for col in 0..columns {
            let x0 = edge(col, width, columns);
            let x1 = edge(col + 1, width, columns);
            let tile = imageops::crop_imm(resized, x0, y0, x1 - x0, y1 - y0).to_image();
            pieces.push(PuzzlePiece::new(tile, GridPosition::new(row, col), columns));
        }
    }
    pieces
}

fn edge(index: u32, size: u32, count: u32) -> u32 {
    (u64::from(index) * u64::from(size) / u64::from(count)) as u32
}

fn spill(pieces: &mut [PuzzlePiece], dir: &std::path::Path, generation: u64) -> Result<PieceFiles> {
    let mut files = PieceFiles::new();
    for piece in pieces.iter_mut() {
        let path = files.write(dir, generation, piece.correct_position, &piece.image)?;
        piece.file = Some(path);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashSet;

    /// Each pixel encodes its own coordinates so tiles can be checked
    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x / 256) * 16 + y / 256) as u8, 255])
        }))
    }

    fn generator() -> PuzzleGenerator {
        PuzzleGenerator::new(&PuzzleConfig::default()).with_seed(42)
    }

    #[test]
    fn test_landscape_board() {
        let request = PuzzleRequest::new("img", 900.0, 700.0, &PuzzleConfig::default())
            .with_spacing(2.0)
            .with_base_columns(4);
        let puzzle = generator().generate(&gradient(1200, 800), &request).unwrap();

        assert_eq!(puzzle.layout.columns, 5);
        assert_eq!(puzzle.layout.rows, 3);
        assert_eq!(puzzle.pieces.len(), 15);
        assert!(puzzle.files.is_none());

        let positions: HashSet<_> = puzzle.pieces.iter().map(|p| p.correct_position).collect();
        assert_eq!(positions.len(), 15);
        assert!(positions.iter().all(|p| p.row < 3 && p.col < 5));
        assert!(!is_solved_order(&puzzle.pieces, 5));
    }

    #[test]
    fn test_pieces_tile_resized_image() {
        let request = PuzzleRequest::new("img", 900.0, 700.0, &PuzzleConfig::default()).with_spacing(2.0);
        let puzzle = generator().generate(&gradient(1200, 800), &request).unwrap();
        let layout = puzzle.layout;

        let expected_w = (layout.columns as f32 * layout.cell_width).round() as u32;
        let expected_h = (layout.rows as f32 * layout.cell_height).round() as u32;

        let mut ordered = puzzle.pieces.clone();
        ordered.sort_by_key(|p| p.correct_position.to_index(layout.columns));

        let row_width: u32 = ordered[..layout.columns as usize].iter().map(|p| p.width()).sum();
        let col_height: u32 = ordered
            .iter()
            .filter(|p| p.correct_position.col == 0)
            .map(|p| p.height())
            .sum();
        assert_eq!(row_width, expected_w);
        assert_eq!(col_height, expected_h);

        let area: u64 = ordered.iter().map(|p| u64::from(p.width()) * u64::from(p.height())).sum();
        assert_eq!(area, u64::from(expected_w) * u64::from(expected_h));
    }

    #[test]
    fn test_slice_preserves_pixels() {
        let source = gradient(10, 6).to_rgba8();
        let layout = GridLayout {
            columns: 3,
            rows: 2,
            cell_width: 10.0 / 3.0,
            cell_height: 3.0,
            spacing: 0.0,
        };
        let pieces = slice_pieces(&source, &layout);
        assert_eq!(pieces.len(), 6);
        assert_eq!(pieces[0].title, "Piece 1");
        assert_eq!(pieces[5].correct_position, GridPosition::new(1, 2));

        // Column edges at 0, 3, 6, 10
        assert_eq!(pieces[0].width(), 3);
        assert_eq!(pieces[2].width(), 4);
        assert_eq!(pieces[4].image.get_pixel(0, 0), source.get_pixel(3, 3));
    }

    #[test]
    fn test_same_seed_same_order() {
        let request = PuzzleRequest::new("img", 400.0, 400.0, &PuzzleConfig::default());
        let image = gradient(300, 200);
        let a = generator().generate(&image, &request).unwrap();
        let b = generator().generate(&image, &request).unwrap();
        let titles = |p: &GeneratedPuzzle| p.pieces.iter().map(|x| x.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&a), titles(&b));
    }

    #[test]
    fn test_density_converts_units() {
        let config = PuzzleConfig {
            density: 2.0,
            ..PuzzleConfig::default()
        };
        let request = PuzzleRequest::new("img", 450.0, 350.0, &config).with_spacing(1.0);
        let puzzle = PuzzleGenerator::new(&config)
            .with_seed(1)
            .generate(&gradient(1200, 800), &request)
            .unwrap();

        // Same board as 900x700 px at spacing 2, reported in layout units
        assert_eq!(puzzle.layout.columns, 5);
        assert!((puzzle.layout.cell_width - 88.8).abs() < 1e-3);
        assert!((puzzle.pieces.iter().map(|p| p.width()).max().unwrap() as f32 - 177.6).abs() < 1.0);
    }

    #[test]
    fn test_degenerate_viewport() {
        let request = PuzzleRequest::new("img", 8.0, 8.0, &PuzzleConfig::default());
        let result = generator().generate(&gradient(1200, 800), &request);
        assert!(matches!(result, Err(QuestError::DegenerateLayout { .. })));
    }

    #[test]
    fn test_spill_writes_and_cleans_up() {
        let dir = std::env::temp_dir().join(format!("poi_quest_gen_spill_{}", std::process::id()));
        let config = PuzzleConfig {
            spill_dir: Some(dir.clone()),
            ..PuzzleConfig::default()
        };
        let request = PuzzleRequest::new("img", 200.0, 200.0, &config);
        let puzzle = PuzzleGenerator::new(&config)
            .with_seed(3)
            .generate_tagged(&gradient(100, 100), &request, 9)
            .unwrap();

        let files = puzzle.files.expect("spill enabled");
        assert_eq!(files.len(), puzzle.pieces.len());
        let paths: Vec<PathBuf> = puzzle.pieces.iter().filter_map(|p| p.file.clone()).collect();
        assert!(paths.iter().all(|p| p.exists()));

        drop(files);
        assert!(paths.iter().all(|p| !p.exists()));
        let _ = std::fs::remove_dir(&dir);
    }
}
