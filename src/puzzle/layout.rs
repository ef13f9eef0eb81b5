//! Grid layout fitting a source image into an available viewport
//!
//! The grid keeps the image aspect ratio and fills the binding dimension.
//! Columns come from the orientation (landscape gets one more than the base,
//! portrait one fewer); rows follow from near-square cells and are then
//! stretched so the grid height is filled exactly.
//!
//! Invariant: `columns * cell_width + (columns + 1) * spacing` equals the
//! grid width, which never exceeds the available width; same for rows.

use serde::Serialize;

use crate::core::error::{QuestError, Result};

/// Rows x columns x cell size of a puzzle board
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    /// Gap between cells and around the border
    pub spacing: f32,
}

impl GridLayout {
    pub fn piece_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Width including gutters and border spacing
    pub fn grid_width(&self) -> f32 {
        self.columns as f32 * self.cell_width + (self.columns as f32 + 1.0) * self.spacing
    }

    /// Height including gutters and border spacing
    pub fn grid_height(&self) -> f32 {
        self.rows as f32 * self.cell_height + (self.rows as f32 + 1.0) * self.spacing
    }

    /// Same grid expressed in another unit (e.g. pixels to layout units)
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            cell_width: self.cell_width * factor,
            cell_height: self.cell_height * factor,
            spacing: self.spacing * factor,
            ..*self
        }
    }
}

/// Column count for an image of the given aspect ratio (minimum 1)
pub fn column_count(image_ratio: f32, base_column_count: u32) -> u32 {
    if image_ratio > 1.0 {
        base_column_count.saturating_add(1)
    } else {
        base_column_count.saturating_sub(1).max(1)
    }
}

/// Compute the layout for an `image_width` x `image_height` image
///
/// All lengths share one unit. Fails with `DegenerateLayout` when either
/// cell dimension would not be strictly positive.
pub fn compute_layout(
    image_width: u32,
    image_height: u32,
    available_width: f32,
    available_height: f32,
    spacing: f32,
    base_column_count: u32,
) -> Result<GridLayout> {
    if image_width == 0 || image_height == 0 {
        return Err(QuestError::ImageLoad(format!(
            "image has no pixels ({}x{})",
            image_width, image_height
        )));
    }
    let viewport_ok = available_width.is_finite()
        && available_height.is_finite()
        && available_width > 0.0
        && available_height > 0.0
        && spacing.is_finite();
    if !viewport_ok {
        return Err(QuestError::DegenerateLayout {
            cell_width: 0.0,
            cell_height: 0.0,
        });
    }
    let spacing = spacing.max(0.0);

    let image_ratio = image_width as f32 / image_height as f32;
    let columns = column_count(image_ratio, base_column_count);

    let width_ratio = available_width / image_width as f32;
    let height_ratio = available_height / image_height as f32;

    // The smaller scale factor is the binding dimension
    let (grid_width, grid_height) = if width_ratio < height_ratio {
        (available_width, available_width / image_ratio)
    } else {
        (available_height * image_ratio, available_height)
    };

    let cell_width = (grid_width - (columns as f32 + 1.0) * spacing) / columns as f32;
    if !(cell_width > 0.0) {
        return Err(QuestError::DegenerateLayout {
            cell_width,
            cell_height: cell_width,
        });
    }

    // Square cells first, then stretch rows to fill the height exactly
    let rows = ((grid_height / cell_width).floor() as u32).max(1);
    let cell_height = (grid_height - (rows as f32 + 1.0) * spacing) / rows as f32;
    if !(cell_height > 0.0) {
        return Err(QuestError::DegenerateLayout {
            cell_width,
            cell_height,
        });
    }

    Ok(GridLayout {
        columns,
        rows,
        cell_width,
        cell_height,
        spacing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_landscape_width_bound() {
        let layout = compute_layout(1200, 800, 900.0, 700.0, 2.0, 4).unwrap();
        assert_eq!(layout.columns, 5);
        assert_eq!(layout.rows, 3);
        assert!((layout.cell_width - 177.6).abs() < 1e-3);
        assert!((layout.cell_height - 197.333).abs() < 1e-2);
        assert_eq!(layout.piece_count(), 15);
    }

    #[test]
    fn test_portrait_height_bound() {
        // 600x900 portrait in a 900x600 viewport: height binds
        let layout = compute_layout(600, 900, 900.0, 600.0, 0.0, 4).unwrap();
        assert_eq!(layout.columns, 3);
        assert!((layout.grid_width() - 400.0).abs() < 1e-3);
        assert!((layout.grid_height() - 600.0).abs() < 1e-3);
        // cell_width = 133.33, rows = floor(600 / 133.33) = 4
        assert_eq!(layout.rows, 4);
        assert!((layout.cell_height - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_square_image_counts_as_portrait() {
        assert_eq!(column_count(1.0, 4), 3);
        assert_eq!(column_count(1.01, 4), 5);
        assert_eq!(column_count(0.5, 1), 1);
    }

    #[test]
    fn test_huge_base_column_count_does_not_overflow() {
        assert_eq!(column_count(1.5, u32::MAX), u32::MAX);
        let result = compute_layout(1200, 800, 900.0, 700.0, 2.0, u32::MAX);
        assert!(matches!(result, Err(QuestError::DegenerateLayout { .. })));
    }

    #[test]
    fn test_tiny_viewport_is_degenerate() {
        let result = compute_layout(1200, 800, 10.0, 10.0, 4.0, 4);
        assert!(matches!(result, Err(QuestError::DegenerateLayout { .. })));
    }

    #[test]
    fn test_invalid_viewport_is_degenerate() {
        assert!(compute_layout(100, 100, f32::NAN, 100.0, 1.0, 4).is_err());
        assert!(compute_layout(100, 100, 100.0, 0.0, 1.0, 4).is_err());
    }

    #[test]
    fn test_zero_sized_image_is_load_error() {
        let result = compute_layout(0, 800, 900.0, 700.0, 2.0, 4);
        assert!(matches!(result, Err(QuestError::ImageLoad(_))));
    }

    proptest! {
        #[test]
        fn prop_layout_fits_viewport(
            image_w in 16u32..4000,
            image_h in 16u32..4000,
            avail_w in 50.0f32..2000.0,
            avail_h in 50.0f32..2000.0,
            spacing in 0.0f32..4.0,
            base in 1u32..8,
        ) {
            if let Ok(layout) = compute_layout(image_w, image_h, avail_w, avail_h, spacing, base) {
                let tolerance = 1e-2;
                prop_assert!(layout.columns >= 1 && layout.rows >= 1);
                prop_assert!(layout.cell_width > 0.0 && layout.cell_height > 0.0);
                prop_assert!(layout.columns as f32 * layout.cell_width <= avail_w + tolerance);
                prop_assert!(layout.rows as f32 * layout.cell_height <= avail_h + tolerance);
                prop_assert!(layout.grid_width() <= avail_w + tolerance);
                prop_assert!(layout.grid_height() <= avail_h + tolerance);

                // The grid including gutters keeps the image aspect ratio
                let image_ratio = image_w as f32 / image_h as f32;
                let grid_ratio = layout.grid_width() / layout.grid_height();
                prop_assert!((grid_ratio - image_ratio).abs() / image_ratio < 1e-3);
            }
        }
    }
}
