//! Image source boundary for puzzle generation

use ahash::AHashMap;
use image::DynamicImage;
use std::path::{Component, Path, PathBuf};

use crate::core::error::{QuestError, Result};

/// Resolves an image reference to decoded pixels
///
/// A missing reference is reported as `QuestError::ImageLoad`.
pub trait ImageSource: Send + Sync {
    fn load_image(&self, image_ref: &str) -> Result<DynamicImage>;
}

/// Loads `<root>/<ref>.<ext>` for the first extension that exists
#[derive(Debug, Clone)]
pub struct DirectoryImageSource {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: ["png", "jpg", "jpeg", "webp"].iter().map(|e| e.to_string()).collect(),
        }
    }

    fn resolve(&self, image_ref: &str) -> Option<PathBuf> {
        let direct = self.root.join(image_ref);
        if direct.extension().is_some() && direct.is_file() {
            return Some(direct);
        }
        self.extensions
            .iter()
            .map(|ext| self.root.join(format!("{}.{}", image_ref, ext)))
            .find(|path| path.is_file())
    }
}

impl ImageSource for DirectoryImageSource {
    fn load_image(&self, image_ref: &str) -> Result<DynamicImage> {
        if !is_relative_ref(image_ref) {
            return Err(QuestError::ImageLoad(format!("invalid image reference '{}'", image_ref)));
        }
        let path = self
            .resolve(image_ref)
            .ok_or_else(|| QuestError::ImageLoad(format!("image '{}' not found", image_ref)))?;
        tracing::debug!("Loading puzzle image {}", path.display());
        image::open(&path)
            .map_err(|e| QuestError::ImageLoad(format!("{}: {}", path.display(), e)))
    }
}

/// A non-empty path made only of plain names, so it cannot leave the root
fn is_relative_ref(image_ref: &str) -> bool {
    let path = Path::new(image_ref);
    !image_ref.is_empty()
        && !path.is_absolute()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Images held in memory, keyed by reference
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: AHashMap<String, DynamicImage>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image_ref: impl Into<String>, image: DynamicImage) {
        self.images.insert(image_ref.into(), image);
    }

    pub fn with_image(mut self, image_ref: impl Into<String>, image: DynamicImage) -> Self {
        self.insert(image_ref, image);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn load_image(&self, image_ref: &str) -> Result<DynamicImage> {
        self.images
            .get(image_ref)
            .cloned()
            .ok_or_else(|| QuestError::ImageLoad(format!("image '{}' not found", image_ref)))
    }
}
