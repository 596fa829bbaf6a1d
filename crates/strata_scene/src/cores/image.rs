//! Image sources shared by texture and region map cores.

use std::sync::Arc;

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl ImageData {
    #[must_use]
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// 1x1 image of a single colour.
    #[must_use]
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::new(1, 1, rgba.to_vec())
    }

    /// Whether the pixel buffer matches the declared size.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * 4
    }
}

/// Where the pixels of an image-backed core come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded asynchronously through the scene's asset loader.
    Uri(String),
    /// Render target owned by the backend, resolved by name.
    Target(String),
    /// Pixels supplied inline.
    Image(ImageData),
}

impl ImageSource {
    /// Declared identity used for sharing. Inline images have none.
    #[must_use]
    pub fn identity(&self) -> Option<String> {
        match self {
            ImageSource::Uri(uri) => Some(format!("src={uri}")),
            ImageSource::Target(target) => Some(format!("target={target}")),
            ImageSource::Image(_) => None,
        }
    }
}
