//! Frame data structures for captured screen content

use image::{DynamicImage, RgbaImage};
use sha2::{Digest, Sha256};
use std::time::Instant;

/// SHA-256 over the frame size and raw pixel bytes
pub type Fingerprint = [u8; 32];

/// A captured frame from the remote screen
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA pixel data
    pub image: RgbaImage,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
        }
    }

    /// Create a frame from any decoded image
    pub fn from_image(image: &DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn to_image(&self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.image.clone())
    }

    /// Content fingerprint used to tell screens apart
    pub fn fingerprint(&self) -> Fingerprint {
        let (width, height) = self.dimensions();
        let mut hasher = Sha256::new();
        hasher.update(width.to_le_bytes());
        hasher.update(height.to_le_bytes());
        hasher.update(self.image.as_raw());
        hasher.finalize().into()
    }

    /// True when every pixel has the same colour (or there are no pixels),
    /// as with a screen saver or a display that is switched off
    pub fn is_blank(&self) -> bool {
        let mut pixels = self.image.pixels();
        match pixels.next() {
            Some(first) => pixels.all(|p| p == first),
            None => true,
        }
    }
}
