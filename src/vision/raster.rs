//! Grayscale rasters
//!
//! Screens arrive as colour images; the pipeline works on a single-channel
//! floating point grid indexed `[y, x]`.

use image::{DynamicImage, GrayImage};
use ndarray::Array2;
use tracing::debug;

/// Single-channel intensity grid, indexed `[y, x]`
pub type Raster = Array2<f32>;

/// Convert a captured screen to 8-bit luma, inverting predominantly dark screens
pub fn prepare_screen(image: &DynamicImage, invert_dark: bool) -> GrayImage {
    let mut gray = image.to_luma8();

    if invert_dark && mean_intensity(&gray) < 0.5 {
        debug!("Screen is predominantly dark, inverting");
        image::imageops::invert(&mut gray);
    }

    gray
}

/// Mean intensity scaled to 0.0 - 1.0
pub fn mean_intensity(gray: &GrayImage) -> f64 {
    let pixels = gray.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }

    let sum: u64 = pixels.iter().map(|&p| p as u64).sum();
    sum as f64 / pixels.len() as f64 / 255.0
}

/// Build the floating point raster from a luma image
pub fn raster_from_gray(gray: &GrayImage) -> Raster {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        gray.get_pixel(x as u32, y as u32).0[0] as f32
    })
}

/// Round a raster back into an 8-bit image (values saturate at 0 and 255)
pub fn gray_from_raster(raster: &Raster) -> GrayImage {
    let (height, width) = raster.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        image::Luma([raster[[y as usize, x as usize]].round() as u8])
    })
}
