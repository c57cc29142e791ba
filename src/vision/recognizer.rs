//! Region recognition
//!
//! Crops every candidate region out of the screen, scales it for the OCR
//! engine and maps the recognized word boxes back into screen coordinates.

use futures_util::stream::{self, StreamExt};
use image::imageops::{self, FilterType};
use image::GrayImage;
use std::sync::Arc;
use tracing::{debug, warn};

use super::boxes::Rectangle;
use super::ocr::{OcrEngine, OcrLine};
use crate::config::LocatorConfig;

/// Integer pixel rectangle inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Part of the screen handed to the OCR engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The whole image
    Full,
    /// A rectangle clipped to the image
    Area(PixelRect),
}

impl Region {
    /// Round `rect` to pixels and clip it to a `width` x `height` image.
    /// Returns `None` when nothing of it is left.
    pub fn from_rectangle(rect: &Rectangle, width: u32, height: u32) -> Option<Self> {
        let clip = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
        let left = clip(rect.left, width);
        let top = clip(rect.top, height);
        let right = clip(rect.right, width);
        let bottom = clip(rect.bottom, height);

        if right <= left || bottom <= top {
            return None;
        }
        Some(Region::Area(PixelRect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }))
    }

    /// Top-left corner in image coordinates
    pub fn origin(&self) -> (f64, f64) {
        match self {
            Region::Full => (0.0, 0.0),
            Region::Area(r) => (r.x as f64, r.y as f64),
        }
    }
}

/// The full image followed by one region per rectangle
pub fn regions_for(rects: &[Rectangle], width: u32, height: u32) -> Vec<Region> {
    std::iter::once(Region::Full)
        .chain(rects.iter().filter_map(|r| Region::from_rectangle(r, width, height)))
        .collect()
}

/// Scale an image by `factor` with bicubic interpolation
pub fn scale_image(image: &GrayImage, factor: f64) -> GrayImage {
    let width = ((image.width() as f64 * factor).round() as u32).max(1);
    let height = ((image.height() as f64 * factor).round() as u32).max(1);
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::CatmullRom)
}

/// Crop `region` out of `image` and scale it for the OCR engine
pub fn region_image(image: &GrayImage, region: &Region, factor: f64) -> GrayImage {
    match region {
        Region::Full => scale_image(image, factor),
        Region::Area(r) => {
            let crop = imageops::crop_imm(image, r.x, r.y, r.width, r.height).to_image();
            scale_image(&crop, factor)
        }
    }
}

/// Run OCR on every region, at most `ocr_concurrency` calls at a time.
///
/// The result holds one entry per region, in region order. Regions whose
/// OCR call failed contribute an empty entry. Cropping and scaling run on
/// the blocking pool.
pub async fn recognize_regions<E>(
    engine: &E,
    image: &Arc<GrayImage>,
    regions: &[Region],
    config: &LocatorConfig,
) -> Vec<Vec<OcrLine>>
where
    E: OcrEngine + ?Sized,
{
    debug!("Running OCR on {} regions", regions.len());
    stream::iter(regions)
        .map(|region| recognize_region(engine, image, region, config))
        .buffered(config.ocr_concurrency.max(1))
        .collect()
        .await
}

async fn recognize_region<E>(
    engine: &E,
    image: &Arc<GrayImage>,
    region: &Region,
    config: &LocatorConfig,
) -> Vec<OcrLine>
where
    E: OcrEngine + ?Sized,
{
    let source = Arc::clone(image);
    let target = *region;
    let factor = config.img_resize;
    let prepared =
        tokio::task::spawn_blocking(move || region_image(&source, &target, factor)).await;
    let scaled = match prepared {
        Ok(scaled) => scaled,
        Err(e) => {
            warn!("Preparing region {:?} for OCR failed: {}", region, e);
            return Vec::new();
        }
    };

    let mut lines = match engine.recognize(&scaled, &config.lang).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!("OCR failed for region {:?}: {}", region, e);
            return Vec::new();
        }
    };

    let (dx, dy) = region.origin();
    for word in lines.iter_mut().flatten() {
        word.resize(1.0 / config.img_resize);
        word.offset(dx, dy);
    }

    debug!(
        "Region {:?}: {}",
        region,
        lines
            .iter()
            .flatten()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );
    lines
}
