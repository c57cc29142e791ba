//! Vision Layer
//!
//! Finds a phrase on a screen image without any knowledge of the UI behind
//! it. Text fields and buttons are recognized by their outlines:
//!
//! - `edges`: horizontal and vertical gradient maps
//! - `lines`: gradient ridges grouped into axis aligned lines
//! - `boxes`: rectangles assembled from line corners
//! - `recognizer`: OCR of the full screen and of every rectangle
//! - `matcher`: fuzzy matching of the phrase against the recognized words

pub mod boxes;
pub mod dump;
pub mod edges;
pub mod lines;
pub mod matcher;
pub mod ocr;
pub mod raster;
pub mod recognizer;
pub mod tesseract;

use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{DumpConfig, LocatorConfig};
use crate::error::LocateError;

pub use boxes::Rectangle;
pub use matcher::{ClickPoint, TextMatch};
pub use ocr::{OcrEngine, OcrLine, OcrWord};
pub use recognizer::Region;
pub use tesseract::TesseractEngine;

/// A phrase found on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located {
    /// Where to click
    pub point: ClickPoint,
    /// Fuzzy match score
    pub score: f64,
    /// The matched words in screen coordinates
    pub words: Vec<OcrWord>,
}

/// Screen prepared for OCR together with the rectangles found on it
#[derive(Debug, Clone)]
pub struct ScreenLayout {
    pub screen: Arc<GrayImage>,
    pub boxes: Vec<Rectangle>,
}

/// Detect the rectangles on a screen.
///
/// CPU bound; the async entry points run it on the blocking pool.
pub fn analyse_screen(
    image: &DynamicImage,
    config: &LocatorConfig,
    dump: &DumpConfig,
) -> ScreenLayout {
    let start = Instant::now();
    if let Some(dir) = &dump.dir {
        dump::dump_screen_to_dir(image, dir);
    }
    if let Some(path) = &dump.screen {
        dump::dump_screen(image, path);
    }

    let screen = raster::prepare_screen(image, config.invert_dark_screens);

    let raster = raster::raster_from_gray(&screen);
    debug!("Detecting edges in image");
    let edges = edges::detect_edges(&raster);
    if let Some(path) = &dump.x_gradients {
        dump::dump_edges(&edges.vertical, path);
    }
    if let Some(path) = &dump.y_gradients {
        dump::dump_edges(&edges.horizontal, path);
    }

    debug!("Detecting vertical lines");
    let vertical = lines::find_lines(&edges.vertical, config);
    debug!("Detecting horizontal lines");
    let horizontal = lines::find_lines(&edges.horizontal, config);

    let boxes = boxes::detect_boxes(&horizontal, &vertical, config);
    if let Some(path) = &dump.boxes {
        let (width, height) = screen.dimensions();
        dump::dump_boxes(width, height, &horizontal, &vertical, &boxes, path);
    }

    debug!(
        "Analysed {}x{} screen in {:?}: {} boxes",
        screen.width(),
        screen.height(),
        start.elapsed(),
        boxes.len()
    );
    ScreenLayout {
        screen: Arc::new(screen),
        boxes,
    }
}

/// Text localization pipeline bound to an OCR engine
pub struct TextLocator<E: OcrEngine> {
    config: Arc<LocatorConfig>,
    dump: Arc<DumpConfig>,
    engine: Arc<E>,
}

impl<E: OcrEngine> Clone for TextLocator<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            dump: Arc::clone(&self.dump),
            engine: Arc::clone(&self.engine),
        }
    }
}

impl TextLocator<TesseractEngine> {
    /// Locator using the tesseract executable from the configuration
    pub fn tesseract(config: LocatorConfig, dump: DumpConfig) -> Self {
        let engine = TesseractEngine::new(config.tesseract_path.clone());
        Self::new(config, dump, engine)
    }
}

impl<E: OcrEngine> TextLocator<E> {
    pub fn new(config: LocatorConfig, dump: DumpConfig, engine: E) -> Self {
        Self {
            config: Arc::new(config),
            dump: Arc::new(dump),
            engine: Arc::new(engine),
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Detect rectangles off the async runtime
    pub async fn layout(&self, image: &DynamicImage) -> Result<ScreenLayout, LocateError> {
        let image = image.clone();
        let config = Arc::clone(&self.config);
        let dump = Arc::clone(&self.dump);

        let layout =
            tokio::task::spawn_blocking(move || analyse_screen(&image, &config, &dump)).await?;
        Ok(layout)
    }

    /// Recognized lines for the full screen followed by every rectangle
    pub async fn recognize(&self, layout: &ScreenLayout) -> Vec<Vec<OcrLine>> {
        let (width, height) = layout.screen.dimensions();
        let regions = recognizer::regions_for(&layout.boxes, width, height);
        recognizer::recognize_regions(self.engine.as_ref(), &layout.screen, &regions, &self.config)
            .await
    }

    /// Find `text` on `image`.
    ///
    /// `Ok(None)` means the screen was analysed but nothing scored above
    /// `min_str_match_score`.
    pub async fn find_text(
        &self,
        image: &DynamicImage,
        text: &str,
    ) -> Result<Option<Located>, LocateError> {
        let pattern = matcher::split_pattern(text);
        if pattern.is_empty() {
            debug!("Empty search text, nothing to match");
            return Ok(None);
        }

        let start = Instant::now();
        let layout = self.layout(image).await?;
        let regions = self.recognize(&layout).await;
        let best = matcher::find_best_match(&regions, &pattern, self.config.min_str_match_score);

        let located = best.and_then(|m| {
            let point = matcher::click_point(&m.words)?;
            Some(Located {
                point,
                score: m.score,
                words: m.words,
            })
        });

        match &located {
            Some(l) => info!(
                "Final click point for {:?}: ({}, {}) score {:.3} in {:?}",
                text,
                l.point.x,
                l.point.y,
                l.score,
                start.elapsed()
            ),
            None => debug!("No match for {:?} in {:?}", text, start.elapsed()),
        }
        Ok(located)
    }
}
