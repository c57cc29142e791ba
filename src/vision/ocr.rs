//! OCR (Optical Character Recognition) module
//!
//! Text recognition is delegated to an external engine. The pipeline only
//! needs lines of words with pixel bounding boxes for a grayscale image.

use async_trait::async_trait;
use image::GrayImage;
use serde::Serialize;
use std::fmt;

use crate::error::OcrError;

/// Word bounding box `[x0, y0, x1, y1]` (top-left and bottom-right corners)
pub type WordBox = [f64; 4];

/// Single recognized word
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrWord {
    /// Recognized text
    pub text: String,
    /// Bounding box in the coordinate space of the image it was recognized in
    pub bbox: WordBox,
}

/// Words of one text line, in reading order
pub type OcrLine = Vec<OcrWord>;

impl OcrWord {
    pub fn new(text: impl Into<String>, bbox: WordBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }

    /// Scale the bounding box by `factor`
    pub fn resize(&mut self, factor: f64) {
        for v in &mut self.bbox {
            *v *= factor;
        }
    }

    /// Translate the bounding box by `(dx, dy)`
    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.bbox[0] += dx;
        self.bbox[1] += dy;
        self.bbox[2] += dx;
        self.bbox[3] += dy;
    }
}

impl fmt::Display for OcrWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}@[{}, {}, {}, {}]",
            self.text, self.bbox[0], self.bbox[1], self.bbox[2], self.bbox[3]
        )
    }
}

/// External text recognition engine
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text lines in a grayscale image.
    ///
    /// Word boxes are reported in the pixel space of `image`. Output the
    /// engine cannot make sense of should come back as an empty list.
    async fn recognize(&self, image: &GrayImage, lang: &str) -> Result<Vec<OcrLine>, OcrError>;
}
