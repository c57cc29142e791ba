//! Tesseract OCR backend
//!
//! Runs the `tesseract` command line program on a temporary PNG and reads
//! its TSV report from stdout.

use async_trait::async_trait;
use image::{GrayImage, ImageFormat};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

use super::ocr::{OcrEngine, OcrLine, OcrWord};
use crate::error::OcrError;

/// Word level in tesseract's TSV layout hierarchy
const TSV_WORD_LEVEL: i32 = 5;
const TSV_FIELDS: usize = 12;

/// OCR engine backed by the tesseract executable
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    executable: PathBuf,
}

impl TesseractEngine {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, image: &GrayImage, lang: &str) -> Result<Vec<OcrLine>, OcrError> {
        let (width, height) = image.dimensions();
        let image = image.clone();
        let input = tokio::task::spawn_blocking(move || -> Result<NamedTempFile, OcrError> {
            let input = tempfile::Builder::new()
                .prefix("screentext_")
                .suffix(".png")
                .tempfile()?;
            image.save_with_format(input.path(), ImageFormat::Png)?;
            Ok(input)
        })
        .await??;

        debug!(
            "Running {:?} on {}x{} image with language {}",
            self.executable, width, height, lang
        );
        let output = Command::new(&self.executable)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .arg("tsv")
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let lines = parse_tsv_output(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "Read {} bytes from tesseract, {} lines",
            output.stdout.len(),
            lines.len()
        );
        Ok(lines)
    }
}

/// Parse tesseract TSV output into lines of words.
///
/// Rows that cannot be parsed are skipped, so garbage input degrades to an
/// empty list rather than an error.
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_key: Option<[i32; 4]> = None;
    let mut current_words: OcrLine = Vec::new();
    let mut skipped = 0usize;

    // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
    //             left, top, width, height, conf, text
    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < TSV_FIELDS {
            skipped += 1;
            continue;
        }

        let numbers: Option<Vec<i32>> = fields[..10]
            .iter()
            .map(|f| f.trim().parse().ok())
            .collect();
        let Some(numbers) = numbers else {
            skipped += 1;
            continue;
        };
        if numbers[0] != TSV_WORD_LEVEL {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        let key = [numbers[1], numbers[2], numbers[3], numbers[4]];
        if current_key != Some(key) && !current_words.is_empty() {
            lines.push(std::mem::take(&mut current_words));
        }
        current_key = Some(key);

        let (left, top, width, height) = (numbers[6], numbers[7], numbers[8], numbers[9]);
        current_words.push(OcrWord::new(
            text,
            [
                left as f64,
                top as f64,
                (left + width) as f64,
                (top + height) as f64,
            ],
        ));
    }

    if !current_words.is_empty() {
        lines.push(current_words);
    }

    if skipped > 0 {
        warn!("Ignored {} malformed rows in tesseract output", skipped);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
2\t1\t1\t0\t0\t0\t36\t92\t200\t60\t-1\t
4\t1\t1\t1\t1\t0\t36\t92\t200\t20\t-1\t
5\t1\t1\t1\t1\t1\t36\t92\t90\t20\t96.1\tUser
5\t1\t1\t1\t1\t2\t130\t92\t60\t20\t95.3\tname
5\t1\t1\t1\t2\t1\t36\t132\t120\t20\t91.0\tPassword
5\t1\t1\t1\t2\t2\t160\t132\t10\t20\t12.0\t
5\t1\t2\t1\t1\t1\t300\t400\t80\t30\t88.8\tLOGIN
";

    #[test]
    fn test_parse_tsv_output() {
        let lines = parse_tsv_output(SAMPLE);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 2);
        assert_eq!(lines[0][0], OcrWord::new("User", [36.0, 92.0, 126.0, 112.0]));
        assert_eq!(lines[0][1].text, "name");
        assert_eq!(lines[1].len(), 1);
        assert_eq!(lines[1][0].text, "Password");
        assert_eq!(lines[2][0], OcrWord::new("LOGIN", [300.0, 400.0, 380.0, 430.0]));
    }

    #[test]
    fn test_parse_malformed_output() {
        assert!(parse_tsv_output("").is_empty());
        assert!(parse_tsv_output("<html>not tsv</html>\nstill not tsv").is_empty());
        assert!(parse_tsv_output("header\n5\t1\tx\t1\t1\t1\t1\t1\t1\t1\t90\tword").is_empty());
    }

    #[test]
    fn test_parse_skips_bad_rows_but_keeps_good_ones() {
        let tsv = "header\n5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t90\tgood\n5\t1\t1\tbad\n";
        let lines = parse_tsv_output(tsv);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0][0].text, "good");
    }

    #[tokio::test]
    async fn test_missing_executable_is_an_error() {
        let engine = TesseractEngine::new("/nonexistent/tesseract-binary");
        let image = GrayImage::new(8, 8);

        let result = engine.recognize(&image, "eng").await;
        assert!(matches!(result, Err(OcrError::Io(_))));
    }
}
