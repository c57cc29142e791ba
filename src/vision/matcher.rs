//! Fuzzy word sequence matching
//!
//! A target phrase is compared against every run of consecutive words on
//! every recognized line. Each position is scored with the normalized
//! Levenshtein similarity, the mean is taken over the whole phrase and a
//! small bonus rewards lines the phrase covers completely.

use serde::Serialize;
use strsim::normalized_levenshtein;
use tracing::debug;

use super::ocr::{OcrLine, OcrWord};

/// Best scoring word sequence
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub score: f64,
    pub words: Vec<OcrWord>,
}

/// Pixel to click on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
}

/// Split a phrase into lowercase words
pub fn split_pattern(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Find the word sequence that matches `pattern` best across all regions.
///
/// Only a score strictly above `min_score` is reported. On equal scores the
/// sequence found first wins.
pub fn find_best_match(
    regions: &[Vec<OcrLine>],
    pattern: &[String],
    min_score: f64,
) -> Option<TextMatch> {
    if pattern.is_empty() {
        return None;
    }

    let mut best: Option<TextMatch> = None;
    let mut best_score = min_score;

    for line in regions.iter().flatten() {
        for start in 0..line.len() {
            let score = score_window(line, start, pattern);
            debug!(
                "  Matched words starting at {}: score {:.4}",
                line[start], score
            );

            if score > best_score {
                let end = (start + pattern.len()).min(line.len());
                debug!("  Found new best match");
                best_score = score;
                best = Some(TextMatch {
                    score,
                    words: line[start..end].to_vec(),
                });
            }
        }
    }

    match &best {
        Some(m) => debug!(
            "Matched words: {} (score={:.4})",
            m.words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" "),
            m.score
        ),
        None => debug!("No matches found for {}", pattern.join(" ")),
    }
    best
}

/// Score of the window of `line` starting at `start`. Pattern words past
/// the end of the line score zero.
fn score_window(line: &[OcrWord], start: usize, pattern: &[String]) -> f64 {
    let total: f64 = pattern
        .iter()
        .zip(&line[start..])
        .map(|(target, word)| normalized_levenshtein(&word.text.to_lowercase(), target))
        .sum();

    let score = total / pattern.len() as f64;
    let coverage = pattern.len() as f64 / line.len() as f64;
    score * (0.9 + 0.1 * coverage)
}

/// Mean of all box corners of the matched words, truncated to whole pixels
pub fn click_point(words: &[OcrWord]) -> Option<ClickPoint> {
    if words.is_empty() {
        return None;
    }

    let n = (2 * words.len()) as f64;
    let sum_x: f64 = words.iter().map(|w| w.bbox[0] + w.bbox[2]).sum();
    let sum_y: f64 = words.iter().map(|w| w.bbox[1] + w.bbox[3]).sum();

    Some(ClickPoint {
        x: (sum_x / n) as i32,
        y: (sum_y / n) as i32,
    })
}
