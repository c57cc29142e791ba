//! Box reconstruction
//!
//! Rectangles are assembled from the detected lines by walking around their
//! corners: from the left end of a horizontal line (top) down a vertical line
//! (left) to another horizontal line (bottom), and from the right end of the
//! top line to a second vertical line (right). Corners are matched through
//! the label grids, so only lines whose pixels come close to a corner are
//! ever considered.

use std::collections::BTreeSet;
use tracing::debug;

use super::lines::{LabelGrid, LineSegment, LineSet};
use crate::config::LocatorConfig;

/// Largest ring scanned around a corner
const SEARCH_RADIUS: i64 = 4;

/// Axis aligned rectangle in image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rectangle {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Reconstruct rectangles from horizontal and vertical lines
pub fn detect_boxes(
    horizontal: &LineSet,
    vertical: &LineSet,
    config: &LocatorConfig,
) -> Vec<Rectangle> {
    debug!("Detecting boxes in image given the detected lines");
    let max_distance = config.box_corner_points_max_distance;

    let mut boxes = Vec::new();
    for (itop, top) in horizontal.lines() {
        let (x, y) = top.start();
        let Some((ileft, left)) = match_line_in_neighborhood(x, y, None, vertical, max_distance)
        else {
            continue;
        };

        let (x, y) = left.end();
        let Some((_, bottom)) =
            match_line_in_neighborhood(x, y, Some(itop), horizontal, max_distance)
        else {
            continue;
        };

        let (x, y) = top.end();
        let Some((_, right)) =
            match_line_in_neighborhood(x, y, Some(ileft), vertical, max_distance)
        else {
            continue;
        };

        let rect = Rectangle {
            left: left.x1,
            top: top.y1,
            right: right.x2,
            bottom: bottom.y2,
        };
        debug!("  Detected new box {:?}", rect);
        boxes.push(rect);
    }

    debug!("Detected {} box candidates", boxes.len());
    let boxes = prune_boxes(boxes, config);
    debug!("Detected {} final boxes", boxes.len());
    boxes
}

/// Keep boxes that are wide enough and neither too low nor too high
pub fn prune_boxes(boxes: Vec<Rectangle>, config: &LocatorConfig) -> Vec<Rectangle> {
    let before = boxes.len();
    let kept: Vec<_> = boxes
        .into_iter()
        .filter(|b| {
            b.width() > config.box_min_width as f64
                && b.height() > config.box_min_height as f64
                && b.height() < config.box_max_height as f64
        })
        .collect();
    debug!("Pruning {} boxes with unsuitable size", before - kept.len());
    kept
}

/// Find the line of `lines` with an endpoint closest to `(x, y)` among those
/// whose pixels lie in the neighborhood of the rounded position
fn match_line_in_neighborhood<'a>(
    x: f64,
    y: f64,
    exclude: Option<usize>,
    lines: &'a LineSet,
    max_distance: f64,
) -> Option<(usize, &'a LineSegment)> {
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let candidates = neighborhood_labels(&lines.labels, cx, cy, exclude);

    let mut best: Option<(usize, &LineSegment)> = None;
    let mut best_distance = max_distance * max_distance;
    for label in candidates {
        let Some(line) = lines.line(label) else {
            continue;
        };
        let distance = line.endpoint_distance_sq(x, y);
        if distance < best_distance {
            best = Some((label, line));
            best_distance = distance;
        }
    }

    if let Some((label, _)) = best {
        debug!("Best match: line {}, squared distance: {}", label, best_distance);
    }
    best
}

/// Labels found on the square rings of radius 1..=4 around `(cx, cy)`.
///
/// ```text
/// .........  .1--->27.
/// ...127...  .5     |.
/// ...508...  .|  0  |.
/// ...634...  .V     8.
/// .........  .63--->4.
/// ```
fn neighborhood_labels(
    grid: &LabelGrid,
    cx: i64,
    cy: i64,
    exclude: Option<usize>,
) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    let mut test = |x: i64, y: i64| {
        if let Some(label) = grid.get(x, y) {
            if Some(label) != exclude {
                found.insert(label);
            }
        }
    };

    for dist in 1..=SEARCH_RADIUS {
        for x in (cx - dist)..(cx + dist) {
            test(x, cy - dist);
            test(x + 1, cy + dist);
        }
        for y in (cy - dist)..(cy + dist) {
            test(cx - dist, y + 1);
            test(cx + dist, y);
        }
    }
    found
}
