//! Line segmentation
//!
//! Strong edge pixels are grown into 4-connected clusters with a two level
//! threshold: a pixel above the high threshold seeds a cluster, neighbours
//! above the low threshold join it. Every cluster is collapsed into an axis
//! aligned line, or rejected when it is blob-like or too short.
//!
//! The label grid records which cluster owns each pixel. Label `i` always
//! refers to `segments[i]`, rejected clusters included, so the grid can be
//! used to look lines up by position during box reconstruction.

use ndarray::Array2;
use tracing::debug;

use super::edges::EdgeMap;
use crate::config::LocatorConfig;

const UNLABELED: i32 = -1;

/// Guards the covariance ratio against a zero y-variance
const VARIANCE_EPSILON: f64 = 1e-7;

/// Per-pixel cluster ownership, written at most once per cell
#[derive(Debug, Clone)]
pub struct LabelGrid {
    labels: Array2<i32>,
}

impl LabelGrid {
    /// Create a grid of `width` x `height` unlabeled cells
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            labels: Array2::from_elem((height, width), UNLABELED),
        }
    }

    pub fn width(&self) -> usize {
        self.labels.ncols()
    }

    pub fn height(&self) -> usize {
        self.labels.nrows()
    }

    /// Label at `(x, y)`, `None` when unlabeled or outside the grid
    pub fn get(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let label = *self.labels.get((y as usize, x as usize))?;
        (label >= 0).then_some(label as usize)
    }

    /// Number of labeled cells
    pub fn labeled_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l >= 0).count()
    }

    #[inline]
    fn is_unlabeled(&self, x: usize, y: usize) -> bool {
        self.labels[[y, x]] == UNLABELED
    }

    #[inline]
    fn assign(&mut self, x: usize, y: usize, label: usize) {
        debug_assert!(self.is_unlabeled(x, y));
        self.labels[[y, x]] = label as i32;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Axis aligned line fitted to a pixel cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub orientation: Orientation,
}

impl LineSegment {
    /// Left end of a horizontal line, top end of a vertical one
    pub fn start(&self) -> (f64, f64) {
        (self.x1, self.y1)
    }

    /// Right end of a horizontal line, bottom end of a vertical one
    pub fn end(&self) -> (f64, f64) {
        (self.x2, self.y2)
    }

    pub fn length(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.x2 - self.x1,
            Orientation::Vertical => self.y2 - self.y1,
        }
    }

    /// Squared distance from `(x, y)` to the nearer endpoint
    pub fn endpoint_distance_sq(&self, x: f64, y: f64) -> f64 {
        let d1 = (self.x1 - x).powi(2) + (self.y1 - y).powi(2);
        let d2 = (self.x2 - x).powi(2) + (self.y2 - y).powi(2);
        d1.min(d2)
    }
}

/// Why a cluster did not become a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Variances along both axes are too similar
    BlobLike { ratio: f64 },
    /// Extent along the dominant axis is below `line_min_length`
    TooShort { length: f64 },
}

/// Outcome for one cluster; `segments[label]` belongs to cluster `label`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line(LineSegment),
    Rejected(Rejection),
}

impl Segment {
    pub fn line(&self) -> Option<&LineSegment> {
        match self {
            Segment::Line(line) => Some(line),
            Segment::Rejected(_) => None,
        }
    }

    /// Coordinates `(x1, y1, x2, y2)`; the zero box for rejected clusters
    pub fn coords(&self) -> (f64, f64, f64, f64) {
        match self {
            Segment::Line(l) => (l.x1, l.y1, l.x2, l.y2),
            Segment::Rejected(_) => (0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// Segments of one edge map together with their label grid
#[derive(Debug, Clone)]
pub struct LineSet {
    pub segments: Vec<Segment>,
    pub labels: LabelGrid,
}

impl LineSet {
    /// Accepted line for `label`, if any
    pub fn line(&self, label: usize) -> Option<&LineSegment> {
        self.segments.get(label).and_then(Segment::line)
    }

    /// Accepted lines with their labels, in discovery order
    pub fn lines(&self) -> impl Iterator<Item = (usize, &LineSegment)> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(label, segment)| segment.line().map(|line| (label, line)))
    }
}

/// Segment all lines of an edge map
pub fn find_lines(edges: &EdgeMap, config: &LocatorConfig) -> LineSet {
    let (height, width) = edges.dim();
    let high = config.line_segment_high_threshold;
    let low = config.line_segment_low_threshold;

    let mut labels = LabelGrid::new(width, height);
    let mut segments = Vec::new();
    let mut stack = Vec::new();
    let mut pixels = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if edges[[y, x]] <= high || !labels.is_unlabeled(x, y) {
                continue;
            }

            let label = segments.len();
            grow_cluster(x, y, label, edges, low, &mut labels, &mut stack, &mut pixels);

            let segment = fit_line(&pixels, config);
            if let Segment::Rejected(reason) = &segment {
                debug!("Ignoring line segment {} seeded at ({}, {}): {:?}", label, x, y, reason);
            }
            segments.push(segment);
        }
    }

    debug!(
        "{} line segments found, {} accepted",
        segments.len(),
        segments.iter().filter(|s| s.line().is_some()).count()
    );

    LineSet { segments, labels }
}

/// Flood fill from a seed, labeling every reachable pixel above `low`.
/// The label write doubles as the visited mark.
#[allow(clippy::too_many_arguments)]
fn grow_cluster(
    seed_x: usize,
    seed_y: usize,
    label: usize,
    edges: &EdgeMap,
    low: f32,
    labels: &mut LabelGrid,
    stack: &mut Vec<(usize, usize)>,
    pixels: &mut Vec<(usize, usize)>,
) {
    let (height, width) = edges.dim();
    stack.clear();
    pixels.clear();

    labels.assign(seed_x, seed_y, label);
    pixels.push((seed_x, seed_y));
    stack.push((seed_x, seed_y));

    while let Some((x, y)) = stack.pop() {
        let mut visit = |nx: usize, ny: usize| {
            if labels.is_unlabeled(nx, ny) && edges[[ny, nx]] > low {
                labels.assign(nx, ny, label);
                pixels.push((nx, ny));
                stack.push((nx, ny));
            }
        };

        if x > 0 {
            visit(x - 1, y);
        }
        if x + 1 < width {
            visit(x + 1, y);
        }
        if y > 0 {
            visit(x, y - 1);
        }
        if y + 1 < height {
            visit(x, y + 1);
        }
    }
}

/// Collapse a pixel cluster into a line
pub fn fit_line(pixels: &[(usize, usize)], config: &LocatorConfig) -> Segment {
    if pixels.is_empty() {
        return Segment::Rejected(Rejection::TooShort { length: 0.0 });
    }

    let n = pixels.len() as f64;
    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
    let (mut max_x, mut max_y) = (0, 0);
    for &(x, y) in pixels {
        sum_x += x as f64;
        sum_y += y as f64;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;

    let (mut var_x, mut var_y) = (0.0, 0.0);
    for &(x, y) in pixels {
        var_x += (x as f64 - mean_x).powi(2);
        var_y += (y as f64 - mean_y).powi(2);
    }
    var_x /= n;
    var_y /= n;

    let ratio = var_x / (var_y + VARIANCE_EPSILON);
    let min_covariance = config.line_segment_min_covariance;
    if 1.0 / min_covariance < ratio && ratio < min_covariance {
        return Segment::Rejected(Rejection::BlobLike { ratio });
    }

    let line = if var_x > var_y {
        LineSegment {
            x1: min_x as f64,
            y1: mean_y,
            x2: max_x as f64,
            y2: mean_y,
            orientation: Orientation::Horizontal,
        }
    } else {
        LineSegment {
            x1: mean_x,
            y1: min_y as f64,
            x2: mean_x,
            y2: max_y as f64,
            orientation: Orientation::Vertical,
        }
    };

    let length = line.length();
    if length < config.line_min_length as f64 {
        return Segment::Rejected(Rejection::TooShort { length });
    }

    Segment::Line(line)
}
