//! Edge detection
//!
//! Separable directional gradients: a central difference along one axis and
//! a 7-tap box filter along the other. The positive and negative halves of
//! the gradient are pulled one pixel towards each other so a thin stroke
//! yields a single centred ridge instead of two flanking edges.

use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis};

use super::raster::Raster;

/// Gradient magnitude per pixel, same shape as the source raster
pub type EdgeMap = Array2<f32>;

pub const GRADIENT_KERNEL: [f32; 5] = [0.0, 1.0, 0.0, -1.0, 0.0];
pub const SMOOTHING_KERNEL: [f32; 7] = [1.0; 7];

/// Edge maps for both axes
#[derive(Debug, Clone)]
pub struct EdgeMaps {
    /// Gradients along y; ridges follow horizontal strokes
    pub horizontal: EdgeMap,
    /// Gradients along x; ridges follow vertical strokes
    pub vertical: EdgeMap,
}

/// Compute horizontal and vertical edge maps of a raster
pub fn detect_edges(raster: &Raster) -> EdgeMaps {
    let norm: f32 = SMOOTHING_KERNEL.iter().sum();

    let dx = separable_filter(raster, &GRADIENT_KERNEL, &SMOOTHING_KERNEL) / norm;
    let vertical = center_edges(&dx, Axis(1));

    let dy = separable_filter(raster, &SMOOTHING_KERNEL, &GRADIENT_KERNEL) / norm;
    let horizontal = center_edges(&dy, Axis(0));

    EdgeMaps {
        horizontal,
        vertical,
    }
}

/// Filter every row with `row_kernel`, then every column with `col_kernel`
pub fn separable_filter(src: &Array2<f32>, row_kernel: &[f32], col_kernel: &[f32]) -> Array2<f32> {
    let rows = filter_lanes(src, Axis(1), row_kernel);
    filter_lanes(&rows, Axis(0), col_kernel)
}

fn filter_lanes(src: &Array2<f32>, axis: Axis, kernel: &[f32]) -> Array2<f32> {
    let mut out = Array2::zeros(src.raw_dim());
    for (lane, out_lane) in src.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        convolve_reflect101(lane, kernel, out_lane);
    }
    out
}

/// 1-D convolution with mirrored borders (`dcb|abcd|cba`)
fn convolve_reflect101(signal: ArrayView1<f32>, kernel: &[f32], mut out: ArrayViewMut1<f32>) {
    let n = signal.len();
    if n == 0 {
        return;
    }

    let radius = (kernel.len() / 2) as isize;
    for i in 0..n {
        let mut acc = 0.0f32;
        for (k, &kv) in kernel.iter().enumerate() {
            if kv == 0.0 {
                continue;
            }
            let idx = reflect101(i as isize + radius - k as isize, n);
            acc += signal[idx] * kv;
        }
        out[i] = acc;
    }
}

fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let i = i.rem_euclid(period);
    if i >= n as isize {
        (period - i) as usize
    } else {
        i as usize
    }
}

/// Shift the positive gradient back and the negative gradient forward by one
/// pixel along `axis` and average them. Pixels shifted in from outside are 0.
fn center_edges(gradient: &Array2<f32>, axis: Axis) -> EdgeMap {
    let mut out = Array2::zeros(gradient.raw_dim());
    for (g, mut o) in gradient.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = g.len();
        for i in 0..n {
            let rising = if i + 1 < n { g[i + 1].max(0.0) } else { 0.0 };
            let falling = if i > 0 { g[i - 1].min(0.0) } else { 0.0 };
            o[i] = (rising - falling) / 2.0;
        }
    }
    out
}
