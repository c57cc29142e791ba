//! Diagnostic image dumps
//!
//! Every writer here only logs on failure; dumps never change the outcome
//! of a search.

use image::{DynamicImage, ImageResult, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::boxes::Rectangle;
use super::edges::EdgeMap;
use super::lines::LineSet;
use super::raster::gray_from_raster;

const HORIZONTAL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const VERTICAL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Save an edge map as an 8-bit image
pub fn dump_edges(edges: &EdgeMap, path: &Path) {
    report(gray_from_raster(edges).save(path), path, "edge map");
}

/// Save the screen as captured
pub fn dump_screen(screen: &DynamicImage, path: &Path) {
    report(screen.save(path), path, "screen");
}

/// Save the screen as captured into `dir` under a timestamped name
pub fn dump_screen_to_dir(screen: &DynamicImage, dir: &Path) {
    let path = timestamped_path(dir);
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!("Failed to create dump directory {:?}: {}", dir, e);
        return;
    }
    dump_screen(screen, &path);
}

/// Draw detected lines and boxes on a white canvas and save it
pub fn dump_boxes(
    width: u32,
    height: u32,
    horizontal: &LineSet,
    vertical: &LineSet,
    boxes: &[Rectangle],
    path: &Path,
) {
    let canvas = render_boxes(width, height, horizontal, vertical, boxes);
    report(canvas.save(path), path, "lines and boxes");
}

/// Overlay image of lines (horizontal green, vertical red) and boxes (blue)
pub fn render_boxes(
    width: u32,
    height: u32,
    horizontal: &LineSet,
    vertical: &LineSet,
    boxes: &[Rectangle],
) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (lines, color) in [(horizontal, HORIZONTAL_COLOR), (vertical, VERTICAL_COLOR)] {
        for (_, line) in lines.lines() {
            draw_line_segment_mut(
                &mut canvas,
                (line.x1 as f32, line.y1 as f32),
                (line.x2 as f32, line.y2 as f32),
                color,
            );
        }
    }

    for b in boxes {
        let w = b.width().round() as u32;
        let h = b.height().round() as u32;
        if w == 0 || h == 0 {
            continue;
        }
        let rect = Rect::at(b.left.round() as i32, b.top.round() as i32).of_size(w, h);
        draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
    }

    canvas
}

fn report(result: ImageResult<()>, path: &Path, what: &str) {
    match result {
        Ok(()) => debug!("Dumped {} to {:?}", what, path),
        Err(e) => warn!("Failed to dump {} to {:?}: {}", what, path, e),
    }
}

fn timestamped_path(dir: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    dir.join(format!("screentext_{}.png", millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocatorConfig;
    use crate::vision::lines::find_lines;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn line_sets() -> (LineSet, LineSet) {
        let mut h = Array2::zeros((40, 60));
        for x in 5..55 {
            h[[10, x]] = 100.0;
        }
        let mut v = Array2::zeros((40, 60));
        for y in 5..35 {
            v[[y, 30]] = 100.0;
        }
        let config = LocatorConfig::default();
        (find_lines(&h, &config), find_lines(&v, &config))
    }

    #[test]
    fn test_render_boxes_colors() {
        let (horizontal, vertical) = line_sets();
        let boxes = [Rectangle {
            left: 2.0,
            top: 20.0,
            right: 20.0,
            bottom: 30.0,
        }];

        let canvas = render_boxes(60, 40, &horizontal, &vertical, &boxes);

        assert_eq!(canvas.dimensions(), (60, 40));
        assert_eq!(*canvas.get_pixel(20, 10), HORIZONTAL_COLOR);
        assert_eq!(*canvas.get_pixel(30, 20), VERTICAL_COLOR);
        assert_eq!(*canvas.get_pixel(2, 25), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(50, 38), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_dump_files_are_written() {
        let dir = TempDir::new().unwrap();
        let (horizontal, vertical) = line_sets();

        let edges_path = dir.path().join("x.png");
        dump_edges(&Array2::from_elem((4, 5), 300.0), &edges_path);
        let boxes_path = dir.path().join("boxes.png");
        dump_boxes(60, 40, &horizontal, &vertical, &[], &boxes_path);

        let edges = image::open(&edges_path).unwrap().to_luma8();
        assert_eq!(edges.dimensions(), (5, 4));
        assert_eq!(edges.get_pixel(0, 0).0[0], 255);
        assert!(boxes_path.exists());
    }

    #[test]
    fn test_dump_to_dir_creates_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("screens");

        dump_screen_to_dir(&DynamicImage::new_rgba8(3, 3), &target);

        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_dump_does_not_panic() {
        dump_screen(&DynamicImage::new_rgba8(3, 3), Path::new("/nonexistent/dir/screen.png"));
    }
}
