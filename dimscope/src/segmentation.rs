// Edge-based contour extraction
// Grayscale -> Gaussian blur -> Canny -> outer border following

use dimscope_common::{Contour, Point2D};
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::EdgeConfig;

/// Produces the contours of one frame, in a stable order
///
/// The measurement pipeline treats index 0 as the reference object.
pub trait ContourExtractor {
    fn extract(&mut self, frame: &RgbImage) -> Vec<Contour>;
}

/// Default extractor: Canny edges and their outermost borders
pub struct EdgeContours {
    config: EdgeConfig,
    debug_path: Option<PathBuf>,
}

impl EdgeContours {
    pub fn new(config: EdgeConfig) -> Self {
        Self {
            config,
            debug_path: None,
        }
    }

    /// Save each frame's edge map to this path
    pub fn with_debug_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }
}

impl ContourExtractor for EdgeContours {
    fn extract(&mut self, frame: &RgbImage) -> Vec<Contour> {
        let edges = detect_edges(frame, &self.config);

        if let Some(path) = &self.debug_path {
            match edges.save(path) {
                Ok(()) => debug!("Saved edge map to: {}", path.display()),
                Err(e) => warn!("Failed to save edge map to {}: {}", path.display(), e),
            }
        }

        let contours = external_contours(&edges);
        debug!(
            "Found {} outer contour(s) in {}x{} frame",
            contours.len(),
            frame.width(),
            frame.height()
        );
        contours
    }
}

/// Binary edge map of a color frame (255 = edge)
pub fn detect_edges(frame: &RgbImage, config: &EdgeConfig) -> GrayImage {
    let gray = image::imageops::grayscale(frame);
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    canny(&blurred, config.canny_low, config.canny_high)
}

/// Outermost borders of a binary image, with straight runs compressed to their endpoints
///
/// Hole borders and borders nested inside another shape are skipped.
pub fn external_contours(binary: &GrayImage) -> Vec<Contour> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| compress_straight_runs(&c.points))
        .collect()
}

/// Keep only points where the chain changes direction
///
/// Horizontal, vertical and diagonal runs collapse to their endpoints. The
/// contour is treated as closed.
fn compress_straight_runs(points: &[Point<i32>]) -> Contour {
    let n = points.len();
    if n < 3 {
        return Contour::from_pixels(points.iter().map(|p| (p.x, p.y)));
    }

    let step = |a: &Point<i32>, b: &Point<i32>| ((b.x - a.x).signum(), (b.y - a.y).signum());

    let kept: Vec<Point2D> = (0..n)
        .filter(|&i| {
            let prev = &points[(i + n - 1) % n];
            let next = &points[(i + 1) % n];
            step(prev, &points[i]) != step(&points[i], next)
        })
        .map(|i| Point2D::new(f64::from(points[i].x), f64::from(points[i].y)))
        .collect();

    if kept.is_empty() {
        Contour::from_pixels(points.iter().map(|p| (p.x, p.y)))
    } else {
        Contour::new(kept)
    }
}
