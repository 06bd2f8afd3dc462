// Canonical corner ordering
// In image coordinates X increases right and Y increases downward, so:
// top-left = min(X+Y), bottom-right = max(X+Y), top-right = min(Y-X), bottom-left = max(Y-X)

use dimscope_common::{OrderedBox, Point2D};

/// Order four points as [top-left, top-right, bottom-right, bottom-left]
///
/// Any four points are accepted. Ties go to the first point in input order,
/// and degenerate input may assign one point to two slots.
pub fn order_corners(points: &[Point2D; 4]) -> OrderedBox {
    let sum = |p: &Point2D| p.x + p.y;
    let diff = |p: &Point2D| p.y - p.x;

    OrderedBox {
        corners: [
            points[argmin(points, sum)],
            points[argmin(points, diff)],
            points[argmax(points, sum)],
            points[argmax(points, diff)],
        ],
    }
}

/// Index of the first minimum
fn argmin(points: &[Point2D; 4], key: impl Fn(&Point2D) -> f64) -> usize {
    let mut best = 0;
    for i in 1..points.len() {
        if key(&points[i]) < key(&points[best]) {
            best = i;
        }
    }
    best
}

/// Index of the first maximum
fn argmax(points: &[Point2D; 4], key: impl Fn(&Point2D) -> f64) -> usize {
    let mut best = 0;
    for i in 1..points.len() {
        if key(&points[i]) > key(&points[best]) {
            best = i;
        }
    }
    best
}
