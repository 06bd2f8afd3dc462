// Contour size calculation
// Fits a minimum-area rotated rectangle around a contour and measures its edges

use dimscope_common::{Contour, Point2D, SizeResult};

use crate::corners::order_corners;

/// Measure a contour's bounding rectangle
///
/// The rectangle's corners are rounded to the nearest pixel, not truncated,
/// before they are put in canonical order.
/// Width is the top edge and height the left edge of the ordered box. With a
/// scale factor both are divided by it, turning pixels into physical units.
/// Degenerate contours (empty, single point, collinear) give a zero-area box.
pub fn calculate_size(contour: &Contour, pixels_per_metric: Option<f64>) -> SizeResult {
    let rect = min_area_rect(&contour.points).map(|corner| corner.rounded());
    let bounding_box = order_corners(&rect);

    let mut width = bounding_box.width();
    let mut height = bounding_box.height();

    if let Some(ratio) = pixels_per_metric {
        width /= ratio;
        height /= ratio;
    }

    SizeResult {
        bounding_box,
        width,
        height,
    }
}

/// Minimum-area enclosing rectangle using rotating calipers over the convex hull
///
/// Corners come back in traversal order around the rectangle, not canonical order.
pub fn min_area_rect(points: &[Point2D]) -> [Point2D; 4] {
    let hull = convex_hull(points);

    match hull.len() {
        0 => [Point2D::default(); 4],
        1 => [hull[0]; 4],
        2 => [hull[0], hull[1], hull[1], hull[0]],
        n => {
            let mut min_area = f64::MAX;
            let mut best = [hull[0]; 4];

            for i in 0..n {
                let origin = hull[i];
                let next = hull[(i + 1) % n];
                let edge_len = origin.distance(&next);
                if edge_len < f64::EPSILON {
                    continue;
                }

                // Edge direction and its perpendicular
                let (ux, uy) = ((next.x - origin.x) / edge_len, (next.y - origin.y) / edge_len);
                let (vx, vy) = (-uy, ux);

                let mut min_u = f64::MAX;
                let mut max_u = f64::MIN;
                let mut min_v = f64::MAX;
                let mut max_v = f64::MIN;

                for p in &hull {
                    let (dx, dy) = (p.x - origin.x, p.y - origin.y);
                    let proj_u = ux * dx + uy * dy;
                    let proj_v = vx * dx + vy * dy;
                    min_u = min_u.min(proj_u);
                    max_u = max_u.max(proj_u);
                    min_v = min_v.min(proj_v);
                    max_v = max_v.max(proj_v);
                }

                let area = (max_u - min_u) * (max_v - min_v);
                if area < min_area {
                    min_area = area;
                    let corner = |u: f64, v: f64| {
                        Point2D::new(origin.x + u * ux + v * vx, origin.y + u * uy + v * vy)
                    };
                    best = [
                        corner(min_u, min_v),
                        corner(max_u, min_v),
                        corner(max_u, max_v),
                        corner(min_u, max_v),
                    ];
                }
            }

            best
        }
    }
}

/// Convex hull by Andrew's monotone chain
///
/// Duplicate and collinear points are dropped, so collinear input yields its
/// two extreme points and identical input a single point.
pub fn convex_hull(points: &[Point2D]) -> Vec<Point2D> {
    let mut sorted: Vec<Point2D> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: &Point2D, a: &Point2D, b: &Point2D| {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut lower: Vec<Point2D> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2D> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
