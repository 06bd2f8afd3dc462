use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D point in image coordinates (x grows right, y grows down)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Snap to the nearest integer pixel
    pub fn rounded(&self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }

    /// Divide both coordinates by a scale factor
    pub fn scaled_down(&self, factor: f64) -> Self {
        Self::new(self.x / factor, self.y / factor)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Closed polygon approximating a detected edge boundary, in pixels
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<Point2D>,
}

impl Contour {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    /// Build a contour from integer pixel coordinates
    pub fn from_pixels<I>(pixels: I) -> Self
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        pixels
            .into_iter()
            .map(|(x, y)| Point2D::new(f64::from(x), f64::from(y)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<Point2D> for Contour {
    fn from_iter<T: IntoIterator<Item = Point2D>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Four corners in canonical order: [top-left, top-right, bottom-right, bottom-left]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderedBox {
    pub corners: [Point2D; 4],
}

impl OrderedBox {
    pub const TOP_LEFT: usize = 0;
    pub const TOP_RIGHT: usize = 1;
    pub const BOTTOM_RIGHT: usize = 2;
    pub const BOTTOM_LEFT: usize = 3;

    pub fn top_left(&self) -> Point2D {
        self.corners[Self::TOP_LEFT]
    }

    pub fn top_right(&self) -> Point2D {
        self.corners[Self::TOP_RIGHT]
    }

    pub fn bottom_right(&self) -> Point2D {
        self.corners[Self::BOTTOM_RIGHT]
    }

    pub fn bottom_left(&self) -> Point2D {
        self.corners[Self::BOTTOM_LEFT]
    }

    /// Length of the top edge in the box's own units
    pub fn width(&self) -> f64 {
        self.top_right().distance(&self.top_left())
    }

    /// Length of the left edge in the box's own units
    pub fn height(&self) -> f64 {
        self.bottom_left().distance(&self.top_left())
    }

    /// Same box with every corner divided by a scale factor
    pub fn scaled_down(&self, factor: f64) -> Self {
        Self {
            corners: self.corners.map(|c| c.scaled_down(factor)),
        }
    }
}

/// Measured size of one contour
///
/// `bounding_box` is always in pixel coordinates; `width` and `height` are in
/// pixels when no scale factor was applied and in physical units otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeResult {
    pub bounding_box: OrderedBox,
    pub width: f64,
    pub height: f64,
}

/// Output format for measured outlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Svg,
    Dxf,
    Both,
    None,
}

impl OutputFormat {
    pub fn wants_svg(&self) -> bool {
        matches!(self, OutputFormat::Svg | OutputFormat::Both)
    }

    pub fn wants_dxf(&self) -> bool {
        matches!(self, OutputFormat::Dxf | OutputFormat::Both)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Svg => write!(f, "svg"),
            OutputFormat::Dxf => write!(f, "dxf"),
            OutputFormat::Both => write!(f, "svg+dxf"),
            OutputFormat::None => write!(f, "none"),
        }
    }
}
