// Scale calibration from a reference object of known width
// The first contour in extraction order is the reference; no shape check is made

use dimscope_common::Contour;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{MeasureError, Result};
use crate::measure::calculate_size;

/// Pixel-to-physical scale established from the reference object
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Calibration {
    /// Pixels per physical unit
    pub pixels_per_metric: f64,
    /// Width of the reference contour's bounding box in pixels
    pub reference_pixel_width: f64,
    /// Known physical width of the reference object
    pub reference_width: f64,
}

/// Derive the scale from the first contour
///
/// Returns `Ok(None)` when there are no contours, leaving calibration for a
/// later frame. A reference whose pixel width is zero or not finite is
/// reported as `DegenerateReference` instead of producing an infinite scale.
pub fn resolve_calibration(contours: &[Contour], reference_width: f64) -> Result<Option<Calibration>> {
    validate_reference_width(reference_width)?;

    let Some(reference) = contours.first() else {
        debug!("No contours to calibrate from");
        return Ok(None);
    };

    let size = calculate_size(reference, None);
    let pixel_width = size.width;
    debug!(
        "Reference box: tl {} tr {} br {} bl {}",
        size.bounding_box.top_left(),
        size.bounding_box.top_right(),
        size.bounding_box.bottom_right(),
        size.bounding_box.bottom_left()
    );

    if pixel_width == 0.0 || !pixel_width.is_finite() {
        return Err(MeasureError::DegenerateReference { pixel_width });
    }

    let pixels_per_metric = pixel_width / reference_width;
    if !pixels_per_metric.is_finite() || pixels_per_metric <= 0.0 {
        return Err(MeasureError::DegenerateReference { pixel_width });
    }

    info!(
        "Calibrated: reference is {:.1}px wide for {} units -> {:.4} px/unit",
        pixel_width, reference_width, pixels_per_metric
    );

    Ok(Some(Calibration {
        pixels_per_metric,
        reference_pixel_width: pixel_width,
        reference_width,
    }))
}

/// Reference width must be a positive, finite number
pub fn validate_reference_width(reference_width: f64) -> Result<()> {
    if reference_width.is_finite() && reference_width > 0.0 {
        Ok(())
    } else {
        Err(MeasureError::invalid_parameter("reference_width", reference_width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: i32, y0: i32, side: i32) -> Contour {
        Contour::from_pixels([(x0, y0), (x0 + side, y0), (x0 + side, y0 + side), (x0, y0 + side)])
    }

    #[test]
    fn ratio_from_first_contour() {
        let contours = vec![square(0, 0, 100), square(300, 0, 200)];
        let calibration = resolve_calibration(&contours, 50.0).unwrap().unwrap();
        assert_relative_eq!(calibration.pixels_per_metric, 2.0);
        assert_relative_eq!(calibration.reference_pixel_width, 100.0);
    }

    #[test]
    fn larger_later_contours_are_not_the_reference() {
        let contours = vec![square(0, 0, 40), square(100, 100, 400)];
        let calibration = resolve_calibration(&contours, 10.0).unwrap().unwrap();
        assert_relative_eq!(calibration.pixels_per_metric, 4.0);
    }

    #[test]
    fn repeated_calls_agree() {
        let contours = vec![square(3, 4, 77), square(0, 0, 10)];
        let a = resolve_calibration(&contours, 25.4).unwrap();
        let b = resolve_calibration(&contours, 25.4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn no_contours_means_no_calibration() {
        assert_eq!(resolve_calibration(&[], 50.0).unwrap(), None);
    }

    #[test]
    fn single_point_reference_is_degenerate() {
        let contours = vec![Contour::from_pixels([(10, 10)]), square(0, 0, 100)];
        let err = resolve_calibration(&contours, 50.0).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateReference { pixel_width } if pixel_width == 0.0));
    }

    #[test]
    fn vertical_line_reference_is_degenerate() {
        // Collinear vertical points: the top edge of the ordered box has zero length
        let contours = vec![Contour::from_pixels([(5, 0), (5, 40), (5, 80)])];
        let err = resolve_calibration(&contours, 50.0).unwrap_err();
        assert!(matches!(err, MeasureError::DegenerateReference { .. }));
    }

    #[test]
    fn reference_width_must_be_positive() {
        let contours = vec![square(0, 0, 100)];
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let err = resolve_calibration(&contours, bad).unwrap_err();
            assert!(matches!(err, MeasureError::InvalidParameter { .. }));
        }
    }
}
