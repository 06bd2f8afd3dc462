// Measurement overlay
// Draws each measured box and its size label onto a copy of the frame

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use dimscope_common::SizeResult;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AnnotationConfig;
use crate::error::MeasureError;
use crate::pipeline::{CycleReport, FrameSink};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Loaded label font
pub struct LabelFont {
    font: FontVec,
    scale: PxScale,
}

impl LabelFont {
    pub fn load(path: &Path, size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .with_context(|| format!("Failed to parse font {}", path.display()))?;
        Ok(Self {
            font,
            scale: PxScale::from(size),
        })
    }

    pub fn from_config(config: &AnnotationConfig) -> Result<Option<Self>> {
        config
            .font_path
            .as_deref()
            .map(|path| Self::load(path, config.font_scale))
            .transpose()
    }
}

/// Size label shown above a box, e.g. "W: 85.6 mm, H: 54.0 mm"
pub fn size_label(result: &SizeResult, unit: &str) -> String {
    format!("W: {:.1} {unit}, H: {:.1} {unit}", result.width, result.height)
}

/// Copy of `frame` with every measurement drawn on it
pub fn annotate_frame(
    frame: &RgbImage,
    measurements: &[SizeResult],
    unit: &str,
    font: Option<&LabelFont>,
) -> RgbImage {
    let mut canvas = frame.clone();

    for result in measurements {
        draw_box(&mut canvas, result);

        if let Some(label_font) = font {
            let top_left = result.bounding_box.top_left();
            let x = top_left.x as i32;
            let y = (top_left.y as i32 - 10 - label_font.scale.y as i32).max(0);
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                x,
                y,
                label_font.scale,
                &label_font.font,
                &size_label(result, unit),
            );
        }
    }

    canvas
}

/// Closed outline of an ordered box, two pixels thick
fn draw_box(canvas: &mut RgbImage, result: &SizeResult) {
    let corners = result.bounding_box.corners;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        for offset in [0.0f32, 1.0] {
            draw_line_segment_mut(
                canvas,
                (a.x as f32 + offset, a.y as f32 + offset),
                (b.x as f32 + offset, b.y as f32 + offset),
                BOX_COLOR,
            );
        }
    }
}

/// Writes the annotated frame to an image file, overwriting it every cycle
pub struct AnnotatedImageSink {
    output_path: PathBuf,
    unit: String,
    font: Option<LabelFont>,
}

impl AnnotatedImageSink {
    pub fn new(output_path: impl Into<PathBuf>, unit: impl Into<String>, font: Option<LabelFont>) -> Self {
        Self {
            output_path: output_path.into(),
            unit: unit.into(),
            font,
        }
    }
}

impl FrameSink for AnnotatedImageSink {
    fn emit(&mut self, frame: &RgbImage, report: &CycleReport) -> crate::error::Result<()> {
        let annotated = annotate_frame(frame, &report.measurements, &self.unit, self.font.as_ref());
        annotated.save(&self.output_path).map_err(|source| MeasureError::Render {
            path: self.output_path.clone(),
            source,
        })?;

        if report.cycle == 1 {
            info!("Writing annotated frames to: {}", self.output_path.display());
        }
        debug!("Saved annotated frame {}", report.cycle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimscope_common::{OrderedBox, Point2D};

    fn measured_box() -> SizeResult {
        SizeResult {
            bounding_box: OrderedBox {
                corners: [
                    Point2D::new(10.0, 20.0),
                    Point2D::new(50.0, 20.0),
                    Point2D::new(50.0, 40.0),
                    Point2D::new(10.0, 40.0),
                ],
            },
            width: 20.0,
            height: 10.0,
        }
    }

    #[test]
    fn label_uses_one_decimal() {
        assert_eq!(size_label(&measured_box(), "mm"), "W: 20.0 mm, H: 10.0 mm");
    }

    #[test]
    fn boxes_are_drawn_on_a_copy() {
        let frame = RgbImage::new(64, 64);
        let annotated = annotate_frame(&frame, &[measured_box()], "mm", None);

        assert_eq!(*annotated.get_pixel(30, 20), BOX_COLOR);
        assert_eq!(*annotated.get_pixel(10, 30), BOX_COLOR);
        assert_eq!(*annotated.get_pixel(30, 30), Rgb([0, 0, 0]));
        assert_eq!(*frame.get_pixel(30, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn unwritable_output_is_a_render_error() {
        let mut sink = AnnotatedImageSink::new("/no/such/dir/measured.png", "mm", None);
        let report = CycleReport {
            cycle: 1,
            calibration: None,
            calibrated_now: false,
            measurements: vec![measured_box()],
        };

        let err = sink.emit(&RgbImage::new(64, 64), &report).unwrap_err();
        assert!(matches!(err, MeasureError::Render { .. }));
    }

    #[test]
    fn missing_font_is_an_error() {
        let config = AnnotationConfig {
            font_path: Some(PathBuf::from("/no/such/font.ttf")),
            font_scale: 12.0,
        };
        assert!(LabelFont::from_config(&config).is_err());
        assert!(LabelFont::from_config(&AnnotationConfig::default()).unwrap().is_none());
    }
}
