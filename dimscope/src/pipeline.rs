// Per-frame measurement pipeline
//
// One run (a camera session or a single image) moves through three states:
//   AwaitingFirstContours: no scale yet. Frames without contours are skipped;
//     the first frame with contours calibrates from its first contour.
//   Calibrated: the scale is fixed for the rest of the run and every contour of
//     every frame is measured with it, the reference included.
//   Stopped: end of stream, capture failure, cancellation or a degenerate
//     reference. Nothing is measured afterwards.
// Frames come from a FrameSource and results go to a FrameSink, so the
// measurement step never touches devices, files or windows.

use anyhow::Context;
use dimscope_common::{Contour, SizeResult};
use image::RgbImage;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::calibration::{resolve_calibration, validate_reference_width, Calibration};
use crate::error::{MeasureError, Result};
use crate::measure::calculate_size;
use crate::segmentation::ContourExtractor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PipelineState {
    AwaitingFirstContours,
    Calibrated(Calibration),
    Stopped,
}

/// Measurements of one processed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// 1-based frame counter within the run
    pub cycle: u64,
    /// Scale in effect for this frame, if any
    pub calibration: Option<Calibration>,
    /// Whether this frame established the scale
    pub calibrated_now: bool,
    /// One entry per contour, in extraction order
    pub measurements: Vec<SizeResult>,
}

/// Delivers frames until the stream ends
pub trait FrameSource {
    /// `Ok(None)` is a normal end of stream; `Err` is a capture failure
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Receives every processed frame with its measurements
pub trait FrameSink {
    fn emit(&mut self, frame: &RgbImage, report: &CycleReport) -> Result<()>;

    /// Called once after the last frame of a run that ended normally
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl FrameSink for Vec<Box<dyn FrameSink>> {
    fn emit(&mut self, frame: &RgbImage, report: &CycleReport) -> Result<()> {
        for sink in self.iter_mut() {
            sink.emit(frame, report)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for sink in self.iter_mut() {
            sink.finish()?;
        }
        Ok(())
    }
}

/// Cooperative stop request, checked between frames
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Calibration-and-measurement state for one run
pub struct MeasurementPipeline<E> {
    extractor: E,
    reference_width: f64,
    state: PipelineState,
    cycles: u64,
}

impl<E: ContourExtractor> MeasurementPipeline<E> {
    pub fn new(extractor: E, reference_width: f64) -> Result<Self> {
        validate_reference_width(reference_width)?;
        Ok(Self {
            extractor,
            reference_width,
            state: PipelineState::AwaitingFirstContours,
            cycles: 0,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn calibration(&self) -> Option<Calibration> {
        match self.state {
            PipelineState::Calibrated(calibration) => Some(calibration),
            _ => None,
        }
    }

    pub fn pixels_per_metric(&self) -> Option<f64> {
        self.calibration().map(|c| c.pixels_per_metric)
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PipelineState::Stopped
    }

    pub fn stop(&mut self) {
        if !self.is_stopped() {
            debug!("Pipeline stopped after {} cycle(s)", self.cycles);
        }
        self.state = PipelineState::Stopped;
    }

    /// Extract contours from a frame and measure them
    pub fn process_frame(&mut self, frame: &RgbImage) -> Result<CycleReport> {
        if self.is_stopped() {
            return Err(MeasureError::Stopped);
        }
        let contours = self.extractor.extract(frame);
        self.measure_contours(&contours)
    }

    /// Measure one frame's contours, calibrating first if no scale exists yet
    ///
    /// A degenerate reference stops the pipeline and nothing is measured.
    pub fn measure_contours(&mut self, contours: &[Contour]) -> Result<CycleReport> {
        let (calibration, calibrated_now) = match self.state {
            PipelineState::Stopped => return Err(MeasureError::Stopped),
            PipelineState::Calibrated(calibration) => (calibration, false),
            PipelineState::AwaitingFirstContours => {
                match resolve_calibration(contours, self.reference_width) {
                    Ok(Some(calibration)) => {
                        self.state = PipelineState::Calibrated(calibration);
                        (calibration, true)
                    }
                    Ok(None) => {
                        self.cycles += 1;
                        debug!("Cycle {}: no contours, still waiting for a reference", self.cycles);
                        return Ok(CycleReport {
                            cycle: self.cycles,
                            calibration: None,
                            calibrated_now: false,
                            measurements: Vec::new(),
                        });
                    }
                    Err(e) => {
                        warn!("Calibration failed: {}", e);
                        self.stop();
                        return Err(e);
                    }
                }
            }
        };

        self.cycles += 1;
        let measurements: Vec<SizeResult> = contours
            .iter()
            .map(|c| calculate_size(c, Some(calibration.pixels_per_metric)))
            .collect();

        debug!("Cycle {}: measured {} contour(s)", self.cycles, measurements.len());

        Ok(CycleReport {
            cycle: self.cycles,
            calibration: Some(calibration),
            calibrated_now,
            measurements,
        })
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub measurements: usize,
    pub pixels_per_metric: Option<f64>,
}

/// Drive a pipeline until the source ends, the token is cancelled or a cycle fails
///
/// Capture and calibration failures stop the pipeline and are returned
/// without retry; sinks are only finished after a normal end.
pub fn run<E: ContourExtractor>(
    pipeline: &mut MeasurementPipeline<E>,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    cancel: &CancelToken,
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();

    loop {
        if cancel.is_cancelled() {
            info!("Measurement cancelled after {} frame(s)", summary.cycles);
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("End of input");
                break;
            }
            Err(e) => {
                pipeline.stop();
                return Err(e.into());
            }
        };

        let report = match pipeline.process_frame(&frame) {
            Ok(report) => report,
            Err(e) => {
                pipeline.stop();
                return Err(e.into());
            }
        };

        summary.cycles = report.cycle;
        summary.measurements += report.measurements.len();

        if let Err(e) = sink.emit(&frame, &report) {
            pipeline.stop();
            return Err(e).context(format!("Failed to output frame {}", report.cycle));
        }
    }

    summary.pixels_per_metric = pipeline.pixels_per_metric();
    debug!("Run ended in state {:?}", pipeline.state());
    pipeline.stop();
    sink.finish().context("Failed to finish outputs")?;

    Ok(summary)
}
