// Text, JSON and vector outputs for measured frames

use dimscope_common::{OrderedBox, OutputFormat};
use image::RgbImage;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use crate::annotate::size_label;
use crate::error::{MeasureError, Result};
use crate::export_dxf::export_dxf;
use crate::export_svg::export_svg;
use crate::pipeline::{CycleReport, FrameSink};

/// Logs every measurement
pub struct LogSink {
    unit: String,
}

impl LogSink {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }
}

impl FrameSink for LogSink {
    fn emit(&mut self, _frame: &RgbImage, report: &CycleReport) -> Result<()> {
        if report.calibrated_now {
            if let Some(calibration) = report.calibration {
                info!(
                    "Frame {}: scale set to {:.4} px/{}",
                    report.cycle, calibration.pixels_per_metric, self.unit
                );
            }
        }
        for (idx, m) in report.measurements.iter().enumerate() {
            info!(
                "Frame {} object {}: {} at {}",
                report.cycle,
                idx,
                size_label(m, &self.unit),
                m.bounding_box.top_left()
            );
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CycleRecord<'a> {
    unit: &'a str,
    #[serde(flatten)]
    report: &'a CycleReport,
}

/// Appends every cycle to a JSON Lines file as soon as it is measured
///
/// One object per line: the unit label followed by the cycle's report.
pub struct JsonReportSink {
    path: PathBuf,
    unit: String,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonReportSink {
    pub fn create(path: impl Into<PathBuf>, unit: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| MeasureError::export(&path, e))?;
        info!("Writing measurements to report: {}", path.display());
        Ok(Self {
            path,
            unit: unit.into(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }
}

impl FrameSink for JsonReportSink {
    fn emit(&mut self, _frame: &RgbImage, report: &CycleReport) -> Result<()> {
        let record = CycleRecord {
            unit: &self.unit,
            report,
        };
        serde_json::to_writer(&mut self.writer, &record).map_err(|e| MeasureError::export(&self.path, e))?;
        self.writer
            .write_all(b"\n")
            .and_then(|()| self.writer.flush())
            .map_err(|e| MeasureError::export(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| MeasureError::export(&self.path, e))?;
        info!("Wrote {} frame(s) to report {}", self.written, self.path.display());
        Ok(())
    }
}

/// Exports the boxes of the last measured frame as SVG and/or DXF in physical units
pub struct OutlineExportSink {
    output_base: String,
    format: OutputFormat,
    unit: String,
    boxes: Vec<OrderedBox>,
    labels: Vec<String>,
}

impl OutlineExportSink {
    pub fn new(output_base: impl Into<String>, format: OutputFormat, unit: impl Into<String>) -> Self {
        Self {
            output_base: output_base.into(),
            format,
            unit: unit.into(),
            boxes: Vec::new(),
            labels: Vec::new(),
        }
    }
}

impl FrameSink for OutlineExportSink {
    fn emit(&mut self, _frame: &RgbImage, report: &CycleReport) -> Result<()> {
        let Some(calibration) = report.calibration else {
            return Ok(());
        };
        if report.measurements.is_empty() {
            return Ok(());
        }

        self.boxes = report
            .measurements
            .iter()
            .map(|m| m.bounding_box.scaled_down(calibration.pixels_per_metric))
            .collect();
        self.labels = report
            .measurements
            .iter()
            .map(|m| size_label(m, &self.unit))
            .collect();
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.boxes.is_empty() {
            info!("Nothing measured, skipping {} export", self.format);
            return Ok(());
        }

        if self.format.wants_svg() {
            let path = PathBuf::from(format!("{}.svg", self.output_base));
            export_svg(&self.boxes, &self.labels, &self.unit, &path)?;
        }
        if self.format.wants_dxf() {
            let path = PathBuf::from(format!("{}.dxf", self.output_base));
            export_dxf(&self.boxes, &path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Calibration;
    use dimscope_common::{Point2D, SizeResult};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dimscope-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn calibrated_report() -> CycleReport {
        let bounding_box = OrderedBox {
            corners: [
                Point2D::new(0.0, 0.0),
                Point2D::new(100.0, 0.0),
                Point2D::new(100.0, 40.0),
                Point2D::new(0.0, 40.0),
            ],
        };
        CycleReport {
            cycle: 1,
            calibration: Some(Calibration {
                pixels_per_metric: 2.0,
                reference_pixel_width: 100.0,
                reference_width: 50.0,
            }),
            calibrated_now: true,
            measurements: vec![SizeResult {
                bounding_box,
                width: 50.0,
                height: 20.0,
            }],
        }
    }

    #[test]
    fn json_report_is_written_one_cycle_at_a_time() {
        let dir = scratch_dir("json");
        let path = dir.join("report.jsonl");
        let mut sink = JsonReportSink::create(&path, "mm").unwrap();
        let frame = RgbImage::new(1, 1);

        let read_lines = || -> Vec<serde_json::Value> {
            std::fs::read_to_string(&path)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        };

        let mut first = calibrated_report();
        sink.emit(&frame, &first).unwrap();
        let lines = read_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["unit"], "mm");
        assert_eq!(lines[0]["cycle"], 1);
        assert_eq!(lines[0]["calibration"]["pixels_per_metric"], 2.0);
        assert_eq!(lines[0]["measurements"][0]["width"], 50.0);

        first.cycle = 2;
        first.calibrated_now = false;
        sink.emit(&frame, &first).unwrap();
        let lines = read_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["cycle"], 2);
        assert_eq!(lines[1]["calibrated_now"], false);

        sink.finish().unwrap();
        assert_eq!(read_lines().len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn json_report_in_missing_directory_is_an_export_error() {
        let err = JsonReportSink::create("/no/such/dir/report.jsonl", "mm").err().unwrap();
        assert!(matches!(err, MeasureError::Export { .. }));
    }

    #[test]
    fn export_scales_boxes_to_units() {
        let dir = scratch_dir("export");
        let base = dir.join("outlines").to_string_lossy().into_owned();
        let mut sink = OutlineExportSink::new(base.clone(), OutputFormat::Svg, "mm");

        sink.emit(&RgbImage::new(1, 1), &calibrated_report()).unwrap();
        assert_eq!(sink.boxes[0].top_right(), Point2D::new(50.0, 0.0));
        sink.finish().unwrap();

        assert!(PathBuf::from(format!("{}.svg", base)).exists());
        assert!(!PathBuf::from(format!("{}.dxf", base)).exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn export_skips_uncalibrated_frames() {
        let mut sink = OutlineExportSink::new("unused", OutputFormat::Both, "mm");
        let empty = CycleReport {
            cycle: 1,
            calibration: None,
            calibrated_now: false,
            measurements: Vec::new(),
        };
        sink.emit(&RgbImage::new(1, 1), &empty).unwrap();
        assert!(sink.boxes.is_empty());
        sink.finish().unwrap();
    }
}
