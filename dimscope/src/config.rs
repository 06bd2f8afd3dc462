// Run configuration
// Defaults: a 50 mm reference object, a light Gaussian blur and Canny thresholds of
// 50/150. A JSON file can replace any of them and command-line flags override the file:
//
//   {
//     "reference_width": 85.6,
//     "unit": "mm",
//     "edges": { "blur_sigma": 1.1, "canny_low": 50.0, "canny_high": 150.0 },
//     "annotation": { "font_path": "fonts/DejaVuSans.ttf", "font_scale": 16.0 }
//   }

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::calibration::validate_reference_width;
use crate::error::MeasureError;

/// Largest accepted blur sigma; the kernel grows with it
pub const MAX_BLUR_SIGMA: f32 = 50.0;

/// Complete configuration for one measurement run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Known physical width of the reference object
    pub reference_width: f64,

    /// Label for the physical unit; no conversion is performed
    pub unit: String,

    /// Edge detection settings
    pub edges: EdgeConfig,

    /// Overlay settings
    pub annotation: AnnotationConfig,
}

/// Preprocessing and edge detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Gaussian blur sigma (a 5x5 OpenCV kernel with sigma 0 is about 1.1)
    pub blur_sigma: f32,

    /// Canny low hysteresis threshold
    pub canny_low: f32,

    /// Canny high hysteresis threshold
    pub canny_high: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// TrueType font for size labels; without one only boxes are drawn
    pub font_path: Option<PathBuf>,

    /// Label height in pixels
    pub font_scale: f32,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            reference_width: 50.0,
            unit: "mm".to_string(),
            edges: EdgeConfig::default(),
            annotation: AnnotationConfig::default(),
        }
    }
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_scale: 16.0,
        }
    }
}

impl MeasureConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        Ok(())
    }

    /// Check every parameter before a run starts
    pub fn validate(&self) -> std::result::Result<(), MeasureError> {
        validate_reference_width(self.reference_width)?;
        self.edges.validate()?;

        if !(self.annotation.font_scale > 0.0) {
            return Err(MeasureError::invalid_parameter(
                "annotation.font_scale",
                self.annotation.font_scale,
            ));
        }

        Ok(())
    }
}

impl EdgeConfig {
    pub fn validate(&self) -> std::result::Result<(), MeasureError> {
        if !(self.blur_sigma > 0.0 && self.blur_sigma <= MAX_BLUR_SIGMA) {
            return Err(MeasureError::invalid_parameter("edges.blur_sigma", self.blur_sigma));
        }
        if !self.canny_high.is_finite() {
            return Err(MeasureError::invalid_parameter("edges.canny_high", self.canny_high));
        }
        if !(self.canny_low >= 0.0) || self.canny_low > self.canny_high {
            return Err(MeasureError::invalid_parameter(
                "edges.canny_low",
                format!("{} (canny_high {})", self.canny_low, self.canny_high),
            ));
        }
        Ok(())
    }
}
