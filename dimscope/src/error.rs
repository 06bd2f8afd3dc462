// Error types for the measurement pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MeasureError>;

/// Conditions that end a measurement run
///
/// An empty contour set is not among them; that cycle simply has nothing
/// to measure.
#[derive(Error, Debug)]
pub enum MeasureError {
    /// The frame source could not deliver a frame
    #[error("Failed to capture frame: {message}")]
    Capture {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The reference contour has no usable pixel width
    #[error(
        "Reference object is degenerate: measured pixel width {pixel_width} gives no usable scale \
         (make sure the reference object is the first, clearly outlined shape in the frame)"
    )]
    DegenerateReference { pixel_width: f64 },

    /// Image selection outside the listed range
    #[error("Invalid choice '{choice}': select a number between 1 and {available}")]
    InvalidSelection { choice: String, available: usize },

    /// Image directory holds no supported files
    #[error("No images found in {}", dir.display())]
    NoImages { dir: PathBuf },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// An annotated frame could not be encoded or written
    #[error("Failed to render {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A report or vector export could not be written
    #[error("Failed to export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Camera capture was requested from a build without camera support
    #[error("Camera capture is not available: rebuild with `--features camera`")]
    CameraUnavailable,

    /// Measurement requested after the run ended
    #[error("Pipeline already stopped")]
    Stopped,
}

impl MeasureError {
    /// Create a capture error with an underlying cause
    pub fn capture<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Capture {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a capture error with no underlying cause
    pub fn capture_msg(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
            source: None,
        }
    }

    /// Create an export error for `path`
    pub fn export<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Export {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_reference_names_the_width() {
        let err = MeasureError::DegenerateReference { pixel_width: 0.0 };
        assert!(err.to_string().contains("pixel width 0"));
    }

    #[test]
    fn selection_error_lists_range() {
        let err = MeasureError::InvalidSelection {
            choice: "7".to_string(),
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "Invalid choice '7': select a number between 1 and 3"
        );
    }

    #[test]
    fn export_error_names_the_file() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = MeasureError::export("out/measured.svg", io);
        assert_eq!(err.to_string(), "Failed to export out/measured.svg: read-only");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn capture_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = MeasureError::capture("camera 0", io);
        assert!(std::error::Error::source(&err).is_some());
    }
}
