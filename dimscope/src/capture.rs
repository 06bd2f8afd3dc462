// Frame sources: still images picked from a directory, and live cameras
// Camera capture goes through OpenCV and is only built with the `camera` feature

use image::RgbImage;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{MeasureError, Result};
use crate::pipeline::FrameSource;

const IMAGE_EXTENSIONS: [&str; 3] = [".png", ".jpg", ".jpeg"];

/// A single image file, delivered once
pub struct StillImage {
    path: PathBuf,
    delivered: bool,
}

impl StillImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delivered: false,
        }
    }
}

impl FrameSource for StillImage {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.delivered {
            return Ok(None);
        }
        self.delivered = true;

        let img = image::open(&self.path).map_err(|e| {
            MeasureError::capture(format!("failed to load image {}", self.path.display()), e)
        })?;
        info!("Loaded {} ({}x{})", self.path.display(), img.width(), img.height());
        Ok(Some(img.to_rgb8()))
    }
}

/// Stops another source after a fixed number of frames
pub struct Limited<S> {
    inner: S,
    remaining: u64,
}

impl<S: FrameSource> Limited<S> {
    pub fn new(inner: S, max_frames: u64) -> Self {
        Self {
            inner,
            remaining: max_frames,
        }
    }
}

impl<S: FrameSource> FrameSource for Limited<S> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.remaining == 0 {
            debug!("Frame limit reached");
            return Ok(None);
        }
        self.remaining -= 1;
        self.inner.next_frame()
    }
}

impl FrameSource for Box<dyn FrameSource> {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        self.as_mut().next_frame()
    }
}

/// PNG and JPEG files in a directory, sorted by file name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        MeasureError::capture(format!("cannot read image directory {}", dir.display()), e)
    })?;

    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
        })
        .collect();

    if images.is_empty() {
        return Err(MeasureError::NoImages {
            dir: dir.to_path_buf(),
        });
    }

    images.sort();
    Ok(images)
}

/// Turn a 1-based choice into an index into `available` images
pub fn resolve_selection(choice: i64, available: usize) -> Result<usize> {
    if choice >= 1 && (choice as u64) <= available as u64 {
        Ok(choice as usize - 1)
    } else {
        Err(MeasureError::InvalidSelection {
            choice: choice.to_string(),
            available,
        })
    }
}

/// List the images and read a 1-based choice
///
/// Blocks until a line arrives on `input`.
pub fn prompt_selection<R: BufRead, W: Write>(
    images: &[PathBuf],
    input: &mut R,
    output: &mut W,
) -> Result<usize> {
    let prompt_failed = |e: std::io::Error| MeasureError::capture("failed to prompt for an image", e);

    writeln!(output, "Available images:").map_err(prompt_failed)?;
    for (i, path) in images.iter().enumerate() {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        writeln!(output, "{}: {}", i + 1, name).map_err(prompt_failed)?;
    }
    write!(output, "Select an image by number (1-{}): ", images.len()).map_err(prompt_failed)?;
    output.flush().map_err(prompt_failed)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(prompt_failed)?;
    let raw = line.trim();

    match raw.parse::<i64>() {
        Ok(choice) => resolve_selection(choice, images.len()),
        Err(_) => Err(MeasureError::InvalidSelection {
            choice: raw.to_string(),
            available: images.len(),
        }),
    }
}

/// Camera given on the command line: a device index or a stream URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraId {
    Device(i32),
    Url(String),
}

impl CameraId {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i32>() {
            Ok(index) => CameraId::Device(index),
            Err(_) => CameraId::Url(raw.trim().to_string()),
        }
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraId::Device(index) => write!(f, "camera {}", index),
            CameraId::Url(url) => write!(f, "{}", url),
        }
    }
}

#[cfg(feature = "camera")]
pub fn open_camera(id: &CameraId) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(camera::CameraSource::open(id)?))
}

#[cfg(not(feature = "camera"))]
pub fn open_camera(id: &CameraId) -> Result<Box<dyn FrameSource>> {
    debug!("Cannot open {}: built without camera support", id);
    Err(MeasureError::CameraUnavailable)
}

#[cfg(feature = "camera")]
mod camera {
    use image::RgbImage;
    use opencv::{
        core::{AlgorithmHint, Mat},
        imgproc::{cvt_color, COLOR_BGR2RGB},
        prelude::*,
        videoio::{VideoCapture, CAP_ANY},
    };
    use tracing::info;

    use super::CameraId;
    use crate::error::{MeasureError, Result};
    use crate::pipeline::FrameSource;

    /// Live frames from a local device or a network stream
    pub struct CameraSource {
        capture: VideoCapture,
        frame: Mat,
        label: String,
    }

    impl CameraSource {
        pub fn open(id: &CameraId) -> Result<Self> {
            let label = id.to_string();
            let capture = match id {
                CameraId::Device(index) => VideoCapture::new(*index, CAP_ANY),
                CameraId::Url(url) => VideoCapture::from_file(url, CAP_ANY),
            }
            .map_err(|e| MeasureError::capture(format!("failed to open {}", label), e))?;

            let opened = capture
                .is_opened()
                .map_err(|e| MeasureError::capture(format!("failed to query {}", label), e))?;
            if !opened {
                return Err(MeasureError::capture_msg(format!("{} could not be opened", label)));
            }

            info!("Opened {}", label);
            Ok(Self {
                capture,
                frame: Mat::default(),
                label,
            })
        }
    }

    impl FrameSource for CameraSource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            let grabbed = self
                .capture
                .read(&mut self.frame)
                .map_err(|e| MeasureError::capture(format!("read from {} failed", self.label), e))?;
            if !grabbed || self.frame.empty() {
                return Err(MeasureError::capture_msg(format!("{} delivered no frame", self.label)));
            }

            let mut rgb = Mat::default();
            cvt_color(&self.frame, &mut rgb, COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)
                .map_err(|e| MeasureError::capture("BGR to RGB conversion failed", e))?;

            let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
            let data = rgb
                .data_bytes()
                .map_err(|e| MeasureError::capture("failed to read frame data", e))?;

            RgbImage::from_raw(width, height, data.to_vec())
                .map(Some)
                .ok_or_else(|| MeasureError::capture_msg("frame buffer has unexpected size"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dimscope-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn lists_only_supported_images_sorted() {
        let dir = scratch_dir("list");
        for name in ["b.jpg", "a.png", "c.jpeg", "notes.txt", "d.JPG"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let images = list_images(&dir).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.jpg", "c.jpeg"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_reported() {
        let dir = scratch_dir("empty");
        assert!(matches!(list_images(&dir), Err(MeasureError::NoImages { .. })));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn selection_is_one_based() {
        assert_eq!(resolve_selection(1, 3).unwrap(), 0);
        assert_eq!(resolve_selection(3, 3).unwrap(), 2);
        for bad in [0, 4, -1] {
            assert!(matches!(
                resolve_selection(bad, 3),
                Err(MeasureError::InvalidSelection { available: 3, .. })
            ));
        }
    }

    #[test]
    fn prompt_lists_images_and_reads_choice() {
        let images = vec![PathBuf::from("/x/one.png"), PathBuf::from("/x/two.jpg")];
        let mut input = Cursor::new(b"2\n".to_vec());
        let mut output = Vec::new();

        let index = prompt_selection(&images, &mut input, &mut output).unwrap();
        assert_eq!(index, 1);

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("1: one.png"));
        assert!(shown.contains("2: two.jpg"));
        assert!(shown.contains("(1-2)"));
    }

    #[test]
    fn prompt_rejects_garbage() {
        let images = vec![PathBuf::from("one.png")];
        let mut input = Cursor::new(b"first\n".to_vec());
        let err = prompt_selection(&images, &mut input, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, MeasureError::InvalidSelection { ref choice, .. } if choice == "first"));
    }

    #[test]
    fn still_image_is_delivered_once() {
        let dir = scratch_dir("still");
        let path = dir.join("frame.png");
        RgbImage::new(8, 6).save(&path).unwrap();

        let mut source = StillImage::new(&path);
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert!(source.next_frame().unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unreadable_image_is_a_capture_failure() {
        let mut source = StillImage::new("/definitely/not/here.png");
        assert!(matches!(source.next_frame(), Err(MeasureError::Capture { .. })));
    }

    #[test]
    fn limited_source_stops_early() {
        let dir = scratch_dir("limited");
        let path = dir.join("frame.png");
        RgbImage::new(2, 2).save(&path).unwrap();

        let mut source = Limited::new(StillImage::new(&path), 0);
        assert!(source.next_frame().unwrap().is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn camera_ids() {
        assert_eq!(CameraId::parse("0"), CameraId::Device(0));
        assert_eq!(
            CameraId::parse("http://192.168.1.20:8080/video"),
            CameraId::Url("http://192.168.1.20:8080/video".to_string())
        );
    }
}
