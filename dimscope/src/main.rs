use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dimscope_common::OutputFormat;
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod annotate;
mod calibration;
mod capture;
mod config;
mod corners;
mod error;
mod export_dxf;
mod export_svg;
mod measure;
mod pipeline;
mod report;
mod segmentation;

use annotate::{AnnotatedImageSink, LabelFont};
use capture::{CameraId, Limited, StillImage};
use config::MeasureConfig;
use pipeline::{CancelToken, FrameSink, FrameSource, MeasurementPipeline};
use report::{JsonReportSink, LogSink, OutlineExportSink};
use segmentation::EdgeContours;

/// Measure the width and height of objects in a photo or camera stream.
/// The first object found in the first frame with objects is the reference.
#[derive(Parser, Debug)]
#[command(name = "dimscope")]
#[command(about = "Measure object dimensions against a reference of known width", long_about = None)]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Physical width of the reference object (overrides the config file)
    #[arg(short = 'w', long, global = true)]
    reference_width: Option<f64>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output file path (without extension)
    #[arg(short, long, default_value = "measured", global = true)]
    output: String,

    /// Vector export of the measured boxes
    #[arg(short, long, value_enum, default_value = "none", global = true)]
    format: FormatArg,

    /// Append every frame's measurements to this JSON Lines file
    #[arg(short, long, global = true)]
    report: Option<PathBuf>,

    /// TrueType font for the size labels (overrides the config file)
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// Write the effective configuration to this JSON file
    #[arg(long, global = true)]
    save_config: Option<PathBuf>,

    /// Save the edge map of the last frame next to the output
    #[arg(short, long, global = true)]
    debug_edges: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Measure a live camera; type `q` and Enter to stop
    Camera {
        /// Device index or stream URL
        #[arg(default_value = "0")]
        source: String,

        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },
    /// Measure one image chosen from a directory
    Images {
        /// Directory containing .png, .jpg or .jpeg files
        dir: PathBuf,

        /// 1-based image number; prompts when omitted
        #[arg(short, long, allow_negative_numbers = true)]
        select: Option<i64>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Svg,
    Dxf,
    Both,
    None,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Svg => OutputFormat::Svg,
            FormatArg::Dxf => OutputFormat::Dxf,
            FormatArg::Both => OutputFormat::Both,
            FormatArg::None => OutputFormat::None,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MeasureConfig::from_json_file(path)?,
        None => MeasureConfig::default(),
    };
    if let Some(width) = args.reference_width {
        config.reference_width = width;
    }
    if let Some(font) = &args.font {
        config.annotation.font_path = Some(font.clone());
    }
    config.validate()?;
    if let Some(path) = &args.save_config {
        config.to_json_file(path)?;
        info!("Saved configuration to: {}", path.display());
    }

    let format: OutputFormat = args.format.into();
    info!("dimscope - object measurement");
    info!("Reference width: {} {}", config.reference_width, config.unit);
    info!("Output: {} (export: {})", args.output, format);

    let mut extractor = EdgeContours::new(config.edges.clone());
    if args.debug_edges {
        extractor = extractor.with_debug_path(format!("{}_edges.png", args.output));
    }
    let mut pipeline = MeasurementPipeline::new(extractor, config.reference_width)?;

    let font = LabelFont::from_config(&config.annotation)?;
    if font.is_none() {
        warn!("No label font configured, boxes are drawn without size labels");
    }

    let mut sinks: Vec<Box<dyn FrameSink>> = vec![
        Box::new(LogSink::new(config.unit.clone())),
        Box::new(AnnotatedImageSink::new(
            format!("{}.png", args.output),
            config.unit.clone(),
            font,
        )),
    ];
    if !matches!(format, OutputFormat::None) {
        sinks.push(Box::new(OutlineExportSink::new(
            args.output.clone(),
            format,
            config.unit.clone(),
        )));
    }
    if let Some(path) = &args.report {
        sinks.push(Box::new(JsonReportSink::create(path.clone(), config.unit.clone())?));
    }

    let cancel = CancelToken::new();
    let mut source = open_source(&args.mode, &cancel)?;

    let summary = pipeline::run(&mut pipeline, &mut source, &mut sinks, &cancel)
        .context("Measurement failed")?;

    info!("Processed {} frame(s), {} measurement(s)", summary.cycles, summary.measurements);
    match summary.pixels_per_metric {
        Some(ppm) => info!("Scale: {:.4} px/{}", ppm, config.unit),
        None => warn!("No objects found, nothing was measured"),
    }

    Ok(())
}

fn open_source(mode: &Mode, cancel: &CancelToken) -> Result<Box<dyn FrameSource>> {
    match mode {
        Mode::Camera { source, max_frames } => {
            let id = CameraId::parse(source);
            let camera = capture::open_camera(&id).with_context(|| format!("Cannot open {}", id))?;
            watch_for_quit(cancel.clone());
            info!("Measuring {}; type q and Enter to stop", id);

            match max_frames {
                Some(limit) => Ok(Box::new(Limited::new(camera, *limit))),
                None => Ok(camera),
            }
        }
        Mode::Images { dir, select } => {
            let images = capture::list_images(dir)?;
            let index = match select {
                Some(choice) => capture::resolve_selection(*choice, images.len())?,
                None => capture::prompt_selection(
                    &images,
                    &mut std::io::stdin().lock(),
                    &mut std::io::stdout(),
                )?,
            };
            Ok(Box::new(StillImage::new(&images[index])))
        }
    }
}

/// Cancel the run when `q` is entered on stdin
fn watch_for_quit(cancel: CancelToken) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(text) if text.trim().eq_ignore_ascii_case("q") => {
                    cancel.cancel();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}
