// SVG export module
// Exports measured boxes to SVG with physical-unit coordinates

use dimscope_common::OrderedBox;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::error::{MeasureError, Result};

/// Export boxes to an SVG file
/// Coordinates must already be in physical units
pub fn export_svg(boxes: &[OrderedBox], labels: &[String], unit: &str, output_path: &Path) -> Result<()> {
    let (width, height) = File::create(output_path)
        .and_then(|file| write_svg(&mut BufWriter::new(file), boxes, labels, unit))
        .map_err(|e| MeasureError::export(output_path, e))?;

    info!("Exported {} box(es) to SVG: {}", boxes.len(), output_path.display());
    info!("  Bounds: {:.1}{unit} x {:.1}{unit}", width, height);

    Ok(())
}

/// Write the SVG document, returning its width and height
fn write_svg<W: Write>(file: &mut W, boxes: &[OrderedBox], labels: &[String], unit: &str) -> std::io::Result<(f64, f64)> {
    let (min_x, min_y, max_x, max_y) = calculate_bounds(boxes);
    let width = max_x - min_x;
    let height = max_y - min_y;
    // SVG only knows a few absolute units; anything else is written unitless
    let svg_unit = match unit {
        "mm" | "cm" | "in" => unit,
        _ => "",
    };

    writeln!(file, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(file, r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1""#)?;
    writeln!(file, r#"     width="{:.3}{}" height="{:.3}{}""#, width, svg_unit, height, svg_unit)?;
    writeln!(file, r#"     viewBox="{:.3} {:.3} {:.3} {:.3}">"#, min_x, min_y, width, height)?;
    writeln!(file)?;

    writeln!(file, r#"  <title>dimscope - Measured objects</title>"#)?;
    writeln!(file, r#"  <desc>Minimum-area bounding boxes of detected objects. Units: {}</desc>"#, unit)?;
    writeln!(file)?;

    let text_size = (width.max(height) / 60.0).max(0.5);

    for (idx, b) in boxes.iter().enumerate() {
        write!(file, r#"  <path id="object-{}" "#, idx)?;
        write!(file, r#"stroke="black" stroke-width="{:.3}" fill="none" "#, text_size / 10.0)?;

        let [tl, tr, br, bl] = b.corners;
        write!(file, r#"d="M {:.3},{:.3} L {:.3},{:.3} L {:.3},{:.3} L {:.3},{:.3} Z""#,
            tl.x, tl.y, tr.x, tr.y, br.x, br.y, bl.x, bl.y)?;
        writeln!(file, " />")?;

        if let Some(label) = labels.get(idx) {
            writeln!(
                file,
                r#"  <text x="{:.3}" y="{:.3}" font-size="{:.3}" fill="blue">{}</text>"#,
                tl.x,
                tl.y - text_size / 2.0,
                text_size,
                escape(label)
            )?;
        }
    }

    writeln!(file)?;
    writeln!(file, "</svg>")?;
    file.flush()?;

    Ok((width, height))
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Calculate bounding box for all boxes
fn calculate_bounds(boxes: &[OrderedBox]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;

    for b in boxes {
        for pt in &b.corners {
            min_x = min_x.min(pt.x);
            min_y = min_y.min(pt.y);
            max_x = max_x.max(pt.x);
            max_y = max_y.max(pt.y);
        }
    }

    // Room for the labels above the top edge
    if min_x < f64::MAX {
        let margin = ((max_x - min_x).max(max_y - min_y) / 20.0).max(1.0);
        (min_x - margin, min_y - margin, max_x + margin, max_y + margin)
    } else {
        (0.0, 0.0, 100.0, 100.0) // Default if no boxes
    }
}
