// DXF export module
// Exports measured boxes to DXF format (AutoCAD/Fusion 360 compatible)

use dimscope_common::OrderedBox;
use dxf::enums::AcadVersion;
use dxf::{entities::*, Color, Drawing, LwPolylineVertex};
use std::path::Path;
use tracing::info;

use crate::error::{MeasureError, Result};

/// Export boxes to a DXF file
/// Coordinates must already be in physical units; one layer per object
pub fn export_dxf(boxes: &[OrderedBox], output_path: &Path) -> Result<()> {
    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2010;

    for (idx, b) in boxes.iter().enumerate() {
        let mut polyline = LwPolyline::default();

        // DXF's Y axis points up; image rows grow downward
        for corner in &b.corners {
            polyline.vertices.push(LwPolylineVertex {
                x: corner.x,
                y: -corner.y,
                ..Default::default()
            });
        }
        polyline.set_is_closed(true);

        let mut common = EntityCommon::default();
        common.layer = format!("OBJECT-{}", idx);
        common.color = Color::from_index(7); // White/Black (default)

        drawing.add_entity(Entity {
            common,
            specific: EntityType::LwPolyline(polyline),
        });
    }

    drawing
        .save_file(output_path)
        .map_err(|e| MeasureError::export(output_path, e))?;

    info!("Exported {} box(es) to DXF: {}", boxes.len(), output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimscope_common::Point2D;

    #[test]
    fn writes_closed_polylines() {
        let dir = std::env::temp_dir().join(format!("dimscope-dxf-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("boxes.dxf");

        let b = OrderedBox {
            corners: [
                Point2D::new(0.0, 0.0),
                Point2D::new(10.0, 0.0),
                Point2D::new(10.0, 5.0),
                Point2D::new(0.0, 5.0),
            ],
        };
        export_dxf(&[b], &path).unwrap();

        let drawing = Drawing::load_file(&path).unwrap();
        let polylines: Vec<_> = drawing
            .entities()
            .filter_map(|e| match &e.specific {
                EntityType::LwPolyline(p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(polylines.len(), 1);
        assert_eq!(polylines[0].vertices.len(), 4);
        assert!(polylines[0].is_closed());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_an_export_error() {
        let err = export_dxf(&[], Path::new("/no/such/dir/boxes.dxf")).unwrap_err();
        assert!(matches!(err, MeasureError::Export { .. }));
    }
}
