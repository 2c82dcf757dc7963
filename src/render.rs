use crate::geometry::BoundingBox;
use crate::layout::{GlyphPositions, PixelPosition};
use crate::scene::{FeatureResult, PlacementReport};
use anyhow::Result;
use std::path::Path;

const BACKGROUND: &str = "#FFFFFF";
const LABEL_STROKE: &str = "#2563EB";
const MARKER_FILL: &str = "#F59E0B";
const GROUP_STROKE: &str = "#059669";
const COLLISION_FILL: &str = "rgba(220,38,38,0.25)";
const TEXT_COLOR: &str = "#111827";

/// Debug preview of a placement pass: inserted boxes, glyph anchors and
/// markers in canvas pixels.
pub fn render_svg(report: &PlacementReport) -> String {
    let mut svg = String::new();
    let width = report.width.max(1.0);
    let height = report.height.max(1.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{BACKGROUND}\"/>"
    ));

    for feature in &report.features {
        match &feature.result {
            FeatureResult::Text { placements } | FeatureResult::Shield { placements } => {
                for label in placements {
                    svg.push_str(&label_svg(label));
                }
            }
            FeatureResult::Group { positions } => {
                for pos in positions {
                    svg.push_str(&format!(
                        "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"2\" fill=\"none\" stroke=\"{GROUP_STROKE}\"/>",
                        pos.x, pos.y
                    ));
                }
            }
            FeatureResult::Collision { boxes } => {
                for bbox in boxes {
                    svg.push_str(&rect_svg(bbox, COLLISION_FILL, "none"));
                }
            }
        }
    }

    svg.push_str("</svg>");
    svg
}

fn label_svg(label: &GlyphPositions) -> String {
    let mut out = String::new();
    for bbox in &label.boxes {
        out.push_str(&rect_svg(bbox, "none", LABEL_STROKE));
    }
    if let Some(marker) = &label.marker {
        let bbox = BoundingBox::from_center(
            marker.pos.x,
            marker.pos.y,
            marker.info.marker.width,
            marker.info.marker.height,
        );
        out.push_str(&rect_svg(&bbox, MARKER_FILL, "none"));
    }
    for glyph in &label.glyphs {
        // glyph offsets grow upwards
        let at = PixelPosition::new(
            label.base_point.x + glyph.pos.x,
            label.base_point.y - glyph.pos.y,
        );
        let rotate = if glyph.rot.is_identity() {
            String::new()
        } else {
            format!(
                " transform=\"rotate({:.2} {:.2} {:.2})\"",
                -glyph.rot.angle().to_degrees(),
                at.x,
                at.y
            )
        };
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"sans-serif\" font-size=\"10\" fill=\"{TEXT_COLOR}\"{rotate}>{}</text>",
            at.x,
            at.y,
            escape_xml(&glyph.codepoint.to_string())
        ));
    }
    out
}

fn rect_svg(bbox: &BoundingBox, fill: &str, stroke: &str) -> String {
    format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"0.8\"/>",
        bbox.minx,
        bbox.miny,
        bbox.width(),
        bbox.height()
    )
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, width: f64, height: f64) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "sans-serif".to_string();
    if let Some(size) = usvg::Size::from_wh(width as f32, height as f32) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementConfig;
    use crate::scene::parse_scene;

    #[test]
    fn render_svg_draws_labels_and_footprints() {
        let scene = parse_scene(
            r#"{
                "width": 120, "height": 80,
                "features": [
                    {"geometry": {"type": "point", "coordinates": [30, 40]}, "text": "A&B"},
                    {"geometry": {"type": "point", "coordinates": [90, 40]}, "symbolizer": "collision"}
                ]
            }"#,
            false,
        )
        .expect("parse");
        let config = PlacementConfig {
            fast_text_metrics: true,
            ..PlacementConfig::default()
        };
        let svg = render_svg(&scene.place(&config));
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("&amp;"));
        assert!(svg.contains(COLLISION_FILL));
        assert_eq!(svg.matches("<text").count(), 3);
    }
}
