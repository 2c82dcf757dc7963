use crate::geometry::{BoundingBox, Point};
use crate::style::{PropertyKey, StyleProperties};
use crate::text_metrics;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{PixelPosition, Rotation};

pub const DEFAULT_TEXT_SIZE: f64 = 10.0;
pub const DEFAULT_FACE_NAME: &str = "sans-serif";
const LINE_HEIGHT: f64 = 1.2;
const FALLBACK_ADVANCE: f64 = 0.56;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub codepoint: char,
    /// Zero for glyphs that continue a multi-glyph sequence.
    pub advance: f64,
    /// Unscaled; layouts apply the scale factor.
    pub character_spacing: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLine {
    pub glyphs: Vec<Glyph>,
    pub width: f64,
    pub height: f64,
}

impl TextLine {
    pub fn new(glyphs: Vec<Glyph>, height: f64, scale_factor: f64) -> Self {
        let advancing: Vec<&Glyph> = glyphs.iter().filter(|g| g.advance != 0.0).collect();
        let spacing: f64 = advancing
            .iter()
            .skip(1)
            .map(|g| g.character_spacing * scale_factor)
            .sum();
        let width = advancing.iter().map(|g| g.advance).sum::<f64>() + spacing;
        Self {
            glyphs,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Justify {
    Left,
    #[default]
    Middle,
    Right,
    /// Resolved from the horizontal displacement when measuring.
    Auto,
}

impl FromStr for Justify {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "left" => Ok(Justify::Left),
            "center" | "middle" => Ok(Justify::Middle),
            "right" => Ok(Justify::Right),
            "auto" => Ok(Justify::Auto),
            other => Err(format!("unknown justify alignment '{other}'")),
        }
    }
}

/// One measured text component: lines stacked top to bottom, centered on
/// the origin before displacement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLayout {
    pub lines: Vec<TextLine>,
    pub displacement: PixelPosition,
    pub orientation: Rotation,
    pub justify: Justify,
}

impl TextLayout {
    pub fn width(&self) -> f64 {
        self.lines.iter().map(|l| l.width).fold(0.0, f64::max)
    }

    pub fn height(&self) -> f64 {
        self.lines.iter().map(|l| l.height).sum()
    }

    pub fn glyphs_count(&self) -> usize {
        self.lines.iter().map(|l| l.glyphs.len()).sum()
    }

    /// Envelope of the rotated block, centered on the origin.
    pub fn bounds(&self) -> BoundingBox {
        let hw = self.width() / 2.0;
        let hh = self.height() / 2.0;
        if self.orientation.is_identity() {
            return BoundingBox::new(-hw, -hh, hw, hh);
        }
        let corners = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(x, y)| {
            let p = PixelPosition::new(x, y).rotate(self.orientation);
            Point::new(p.x, p.y)
        });
        BoundingBox::from_points(corners).unwrap_or_default()
    }

    /// Start of a line of `line_width` relative to the block center.
    pub fn jalign_offset(&self, line_width: f64) -> f64 {
        match self.justify {
            Justify::Middle | Justify::Auto => -(line_width / 2.0),
            Justify::Left => -(self.width() / 2.0),
            Justify::Right => self.width() / 2.0 - line_width,
        }
    }
}

/// All components of one text alternative. `text` doubles as the repeat
/// key of the label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBlock {
    pub text: String,
    pub layouts: Vec<TextLayout>,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, layouts: Vec<TextLayout>) -> Self {
        Self {
            text: text.into(),
            layouts,
        }
    }

    pub fn glyphs_count(&self) -> usize {
        self.layouts.iter().map(TextLayout::glyphs_count).sum()
    }

    pub fn repeat_key(&self) -> Option<&str> {
        (!self.text.is_empty()).then_some(self.text.as_str())
    }
}

/// Text format values read from style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFormat {
    pub face_name: String,
    pub size: f64,
    pub line_spacing: f64,
    pub character_spacing: f64,
    pub justify: Justify,
    pub dx: f64,
    pub dy: f64,
    /// Degrees.
    pub orientation: f64,
    /// Skip font lookup and use the average advance.
    pub fast_metrics: bool,
}

impl Default for TextFormat {
    fn default() -> Self {
        Self {
            face_name: DEFAULT_FACE_NAME.to_string(),
            size: DEFAULT_TEXT_SIZE,
            line_spacing: 0.0,
            character_spacing: 0.0,
            justify: Justify::Auto,
            dx: 0.0,
            dy: 0.0,
            orientation: 0.0,
            fast_metrics: false,
        }
    }
}

impl TextFormat {
    pub fn from_style(style: &dyn StyleProperties) -> Self {
        let defaults = TextFormat::default();
        let size = style
            .get(PropertyKey::TextSize)
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
            .unwrap_or(defaults.size);
        let justify = style
            .get_string(PropertyKey::JustifyAlignment)
            .map(|raw| {
                raw.parse().unwrap_or_else(|err: String| {
                    tracing::warn!(%err, "using auto justification");
                    Justify::Auto
                })
            })
            .unwrap_or(defaults.justify);
        Self {
            face_name: style
                .get_string(PropertyKey::FaceName)
                .filter(|f| !f.trim().is_empty())
                .unwrap_or(defaults.face_name),
            size,
            line_spacing: style.get_f64(PropertyKey::LineSpacing),
            character_spacing: style.get_f64(PropertyKey::CharacterSpacing),
            justify,
            dx: style.get_f64(PropertyKey::Dx),
            dy: style.get_f64(PropertyKey::Dy),
            orientation: style.get_f64(PropertyKey::Orientation),
            fast_metrics: false,
        }
    }

    pub fn with_fast_metrics(mut self, fast_metrics: bool) -> Self {
        self.fast_metrics = fast_metrics;
        self
    }

    fn resolved_justify(&self) -> Justify {
        match self.justify {
            Justify::Auto if self.dx > 0.0 => Justify::Left,
            Justify::Auto if self.dx < 0.0 => Justify::Right,
            Justify::Auto => Justify::Middle,
            other => other,
        }
    }
}

/// Measure `text` into a single-component block.
pub fn measure_block(text: &str, format: &TextFormat, scale_factor: f64) -> TextBlock {
    let font_size = format.size * scale_factor;
    let line_height = font_size * LINE_HEIGHT + format.line_spacing * scale_factor;
    let lines = split_lines(text)
        .into_iter()
        .map(|line| {
            let advances = glyph_advances(&line, font_size, format);
            let glyphs = line
                .chars()
                .zip(advances)
                .map(|(codepoint, advance)| Glyph {
                    codepoint,
                    advance,
                    character_spacing: format.character_spacing,
                })
                .collect();
            TextLine::new(glyphs, line_height, scale_factor)
        })
        .collect();
    let layout = TextLayout {
        lines,
        displacement: PixelPosition::new(format.dx, format.dy) * scale_factor,
        orientation: Rotation::from_degrees(format.orientation),
        justify: format.resolved_justify(),
    };
    TextBlock::new(text, vec![layout])
}

pub(super) fn split_lines(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

fn glyph_advances(line: &str, font_size: f64, format: &TextFormat) -> Vec<f64> {
    let count = line.chars().count();
    if !format.fast_metrics
        && let Some(advances) =
            text_metrics::glyph_advances(line, font_size as f32, format.face_name.as_str())
        && advances.len() == count
    {
        return advances.into_iter().map(f64::from).collect();
    }
    vec![font_size * FALLBACK_ADVANCE; count]
}
