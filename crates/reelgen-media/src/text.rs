//! Width-aware wrapping and mixed font/emoji drawing.
//!
//! Measurement and drawing share one per-character advance rule
//! ([`TextStyle::advance`]), so the wrapped lines are exactly as wide as
//! what ends up on the canvas.

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{imageops, Rgba, RgbaImage};

use crate::emoji::{is_zero_width, GlyphSet};

/// Maximum number of lines `wrap` returns.
pub const MAX_WRAPPED_LINES: usize = 6;

/// A font face at a pixel size in a color.
#[derive(Clone)]
pub struct TextStyle {
    font: FontArc,
    size: u32,
    color: Rgba<u8>,
}

impl std::fmt::Debug for TextStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStyle")
            .field("size", &self.size)
            .field("color", &self.color)
            .finish()
    }
}

impl TextStyle {
    /// `size` is the em size in pixels; emoji bitmaps are drawn at the same size.
    pub fn new(font: FontArc, size: u32, color: [u8; 4]) -> Self {
        Self {
            font,
            size,
            color: Rgba(color),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    /// ab_glyph scales by ascent-to-descent height; convert from em size.
    fn scale(&self) -> PxScale {
        let em = self.size as f32;
        match self.font.units_per_em() {
            Some(upem) if upem > 0.0 => PxScale::from(em * self.font.height_unscaled() / upem),
            _ => PxScale::from(em),
        }
    }

    /// Horizontal advance of one character.
    pub fn advance(&self, c: char, glyphs: &GlyphSet) -> f32 {
        if is_zero_width(c) {
            return 0.0;
        }
        if let Some(glyph) = glyphs.get(c, self.size) {
            return glyph.width() as f32;
        }
        let scaled = self.font.as_scaled(self.scale());
        scaled.h_advance(self.font.glyph_id(c))
    }

    /// Width of a run of text.
    pub fn measure(&self, text: &str, glyphs: &GlyphSet) -> f32 {
        text.chars().map(|c| self.advance(c, glyphs)).sum()
    }
}

/// Split text into alternating runs of whitespace and non-whitespace.
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, c) in text.char_indices() {
        let space = c.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                tokens.push(&text[start..idx]);
                start = idx;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Greedily wrap `text` into lines no wider than `max_width`.
///
/// Original spacing inside a line is preserved; whitespace at a break is
/// dropped. A token wider than `max_width` gets a line to itself. Line
/// breaks in the text always start a new line. At most `max_lines` lines
/// are returned and the rest of the text is dropped.
pub fn wrap(
    text: &str,
    style: &TextStyle,
    glyphs: &GlyphSet,
    max_width: f32,
    max_lines: usize,
) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut width = 0.0f32;

    for token in tokenize(text) {
        if lines.len() >= max_lines {
            break;
        }

        if token.starts_with(char::is_whitespace) {
            if token.contains('\n') {
                close_line(&mut current, &mut width, &mut lines);
            } else if !current.is_empty() {
                current.push_str(token);
                width += style.measure(token, glyphs);
            }
            continue;
        }

        let token_width = style.measure(token, glyphs);
        if current.is_empty() {
            current.push_str(token);
            width = token_width;
        } else if width + token_width <= max_width {
            current.push_str(token);
            width += token_width;
        } else {
            close_line(&mut current, &mut width, &mut lines);
            current.push_str(token);
            width = token_width;
        }
    }

    close_line(&mut current, &mut width, &mut lines);
    lines.truncate(max_lines);
    lines
}

fn close_line(current: &mut String, width: &mut f32, lines: &mut Vec<String>) {
    let line = current.trim_end();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
    current.clear();
    *width = 0.0;
}

/// Draw text with emoji bitmaps where available and font glyphs elsewhere.
///
/// `(x, y)` is the top-left of the line box. Returns the horizontal
/// distance advanced, which always equals `style.measure(text, glyphs)`.
pub fn draw_mixed(
    canvas: &mut RgbaImage,
    text: &str,
    (x, y): (i32, i32),
    style: &TextStyle,
    glyphs: &GlyphSet,
) -> f32 {
    let scale = style.scale();
    let scaled = style.font.as_scaled(scale);
    let baseline = y as f32 + scaled.ascent();
    let mut cursor = x as f32;

    for c in text.chars() {
        let advance = style.advance(c, glyphs);
        if advance == 0.0 {
            continue;
        }

        if let Some(bitmap) = glyphs.get(c, style.size) {
            imageops::overlay(canvas, bitmap, cursor.round() as i64, y as i64);
        } else if !c.is_whitespace() {
            let glyph = style
                .font
                .glyph_id(c)
                .with_scale_and_position(scale, point(cursor, baseline));
            if let Some(outlined) = style.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, coverage| {
                    let px = bounds.min.x as i32 + gx as i32;
                    let py = bounds.min.y as i32 + gy as i32;
                    blend_coverage(canvas, px, py, style.color, coverage);
                });
            }
        }

        cursor += advance;
    }

    cursor - x as f32
}

/// Source-over blend of a solid color at partial coverage.
fn blend_coverage(canvas: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let src_a = coverage.clamp(0.0, 1.0) * color[3] as f32 / 255.0;
    if src_a <= 0.0 {
        return;
    }

    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    for i in 0..3 {
        let src = color[i] as f32 * src_a;
        let below = dst[i] as f32 * dst_a * (1.0 - src_a);
        dst[i] = ((src + below) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
