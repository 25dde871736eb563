//! Video placement on the portrait canvas.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Scaled video rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Fit a source video inside the canvas, leaving `margin` on both sides.
    ///
    /// Sources taller than `height_cap` are first scaled down to the cap,
    /// truncating to whole pixels; the fit scale is then
    /// `min(available_width / w, canvas_height / h)` and the result is
    /// centered.
    pub fn compute(
        source: (u32, u32),
        canvas: (u32, u32),
        margin: u32,
        height_cap: u32,
    ) -> MediaResult<Self> {
        let (source_w, source_h) = source;
        let (canvas_w, canvas_h) = canvas;

        if source_w == 0 || source_h == 0 {
            return Err(MediaError::UnsupportedFormat(format!(
                "source video has zero dimension ({}x{})",
                source_w, source_h
            )));
        }

        let available_w = canvas_w.saturating_sub(2 * margin);
        if available_w == 0 || canvas_h == 0 {
            return Err(MediaError::internal(format!(
                "canvas {}x{} leaves no room for margin {}",
                canvas_w, canvas_h, margin
            )));
        }

        let (mut w, mut h) = (source_w as u64, source_h as u64);
        if height_cap > 0 && h > height_cap as u64 {
            w = (w * height_cap as u64 / h).max(1);
            h = height_cap as u64;
        }

        let scale = f64::min(available_w as f64 / w as f64, canvas_h as f64 / h as f64);
        // Truncate, absorbing float error so an exact fit is not lost by one pixel.
        let width = ((w as f64 * scale + 1e-6) as u32).clamp(1, available_w);
        let height = ((h as f64 * scale + 1e-6) as u32).clamp(1, canvas_h);

        Ok(Self {
            x: (canvas_w - width) / 2,
            y: (canvas_h - height) / 2,
            width,
            height,
        })
    }
}
