//! Per-frame transforms applied to the scaled video.

use image::RgbaImage;

/// A pure frame-to-frame transform, applied identically to every decoded frame.
pub trait FrameTransform: Send + Sync {
    fn apply(&self, frame: RgbaImage) -> RgbaImage;
}

/// Rounded-rectangle alpha mask with anti-aliased corners.
///
/// Coverage is precomputed once for the frame size; applying the mask
/// multiplies each pixel's alpha by its coverage.
#[derive(Debug, Clone)]
pub struct RoundedCornerMask {
    width: u32,
    height: u32,
    radius: u32,
    coverage: Vec<u8>,
}

impl RoundedCornerMask {
    /// Radius is clamped to half the shorter side.
    pub fn new(width: u32, height: u32, radius: u32) -> Self {
        let radius = radius.min(width / 2).min(height / 2);
        let mut coverage = vec![255u8; width as usize * height as usize];

        if radius > 0 {
            let r = radius as f32;
            for y in 0..height {
                for x in 0..width {
                    let cx = corner_center(x, width, radius);
                    let cy = corner_center(y, height, radius);
                    let (Some(cx), Some(cy)) = (cx, cy) else {
                        continue;
                    };
                    let dx = x as f32 + 0.5 - cx;
                    let dy = y as f32 + 0.5 - cy;
                    let distance = (dx * dx + dy * dy).sqrt();
                    let alpha = (r - distance + 0.5).clamp(0.0, 1.0);
                    coverage[(y * width + x) as usize] = (alpha * 255.0).round() as u8;
                }
            }
        }

        Self {
            width,
            height,
            radius,
            coverage,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Coverage at a pixel, 0 (masked) to 255 (opaque).
    pub fn coverage_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.coverage[(y * self.width + x) as usize]
    }
}

/// Center coordinate of the corner arc covering `pos`, if `pos` is in a corner band.
fn corner_center(pos: u32, extent: u32, radius: u32) -> Option<f32> {
    if pos < radius {
        Some(radius as f32)
    } else if pos >= extent - radius {
        Some((extent - radius) as f32)
    } else {
        None
    }
}

impl FrameTransform for RoundedCornerMask {
    fn apply(&self, mut frame: RgbaImage) -> RgbaImage {
        let width = frame.width().min(self.width);
        let height = frame.height().min(self.height);

        for y in 0..height {
            for x in 0..width {
                let coverage = self.coverage[(y * self.width + x) as usize];
                if coverage == 255 {
                    continue;
                }
                let pixel = frame.get_pixel_mut(x, y);
                pixel[3] = ((pixel[3] as u16 * coverage as u16 + 127) / 255) as u8;
            }
        }

        frame
    }
}
