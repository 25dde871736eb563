//! Overlay layout and rendering.
//!
//! The overlay sits above the video: author block (avatar, display name,
//! handle), then the caption directly above the video, and the post date in
//! the canvas's bottom margin. Layout is computed as plain data first and
//! rendered into a transparent layer in a second step.

use image::{imageops, RgbaImage};
use reelgen_models::{Palette, PostMetadata};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::avatar::AvatarImage;
use crate::compositor::placement::Placement;
use crate::emoji::GlyphSet;
use crate::fonts::{FontProvider, FontWeight};
use crate::text::{draw_mixed, wrap, TextStyle, MAX_WRAPPED_LINES};

/// How the caption block height is determined for placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionHeight {
    /// Wrap first, then place using the real line count.
    #[default]
    Measured,
    /// Place using `ceil(chars / chars_per_line)` lines, independent of the
    /// wrap. The rendered caption may overlap or leave a gap.
    Estimated,
}

/// Overlay geometry and type sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub display_name_size: u32,
    pub username_size: u32,
    pub caption_size: u32,
    pub timestamp_size: u32,
    pub caption_line_height: u32,
    pub caption_margin_above_video: u32,
    pub avatar_margin_above_caption: u32,
    /// Gap between the avatar and the name column
    pub text_gap_after_avatar: u32,
    pub display_name_offset: u32,
    pub username_offset: u32,
    /// Distance of the timestamp from the canvas bottom
    pub bottom_margin: u32,
    pub max_caption_lines: usize,
    pub caption_height: CaptionHeight,
    /// Characters per line assumed by [`CaptionHeight::Estimated`]
    pub estimated_chars_per_line: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            display_name_size: 26,
            username_size: 22,
            caption_size: 28,
            timestamp_size: 20,
            caption_line_height: 38,
            caption_margin_above_video: 30,
            avatar_margin_above_caption: 20,
            text_gap_after_avatar: 12,
            display_name_offset: 5,
            username_offset: 35,
            bottom_margin: 100,
            max_caption_lines: MAX_WRAPPED_LINES,
            caption_height: CaptionHeight::Measured,
            estimated_chars_per_line: 50,
        }
    }
}

/// Which overlay element a line of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    DisplayName,
    Username,
    Caption,
    Timestamp,
}

/// One line of text at its top-left position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedText {
    pub role: TextRole,
    pub text: String,
    pub x: i32,
    pub y: i32,
}

/// Positioned overlay elements for one canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Top-left of the avatar, when one is drawn
    pub avatar: Option<(i32, i32)>,
    pub texts: Vec<PlacedText>,
}

impl OverlayLayout {
    pub fn lines(&self, role: TextRole) -> impl Iterator<Item = &PlacedText> {
        self.texts.iter().filter(move |t| t.role == role)
    }
}

/// Text styles for each overlay role.
#[derive(Debug, Clone)]
pub struct OverlayStyles {
    pub display_name: TextStyle,
    pub username: TextStyle,
    pub caption: TextStyle,
    pub timestamp: TextStyle,
}

impl OverlayStyles {
    pub fn new(fonts: &FontProvider, config: &LayoutConfig, palette: &Palette) -> Self {
        let regular = fonts.font(FontWeight::Regular);
        let bold = fonts.font(FontWeight::Bold);
        Self {
            display_name: TextStyle::new(bold.clone(), config.display_name_size, palette.primary),
            username: TextStyle::new(regular.clone(), config.username_size, palette.muted),
            caption: TextStyle::new(regular.clone(), config.caption_size, palette.primary),
            timestamp: TextStyle::new(regular.clone(), config.timestamp_size, palette.muted),
        }
    }

    /// Every text the overlay will draw, paired with its size, for glyph preloading.
    pub fn glyph_requests<'a>(&self, metadata: &'a PostMetadata) -> Vec<(&'a str, u32)> {
        vec![
            (metadata.display_name.as_str(), self.display_name.size()),
            (metadata.username.as_str(), self.username.size()),
            (metadata.caption.as_str(), self.caption.size()),
            (metadata.timestamp.as_str(), self.timestamp.size()),
        ]
    }

    fn for_role(&self, role: TextRole) -> &TextStyle {
        match role {
            TextRole::DisplayName => &self.display_name,
            TextRole::Username => &self.username,
            TextRole::Caption => &self.caption,
            TextRole::Timestamp => &self.timestamp,
        }
    }
}

/// Lay out the overlay relative to the placed video.
///
/// `avatar_block` is the side of the bordered avatar canvas. The author
/// block reserves that height even when no avatar is drawn; without an
/// avatar the name column starts at the video's left edge.
#[allow(clippy::too_many_arguments)]
pub fn build_overlay(
    metadata: &PostMetadata,
    placement: &Placement,
    canvas: (u32, u32),
    avatar_block: u32,
    has_avatar: bool,
    styles: &OverlayStyles,
    glyphs: &GlyphSet,
    config: &LayoutConfig,
) -> OverlayLayout {
    let (canvas_width, canvas_height) = canvas;
    let video_x = placement.x as i32;
    let video_y = placement.y as i32;
    let line_height = config.caption_line_height as i32;

    let caption_lines = if metadata.caption.is_empty() {
        Vec::new()
    } else {
        wrap(
            &metadata.caption,
            &styles.caption,
            glyphs,
            placement.width as f32,
            config.max_caption_lines,
        )
    };

    let caption_rows = match config.caption_height {
        CaptionHeight::Measured => caption_lines.len(),
        CaptionHeight::Estimated => {
            let estimated = estimate_caption_lines(&metadata.caption, config.estimated_chars_per_line);
            if estimated != caption_lines.len() {
                debug!(
                    estimated = estimated,
                    wrapped = caption_lines.len(),
                    "Caption height estimate differs from wrapped line count"
                );
            }
            estimated
        }
    };
    let caption_height = caption_rows as i32 * line_height;

    let caption_y = video_y - config.caption_margin_above_video as i32 - caption_height;
    let caption_x = video_x;

    let avatar_y = caption_y - avatar_block as i32 - config.avatar_margin_above_caption as i32;
    let avatar_x = video_x;

    let text_x = if has_avatar {
        avatar_x + avatar_block as i32 + config.text_gap_after_avatar as i32
    } else {
        avatar_x
    };

    let mut texts = vec![
        PlacedText {
            role: TextRole::DisplayName,
            text: metadata.display_name.clone(),
            x: text_x,
            y: avatar_y + config.display_name_offset as i32,
        },
        PlacedText {
            role: TextRole::Username,
            text: metadata.handle(),
            x: text_x,
            y: avatar_y + config.username_offset as i32,
        },
    ];

    texts.extend(caption_lines.into_iter().enumerate().map(|(i, line)| PlacedText {
        role: TextRole::Caption,
        text: line,
        x: caption_x,
        y: caption_y + i as i32 * line_height,
    }));

    if !metadata.timestamp.is_empty() {
        texts.push(PlacedText {
            role: TextRole::Timestamp,
            text: metadata.timestamp.clone(),
            x: video_x,
            y: canvas_height as i32 - config.bottom_margin as i32,
        });
    }

    OverlayLayout {
        canvas_width,
        canvas_height,
        avatar: has_avatar.then_some((avatar_x, avatar_y)),
        texts,
    }
}

/// Length heuristic: `ceil(chars / chars_per_line)`.
pub fn estimate_caption_lines(caption: &str, chars_per_line: usize) -> usize {
    let chars = caption.chars().count();
    chars.div_ceil(chars_per_line.max(1))
}

/// Render a layout into a transparent RGBA layer.
pub fn render_overlay(
    layout: &OverlayLayout,
    avatar: Option<&AvatarImage>,
    styles: &OverlayStyles,
    glyphs: &GlyphSet,
) -> RgbaImage {
    let mut layer = RgbaImage::new(layout.canvas_width, layout.canvas_height);

    if let (Some((x, y)), Some(avatar)) = (layout.avatar, avatar) {
        imageops::overlay(&mut layer, avatar.as_image(), x as i64, y as i64);
    }

    for placed in &layout.texts {
        draw_mixed(
            &mut layer,
            &placed.text,
            (placed.x, placed.y),
            styles.for_role(placed.role),
            glyphs,
        );
    }

    layer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::mask_avatar;
    use image::{DynamicImage, Rgba};
    use reelgen_models::BackgroundMode;
    use serde_json::json;

    const CANVAS: (u32, u32) = (1080, 1920);
    const AVATAR_BLOCK: u32 = 86;

    fn placement() -> Placement {
        Placement {
            x: 100,
            y: 712,
            width: 880,
            height: 495,
        }
    }

    fn metadata(caption: &str) -> PostMetadata {
        let record = json!({
            "uploader_id": "testuser",
            "uploader": "Test User",
            "description": caption,
            "upload_date": "20260125",
            "id": "1"
        });
        PostMetadata::normalize(&record, "https://x.com/testuser/status/1").unwrap()
    }

    fn styles() -> OverlayStyles {
        let fonts = FontProvider::builtin().unwrap();
        OverlayStyles::new(&fonts, &LayoutConfig::default(), &BackgroundMode::Light.palette())
    }

    fn layout_for(caption: &str, has_avatar: bool, config: &LayoutConfig) -> OverlayLayout {
        build_overlay(
            &metadata(caption),
            &placement(),
            CANVAS,
            AVATAR_BLOCK,
            has_avatar,
            &styles(),
            &GlyphSet::empty(),
            config,
        )
    }

    fn first(layout: &OverlayLayout, role: TextRole) -> PlacedText {
        layout.lines(role).next().cloned().unwrap()
    }

    #[test]
    fn test_measured_layout_positions() {
        let layout = layout_for("first line\nsecond line", true, &LayoutConfig::default());

        let captions: Vec<_> = layout.lines(TextRole::Caption).collect();
        assert_eq!(captions.len(), 2);
        // 712 - 30 - 2 * 38
        assert_eq!((captions[0].x, captions[0].y), (100, 606));
        assert_eq!(captions[1].y, 644);

        // 606 - 86 - 20
        assert_eq!(layout.avatar, Some((100, 500)));

        let name = first(&layout, TextRole::DisplayName);
        assert_eq!((name.x, name.y), (198, 505));
        assert_eq!(name.text, "Test User");

        let handle = first(&layout, TextRole::Username);
        assert_eq!((handle.x, handle.y), (198, 535));
        assert_eq!(handle.text, "@testuser");

        let timestamp = first(&layout, TextRole::Timestamp);
        assert_eq!((timestamp.x, timestamp.y), (100, 1820));
        assert_eq!(timestamp.text, "Jan 25, 2026");
    }

    #[test]
    fn test_no_avatar_text_starts_at_video_edge() {
        let layout = layout_for("caption", false, &LayoutConfig::default());

        assert_eq!(layout.avatar, None);
        assert_eq!(first(&layout, TextRole::DisplayName).x, 100);
        assert_eq!(first(&layout, TextRole::Username).x, 100);
    }

    #[test]
    fn test_estimated_strategy_uses_length_heuristic() {
        let config = LayoutConfig {
            caption_height: CaptionHeight::Estimated,
            ..LayoutConfig::default()
        };
        // The estimate is ceil(120 / 50) = 3 lines whatever the wrap produces.
        let caption = "x".repeat(120);
        let layout = layout_for(&caption, true, &config);

        let caption_y = first(&layout, TextRole::Caption).y;
        assert_eq!(caption_y, 712 - 30 - 3 * 38);
    }

    #[test]
    fn test_empty_caption_has_no_caption_lines() {
        let layout = layout_for("", true, &LayoutConfig::default());
        assert_eq!(layout.lines(TextRole::Caption).count(), 0);
        // Caption block collapses: 712 - 30 - 0 - 86 - 20
        assert_eq!(layout.avatar, Some((100, 576)));
    }

    #[test]
    fn test_long_caption_is_capped() {
        let caption = (0..60).map(|i| format!("w{i}")).collect::<Vec<_>>().join("\n");
        let layout = layout_for(&caption, true, &LayoutConfig::default());
        assert_eq!(layout.lines(TextRole::Caption).count(), 6);
    }

    #[test]
    fn test_estimate_caption_lines() {
        assert_eq!(estimate_caption_lines("", 50), 0);
        assert_eq!(estimate_caption_lines(&"a".repeat(50), 50), 1);
        assert_eq!(estimate_caption_lines(&"a".repeat(51), 50), 2);
    }

    #[test]
    fn test_render_overlay_places_avatar_and_leaves_rest_transparent() {
        let styles = styles();
        let layout = layout_for("caption", true, &LayoutConfig::default());
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 200, 0, 255])));
        let avatar = mask_avatar(&source, 80, 3, [255, 255, 255, 255]);

        let layer = render_overlay(&layout, Some(&avatar), &styles, &GlyphSet::empty());

        let (ax, ay) = layout.avatar.unwrap();
        assert_eq!(layer.dimensions(), CANVAS);
        assert_eq!(layer.get_pixel(ax as u32, ay as u32), &Rgba([255, 255, 255, 255]));
        assert_eq!(layer.get_pixel(ax as u32 + 43, ay as u32 + 43), &Rgba([0, 200, 0, 255]));
        assert_eq!(layer.get_pixel(1079, 0)[3], 0);
        assert_eq!(layer.get_pixel(540, 1000)[3], 0);
    }
}
