#![deny(unreachable_patterns)]
//! Media side of reel generation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a timeout-bounded runner
//! - Post metadata and video acquisition through yt-dlp
//! - Avatar and emoji glyph acquisition over HTTP
//! - Font resolution, mixed text/emoji measurement and wrapping
//! - Overlay layout and the streaming frame compositor

pub mod avatar;
pub mod command;
pub mod compositor;
pub mod download;
pub mod emoji;
pub mod error;
pub mod fonts;
pub mod fs_utils;
pub mod http;
pub mod metrics;
pub mod overlay;
pub mod probe;
pub mod text;

pub use avatar::{mask_avatar, AvatarConfig, AvatarFetcher, AvatarImage};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use compositor::{
    ComposeConfig, FfmpegBackend, MediaBackend, Placement, ReelArtifact, RoundedCornerMask,
    VideoCompositor,
};
pub use download::{PostSource, YtDlp};
pub use emoji::{EmojiConfig, EmojiGlyphCache, EmojiGlyphResolver, GlyphSet};
pub use error::{MediaError, MediaResult};
pub use fonts::{FontProvider, FontWeight};
pub use fs_utils::{file_size_mb, move_file, TempFileGuard};
pub use overlay::{build_overlay, render_overlay, CaptionHeight, LayoutConfig, OverlayLayout};
pub use probe::{probe_video, VideoInfo};
pub use text::{wrap, TextStyle};
