//! Shared data models for the reelgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Normalized post metadata and the raw-record normalizer
//! - Render options (resolution ceiling, background mode, palette)
//! - Encoding configuration
//! - Caption, timestamp and count formatting helpers

pub mod encoding;
pub mod error;
pub mod options;
pub mod post;
pub mod utils;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use options::{BackgroundMode, BackgroundModeParseError, Palette, Resolution, ResolutionParseError};
pub use post::PostMetadata;
pub use utils::{
    format_count, format_upload_date, is_supported_post_url, normalize_caption,
    MAX_CAPTION_LENGTH,
};
