//! Video encoding configuration.
//!
//! Defaults are biased towards encode speed: reels are short, viewed on
//! phones, and re-encoded again by the destination platform.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "ultrafast";
/// Default CRF (higher is faster and smaller)
pub const DEFAULT_CRF: u8 = 30;
/// Default target video bitrate
pub const DEFAULT_VIDEO_BITRATE: &str = "1500k";
/// Default rate-control buffer
pub const DEFAULT_BUFSIZE: &str = "3000k";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Default output frame rate
pub const DEFAULT_FPS: u32 = 24;
/// Default GOP size (two seconds at 24 fps)
pub const DEFAULT_GOP: u32 = 48;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "ultrafast", "veryfast")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Target and max video bitrate
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// Rate-control buffer size
    #[serde(default = "default_bufsize")]
    pub bufsize: String,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Keyframe interval in frames
    #[serde(default = "default_gop")]
    pub gop: u32,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_video_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}
fn default_bufsize() -> String {
    DEFAULT_BUFSIZE.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_gop() -> u32 {
    DEFAULT_GOP
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            video_bitrate: DEFAULT_VIDEO_BITRATE.to_string(),
            bufsize: DEFAULT_BUFSIZE.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            fps: DEFAULT_FPS,
            gop: DEFAULT_GOP,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Video encoder arguments (codec, rate control, speed flags).
    pub fn video_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-c:v".into(),
            self.codec.clone(),
            "-preset".into(),
            self.preset.clone(),
            "-tune".into(),
            "fastdecode".into(),
            "-profile:v".into(),
            "baseline".into(),
            "-level".into(),
            "3.0".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-crf".into(),
            self.crf.to_string(),
            "-b:v".into(),
            self.video_bitrate.clone(),
            "-maxrate".into(),
            self.video_bitrate.clone(),
            "-bufsize".into(),
            self.bufsize.clone(),
            "-g".into(),
            self.gop.to_string(),
            "-sc_threshold".into(),
            "0".into(),
        ];
        args.extend(self.extra_args.clone());
        args
    }

    /// Audio encoder arguments.
    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".into(),
            self.audio_codec.clone(),
            "-b:a".into(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Container arguments.
    pub fn container_args(&self) -> Vec<String> {
        vec![
            "-movflags".into(),
            "+faststart".into(),
            "-max_muxing_queue_size".into(),
            "4096".into(),
        ]
    }

    /// Convert to FFmpeg output arguments, with or without an audio stream.
    pub fn to_ffmpeg_args(&self, with_audio: bool) -> Vec<String> {
        let mut args = self.video_args();
        if with_audio {
            args.extend(self.audio_args());
        } else {
            args.push("-an".into());
        }
        args.extend(self.container_args());
        args
    }
}
