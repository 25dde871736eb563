//! Run configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reelgen_media::{AvatarConfig, ComposeConfig, EmojiConfig};

/// Configuration for one pipeline, built once and passed down explicitly.
#[derive(Debug, Clone)]
pub struct ReelConfig {
    /// Directory for artifacts and run-scoped temp files
    pub output_dir: PathBuf,
    /// Wall-clock ceiling for a whole run, checked between stages
    pub max_processing_timeout: Duration,
    /// Timeout for the metadata extraction tool
    pub metadata_timeout: Duration,
    pub avatar: AvatarConfig,
    pub emoji: EmojiConfig,
    pub compose: ComposeConfig,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./downloads"),
            max_processing_timeout: Duration::from_secs(900), // 15 minutes
            metadata_timeout: Duration::from_secs(60),
            avatar: AvatarConfig::default(),
            emoji: EmojiConfig::default(),
            compose: ComposeConfig::default(),
        }
    }
}

impl ReelConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup. Unset or unparseable
    /// values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mut compose = defaults.compose;
        if let Some(preset) = lookup("VIDEO_PRESET").filter(|p| !p.trim().is_empty()) {
            compose.encoding = compose.encoding.with_preset(preset.trim());
        }

        Self {
            output_dir: lookup("REEL_OUTPUT_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_processing_timeout: Duration::from_secs(parse_or(
                &lookup,
                "MAX_PROCESSING_TIMEOUT",
                defaults.max_processing_timeout.as_secs(),
            )),
            metadata_timeout: Duration::from_secs(parse_or(
                &lookup,
                "METADATA_TIMEOUT_SECS",
                defaults.metadata_timeout.as_secs(),
            )),
            avatar: defaults.avatar,
            emoji: defaults.emoji,
            compose,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
