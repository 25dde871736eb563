//! Render options: source resolution ceiling and background mode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requested source resolution, mapped to a height ceiling for the fetch tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[default]
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub const ALL: &'static [Resolution] = &[
        Resolution::P360,
        Resolution::P480,
        Resolution::P720,
        Resolution::P1080,
    ];

    /// Maximum source height in pixels.
    pub fn max_height(&self) -> u32 {
        match self {
            Resolution::P360 => 360,
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P360 => "360p",
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }

    /// Parse a label, falling back to the default (720p) for unknown values.
    pub fn from_label_or_default(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "360p" | "360" => Ok(Resolution::P360),
            "480p" | "480" => Ok(Resolution::P480),
            "720p" | "720" => Ok(Resolution::P720),
            "1080p" | "1080" => Ok(Resolution::P1080),
            _ => Err(ResolutionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown resolution: {0}")]
pub struct ResolutionParseError(String);

/// Canvas background mode. Picks the canvas color and the text palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMode {
    #[default]
    Light,
    Dark,
}

impl BackgroundMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundMode::Light => "light",
            BackgroundMode::Dark => "dark",
        }
    }

    /// Colors used to paint the canvas and the overlay text.
    pub fn palette(&self) -> Palette {
        match self {
            BackgroundMode::Light => Palette {
                background: [255, 255, 255, 255],
                primary: [0, 0, 0, 255],
                muted: [120, 120, 120, 255],
            },
            BackgroundMode::Dark => Palette {
                background: [0, 0, 0, 255],
                primary: [255, 255, 255, 255],
                muted: [170, 170, 170, 255],
            },
        }
    }
}

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackgroundMode {
    type Err = BackgroundModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" | "white" => Ok(BackgroundMode::Light),
            "dark" | "black" => Ok(BackgroundMode::Dark),
            _ => Err(BackgroundModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown background mode: {0}")]
pub struct BackgroundModeParseError(String);

/// RGBA colors for one background mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Opaque canvas color
    pub background: [u8; 4],
    /// Display name and caption
    pub primary: [u8; 4],
    /// Username and timestamp
    pub muted: [u8; 4],
}
