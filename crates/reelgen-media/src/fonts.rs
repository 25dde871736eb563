//! Font resolution.
//!
//! Fonts are resolved once per process from a fixed priority list of
//! system font files, with a font compiled into the binary as the last
//! resort. Drawing code only ever sees the resolved [`FontProvider`].

use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Regular-weight font files in priority order.
pub const REGULAR_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Bold font files in priority order.
pub const BOLD_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// Where a resolved font came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    Builtin,
}

/// Resolved regular and bold faces.
#[derive(Clone)]
pub struct FontProvider {
    regular: FontArc,
    bold: FontArc,
    regular_source: FontSource,
    bold_source: FontSource,
}

impl std::fmt::Debug for FontProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontProvider")
            .field("regular", &self.regular_source)
            .field("bold", &self.bold_source)
            .finish()
    }
}

impl FontProvider {
    /// Resolve fonts from the default system candidates.
    pub fn resolve() -> MediaResult<Self> {
        let regular: Vec<PathBuf> = REGULAR_FONT_CANDIDATES.iter().map(PathBuf::from).collect();
        let bold: Vec<PathBuf> = BOLD_FONT_CANDIDATES.iter().map(PathBuf::from).collect();
        Self::from_candidates(&regular, &bold)
    }

    /// Resolve fonts from explicit candidate lists.
    ///
    /// A missing bold face falls back to the regular face before the
    /// built-in font.
    pub fn from_candidates(regular: &[PathBuf], bold: &[PathBuf]) -> MediaResult<Self> {
        let (regular, regular_source) = match first_loadable(regular) {
            Some((font, path)) => (font, FontSource::File(path)),
            None => {
                warn!("No system font found, using built-in font");
                (builtin_font()?, FontSource::Builtin)
            }
        };

        let (bold, bold_source) = match first_loadable(bold) {
            Some((font, path)) => (font, FontSource::File(path)),
            None => (regular.clone(), regular_source.clone()),
        };

        debug!(regular = ?regular_source, bold = ?bold_source, "Resolved fonts");

        Ok(Self {
            regular,
            bold,
            regular_source,
            bold_source,
        })
    }

    /// Provider backed only by the built-in font.
    pub fn builtin() -> MediaResult<Self> {
        let font = builtin_font()?;
        Ok(Self {
            regular: font.clone(),
            bold: font,
            regular_source: FontSource::Builtin,
            bold_source: FontSource::Builtin,
        })
    }

    pub fn font(&self, weight: FontWeight) -> &FontArc {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }

    pub fn source(&self, weight: FontWeight) -> &FontSource {
        match weight {
            FontWeight::Regular => &self.regular_source,
            FontWeight::Bold => &self.bold_source,
        }
    }
}

fn first_loadable(candidates: &[PathBuf]) -> Option<(FontArc, PathBuf)> {
    candidates
        .iter()
        .find_map(|path| load_font_file(path).map(|font| (font, path.clone())))
}

fn load_font_file(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable font file");
            None
        }
    }
}

fn builtin_font() -> MediaResult<FontArc> {
    FontArc::try_from_slice(epaint_default_fonts::UBUNTU_LIGHT)
        .map_err(|e| MediaError::Font(format!("built-in font is invalid: {}", e)))
}
