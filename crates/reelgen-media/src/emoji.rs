//! Emoji glyph resolution.
//!
//! Fonts available to the renderer rarely carry color emoji, so emoji code
//! points are drawn from bitmaps fetched off a glyph CDN keyed by lowercase
//! hex code point. Bitmaps are cached process-wide by `(codepoint, size)`.
//!
//! Rendering is synchronous, so every glyph a run needs is resolved up front
//! into a [`GlyphSet`]; layout and drawing then consult only that set.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_properties::UnicodeEmoji;

use crate::error::{MediaError, MediaResult};
use crate::http::{build_client, is_image_response};
use crate::metrics::{record_glyph_cache_hit, record_glyph_unavailable};

/// Zero-width joiner.
const ZWJ: char = '\u{200D}';
/// Text and emoji presentation selectors.
const VARIATION_SELECTORS: [char; 2] = ['\u{FE0E}', '\u{FE0F}'];

/// Emoji resolver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiConfig {
    /// Base URL; glyphs live at `{cdn_base}/{hex}.png`
    pub cdn_base: String,
    /// Per-glyph fetch timeout
    pub timeout: Duration,
}

impl Default for EmojiConfig {
    fn default() -> Self {
        Self {
            cdn_base: "https://cdn.jsdelivr.net/gh/twitter/twemoji@14.0.2/assets/72x72".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Whether a character is drawn as an emoji bitmap.
pub fn is_emoji(c: char) -> bool {
    !c.is_ascii() && !is_zero_width(c) && c.is_emoji_char()
}

/// Joiners and presentation selectors take no horizontal space.
pub fn is_zero_width(c: char) -> bool {
    c == ZWJ || VARIATION_SELECTORS.contains(&c)
}

/// CDN URL of a glyph bitmap.
pub fn glyph_url(base: &str, c: char) -> String {
    format!("{}/{:x}.png", base.trim_end_matches('/'), c as u32)
}

type CacheMap = HashMap<(u32, u32), Arc<RgbaImage>>;

/// Process-wide `(codepoint, size) -> bitmap` cache.
///
/// Entries are immutable and never evicted. Concurrent misses on the same
/// key may fetch twice; the last insert wins.
#[derive(Debug, Clone, Default)]
pub struct EmojiGlyphCache {
    inner: Arc<RwLock<CacheMap>>,
}

impl EmojiGlyphCache {
    /// The cache shared by every resolver in this process.
    pub fn shared() -> Self {
        static SHARED: OnceLock<EmojiGlyphCache> = OnceLock::new();
        SHARED.get_or_init(EmojiGlyphCache::default).clone()
    }

    pub fn get(&self, c: char, size: u32) -> Option<Arc<RgbaImage>> {
        let map = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(&(c as u32, size)).cloned()
    }

    pub fn insert(&self, c: char, size: u32, glyph: RgbaImage) -> Arc<RgbaImage> {
        let glyph = Arc::new(glyph);
        let mut map = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert((c as u32, size), Arc::clone(&glyph));
        glyph
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Glyph bitmaps resolved for one render, keyed by `(char, size)`.
#[derive(Debug, Clone, Default)]
pub struct GlyphSet {
    glyphs: HashMap<(char, u32), Arc<RgbaImage>>,
}

impl GlyphSet {
    /// Empty set: every emoji falls back to the font.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, c: char, size: u32) -> Option<&RgbaImage> {
        self.glyphs.get(&(c, size)).map(Arc::as_ref)
    }

    pub fn insert(&mut self, c: char, size: u32, glyph: Arc<RgbaImage>) {
        self.glyphs.insert((c, size), glyph);
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// Fetches emoji bitmaps through the shared cache.
#[derive(Debug, Clone)]
pub struct EmojiGlyphResolver {
    client: Client,
    config: EmojiConfig,
    cache: EmojiGlyphCache,
}

impl EmojiGlyphResolver {
    pub fn new(config: EmojiConfig, cache: EmojiGlyphCache) -> MediaResult<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self::with_client(client, config, cache))
    }

    pub fn with_client(client: Client, config: EmojiConfig, cache: EmojiGlyphCache) -> Self {
        Self {
            client,
            config,
            cache,
        }
    }

    /// Resolve one character to a `size`x`size` bitmap.
    ///
    /// Returns `None` for non-emoji characters and on any fetch or decode
    /// failure; the caller draws the character with the font instead.
    pub async fn resolve(&self, c: char, size: u32) -> Option<Arc<RgbaImage>> {
        if !is_emoji(c) || size == 0 {
            return None;
        }

        if let Some(glyph) = self.cache.get(c, size) {
            record_glyph_cache_hit();
            return Some(glyph);
        }

        match self.fetch(c, size).await {
            Ok(glyph) => Some(self.cache.insert(c, size, glyph)),
            Err(e) => {
                warn!(codepoint = %format!("U+{:04X}", c as u32), error = %e, "Emoji glyph unavailable, using font");
                record_glyph_unavailable();
                None
            }
        }
    }

    /// Resolve every emoji in `texts`, each text paired with its font size.
    pub async fn preload(&self, texts: &[(&str, u32)]) -> GlyphSet {
        let mut set = GlyphSet::empty();
        let mut attempted = std::collections::HashSet::new();

        for (text, size) in texts {
            for c in text.chars().filter(|c| is_emoji(*c)) {
                if !attempted.insert((c, *size)) {
                    continue;
                }
                if let Some(glyph) = self.resolve(c, *size).await {
                    set.insert(c, *size, glyph);
                }
            }
        }

        debug!(glyphs = set.len(), "Preloaded emoji glyphs");
        set
    }

    async fn fetch(&self, c: char, size: u32) -> MediaResult<RgbaImage> {
        let url = glyph_url(&self.config.cdn_base, c);
        let response = self
            .client
            .get(&url)
            .timeout(self.config.timeout)
            .send()
            .await?
            .error_for_status()?;

        if !is_image_response(&response) {
            return Err(MediaError::UnsupportedFormat(format!(
                "{} did not return an image",
                url
            )));
        }

        let bytes = response.bytes().await?;
        let decoded = image::load_from_memory(&bytes)?.to_rgba8();
        Ok(imageops::resize(&decoded, size, size, FilterType::Lanczos3))
    }
}
