//! Avatar acquisition and circular masking.
//!
//! Avatar failures never abort a run: every path that cannot produce a
//! bitmap logs a warning and returns `None`, and the overlay is laid out
//! without the avatar column.

use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_ellipse_mut;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::http::{build_client, is_image_response};
use crate::metrics::record_avatar_unavailable;

/// Avatar diameter in pixels (before the border).
pub const DEFAULT_AVATAR_SIZE: u32 = 80;
/// Border width in pixels on each side.
pub const DEFAULT_AVATAR_BORDER: u32 = 3;

/// Avatar fetcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Avatar diameter S
    pub size: u32,
    /// Border width B
    pub border: u32,
    /// Border canvas color (opaque)
    pub border_color: [u8; 4],
    /// Timeout for the final avatar download
    pub download_timeout: Duration,
    /// Timeout for each CDN probe
    pub probe_timeout: Duration,
    /// Avatar CDN bases, probed in order as `{base}/{username}`
    pub cdn_bases: Vec<String>,
    /// Hosts whose URLs are profile pages rather than images
    pub platform_hosts: Vec<String>,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_AVATAR_SIZE,
            border: DEFAULT_AVATAR_BORDER,
            border_color: [255, 255, 255, 255],
            download_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(10),
            cdn_bases: vec![
                "https://unavatar.io/twitter".to_string(),
                "https://avatar.vercel.app/twitter".to_string(),
            ],
            platform_hosts: vec!["x.com".to_string(), "twitter.com".to_string()],
        }
    }
}

impl AvatarConfig {
    /// Side of the bordered avatar canvas (`S + 2B`).
    pub fn total_size(&self) -> u32 {
        self.size + 2 * self.border
    }
}

/// Circular avatar on an opaque square border canvas of side `S + 2B`.
#[derive(Debug, Clone)]
pub struct AvatarImage {
    image: RgbaImage,
}

impl AvatarImage {
    /// Side length of the bordered canvas.
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Mask a decoded avatar into a bordered circle.
pub fn mask_avatar(source: &DynamicImage, size: u32, border: u32, border_color: [u8; 4]) -> AvatarImage {
    let mut avatar = imageops::resize(&source.to_rgba8(), size, size, FilterType::Lanczos3);

    let mut mask = GrayImage::new(size, size);
    let radius = (size / 2) as i32;
    draw_filled_ellipse_mut(&mut mask, (radius, radius), radius, radius, Luma([255u8]));

    for (x, y, pixel) in avatar.enumerate_pixels_mut() {
        let coverage = mask.get_pixel(x, y)[0];
        pixel[3] = pixel[3].min(coverage);
    }

    let total = size + 2 * border;
    let mut canvas = RgbaImage::from_pixel(total, total, Rgba(border_color));
    imageops::overlay(&mut canvas, &avatar, border as i64, border as i64);

    AvatarImage { image: canvas }
}

/// Resolves, downloads and masks post author avatars.
#[derive(Debug, Clone)]
pub struct AvatarFetcher {
    client: Client,
    config: AvatarConfig,
}

impl AvatarFetcher {
    /// Create a fetcher with its own HTTP client.
    pub fn new(config: AvatarConfig) -> MediaResult<Self> {
        let client = build_client(config.download_timeout.max(config.probe_timeout))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a fetcher sharing an existing HTTP client.
    pub fn with_client(client: Client, config: AvatarConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    /// Prepare the bordered circular avatar for a post author.
    ///
    /// `avatar_url` may be a direct image URL or a profile page. Returns
    /// `None` on any failure.
    pub async fn prepare(&self, avatar_url: &str, username: &str) -> Option<AvatarImage> {
        let avatar_url = avatar_url.trim();
        if avatar_url.is_empty() {
            info!("No avatar URL provided, continuing without avatar");
            record_avatar_unavailable("empty_url");
            return None;
        }

        let bytes = match self.resolve_bytes(avatar_url, username).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %avatar_url, error = %e, "Avatar unavailable");
                record_avatar_unavailable("download");
                return None;
            }
        };

        match image::load_from_memory(&bytes) {
            Ok(decoded) => {
                debug!(width = decoded.width(), height = decoded.height(), "Decoded avatar");
                Some(mask_avatar(
                    &decoded,
                    self.config.size,
                    self.config.border,
                    self.config.border_color,
                ))
            }
            Err(e) => {
                warn!(url = %avatar_url, error = %e, "Avatar could not be decoded");
                record_avatar_unavailable("decode");
                None
            }
        }
    }

    /// Fetch avatar bytes, going through the CDN probes for profile URLs.
    async fn resolve_bytes(&self, avatar_url: &str, username: &str) -> MediaResult<Vec<u8>> {
        if self.is_profile_url(avatar_url) && has_username(username) {
            debug!(username = %username, "Profile URL detected, probing avatar CDNs");
            for candidate in self.cdn_candidates(username) {
                match self.fetch_image(&candidate, self.config.probe_timeout).await {
                    Ok(bytes) => {
                        info!(url = %candidate, "Found avatar on CDN");
                        return Ok(bytes);
                    }
                    Err(e) => debug!(url = %candidate, error = %e, "Avatar CDN probe failed"),
                }
            }
            warn!("No avatar CDN answered with an image, trying original URL");
        }

        self.fetch_image(avatar_url, self.config.download_timeout).await
    }

    /// GET a URL and return the body if it is a 2xx image response.
    async fn fetch_image(&self, url: &str, timeout: Duration) -> MediaResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        if !is_image_response(&response) {
            return Err(MediaError::UnsupportedFormat(format!(
                "{} did not return an image",
                url
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Whether a URL points at a profile page (platform host or not absolute).
    pub fn is_profile_url(&self, avatar_url: &str) -> bool {
        let Ok(parsed) = Url::parse(avatar_url) else {
            return true;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return true;
        }
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let host = host.to_ascii_lowercase();
        self.config
            .platform_hosts
            .iter()
            .any(|platform| host == *platform || host.ends_with(&format!(".{}", platform)))
    }

    /// CDN URLs to probe for a username, in priority order.
    pub fn cdn_candidates(&self, username: &str) -> Vec<String> {
        self.config
            .cdn_bases
            .iter()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), username))
            .collect()
    }
}

fn has_username(username: &str) -> bool {
    let username = username.trim();
    !username.is_empty() && username != reelgen_models::post::UNKNOWN_USERNAME
}
