//! Shared HTTP client for avatar and glyph downloads.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};

use crate::error::MediaResult;

/// Build the HTTP client used for binary downloads.
///
/// Per-request timeouts are set by the caller; `timeout` here is the
/// overall ceiling for any request made through this client.
pub fn build_client(timeout: Duration) -> MediaResult<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .user_agent(concat!("reelgen/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Whether a response declares an image body.
pub fn is_image_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
