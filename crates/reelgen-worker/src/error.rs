//! Caller-facing error types.

use thiserror::Error;

pub type ReelResult<T> = Result<T, ReelError>;

/// The fatal outcomes of a run.
///
/// `Display` keeps the internal detail for logs. Callers should show
/// [`ReelError::user_message`] instead.
#[derive(Debug, Error)]
pub enum ReelError {
    #[error("Metadata extraction failed: {0}")]
    MetadataExtraction(String),

    #[error("Video fetch failed: {0}")]
    VideoFetch(String),

    #[error("Composition failed: {0}")]
    Compose(String),
}

impl ReelError {
    pub fn metadata_extraction(msg: impl Into<String>) -> Self {
        Self::MetadataExtraction(msg.into())
    }

    pub fn video_fetch(msg: impl Into<String>) -> Self {
        Self::VideoFetch(msg.into())
    }

    pub fn compose(msg: impl Into<String>) -> Self {
        Self::Compose(msg.into())
    }

    /// Fixed message safe to show to the caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            ReelError::MetadataExtraction(_) => "no video found",
            ReelError::VideoFetch(_) => "download failed",
            ReelError::Compose(_) => "composition failed",
        }
    }

    /// Stage name used in logs.
    pub fn stage(&self) -> &'static str {
        match self {
            ReelError::MetadataExtraction(_) => "metadata",
            ReelError::VideoFetch(_) => "fetch",
            ReelError::Compose(_) => "compose",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_hide_detail() {
        let err = ReelError::compose("ffmpeg exited with status 1: Broken pipe");
        assert_eq!(err.user_message(), "composition failed");
        assert!(err.to_string().contains("Broken pipe"));

        assert_eq!(
            ReelError::metadata_extraction("yt-dlp failed").user_message(),
            "no video found"
        );
        assert_eq!(ReelError::video_fetch("timeout").user_message(), "download failed");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ReelError::metadata_extraction("").stage(), "metadata");
        assert_eq!(ReelError::video_fetch("").stage(), "fetch");
        assert_eq!(ReelError::compose("").stage(), "compose");
    }
}
