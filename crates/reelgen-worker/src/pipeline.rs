//! End-to-end reel pipeline.
//!
//! One run goes metadata → normalize → avatar → video fetch → compose.
//! Metadata, fetch and compose failures are fatal and map onto
//! [`ReelError`]; avatar failures are absorbed. The run's wall-clock budget
//! is checked between stages, never inside one.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use reelgen_media::{
    file_size_mb, AvatarFetcher, EmojiGlyphCache, EmojiGlyphResolver, FfmpegBackend, FontProvider,
    MediaBackend, MediaResult, PostSource, ReelArtifact, TempFileGuard, VideoCompositor, YtDlp,
};
use reelgen_models::{format_count, BackgroundMode, PostMetadata, Resolution};
use serde::Serialize;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::ReelConfig;
use crate::error::{ReelError, ReelResult};
use crate::logging::RunLogger;

/// Wall-clock budget for one run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    /// Time left, or `None` once the budget is spent.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget
            .checked_sub(self.elapsed())
            .filter(|left| !left.is_zero())
    }
}

/// Orchestrates one reel per [`ReelPipeline::run`] call.
pub struct ReelPipeline<S: PostSource, B: MediaBackend + 'static> {
    source: S,
    avatars: AvatarFetcher,
    compositor: VideoCompositor<B>,
    config: ReelConfig,
}

impl ReelPipeline<YtDlp, FfmpegBackend> {
    /// Production pipeline: yt-dlp, ffmpeg, system fonts and the
    /// process-wide emoji cache.
    pub fn from_config(config: ReelConfig) -> MediaResult<Self> {
        let fonts = FontProvider::resolve()?;
        let emoji = EmojiGlyphResolver::new(config.emoji.clone(), EmojiGlyphCache::shared())?;
        let avatars = AvatarFetcher::new(config.avatar.clone())?;
        let compositor = VideoCompositor::new(
            FfmpegBackend::new(config.compose.command_timeout),
            fonts,
            emoji,
            config.compose.clone(),
            config.output_dir.clone(),
        );

        Ok(Self::new(
            YtDlp::new(config.metadata_timeout),
            avatars,
            compositor,
            config,
        ))
    }
}

impl<S: PostSource, B: MediaBackend + 'static> ReelPipeline<S, B> {
    pub fn new(
        source: S,
        avatars: AvatarFetcher,
        compositor: VideoCompositor<B>,
        config: ReelConfig,
    ) -> Self {
        Self {
            source,
            avatars,
            compositor,
            config,
        }
    }

    pub fn config(&self) -> &ReelConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Produce the reel for `url`.
    pub async fn run(
        &self,
        url: &str,
        resolution: Resolution,
        mode: BackgroundMode,
    ) -> ReelResult<(ReelArtifact, PostMetadata)> {
        let logger = RunLogger::new(url, "metadata");
        let span = logger.create_span();

        let result = self
            .run_stages(&logger, resolution, mode)
            .instrument(span)
            .await;

        if let Err(e) = &result {
            logger.for_stage(e.stage()).log_error(&e.to_string());
        }
        result
    }

    async fn run_stages(
        &self,
        logger: &RunLogger,
        resolution: Resolution,
        mode: BackgroundMode,
    ) -> ReelResult<(ReelArtifact, PostMetadata)> {
        let url = logger.post_url();
        let deadline = Deadline::new(self.config.max_processing_timeout);

        // Metadata
        if deadline.is_expired() {
            return Err(ReelError::metadata_extraction(
                "processing deadline exceeded before metadata extraction",
            ));
        }
        logger.log_start("extracting post metadata");
        let raw = self
            .source
            .fetch_metadata(url)
            .await
            .map_err(|e| ReelError::metadata_extraction(e.to_string()))?;
        let metadata = PostMetadata::normalize(&raw, url)
            .map_err(|e| ReelError::metadata_extraction(e.to_string()))?;
        info!(
            post_id = %metadata.post_id,
            username = %metadata.username,
            caption_len = metadata.caption.chars().count(),
            "Normalized post metadata"
        );

        // Avatar
        let logger = logger.for_stage("avatar");
        let avatar = if deadline.is_expired() {
            logger.log_warning("deadline reached, skipping avatar");
            None
        } else {
            self.avatars
                .prepare(&metadata.avatar_url, &metadata.username)
                .await
        };
        if avatar.is_none() {
            logger.log_progress("continuing without avatar");
        }

        // Video fetch
        let logger = logger.for_stage("fetch");
        let remaining = deadline.remaining().ok_or_else(|| {
            ReelError::video_fetch("processing deadline exceeded before video fetch")
        })?;
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| ReelError::video_fetch(format!("cannot create output directory: {}", e)))?;

        let video = TempFileGuard::new(
            self.config
                .output_dir
                .join(format!("temp_video_{}.mp4", Uuid::new_v4())),
        );
        logger.log_start(&format!("fetching video at {}", resolution));
        self.source
            .fetch_video(url, resolution.max_height(), video.path(), remaining)
            .await
            .map_err(|e| ReelError::video_fetch(e.to_string()))?;
        if !video.exists() {
            return Err(ReelError::video_fetch("fetch tool produced no file"));
        }

        // Compose
        let logger = logger.for_stage("compose");
        if deadline.is_expired() {
            return Err(ReelError::compose(
                "processing deadline exceeded before composition",
            ));
        }
        logger.log_start(&format!("composing with {} background", mode));
        let artifact = self
            .compositor
            .compose(video, avatar.as_ref(), &metadata, mode)
            .await
            .map_err(|e| ReelError::compose(e.to_string()))?;

        if artifact.degraded {
            logger.log_warning("audio dropped after encoder failure");
        }
        logger.log_completion(&format!(
            "{} in {:.1}s",
            artifact.file_name(),
            deadline.elapsed().as_secs_f64()
        ));

        Ok((artifact, metadata))
    }
}

/// Caller-facing summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReelSummary {
    pub post_id: String,
    pub username: String,
    pub display_name: String,
    pub caption: String,
    pub timestamp: String,
    pub file_name: String,
    pub path: PathBuf,
    pub file_size_mb: f64,
    pub has_audio: bool,
    pub degraded: bool,
    pub likes: String,
    pub retweets: String,
    pub comments: String,
    pub views: String,
}

impl ReelSummary {
    pub async fn new(artifact: &ReelArtifact, metadata: &PostMetadata) -> Self {
        let file_size_mb = file_size_mb(&artifact.path).await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read artifact size");
            0.0
        });

        Self {
            post_id: metadata.post_id.clone(),
            username: metadata.username.clone(),
            display_name: metadata.display_name.clone(),
            caption: metadata.caption.clone(),
            timestamp: metadata.timestamp.clone(),
            file_name: artifact.file_name(),
            path: artifact.path.clone(),
            file_size_mb,
            has_audio: artifact.has_audio,
            degraded: artifact.degraded,
            likes: format_count(metadata.likes),
            retweets: format_count(metadata.retweets),
            comments: format_count(metadata.comments),
            views: format_count(metadata.views),
        }
    }
}
