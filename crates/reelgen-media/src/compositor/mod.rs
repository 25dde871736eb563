//! Vertical reel compositing.
//!
//! A reel is built bottom-to-top from a solid background, the scaled and
//! corner-masked source video, and a transparent overlay layer. Frames are
//! decoded, composed and encoded in a streaming loop on a blocking thread.
//!
//! When writing into the encoder fails while audio is attached, the encode
//! is retried exactly once without audio, so the caller gets a silent reel
//! instead of an error.

pub mod backend;
pub mod mask;
pub mod placement;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{imageops, Rgba, RgbaImage};
use reelgen_models::{BackgroundMode, EncodingConfig, PostMetadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::avatar::{AvatarImage, DEFAULT_AVATAR_BORDER, DEFAULT_AVATAR_SIZE};
use crate::emoji::EmojiGlyphResolver;
use crate::error::{MediaError, MediaResult};
use crate::fonts::FontProvider;
use crate::fs_utils::{move_file, TempFileGuard};
use crate::metrics::{record_compose_duration, record_degraded_encode};
use crate::overlay::{build_overlay, render_overlay, LayoutConfig, OverlayStyles};

pub use backend::{
    DecodeRequest, EncodeRequest, FfmpegBackend, FrameSink, FrameSource, MediaBackend,
};
pub use mask::{FrameTransform, RoundedCornerMask};
pub use placement::Placement;

/// Compositor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeConfig {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Minimum gap between the video and each side of the canvas
    pub horizontal_margin: u32,
    /// Sources taller than this are scaled down before placement
    pub processing_height_cap: u32,
    pub corner_radius: u32,
    /// Side of the bordered avatar, reserved in the layout even without one
    pub avatar_block: u32,
    /// Timeout for one-shot ffmpeg commands (audio extraction)
    pub command_timeout: Duration,
    pub layout: LayoutConfig,
    pub encoding: EncodingConfig,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1080,
            canvas_height: 1920,
            horizontal_margin: 100,
            processing_height_cap: 720,
            corner_radius: 24,
            avatar_block: DEFAULT_AVATAR_SIZE + 2 * DEFAULT_AVATAR_BORDER,
            command_timeout: Duration::from_secs(300),
            layout: LayoutConfig::default(),
            encoding: EncodingConfig::default(),
        }
    }
}

/// The composed reel on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReelArtifact {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Source duration in seconds
    pub duration: f64,
    pub frames: u64,
    pub has_audio: bool,
    /// Whether audio was dropped after an encoder failure
    pub degraded: bool,
}

impl ReelArtifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Overlay layer split into horizontal bands that contain visible pixels,
/// so fully transparent rows are never blended.
#[derive(Debug, Clone)]
pub struct PreparedOverlay {
    bands: Vec<(u32, RgbaImage)>,
}

impl PreparedOverlay {
    pub fn new(layer: &RgbaImage) -> Self {
        let (width, height) = layer.dimensions();
        let row_visible = |y: u32| (0..width).any(|x| layer.get_pixel(x, y)[3] > 0);

        let mut bands = Vec::new();
        let mut y = 0;
        while y < height {
            if !row_visible(y) {
                y += 1;
                continue;
            }
            let start = y;
            while y < height && row_visible(y) {
                y += 1;
            }
            let band = imageops::crop_imm(layer, 0, start, width, y - start).to_image();
            bands.push((start, band));
        }

        Self { bands }
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn draw_onto(&self, canvas: &mut RgbaImage) {
        for (y, band) in &self.bands {
            imageops::overlay(canvas, band, 0, *y as i64);
        }
    }
}

/// Everything the frame loop needs, shared with the blocking thread.
struct RenderJob {
    source: PathBuf,
    output: PathBuf,
    placement: Placement,
    background: RgbaImage,
    overlay: PreparedOverlay,
    mask: RoundedCornerMask,
    fps: u32,
    encoding: EncodingConfig,
}

/// Compose one frame: background, masked video, overlay.
pub fn compose_frame(
    background: &RgbaImage,
    video_frame: &RgbaImage,
    placement: &Placement,
    overlay: &PreparedOverlay,
) -> RgbaImage {
    let mut canvas = background.clone();
    imageops::overlay(&mut canvas, video_frame, placement.x as i64, placement.y as i64);
    overlay.draw_onto(&mut canvas);
    canvas
}

fn run_frame_loop<B: MediaBackend + ?Sized>(
    backend: &B,
    job: &RenderJob,
    audio: Option<&Path>,
) -> MediaResult<u64> {
    let mut source = backend.open_source(&DecodeRequest {
        source: job.source.clone(),
        width: job.placement.width,
        height: job.placement.height,
        fps: job.fps,
    })?;

    let mut sink = backend.open_sink(&EncodeRequest {
        output: job.output.clone(),
        width: job.background.width(),
        height: job.background.height(),
        fps: job.fps,
        audio: audio.map(Path::to_path_buf),
        encoding: job.encoding.clone(),
    })?;

    let mut frames = 0u64;
    while let Some(frame) = source.next_frame()? {
        let frame = job.mask.apply(frame);
        let composed = compose_frame(&job.background, &frame, &job.placement, &job.overlay);
        sink.write_frame(&composed)?;
        frames += 1;
    }

    if frames == 0 {
        return Err(MediaError::InvalidVideo("no frames decoded".to_string()));
    }

    sink.finish()?;
    Ok(frames)
}

/// Builds reels from a downloaded source video and post metadata.
pub struct VideoCompositor<B: MediaBackend + 'static> {
    backend: Arc<B>,
    fonts: FontProvider,
    emoji: EmojiGlyphResolver,
    config: ComposeConfig,
    output_dir: PathBuf,
}

impl<B: MediaBackend + 'static> VideoCompositor<B> {
    pub fn new(
        backend: B,
        fonts: FontProvider,
        emoji: EmojiGlyphResolver,
        config: ComposeConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend: Arc::new(backend),
            fonts,
            emoji,
            config,
            output_dir: output_dir.into(),
        }
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Compose the reel for `metadata` from `source`.
    ///
    /// Takes ownership of the source video guard, so the source file is
    /// removed when this returns, whatever the outcome. The artifact is
    /// written to a partial path and only moved to its final name on
    /// success. Intermediate names carry a per-call run id, so concurrent
    /// calls for the same post never share a side-file.
    pub async fn compose(
        &self,
        source: TempFileGuard,
        avatar: Option<&AvatarImage>,
        metadata: &PostMetadata,
        mode: BackgroundMode,
    ) -> MediaResult<ReelArtifact> {
        let started = Instant::now();
        let canvas = (self.config.canvas_width, self.config.canvas_height);

        let info = self.backend.probe(source.path()).await?;
        if !info.has_valid_dimensions() {
            return Err(MediaError::UnsupportedFormat(format!(
                "source video has zero dimension ({}x{})",
                info.width, info.height
            )));
        }
        info!(
            width = info.width,
            height = info.height,
            duration = info.duration,
            has_audio = info.has_audio,
            "Probed source video"
        );

        let placement = Placement::compute(
            (info.width, info.height),
            canvas,
            self.config.horizontal_margin,
            self.config.processing_height_cap,
        )?;
        debug!(?placement, "Computed video placement");

        let palette = mode.palette();
        let styles = OverlayStyles::new(&self.fonts, &self.config.layout, &palette);
        let glyphs = self.emoji.preload(&styles.glyph_requests(metadata)).await;
        let avatar_block = avatar.map(AvatarImage::size).unwrap_or(self.config.avatar_block);
        let layout = build_overlay(
            metadata,
            &placement,
            canvas,
            avatar_block,
            avatar.is_some(),
            &styles,
            &glyphs,
            &self.config.layout,
        );
        let overlay = render_overlay(&layout, avatar, &styles, &glyphs);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let run_id = Uuid::new_v4();
        let final_path = self.output_dir.join(metadata.artifact_file_name());
        let partial = TempFileGuard::new(self.output_dir.join(format!(
            "reel_{}.{}.partial.mp4",
            metadata.file_safe_id(),
            run_id
        )));

        let audio = if info.has_audio {
            self.extract_audio(source.path(), metadata, run_id).await
        } else {
            None
        };

        let job = Arc::new(RenderJob {
            source: source.path().to_path_buf(),
            output: partial.path().to_path_buf(),
            placement,
            background: RgbaImage::from_pixel(canvas.0, canvas.1, Rgba(palette.background)),
            overlay: PreparedOverlay::new(&overlay),
            mask: RoundedCornerMask::new(placement.width, placement.height, self.config.corner_radius),
            fps: self.config.encoding.fps,
            encoding: self.config.encoding.clone(),
        });

        let audio_path = audio.as_ref().map(|guard| guard.path().to_path_buf());
        let (frames, has_audio, degraded) = match self.render(Arc::clone(&job), audio_path.clone()).await {
            Ok(frames) => (frames, audio_path.is_some(), false),
            Err(e) if e.is_encoder_io() => {
                warn!(error = %e, "Encoder I/O failed, retrying once without audio");
                // Only losing audio counts as degraded.
                let dropped_audio = audio_path.is_some();
                if dropped_audio {
                    record_degraded_encode();
                }
                if let Some(guard) = &audio {
                    guard.remove();
                }
                partial.remove();
                let frames = self.render(job, None).await?;
                (frames, false, dropped_audio)
            }
            Err(e) => return Err(e),
        };

        move_file(partial.path(), &final_path).await?;

        let elapsed = started.elapsed().as_secs_f64();
        record_compose_duration(elapsed, degraded);
        info!(
            output = %final_path.display(),
            frames = frames,
            has_audio = has_audio,
            degraded = degraded,
            elapsed_secs = elapsed,
            "Reel composed"
        );

        Ok(ReelArtifact {
            path: final_path,
            width: canvas.0,
            height: canvas.1,
            duration: info.duration,
            frames,
            has_audio,
            degraded,
        })
    }

    /// Extract audio to a guarded side-file. Failure means a silent reel.
    async fn extract_audio(
        &self,
        source: &Path,
        metadata: &PostMetadata,
        run_id: Uuid,
    ) -> Option<TempFileGuard> {
        let guard = TempFileGuard::new(self.output_dir.join(format!(
            "temp_audio_{}_{}.m4a",
            metadata.file_safe_id(),
            run_id
        )));

        match self
            .backend
            .extract_audio(source, guard.path(), &self.config.encoding)
            .await
        {
            Ok(()) => Some(guard),
            Err(e) => {
                warn!(error = %e, "Audio extraction failed, composing without audio");
                None
            }
        }
    }

    async fn render(&self, job: Arc<RenderJob>, audio: Option<PathBuf>) -> MediaResult<u64> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || run_frame_loop(backend.as_ref(), &job, audio.as_deref()))
            .await
            .map_err(|e| MediaError::internal(format!("render task failed: {}", e)))?
    }
}
