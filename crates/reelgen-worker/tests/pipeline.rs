//! End-to-end pipeline tests against in-process fakes for the retrieval
//! tool and the media backend.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use reelgen_media::compositor::{DecodeRequest, EncodeRequest, FrameSink, FrameSource};
use reelgen_media::{
    AvatarConfig, AvatarFetcher, ComposeConfig, EmojiConfig, EmojiGlyphCache, EmojiGlyphResolver,
    FontProvider, MediaBackend, MediaError, MediaResult, PostSource, VideoCompositor, VideoInfo,
};
use reelgen_models::{BackgroundMode, EncodingConfig, Resolution};
use reelgen_worker::{ReelConfig, ReelError, ReelPipeline, ReelSummary};
use serde_json::{json, Value};
use tempfile::TempDir;

const POST_URL: &str = "https://x.com/testuser/status/1234567890";

#[derive(Clone, Copy, PartialEq)]
enum FetchBehavior {
    Ok,
    /// Leaves a partial file behind and then fails.
    FailAfterPartialWrite,
    /// Exits cleanly without producing a file.
    NoFile,
}

struct FakeSource {
    metadata: MediaResult<Value>,
    fetch: FetchBehavior,
    requests: Mutex<Vec<(u32, Duration)>>,
}

impl FakeSource {
    fn new(metadata: Value) -> Self {
        Self {
            metadata: Ok(metadata),
            fetch: FetchBehavior::Ok,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing_metadata() -> Self {
        Self {
            metadata: Err(MediaError::metadata_failed("yt-dlp failed: ERROR: No video could be found in this tweet")),
            fetch: FetchBehavior::Ok,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PostSource for FakeSource {
    async fn fetch_metadata(&self, _url: &str) -> MediaResult<Value> {
        match &self.metadata {
            Ok(value) => Ok(value.clone()),
            Err(e) => Err(MediaError::metadata_failed(e.to_string())),
        }
    }

    async fn fetch_video(
        &self,
        _url: &str,
        max_height: u32,
        output_path: &Path,
        timeout: Duration,
    ) -> MediaResult<()> {
        self.requests.lock().unwrap().push((max_height, timeout));
        match self.fetch {
            FetchBehavior::Ok => {
                std::fs::write(output_path, b"video")?;
                Ok(())
            }
            FetchBehavior::FailAfterPartialWrite => {
                std::fs::write(output_path, b"vid")?;
                Err(MediaError::download_failed("yt-dlp failed: HTTP Error 403"))
            }
            FetchBehavior::NoFile => Ok(()),
        }
    }
}

struct FakeBackend {
    info: VideoInfo,
    fail_encode_with_audio: bool,
}

impl FakeBackend {
    fn new(has_audio: bool) -> Self {
        Self {
            info: VideoInfo {
                duration: 2.0,
                width: 1920,
                height: 1080,
                fps: 30.0,
                codec: "h264".to_string(),
                has_audio,
            },
            fail_encode_with_audio: false,
        }
    }
}

struct Frames {
    remaining: usize,
    size: (u32, u32),
}

impl FrameSource for Frames {
    fn next_frame(&mut self) -> MediaResult<Option<RgbaImage>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(RgbaImage::from_pixel(
            self.size.0,
            self.size.1,
            Rgba([30, 60, 90, 255]),
        )))
    }
}

struct FileSink {
    output: PathBuf,
    broken: bool,
}

impl FrameSink for FileSink {
    fn write_frame(&mut self, _frame: &RgbaImage) -> MediaResult<()> {
        if self.broken {
            return Err(MediaError::encoder_io("Broken pipe (os error 32)"));
        }
        std::fs::write(&self.output, b"mp4")?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> MediaResult<()> {
        Ok(())
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(self.info.clone())
    }

    async fn extract_audio(
        &self,
        _source: &Path,
        output: &Path,
        _encoding: &EncodingConfig,
    ) -> MediaResult<()> {
        std::fs::write(output, b"aac")?;
        Ok(())
    }

    fn open_source(&self, request: &DecodeRequest) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(Frames {
            remaining: 2,
            size: (request.width, request.height),
        }))
    }

    fn open_sink(&self, request: &EncodeRequest) -> MediaResult<Box<dyn FrameSink>> {
        Ok(Box::new(FileSink {
            output: request.output.clone(),
            broken: self.fail_encode_with_audio && request.audio.is_some(),
        }))
    }
}

fn record() -> Value {
    json!({
        "id": "1234567890",
        "uploader_id": "testuser",
        "uploader": "Test User",
        "description": "Watch this https://t.co/abc",
        "upload_date": "20260125",
        "like_count": 1500,
        "repost_count": 999,
        "comment_count": null,
        "view_count": 2300000
    })
}

fn pipeline<S: PostSource>(
    dir: &TempDir,
    source: S,
    backend: FakeBackend,
    timeout: Duration,
) -> ReelPipeline<S, FakeBackend> {
    let config = ReelConfig {
        max_processing_timeout: timeout,
        ..ReelConfig::default()
    }
    .with_output_dir(dir.path());

    let emoji =
        EmojiGlyphResolver::new(EmojiConfig::default(), EmojiGlyphCache::default()).unwrap();
    let compositor = VideoCompositor::new(
        backend,
        FontProvider::builtin().unwrap(),
        emoji,
        ComposeConfig::default(),
        dir.path(),
    );

    ReelPipeline::new(
        source,
        AvatarFetcher::new(AvatarConfig::default()).unwrap(),
        compositor,
        config,
    )
}

fn files_in(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_run_produces_artifact_and_metadata() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        &dir,
        FakeSource::new(record()),
        FakeBackend::new(true),
        Duration::from_secs(900),
    );

    let (artifact, metadata) = pipeline
        .run(POST_URL, Resolution::P480, BackgroundMode::Dark)
        .await
        .unwrap();

    assert_eq!(artifact.file_name(), "reel_1234567890.mp4");
    assert!(artifact.path.exists());
    assert!(artifact.has_audio);
    assert!(!artifact.degraded);

    assert_eq!(metadata.username, "testuser");
    assert_eq!(metadata.caption, "Watch this");
    assert_eq!(metadata.timestamp, "Jan 25, 2026");
    assert_eq!(metadata.comments, 0);
    assert_eq!(metadata.post_url, POST_URL);

    let requests = pipeline_requests(&pipeline);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, 480);
    assert!(requests[0].1 <= Duration::from_secs(900));

    assert_eq!(files_in(&dir), vec!["reel_1234567890.mp4"]);
}

fn pipeline_requests(pipeline: &ReelPipeline<FakeSource, FakeBackend>) -> Vec<(u32, Duration)> {
    pipeline.source().requests.lock().unwrap().clone()
}

#[tokio::test]
async fn test_metadata_failure_is_no_video_found() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        &dir,
        FakeSource::failing_metadata(),
        FakeBackend::new(true),
        Duration::from_secs(900),
    );

    let err = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::MetadataExtraction(_)));
    assert_eq!(err.user_message(), "no video found");
    assert!(pipeline_requests(&pipeline).is_empty());
}

#[tokio::test]
async fn test_non_object_record_is_metadata_error() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        &dir,
        FakeSource::new(json!(["not", "a", "record"])),
        FakeBackend::new(false),
        Duration::from_secs(900),
    );

    let err = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "no video found");
}

#[tokio::test]
async fn test_fetch_failure_removes_partial_download() {
    let dir = TempDir::new().unwrap();
    let mut source = FakeSource::new(record());
    source.fetch = FetchBehavior::FailAfterPartialWrite;
    let pipeline = pipeline(&dir, source, FakeBackend::new(true), Duration::from_secs(900));

    let err = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::VideoFetch(_)));
    assert_eq!(err.user_message(), "download failed");
    assert!(files_in(&dir).is_empty(), "{:?}", files_in(&dir));
}

#[tokio::test]
async fn test_fetch_without_output_file_is_download_failure() {
    let dir = TempDir::new().unwrap();
    let mut source = FakeSource::new(record());
    source.fetch = FetchBehavior::NoFile;
    let pipeline = pipeline(&dir, source, FakeBackend::new(true), Duration::from_secs(900));

    let err = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "download failed");
}

#[tokio::test]
async fn test_compose_failure_is_composition_failed_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let mut backend = FakeBackend::new(true);
    backend.info.height = 0;
    let pipeline = pipeline(&dir, FakeSource::new(record()), backend, Duration::from_secs(900));

    let err = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap_err();

    assert!(matches!(err, ReelError::Compose(_)));
    assert_eq!(err.user_message(), "composition failed");
    assert!(files_in(&dir).is_empty(), "{:?}", files_in(&dir));
}

#[tokio::test]
async fn test_encoder_failure_yields_silent_artifact() {
    let dir = TempDir::new().unwrap();
    let mut backend = FakeBackend::new(true);
    backend.fail_encode_with_audio = true;
    let pipeline = pipeline(&dir, FakeSource::new(record()), backend, Duration::from_secs(900));

    let (artifact, _) = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap();

    assert!(artifact.path.exists());
    assert!(!artifact.has_audio);
    assert!(artifact.degraded);
    assert_eq!(files_in(&dir), vec!["reel_1234567890.mp4"]);
}

#[tokio::test]
async fn test_exhausted_deadline_aborts_before_metadata() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        &dir,
        FakeSource::new(record()),
        FakeBackend::new(true),
        Duration::ZERO,
    );

    let err = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "no video found");
    assert!(pipeline_requests(&pipeline).is_empty());
    assert!(files_in(&dir).is_empty());
}

#[tokio::test]
async fn test_summary_formats_counts() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        &dir,
        FakeSource::new(record()),
        FakeBackend::new(false),
        Duration::from_secs(900),
    );

    let (artifact, metadata) = pipeline
        .run(POST_URL, Resolution::P720, BackgroundMode::Light)
        .await
        .unwrap();
    let summary = ReelSummary::new(&artifact, &metadata).await;

    assert_eq!(summary.post_id, "1234567890");
    assert_eq!(summary.file_name, "reel_1234567890.mp4");
    assert_eq!(summary.likes, "1.5K");
    assert_eq!(summary.retweets, "999");
    assert_eq!(summary.views, "2.3M");
    assert!(!summary.has_audio);
    assert!(summary.file_size_mb >= 0.0);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["username"], "testuser");
}

/// Runs the real `YtDlp` source against a shell stand-in for the tool that
/// leaves yt-dlp's in-flight sidecar files next to the requested output.
#[cfg(unix)]
mod stub_ytdlp {
    use super::*;
    use reelgen_media::YtDlp;
    use std::os::unix::fs::PermissionsExt;

    fn write_stub(dir: &Path, after_partial_write: &str) -> PathBuf {
        let path = dir.join("yt-dlp");
        let script = format!(
            r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "--dump-json" ]; then
    echo '{{"id": "1234567890", "uploader_id": "testuser", "description": "hi"}}'
    exit 0
  fi
done
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
printf 'partial' > "$out.part"
printf '{{}}' > "$out.ytdl"
{}
"#,
            after_partial_write
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_failed_ytdlp_download_leaves_no_temp_files() {
        let tool_dir = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let source = YtDlp::default().with_program(write_stub(tool_dir.path(), "exit 1"));
        let pipeline = pipeline(&dir, source, FakeBackend::new(true), Duration::from_secs(900));

        let err = pipeline
            .run(POST_URL, Resolution::P720, BackgroundMode::Light)
            .await
            .unwrap_err();

        assert!(matches!(err, ReelError::VideoFetch(_)), "{:?}", err);
        assert_eq!(err.user_message(), "download failed");
        assert!(files_in(&dir).is_empty(), "{:?}", files_in(&dir));
    }

    #[tokio::test]
    async fn test_killed_ytdlp_download_leaves_no_temp_files() {
        let tool_dir = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let source = YtDlp::default().with_program(write_stub(tool_dir.path(), "sleep 30"));
        let pipeline = pipeline(&dir, source, FakeBackend::new(true), Duration::from_secs(2));

        let err = pipeline
            .run(POST_URL, Resolution::P720, BackgroundMode::Light)
            .await
            .unwrap_err();

        assert!(matches!(err, ReelError::VideoFetch(_)), "{:?}", err);
        assert!(files_in(&dir).is_empty(), "{:?}", files_in(&dir));
    }
}
