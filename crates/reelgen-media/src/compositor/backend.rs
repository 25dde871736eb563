//! Media backend: probing, audio extraction and raw-frame pipes.
//!
//! Decoding and encoding run as `ffmpeg` child processes exchanging raw
//! RGBA frames over stdio. The traits here are the seam the compositor is
//! written against; [`FfmpegBackend`] is the production implementation.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use reelgen_models::EncodingConfig;
use tracing::{debug, warn};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};

/// Decode a source video into frames of a fixed size and rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Encode composed frames, optionally muxing an audio side-file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio: Option<PathBuf>,
    pub encoding: EncodingConfig,
}

/// Pull-based stream of decoded frames.
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> MediaResult<Option<RgbaImage>>;
}

/// Push-based encoder input.
pub trait FrameSink: Send {
    /// Write one frame. Pipe failures are reported as [`MediaError::EncoderIo`].
    fn write_frame(&mut self, frame: &RgbaImage) -> MediaResult<()>;

    /// Close the input and wait for the output file to be finalized.
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Extract the source's audio track to `output`.
    async fn extract_audio(
        &self,
        source: &Path,
        output: &Path,
        encoding: &EncodingConfig,
    ) -> MediaResult<()>;

    fn open_source(&self, request: &DecodeRequest) -> MediaResult<Box<dyn FrameSource>>;

    fn open_sink(&self, request: &EncodeRequest) -> MediaResult<Box<dyn FrameSink>>;
}

/// ffmpeg/ffprobe backed implementation.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    command_timeout: Duration,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl FfmpegBackend {
    /// `command_timeout` bounds one-shot commands such as audio extraction.
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    async fn extract_audio(
        &self,
        source: &Path,
        output: &Path,
        encoding: &EncodingConfig,
    ) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(source, output)
            .no_video()
            .audio_codec(&encoding.audio_codec)
            .audio_bitrate(&encoding.audio_bitrate);

        FfmpegRunner::new()
            .with_timeout(self.command_timeout.as_secs().max(1))
            .run(&cmd)
            .await
    }

    fn open_source(&self, request: &DecodeRequest) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::spawn(request)?))
    }

    fn open_sink(&self, request: &EncodeRequest) -> MediaResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegFrameSink::spawn(request)?))
    }
}

/// Decoder arguments: scale and resample to the target, emit raw RGBA.
pub fn decode_command(request: &DecodeRequest) -> FfmpegCommand {
    FfmpegCommand::with_sources(request.source.to_string_lossy().to_string(), "pipe:1")
        .no_audio()
        .video_filter(format!(
            "scale={}:{}:flags=bicubic,fps={}",
            request.width, request.height, request.fps
        ))
        .rawvideo_output()
}

/// Encoder arguments: raw RGBA on stdin, optional audio side-file, mp4 out.
pub fn encode_command(request: &EncodeRequest) -> FfmpegCommand {
    let mut cmd =
        FfmpegCommand::rawvideo_stdin(request.width, request.height, request.fps, &request.output);

    if let Some(audio) = &request.audio {
        cmd = cmd.add_input(audio).map("0:v:0").map("1:a:0").shortest();
    }

    cmd.output_args(request.encoding.to_ffmpeg_args(request.audio.is_some()))
        .output_args(["-f", "mp4"])
}

fn spawn_ffmpeg(cmd: &FfmpegCommand, stdin: Stdio, stdout: Stdio) -> MediaResult<Child> {
    check_ffmpeg()?;
    let args = cmd.build_args();
    debug!("Spawning FFmpeg: ffmpeg {}", args.join(" "));

    Command::new("ffmpeg")
        .args(&args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .spawn()
        .map_err(MediaError::from)
}

fn read_stderr(child: &mut Child) -> Option<String> {
    let mut stderr = String::new();
    child.stderr.take()?.read_to_string(&mut stderr).ok()?;
    let stderr = stderr.trim().to_string();
    (!stderr.is_empty()).then_some(stderr)
}

fn kill_child(child: &mut Child) {
    if matches!(child.try_wait(), Ok(None)) {
        let _ = child.kill();
    }
    let _ = child.wait();
}

/// Frames decoded by an ffmpeg child process.
pub struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl FfmpegFrameSource {
    pub fn spawn(request: &DecodeRequest) -> MediaResult<Self> {
        let mut child = spawn_ffmpeg(&decode_command(request), Stdio::null(), Stdio::piped())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("failed to open ffmpeg stdout"))?;

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            width: request.width,
            height: request.height,
            buffer: vec![0u8; request.width as usize * request.height as usize * 4],
        })
    }

    /// Fill the buffer; returns the number of bytes read before EOF.
    fn fill(&mut self) -> MediaResult<usize> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(0);
        };
        let mut filled = 0;
        while filled < self.buffer.len() {
            match stdout.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(MediaError::from(e)),
            }
        }
        Ok(filled)
    }

    fn finish_decoder(&mut self) -> MediaResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let stderr = read_stderr(&mut child);
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg decoder exited with non-zero status",
                stderr,
                status.code(),
            ))
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> MediaResult<Option<RgbaImage>> {
        let filled = self.fill()?;

        if filled < self.buffer.len() {
            if filled > 0 {
                warn!(bytes = filled, "Dropping truncated trailing frame");
            }
            self.finish_decoder()?;
            return Ok(None);
        }

        RgbaImage::from_raw(self.width, self.height, self.buffer.clone())
            .map(Some)
            .ok_or_else(|| MediaError::internal("decoded frame has unexpected size"))
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            kill_child(&mut child);
        }
    }
}

/// Frames encoded by an ffmpeg child process.
pub struct FfmpegFrameSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
}

impl FfmpegFrameSink {
    pub fn spawn(request: &EncodeRequest) -> MediaResult<Self> {
        if let Some(parent) = request.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut child = spawn_ffmpeg(&encode_command(request), Stdio::piped(), Stdio::null())?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("failed to open ffmpeg stdin"))?;

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            width: request.width,
            height: request.height,
        })
    }
}

impl FrameSink for FfmpegFrameSink {
    fn write_frame(&mut self, frame: &RgbaImage) -> MediaResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(MediaError::internal(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MediaError::encoder_io("ffmpeg encoder is already finalized"));
        };

        stdin
            .write_all(frame.as_raw())
            .map_err(|e| MediaError::encoder_io(format!("failed to write frame to ffmpeg stdin: {e}")))
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .flush()
                .map_err(|e| MediaError::encoder_io(format!("failed to flush ffmpeg stdin: {e}")))?;
        }

        let Some(child) = self.child.take() else {
            return Err(MediaError::internal("ffmpeg encoder already finished"));
        };

        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(MediaError::ffmpeg_failed(
                "FFmpeg encoder exited with non-zero status",
                (!stderr.is_empty()).then_some(stderr),
                output.status.code(),
            ))
        }
    }
}

impl Drop for FfmpegFrameSink {
    fn drop(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            kill_child(&mut child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_request(audio: Option<&str>) -> EncodeRequest {
        EncodeRequest {
            output: PathBuf::from("out/reel_1.partial.mp4"),
            width: 1080,
            height: 1920,
            fps: 24,
            audio: audio.map(PathBuf::from),
            encoding: EncodingConfig::default(),
        }
    }

    #[test]
    fn test_decode_command_scales_and_drops_audio() {
        let args = decode_command(&DecodeRequest {
            source: PathBuf::from("temp_video_1.mp4"),
            width: 880,
            height: 495,
            fps: 24,
        })
        .build_args();

        assert!(args.contains(&"scale=880:495:flags=bicubic,fps=24".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"rgba".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[test]
    fn test_encode_command_with_audio_maps_streams() {
        let args = encode_command(&encode_request(Some("temp_audio_1.m4a"))).build_args();

        assert!(args.contains(&"temp_audio_1.m4a".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"aac".to_string()));
        assert!(!args.contains(&"-an".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out/reel_1.partial.mp4"));
    }

    #[test]
    fn test_encode_command_without_audio() {
        let args = encode_command(&encode_request(None)).build_args();

        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-map".to_string()));
        assert!(args.contains(&"1080x1920".to_string()));
        assert!(args.contains(&"libx264".to_string()));
    }
}
