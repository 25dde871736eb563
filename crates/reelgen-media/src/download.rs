//! Post metadata and video retrieval using yt-dlp.
//!
//! The retrieval tool is a black box: it either prints one JSON record for a
//! post or writes one local video file. `PostSource` is the seam the
//! pipeline depends on, so tests can substitute a fake.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::TempFileGuard;

/// Default metadata extraction timeout.
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// Parallel fragment downloads for segmented streams.
const CONCURRENT_FRAGMENTS: &str = "5";

/// Tool-level retries on transient failures.
const FETCH_RETRIES: &str = "2";

/// Suffixes yt-dlp may append to the output path while a download is in
/// flight.
pub const DOWNLOAD_SIDECAR_SUFFIXES: [&str; 2] = [".part", ".ytdl"];

/// Source of post metadata and post video.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fetch the raw metadata record for a post.
    async fn fetch_metadata(&self, url: &str) -> MediaResult<Value>;

    /// Download the post's video to `output_path`, preferring mp4 at or
    /// below `max_height`, within `timeout`.
    async fn fetch_video(
        &self,
        url: &str,
        max_height: u32,
        output_path: &Path,
        timeout: Duration,
    ) -> MediaResult<()>;
}

/// yt-dlp backed post source.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    metadata_timeout: Duration,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TIMEOUT)
    }
}

impl YtDlp {
    pub fn new(metadata_timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            metadata_timeout,
        }
    }

    /// Run `program` instead of the `yt-dlp` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> MediaResult<Command> {
        let program = which::which(&self.program).map_err(|_| MediaError::YtDlpNotFound)?;
        Ok(Command::new(program))
    }
}

/// `path` with `suffix` appended to the full file name, so
/// `temp_video.mp4` becomes `temp_video.mp4.part`.
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl PostSource for YtDlp {
    async fn fetch_metadata(&self, url: &str) -> MediaResult<Value> {
        let mut cmd = self.command()?;
        debug!(url = %url, "Extracting post metadata with yt-dlp");

        cmd.args(["--dump-json", "--skip-download", "--no-warnings", url]);

        let output = run_with_timeout(cmd, self.metadata_timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::metadata_failed(format!(
                "yt-dlp failed: {}",
                last_line(&stderr)
            )));
        }

        parse_metadata_output(&output.stdout)
    }

    async fn fetch_video(
        &self,
        url: &str,
        max_height: u32,
        output_path: &Path,
        timeout: Duration,
    ) -> MediaResult<()> {
        let mut cmd = self.command()?;

        info!(
            url = %url,
            max_height = max_height,
            output = %output_path.display(),
            "Downloading post video"
        );

        // Removed on every exit path, including a timeout kill.
        let _sidecars: Vec<TempFileGuard> = DOWNLOAD_SIDECAR_SUFFIXES
            .iter()
            .map(|suffix| TempFileGuard::new(sidecar_path(output_path, suffix)))
            .collect();

        let format = video_format_selector(max_height);
        cmd.args([
            "--no-playlist",
            "--no-warnings",
            "--no-part",
            "-f",
            format.as_str(),
            "--concurrent-fragments",
            CONCURRENT_FRAGMENTS,
            "--retries",
            FETCH_RETRIES,
            "-o",
        ])
        .arg(output_path)
        .arg(url);

        let output = run_with_timeout(cmd, timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            return Err(MediaError::download_failed(format!(
                "yt-dlp failed: {}",
                last_line(&stderr)
            )));
        }

        if !output_path.exists() {
            return Err(MediaError::download_failed("Output file not created"));
        }

        let file_size = output_path.metadata()?.len();
        info!(
            output = %output_path.display(),
            size_mb = file_size as f64 / (1024.0 * 1024.0),
            "Downloaded video successfully"
        );

        Ok(())
    }
}

/// Format selector preferring mp4 at or below the height ceiling.
pub fn video_format_selector(max_height: u32) -> String {
    format!("best[ext=mp4][height<={}]/best[ext=mp4]/best", max_height)
}

/// Parse `--dump-json` output. Some extractors print one record per line;
/// the first line is the post itself.
pub(crate) fn parse_metadata_output(stdout: &[u8]) -> MediaResult<Value> {
    let text = String::from_utf8_lossy(stdout);
    let first = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| MediaError::metadata_failed("yt-dlp printed no metadata"))?;

    let value: Value = serde_json::from_str(first)
        .map_err(|e| MediaError::metadata_failed(format!("unparseable metadata: {}", e)))?;

    if !value.is_object() {
        return Err(MediaError::metadata_failed("metadata record is not an object"));
    }
    Ok(value)
}

async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> MediaResult<Output> {
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => {
            warn!("yt-dlp timed out after {:?}, killing process", timeout);
            Err(MediaError::Timeout(timeout.as_secs()))
        }
    }
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_format_selector() {
        assert_eq!(
            video_format_selector(720),
            "best[ext=mp4][height<=720]/best[ext=mp4]/best"
        );
    }

    #[test]
    fn test_parse_metadata_output_takes_first_record() {
        let stdout = b"\n{\"id\": \"1\", \"uploader\": \"A\"}\n{\"id\": \"2\"}\n";
        let value = parse_metadata_output(stdout).unwrap();
        assert_eq!(value["id"], "1");
    }

    #[test]
    fn test_parse_metadata_output_rejects_garbage() {
        assert!(parse_metadata_output(b"").is_err());
        assert!(parse_metadata_output(b"ERROR: private post").is_err());
        assert!(parse_metadata_output(b"[1, 2]").is_err());
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nERROR: gone\n\n"), "ERROR: gone");
        assert_eq!(last_line(""), "Unknown error");
    }

    #[test]
    fn test_sidecar_path_keeps_extension() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/temp_video_1.mp4"), ".part"),
            PathBuf::from("/tmp/temp_video_1.mp4.part")
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let ytdlp = YtDlp::default().with_program("/nonexistent/yt-dlp");
        let err = ytdlp
            .fetch_metadata("https://x.com/a/status/1")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::YtDlpNotFound));
    }

    #[cfg(unix)]
    mod stub_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Shell stand-in for yt-dlp. `--dump-json` prints a record; a
        /// download writes `<out>.part` and `<out>.ytdl`, then runs `tail`.
        fn write_stub(dir: &Path, tail: &str) -> PathBuf {
            let path = dir.join("yt-dlp-stub");
            let script = format!(
                r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "--dump-json" ]; then
    echo '{{"id": "1", "uploader_id": "a"}}'
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
                tail
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn leftovers(dir: &TempDir) -> Vec<String> {
            std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .filter(|name| name != "yt-dlp-stub")
                .collect()
        }

        #[tokio::test]
        async fn test_stub_metadata_is_parsed() {
            let dir = TempDir::new().unwrap();
            let ytdlp = YtDlp::default().with_program(write_stub(dir.path(), "exit 0"));

            let value = ytdlp.fetch_metadata("https://x.com/a/status/1").await.unwrap();
            assert_eq!(value["uploader_id"], "a");
        }

        #[tokio::test]
        async fn test_failed_download_removes_sidecars() {
            let dir = TempDir::new().unwrap();
            let stub = write_stub(dir.path(), "echo 'ERROR: HTTP Error 403' >&2\nexit 1");
            let ytdlp = YtDlp::default().with_program(stub);
            let output = dir.path().join("temp_video_1.mp4");

            let err = ytdlp
                .fetch_video("https://x.com/a/status/1", 720, &output, Duration::from_secs(30))
                .await
                .unwrap_err();

            assert!(matches!(err, MediaError::DownloadFailed { .. }), "{:?}", err);
            assert!(err.to_string().contains("HTTP Error 403"));
            assert!(leftovers(&dir).is_empty(), "{:?}", leftovers(&dir));
        }

        #[tokio::test]
        async fn test_timed_out_download_removes_sidecars() {
            let dir = TempDir::new().unwrap();
            let ytdlp = YtDlp::default().with_program(write_stub(dir.path(), "sleep 30"));
            let output = dir.path().join("temp_video_2.mp4");

            let err = ytdlp
                .fetch_video(
                    "https://x.com/a/status/1",
                    720,
                    &output,
                    Duration::from_millis(500),
                )
                .await
                .unwrap_err();

            assert!(matches!(err, MediaError::Timeout(_)), "{:?}", err);
            assert!(leftovers(&dir).is_empty(), "{:?}", leftovers(&dir));
        }
    }
}
