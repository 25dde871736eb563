//! Filesystem helpers: scoped temporary files and cross-device moves.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Owns a temporary file path and deletes the file when dropped.
///
/// Every exit path of a run, success or failure, passes through `Drop`,
/// so intermediates never outlive the run that created them.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    /// Take ownership of `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Guarded path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the guarded file currently exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Delete the file now instead of waiting for drop.
    pub fn remove(&self) {
        remove_quietly(&self.path);
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        remove_quietly(&self.path);
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed temp file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
    }
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-and-delete on EXDEV. The
/// copy goes to a sibling temp file which is then renamed into place, so
/// readers of `dst` never observe a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = std::fs::remove_file(&tmp_dst);
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// File size in megabytes, rounded to two decimals.
pub async fn file_size_mb(path: impl AsRef<Path>) -> MediaResult<f64> {
    let bytes = fs::metadata(path.as_ref()).await?.len();
    Ok((bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_guard_removes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("temp_video_x.mp4");
        std::fs::write(&path, b"data").unwrap();

        {
            let guard = TempFileGuard::new(&path);
            assert!(guard.exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_guard_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        let guard = TempFileGuard::new(dir.path().join("never_created.m4a"));
        guard.remove();
        drop(guard);
    }

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("reel_1.partial.mp4");
        let dst = dir.path().join("reel_1.mp4");

        fs::write(&src, b"test content").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("nested").join("dest.txt");

        fs::create_dir_all(dst.parent().unwrap()).await.unwrap();
        fs::write(&src, b"new content").await.unwrap();
        fs::write(&dst, b"old content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new content");
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }

    #[tokio::test]
    async fn test_file_size_mb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("one_mb.bin");
        fs::write(&path, vec![0u8; 1024 * 1024]).await.unwrap();
        assert_eq!(file_size_mb(&path).await.unwrap(), 1.0);
    }
}
