//! Filesystem utilities: cross-device moves and atomic file replacement.
//!
//! Moves first try a plain rename and fall back to copy-and-delete on
//! EXDEV. [`replace_atomically`] swaps an export into the original's path
//! without ever leaving the original missing while the new file is absent.

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// The copy fallback writes to a temporary file next to `dst` and renames it
/// into place, so `dst` never holds a partial file.
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
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = sibling_path(dst, "tmp");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        tracing::error!(
            "Failed to rename temp file during cross-device move: {} -> {}: {}",
            tmp_dst.display(),
            dst.display(),
            e
        );
        return Err(MediaError::from(e));
    }

    // Best effort: the move itself succeeded
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Hidden, unique sibling of `path` with the given suffix,
/// e.g. `.C0001.MP4.3f2a9c1e.backup`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tag = Uuid::new_v4().simple().to_string();
    path.with_file_name(format!(".{}.{}.{}", name, &tag[..8], suffix))
}

/// Replace `original` with `replacement`.
///
/// 1. `original` is renamed aside to a backup name in the same directory.
/// 2. `replacement` is moved into `original`'s path.
/// 3. The backup is deleted.
///
/// If step 2 fails the backup is renamed back. The returned
/// [`MediaError::AtomicReplace`] records whether that restore worked; when it
/// did not, the original survives under `backup`.
pub async fn replace_atomically(original: impl AsRef<Path>, replacement: impl AsRef<Path>) -> MediaResult<()> {
    let original = original.as_ref();
    let replacement = replacement.as_ref();

    if !original.exists() {
        return Err(MediaError::FileNotFound(original.to_path_buf()));
    }
    if !replacement.exists() {
        return Err(MediaError::FileNotFound(replacement.to_path_buf()));
    }

    let backup = sibling_path(original, "backup");

    if let Err(e) = fs::rename(original, &backup).await {
        return Err(MediaError::AtomicReplace {
            original: original.to_path_buf(),
            backup,
            restored: true,
            message: format!("could not move original aside: {}", e),
        });
    }

    if let Err(move_err) = move_file(replacement, original).await {
        tracing::error!(
            original = %original.display(),
            backup = %backup.display(),
            "Moving export into place failed, restoring original: {}",
            move_err
        );

        let restored = match fs::rename(&backup, original).await {
            Ok(()) => true,
            Err(restore_err) => {
                tracing::error!(
                    backup = %backup.display(),
                    "Restoring original failed, original kept at backup path: {}",
                    restore_err
                );
                false
            }
        };

        return Err(MediaError::AtomicReplace {
            original: original.to_path_buf(),
            backup,
            restored,
            message: move_err.to_string(),
        });
    }

    if let Err(e) = fs::remove_file(&backup).await {
        tracing::warn!("Failed to remove backup {}: {}", backup.display(), e);
    }

    Ok(())
}

/// Write `contents` to `path` through a temporary sibling and a rename.
pub async fn write_atomically(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> MediaResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = sibling_path(path, "tmp");
    fs::write(&tmp, contents).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(MediaError::from(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists(), "Source file should be removed");
        assert!(dst.exists(), "Destination file should exist");
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_to_subdirectory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("subdir").join("dest.txt");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[tokio::test]
    async fn test_is_cross_device_error() {
        let exdev_error = std::io::Error::from_raw_os_error(18);
        assert!(is_cross_device_error(&exdev_error));

        let not_found = std::io::Error::from_raw_os_error(2);
        assert!(!is_cross_device_error(&not_found));
    }

    #[tokio::test]
    async fn test_replace_atomically() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("C0001.MP4");
        let export = dir.path().join("scratch.mp4");
        fs::write(&original, b"old").await.unwrap();
        fs::write(&export, b"new").await.unwrap();

        replace_atomically(&original, &export).await.unwrap();

        assert_eq!(fs::read_to_string(&original).await.unwrap(), "new");
        assert!(!export.exists());
        // No backup left behind
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_replace_restores_original_when_move_fails() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("C0001.MP4");
        // A directory cannot be renamed over a file, so step 2 fails
        let export = dir.path().join("scratch_dir");
        fs::write(&original, b"old").await.unwrap();
        fs::create_dir(&export).await.unwrap();
        fs::write(export.join("inner"), b"x").await.unwrap();

        let err = replace_atomically(&original, &export).await.unwrap_err();
        match err {
            MediaError::AtomicReplace { restored, backup, .. } => {
                assert!(restored);
                assert!(!backup.exists());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fs::read_to_string(&original).await.unwrap(), "old");
    }

    #[tokio::test]
    async fn test_replace_requires_both_files() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("a.mp4");
        fs::write(&original, b"old").await.unwrap();

        let err = replace_atomically(&original, dir.path().join("missing.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert_eq!(fs::read_to_string(&original).await.unwrap(), "old");
    }

    #[tokio::test]
    async fn test_write_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("catalog.json");

        write_atomically(&path, b"[1]").await.unwrap();
        write_atomically(&path, b"[2]").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "[2]");
    }
}
