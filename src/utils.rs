//! Utility functions for file operations and path manipulation

use crate::config::FileCollisionAction;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Get a unique path for a file, handling collisions according to the specified action
///
/// For `Rename` this may return a path with a ` (n)` suffix. For `Skip` an
/// existing file is an [`io::ErrorKind::AlreadyExists`] error. `Overwrite`
/// returns the original path unchanged.
///
/// # Examples
///
/// ```
/// use background_dl::utils::get_unique_path;
/// use background_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/cat.jpg");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If /tmp/cat.jpg exists, returns /tmp/cat (1).jpg
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> io::Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists and collision action is Skip", path.display()),
                ));
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot extract file stem from {}", path.display()),
                )
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("cannot extract parent directory from {}", path.display()),
                )
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(new_path);
                }
            }

            Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "could not find unique filename for {} after {} attempts",
                    path.display(),
                    MAX_RENAME_ATTEMPTS
                ),
            ))
        }
    }
}

/// Synchronously move a file, falling back to copy + remove across filesystems
///
/// Used inside engine callbacks, where the source only exists until the
/// callback returns.
pub fn move_file_blocking(source: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            std::fs::copy(source, destination)?;
            std::fs::remove_file(source)
        }
        Err(e) => Err(e),
    }
}

/// Move a file into its final destination with collision handling
///
/// Creates the destination's parent directory when missing and returns the
/// path the file actually landed at.
pub async fn move_into_place(
    source: &Path,
    destination: &Path,
    action: FileCollisionAction,
) -> io::Result<PathBuf> {
    use tokio::fs;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).await?;
    }

    let final_destination = get_unique_path(destination, action)?;

    match fs::rename(source, &final_destination).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(source, &final_destination).await?;
            fs::remove_file(source).await?;
        }
        Err(e) => return Err(e),
    }

    tracing::debug!(?source, ?final_destination, "moved file into place");
    Ok(final_destination)
}
