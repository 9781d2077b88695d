use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use crate::errors::UploadError;

/// A regular file found under the walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub relative: PathBuf,
}

/// Lazy recursive listing of the regular files below a root directory.
///
/// Errors hit while descending, such as an unreadable subdirectory, are
/// logged and skipped. Only the root itself is validated up front.
pub struct DirectoryWalker {
    root: PathBuf,
    entries: walkdir::IntoIter,
}

impl DirectoryWalker {
    pub async fn open(root: &Path) -> Result<Self, UploadError> {
        let metadata = tokio::fs::metadata(root).await.map_err(|e| {
            tracing::debug!("Cannot stat {}: {}", root.display(), e);
            UploadError::DirectoryNotFound(root.display().to_string())
        })?;

        if !metadata.is_dir() {
            return Err(UploadError::NotADirectory(root.display().to_string()));
        }

        Ok(Self {
            root: root.to_path_buf(),
            // Symlinked directories are never descended
            entries: WalkDir::new(root)
                .min_depth(1)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter(),
        })
    }

    /// Yields the next entry from the blocking pool so the runtime is never
    /// stalled on directory reads.
    pub async fn next_entry(mut self) -> Result<(Self, Option<WalkEntry>), UploadError> {
        tokio::task::spawn_blocking(move || {
            let entry = self.next();
            (self, entry)
        })
        .await
        .map_err(|e| UploadError::TaskPanic(format!("directory walk failed: {}", e)))
    }
}

impl Iterator for DirectoryWalker {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", self.root.display(), e);
                    continue;
                }
            };

            if !is_regular_file(&entry) {
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.root) {
                Ok(relative) => relative.to_path_buf(),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            return Some(WalkEntry {
                path: entry.into_path(),
                relative,
            });
        }
    }
}

// A symlink counts when its target is a regular file; dangling links do not.
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    entry.path_is_symlink()
        && std::fs::metadata(entry.path())
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
}

/// Final segment of the normalized root, used as the object-key prefix.
///
/// Roots without a trailing normal segment (`.`, `..`) are resolved first.
/// The filesystem root has no name at all and is rejected.
pub async fn root_name(root: &Path) -> Result<String, UploadError> {
    if let Some(name) = root.file_name() {
        return Ok(name.to_string_lossy().into_owned());
    }

    let resolved = tokio::fs::canonicalize(root)
        .await
        .map_err(|_| UploadError::DirectoryNotFound(root.display().to_string()))?;

    resolved
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| UploadError::EmptyPrefix(root.display().to_string()))
}

/// `<prefix>/<relative>` with '/' separators whatever the host uses.
pub fn object_key(prefix: &str, relative: &Path) -> String {
    let mut key = String::from(prefix);
    for component in relative.components() {
        key.push('/');
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    key
}
