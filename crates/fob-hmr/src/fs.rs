//! Filesystem handles passed to the dev server.
//!
//! The pipeline hands the reporter one handle for its inputs (project files)
//! and one for its outputs (written bundles). They are usually the same
//! native filesystem, but the split lets a pipeline serve bundles it keeps
//! somewhere else.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    async fn is_file(&self, path: &Path) -> bool;

    /// Files directly or transitively under `dir`, relative to it.
    async fn read_dir_recursive(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`FileSystem`] backed by the OS through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileSystem;

impl NativeFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for NativeFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn is_file(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn read_dir_recursive(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Ok(relative) = path.strip_prefix(dir) {
                        files.push(relative.to_path_buf());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_dir_recursive_lists_nested_files() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("assets")).unwrap();
        std::fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(temp.path().join("assets/app.js"), "console.log(1)").unwrap();

        let fs = NativeFileSystem::new();
        let files = fs.read_dir_recursive(temp.path()).await.unwrap();

        assert_eq!(
            files,
            vec![PathBuf::from("assets/app.js"), PathBuf::from("index.html")]
        );
    }

    #[tokio::test]
    async fn test_is_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.js");
        std::fs::write(&file, "1").unwrap();

        let fs = NativeFileSystem::new();
        assert!(fs.is_file(&file).await);
        assert!(!fs.is_file(temp.path()).await);
        assert!(!fs.is_file(&temp.path().join("missing.js")).await);
        assert_eq!(fs.read_file(&file).await.unwrap(), b"1");
    }
}
