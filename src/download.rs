//! Client-side "save as" for the finished document.
//!
//! The browser version builds a blob, clicks a throwaway link, and revokes
//! the blob. Here a [`DocumentSink`] takes ownership of the bytes, writes
//! them, and drops them. [`DirectorySink`] writes through a temp file in
//! the target directory and renames it into place, so an interrupted save
//! never leaves a truncated PDF under the final name.

use crate::error::FoliatorError;
use crate::machine::upload::DEFAULT_FILENAME;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Somewhere a stamped document can be saved.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Save `document` under `filename` and return where it went.
    async fn save(&self, filename: &str, document: Vec<u8>) -> Result<PathBuf, FoliatorError>;
}

/// Saves into a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DocumentSink for DirectorySink {
    async fn save(&self, filename: &str, document: Vec<u8>) -> Result<PathBuf, FoliatorError> {
        let target = self.dir.join(safe_filename(filename));
        let dir = self.dir.clone();
        let path = target.clone();

        tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&document)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| FoliatorError::Internal(format!("save task failed: {e}")))?
        .map_err(|source| FoliatorError::SaveFailed {
            path: target.clone(),
            source,
        })?;

        info!("Saved {}", target.display());
        Ok(target)
    }
}

/// Keep only the final path component of a server-supplied name, so a
/// header like `filename="../../x.pdf"` cannot write outside the sink.
pub fn safe_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        last.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directories() {
        assert_eq!(safe_filename("../../etc/passwd"), "passwd");
        assert_eq!(safe_filename(r"C:\tmp\out.pdf"), "out.pdf");
        assert_eq!(safe_filename("foliado_123.pdf"), "foliado_123.pdf");
    }

    #[test]
    fn degenerate_names_fall_back() {
        assert_eq!(safe_filename(""), DEFAULT_FILENAME);
        assert_eq!(safe_filename("dir/"), DEFAULT_FILENAME);
        assert_eq!(safe_filename(".."), DEFAULT_FILENAME);
    }

    #[tokio::test]
    async fn directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        let path = sink.save("out.pdf", b"%PDF-1.7".to_vec()).await.unwrap();
        assert_eq!(path, dir.path().join("out.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn directory_sink_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.pdf"), b"old").unwrap();
        let sink = DirectorySink::new(dir.path());
        sink.save("out.pdf", b"new".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("out.pdf")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn missing_directory_is_save_failed() {
        let sink = DirectorySink::new("/definitely/not/a/dir");
        let err = sink.save("out.pdf", b"x".to_vec()).await.unwrap_err();
        assert!(matches!(err, FoliatorError::SaveFailed { .. }));
    }
}
