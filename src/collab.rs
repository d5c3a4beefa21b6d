//! Collaborators outside the signing flow: where published pages and the PDF go.
//!
//! Persisting the signed pages is the host's job. The library hands the two
//! split images to a [`DocumentPublisher`] exactly once per successful capture
//! and offers the PDF to a [`DownloadSink`]. Both are traits so the host can
//! back them with an upload queue, a form field, or a directory on disk.

use crate::pipeline::encode::EncodedImage;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Receives the two published page images, top half first.
///
/// The array type makes "fewer than two" unrepresentable.
pub trait DocumentPublisher: Send + Sync {
    fn publish(&self, images: [EncodedImage; 2]);
}

/// Accepts the assembled PDF as a named file.
pub trait DownloadSink: Send + Sync {
    /// Store `bytes` as `file_name`. Returns where it landed, if anywhere on disk.
    fn offer(&self, file_name: &str, bytes: &[u8]) -> io::Result<Option<PathBuf>>;
}

// ── In-memory implementations ────────────────────────────────────────────────

/// Keeps every publication in memory.
#[derive(Debug, Default)]
pub struct CollectingPublisher {
    published: Mutex<Vec<[EncodedImage; 2]>>,
}

impl CollectingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `publish` was called.
    pub fn count(&self) -> usize {
        self.published.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// The most recent publication.
    pub fn last(&self) -> Option<[EncodedImage; 2]> {
        self.published.lock().ok().and_then(|p| p.last().cloned())
    }
}

impl DocumentPublisher for CollectingPublisher {
    fn publish(&self, images: [EncodedImage; 2]) {
        debug!(
            "Collected published pages ({} + {} bytes)",
            images[0].len(),
            images[1].len()
        );
        if let Ok(mut published) = self.published.lock() {
            published.push(images);
        }
    }
}

/// Keeps every offered file in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the offered files, in order.
    pub fn file_names(&self) -> Vec<String> {
        self.files
            .lock()
            .map(|f| f.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Contents of the most recently offered file.
    pub fn last_bytes(&self) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|f| f.last().map(|(_, b)| b.clone()))
    }
}

impl DownloadSink for MemorySink {
    fn offer(&self, file_name: &str, bytes: &[u8]) -> io::Result<Option<PathBuf>> {
        let mut files = self
            .files
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        files.push((file_name.to_string(), bytes.to_vec()));
        Ok(None)
    }
}

// ── Directory sink ───────────────────────────────────────────────────────────

/// Writes offered files into a directory.
///
/// Files are written to a temporary file in the same directory and renamed
/// into place, so a reader never observes a partial PDF.
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

impl DownloadSink for DirectorySink {
    fn offer(&self, file_name: &str, bytes: &[u8]) -> io::Result<Option<PathBuf>> {
        let target = self.dir.join(file_name);
        write_atomic(&target, bytes)?;
        info!("Saved {} ({} bytes)", target.display(), bytes.len());
        Ok(Some(target))
    }
}

/// Write `bytes` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
