//! The container archive: a gzip-compressed tar file.
//!
//! [`ArchiveWriter`] appends one entry per persisted document and is closed
//! on every exit path — dropping an unfinished writer flushes what was
//! written so far (a failed save leaves a partial archive in place, by
//! design). [`ScopedExtraction`] unpacks a container into a temporary
//! directory owned by the single in-flight load and removed when it drops.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use crate::error::PersistError;

fn archive_error(path: &Path, message: impl std::fmt::Display) -> PersistError {
    PersistError::Archive {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// Writes container entries into a tar.gz archive.
pub struct ArchiveWriter {
    path: PathBuf,
    builder: Option<tar::Builder<GzEncoder<File>>>,
}

impl ArchiveWriter {
    /// Create the archive file, truncating any existing one.
    pub fn create(path: &Path) -> Result<Self, PersistError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| archive_error(path, e))?;
        }
        let file = File::create(path).map_err(|e| archive_error(path, e))?;
        let encoder = GzEncoder::new(file, Compression::default());
        Ok(Self {
            path: path.to_path_buf(),
            builder: Some(tar::Builder::new(encoder)),
        })
    }

    /// Append one named entry.
    pub fn append(&mut self, name: &str, contents: &[u8]) -> Result<(), PersistError> {
        let builder = self
            .builder
            .as_mut()
            .expect("append on a finished archive writer");
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, contents)
            .map_err(|e| archive_error(&self.path, e))
    }

    /// Finish the archive: write the tar trailer and gzip footer, flush.
    pub fn finish(mut self) -> Result<(), PersistError> {
        self.close_inner().map_err(|e| archive_error(&self.path, e))
    }

    fn close_inner(&mut self) -> std::io::Result<()> {
        if let Some(builder) = self.builder.take() {
            let encoder = builder.into_inner()?;
            let mut file = encoder.finish()?;
            file.flush()?;
        }
        Ok(())
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if self.builder.is_some() {
            if let Err(e) = self.close_inner() {
                tracing::warn!(path = %self.path.display(), error = %e, "closing archive on drop failed");
            }
        }
    }
}

/// A container unpacked into a scoped temporary directory.
///
/// The directory belongs to the load operation that created it and is
/// deleted when this value drops, on success and error paths alike.
#[derive(Debug)]
pub struct ScopedExtraction {
    dir: TempDir,
}

impl ScopedExtraction {
    /// Extract the archive at `source` into a fresh temporary directory.
    pub fn extract(source: &Path) -> Result<Self, PersistError> {
        let dir = tempfile::Builder::new()
            .prefix("dianoia-")
            .tempdir()
            .map_err(|e| archive_error(source, e))?;
        let file = File::open(source).map_err(|e| archive_error(source, e))?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        // `unpack` refuses entries that would escape the destination.
        archive
            .unpack(dir.path())
            .map_err(|e| archive_error(source, e))?;
        Ok(Self { dir })
    }

    /// The extraction root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
