//! File-backed sources.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ByteSource, FileRef, SharedSource};

/// An open file and the path it was opened from.
///
/// The file may have been opened with any access mode; the materializer
/// decides whether it is safe to hand to kexec as-is.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
}

impl FileSource {
    /// Open `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self::new(file, path))
    }

    /// Wrap an already open file.
    pub fn new(file: File, path: impl Into<PathBuf>) -> Self {
        Self {
            file,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.file.read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn file(&self) -> Option<FileRef<'_>> {
        Some(FileRef {
            file: &self.file,
            path: &self.path,
        })
    }

    fn name(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    fn type_tag(&self) -> &'static str {
        "FileSource"
    }
}

/// A path that is opened read-only only while it is being used.
///
/// Lets a menu construct many candidate images without holding a
/// descriptor per candidate. Materialization opens the path once through
/// [`ByteSource::open_scoped`] and closes it when it is done; a bare
/// `read_at` opens and closes the file around that one read.
#[derive(Debug, Clone)]
pub struct LazyFile {
    path: PathBuf,
}

impl LazyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the path now, as a source that owns the descriptor.
    pub fn open(&self) -> io::Result<FileSource> {
        FileSource::open(&self.path)
    }
}

impl ByteSource for LazyFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        File::open(&self.path)?.read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn open_scoped(&self) -> io::Result<Option<SharedSource>> {
        Ok(Some(Arc::new(self.open()?)))
    }

    fn name(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    fn type_tag(&self) -> &'static str {
        "LazyFile"
    }
}
