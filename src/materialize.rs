//! Turn an arbitrary byte source into a read-only file kexec will accept.
//!
//! kexec_file_load rejects files that anything holds open for writing, so a
//! source is either reused in place (regular file, on tmpfs/ramfs, opened
//! read-only) or copied into a fresh scratch file that is synced, closed and
//! reopened read-only.
//!
//! Scratch files are unlinked when the returned [`MaterializedFile`] is
//! dropped, and on every failure path before that. Lazily opened sources
//! are opened once per materialization and closed before it returns.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempPath;

use crate::fsclass::{access_mode, is_memory_backed};
use crate::source::{describe, scoped, ByteSource, SharedSource, SourceReader};
use crate::stream::gzip::{self, Gunzip, DEFAULT_DECOMPRESSED_LIMIT};
use crate::stream::{ProgressReader, DEFAULT_INTERVAL};

/// Name prefix of scratch copies.
pub const SCRATCH_PREFIX: &str = "kexec-image";

/// A read-only file ready to be handed to kexec.
#[derive(Debug)]
pub struct MaterializedFile {
    // Declared before `scratch` so the descriptor closes before the unlink.
    file: File,
    path: PathBuf,
    scratch: Option<TempPath>,
}

impl MaterializedFile {
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if this is a scratch copy rather than the caller's file.
    pub fn is_copy(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Produces [`MaterializedFile`]s, copying into `scratch_dir` when needed.
#[derive(Debug, Clone)]
pub struct Materializer {
    scratch_dir: PathBuf,
    progress_interval: u64,
    decompressed_limit: u64,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl Materializer {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            progress_interval: DEFAULT_INTERVAL,
            decompressed_limit: DEFAULT_DECOMPRESSED_LIMIT,
        }
    }

    /// Bytes between progress markers in verbose mode.
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Largest kernel a gzip source may inflate to.
    pub fn with_decompressed_limit(mut self, limit: u64) -> Self {
        self.decompressed_limit = limit;
        self
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Materialize `source`, transparently decompressing gzip.
    ///
    /// A compressed source never takes the zero-copy path. Data that has a
    /// gzip header but does not decompress is copied as is.
    pub fn materialize(&self, source: &SharedSource, verbose: bool) -> io::Result<MaterializedFile> {
        self.materialize_into(source, verbose.then(io::stdout))
    }

    /// Materialize `source` byte for byte, without decompression.
    pub fn materialize_verbatim(
        &self,
        source: &SharedSource,
        verbose: bool,
    ) -> io::Result<MaterializedFile> {
        self.materialize_verbatim_into(source, verbose.then(io::stdout))
    }

    fn materialize_into<W: Write>(
        &self,
        source: &SharedSource,
        mut progress: Option<W>,
    ) -> io::Result<MaterializedFile> {
        let source = scoped(source)?;
        if !gzip::is_gzip(source.as_ref())? {
            return self.materialize_verbatim_into(&source, progress);
        }

        let label = describe(source.as_ref());
        let gunzip = Gunzip::new(source.clone(), self.decompressed_limit);
        match self.copy_to_scratch(gunzip, &label, progress.as_mut()) {
            Err(e) if gzip::is_corrupt(&e) => {
                debug!("{} has a gzip header but did not decompress: {}", label, e);
                self.copy_to_scratch(SourceReader::new(source), &label, progress.as_mut())
            }
            result => result,
        }
    }

    fn materialize_verbatim_into<W: Write>(
        &self,
        source: &SharedSource,
        mut progress: Option<W>,
    ) -> io::Result<MaterializedFile> {
        let source = scoped(source)?;
        if let Some(reused) = reuse_in_place(source.as_ref())? {
            return Ok(reused);
        }
        let label = describe(source.as_ref());
        self.copy_to_scratch(SourceReader::new(source), &label, progress.as_mut())
    }

    fn copy_to_scratch<R: Read, W: Write>(
        &self,
        mut reader: R,
        label: &str,
        progress: Option<W>,
    ) -> io::Result<MaterializedFile> {
        debug!("copying {} into {}", label, self.scratch_dir.display());

        let mut tmp = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(&self.scratch_dir)?;

        match progress {
            Some(out) => {
                let mut reader = ProgressReader::new(reader, out, ".", self.progress_interval);
                io::copy(&mut reader, tmp.as_file_mut())?;
            }
            None => {
                io::copy(&mut reader, tmp.as_file_mut())?;
            }
        }
        tmp.as_file().sync_all()?;

        // Closes the write handle; the path lives on until `scratch` drops.
        let scratch = tmp.into_temp_path();
        let file = File::open(&scratch)?;

        Ok(MaterializedFile {
            file,
            path: scratch.to_path_buf(),
            scratch: Some(scratch),
        })
    }
}

/// Reuse the source's own file if kexec can take it as-is.
///
/// Classification failures are not errors; they just force a copy.
fn reuse_in_place(source: &dyn ByteSource) -> io::Result<Option<MaterializedFile>> {
    let Some(file_ref) = source.file() else {
        return Ok(None);
    };

    match file_ref.file.metadata() {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            debug!("{} is not a regular file", file_ref.path.display());
            return Ok(None);
        }
        Err(e) => {
            warn!("cannot stat {}: {}", file_ref.path.display(), e);
            return Ok(None);
        }
    }

    match is_memory_backed(file_ref.path) {
        Ok(true) => {}
        Ok(false) => {
            debug!("{} is not on tmpfs or ramfs", file_ref.path.display());
            return Ok(None);
        }
        Err(e) => {
            warn!("cannot classify filesystem of {}: {}", file_ref.path.display(), e);
            return Ok(None);
        }
    }

    // Older kernels may not answer F_GETFL; treat that like "open for write".
    match access_mode(file_ref.file) {
        Ok(mode) if !mode.includes_write() => {}
        Ok(mode) => {
            debug!("{} is open {:?}", file_ref.path.display(), mode);
            return Ok(None);
        }
        Err(e) => {
            warn!("cannot query access mode of {}: {}", file_ref.path.display(), e);
            return Ok(None);
        }
    }

    debug!("reusing {} in place", file_ref.path.display());
    Ok(Some(MaterializedFile {
        file: file_ref.file.try_clone()?,
        path: file_ref.path.to_path_buf(),
        scratch: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{FileSource, MemSource};
    use std::fs::{self, OpenOptions};
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn scratch_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    fn contents(m: &MaterializedFile) -> Vec<u8> {
        let mut out = Vec::new();
        File::open(m.path()).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_memory_source_is_copied_read_only() {
        let scratch = TempDir::new().unwrap();
        let materializer = Materializer::new(scratch.path());
        let src: SharedSource = Arc::new(MemSource::new(b"kernel bytes".to_vec()));

        let m = materializer.materialize(&src, false).unwrap();
        assert!(m.is_copy());
        assert!(m.path().starts_with(scratch.path()));
        assert!(m
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
        assert_eq!(contents(&m), b"kernel bytes");
        assert_eq!(access_mode(m.file()).unwrap(), crate::fsclass::AccessMode::ReadOnly);
    }

    #[test]
    fn test_scratch_copy_unlinked_on_drop() {
        let scratch = TempDir::new().unwrap();
        let materializer = Materializer::new(scratch.path());
        let src: SharedSource = Arc::new(MemSource::new(vec![7; 100]));

        let m = materializer.materialize_verbatim(&src, false).unwrap();
        let path = m.path().to_path_buf();
        assert!(path.exists());
        drop(m);
        assert!(!path.exists());
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn test_file_on_disk_is_copied() {
        // Opened read-write, so it is copied wherever it lives.
        let dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let path = dir.path().join("vmlinuz");
        fs::write(&path, b"on disk").unwrap();
        let file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        let src: SharedSource = Arc::new(FileSource::new(file, &path));

        let m = Materializer::new(scratch.path()).materialize(&src, false).unwrap();
        assert!(m.is_copy());
        assert_ne!(m.path(), path.as_path());
        assert_eq!(contents(&m), b"on disk");
    }

    #[test]
    fn test_verbose_copy_marks_progress() {
        let scratch = TempDir::new().unwrap();
        let materializer = Materializer::new(scratch.path()).with_progress_interval(1024);
        let payload: Vec<u8> = (0..10 * 1024 + 100).map(|i| (i % 253) as u8).collect();
        let src: SharedSource = Arc::new(MemSource::new(payload.clone()));

        let mut out = Vec::new();
        let m = materializer.materialize_into(&src, Some(&mut out)).unwrap();
        assert_eq!(out, b"..........");
        assert_eq!(contents(&m), payload);
    }

    #[test]
    fn test_verbose_materialize_copies_identically() {
        let scratch = TempDir::new().unwrap();
        let materializer = Materializer::new(scratch.path()).with_progress_interval(512);
        let payload = vec![0x5a; 4096];
        let src: SharedSource = Arc::new(MemSource::new(payload.clone()));

        let m = materializer.materialize(&src, true).unwrap();
        assert_eq!(contents(&m), payload);
        let m = materializer.materialize_verbatim(&src, true).unwrap();
        assert_eq!(contents(&m), payload);
    }

    fn gzipped(bytes: &[u8]) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_gzip_kernel_is_streamed_decompressed() {
        let scratch = TempDir::new().unwrap();
        let payload = b"bzImage payload".repeat(1000);
        let src: SharedSource = Arc::new(MemSource::new(gzipped(&payload)));

        let m = Materializer::new(scratch.path()).materialize(&src, false).unwrap();
        assert!(m.is_copy());
        assert_eq!(contents(&m), payload);
    }

    #[test]
    fn test_gzip_over_limit_fails_and_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let src: SharedSource = Arc::new(MemSource::new(gzipped(&vec![0u8; 2 << 20])));

        let err = Materializer::new(scratch.path())
            .with_decompressed_limit(1 << 20)
            .materialize(&src, false)
            .unwrap_err();
        assert!(gzip::is_limit_exceeded(&err));
        assert_eq!(scratch_entries(scratch.path()), 0);
    }

    #[test]
    fn test_corrupt_gzip_is_copied_verbatim() {
        let scratch = TempDir::new().unwrap();
        let mut bytes = gzipped(&b"some kernel".repeat(64));
        let len = bytes.len();
        bytes.truncate(len / 2);
        let src: SharedSource = Arc::new(MemSource::new(bytes.clone()));

        let m = Materializer::new(scratch.path()).materialize(&src, false).unwrap();
        assert_eq!(contents(&m), bytes);
        // The abandoned decompression left nothing behind.
        assert_eq!(scratch_entries(scratch.path()), 1);
    }

    #[test]
    fn test_missing_scratch_dir_fails() {
        let src: SharedSource = Arc::new(MemSource::new(vec![1, 2, 3]));
        let err = Materializer::new("/nonexistent/scratch-12345")
            .materialize(&src, false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_failure_leaves_no_scratch_file() {
        struct Failing;
        impl ByteSource for Failing {
            fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
                // First page reads fine, then the source fails mid-copy.
                if offset < 4096 {
                    let n = buf.len().min((4096 - offset) as usize);
                    buf[..n].fill(b'M');
                    return Ok(n);
                }
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "source went away"))
            }
            fn size(&self) -> io::Result<u64> {
                Ok(1 << 20)
            }
            fn type_tag(&self) -> &'static str {
                "Failing"
            }
        }

        let scratch = TempDir::new().unwrap();
        let src: SharedSource = Arc::new(Failing);
        let err = Materializer::new(scratch.path())
            .materialize(&src, false)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(scratch_entries(scratch.path()), 0);
    }
}
