//! Random-access byte sources for kernels, initrds and device trees.
//!
//! Everything downstream (materialization, labels, concatenation) depends
//! only on the [`ByteSource`] capability, never on a concrete kind:
//! - [`FileSource`] - an already open file plus the path it came from
//! - [`LazyFile`] - a path that is opened only while in use
//! - [`MemSource`] - bytes held in memory
//! - [`CatSource`] - several sources presented as one

mod cat;
mod file;
mod mem;
mod reader;

use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

pub use cat::{cat, cat_initrds, CatSource};
pub use file::{FileSource, LazyFile};
pub use mem::MemSource;
pub use reader::SourceReader;

/// A random-access source of bytes.
pub trait ByteSource: Send + Sync {
    /// Read into `buf` starting at `offset`. Returns 0 at end of source.
    /// Short reads are allowed.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total length in bytes.
    fn size(&self) -> io::Result<u64>;

    /// The concrete file backing this source, if there is one.
    fn file(&self) -> Option<FileRef<'_>> {
        None
    }

    /// Acquire what this source opens lazily, for one materialization.
    ///
    /// Returns `None` when the source is usable as is. A returned source
    /// owns whatever was acquired and releases it when dropped.
    fn open_scoped(&self) -> io::Result<Option<SharedSource>> {
        Ok(None)
    }

    /// Custom human-readable description.
    fn description(&self) -> Option<String> {
        None
    }

    /// Filesystem name of the source.
    fn name(&self) -> Option<String> {
        None
    }

    /// Last-resort type tag.
    fn type_tag(&self) -> &'static str;
}

/// Shared handle to a byte source. Cloning never copies data.
pub type SharedSource = Arc<dyn ByteSource>;

/// A concrete open file together with the path it was opened from.
#[derive(Debug, Clone, Copy)]
pub struct FileRef<'a> {
    pub file: &'a File,
    pub path: &'a Path,
}

/// How a source is rendered in labels, picked in fixed priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLabel {
    Described(String),
    Named(String),
    Tagged(&'static str),
}

impl SourceLabel {
    pub fn of(source: &dyn ByteSource) -> Self {
        if let Some(description) = source.description() {
            return SourceLabel::Described(description);
        }
        if let Some(name) = source.name() {
            return SourceLabel::Named(name);
        }
        SourceLabel::Tagged(source.type_tag())
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLabel::Described(s) | SourceLabel::Named(s) => f.write_str(s),
            SourceLabel::Tagged(tag) => f.write_str(tag),
        }
    }
}

/// `source` with its lazy resources acquired, see [`ByteSource::open_scoped`].
pub fn scoped(source: &SharedSource) -> io::Result<SharedSource> {
    Ok(source.open_scoped()?.unwrap_or_else(|| source.clone()))
}

/// Render a source for labels and diagnostics.
pub fn describe(source: &dyn ByteSource) -> String {
    SourceLabel::of(source).to_string()
}

/// Fill `buf` from `offset`, stopping early only at end of source.
/// Returns the number of bytes read.
pub fn read_full_at(source: &dyn ByteSource, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
