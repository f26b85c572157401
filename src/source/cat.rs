//! Concatenation of byte sources.

use std::io;
use std::sync::Arc;

use super::{describe, ByteSource, SharedSource};

/// Several sources presented as one logical source, in order.
///
/// Pure wrapper: nothing is copied or buffered until the composed source
/// is read.
pub struct CatSource {
    parts: Vec<SharedSource>,
}

impl CatSource {
    pub fn new(parts: Vec<SharedSource>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[SharedSource] {
        &self.parts
    }
}

impl ByteSource for CatSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut base = 0u64;
        for part in &self.parts {
            let len = part.size()?;
            if offset < base + len {
                let n = part.read_at(buf, offset - base)?;
                if n == 0 && !buf.is_empty() {
                    // The part shrank after it was sized.
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "{} ended at {} of {} bytes",
                            describe(part.as_ref()),
                            offset - base,
                            len
                        ),
                    ));
                }
                return Ok(n);
            }
            base += len;
        }
        Ok(0)
    }

    fn size(&self) -> io::Result<u64> {
        let mut total = 0u64;
        for part in &self.parts {
            total += part.size()?;
        }
        Ok(total)
    }

    fn open_scoped(&self) -> io::Result<Option<SharedSource>> {
        let mut changed = false;
        let mut parts = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            match part.open_scoped()? {
                Some(opened) => {
                    changed = true;
                    parts.push(opened);
                }
                None => parts.push(part.clone()),
            }
        }
        Ok(changed.then(|| cat(parts)))
    }

    fn description(&self) -> Option<String> {
        let parts: Vec<String> = self.parts.iter().map(|p| describe(p.as_ref())).collect();
        Some(format!("cat({})", parts.join(", ")))
    }

    fn type_tag(&self) -> &'static str {
        "CatSource"
    }
}

/// Concatenate `parts` into a single source.
pub fn cat(parts: Vec<SharedSource>) -> SharedSource {
    Arc::new(CatSource::new(parts))
}

/// Initrd bytes followed by device-tree bytes.
pub fn cat_initrds(initrd: SharedSource, dtb: SharedSource) -> SharedSource {
    cat(vec![initrd, dtb])
}
