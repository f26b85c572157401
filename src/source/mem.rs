//! In-memory sources.

use std::io;

use super::ByteSource;

/// Bytes held in memory, optionally carrying a display name.
#[derive(Debug, Clone, Default)]
pub struct MemSource {
    bytes: Vec<u8>,
    name: Option<String>,
}

impl MemSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, name: None }
    }

    pub fn named(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            name: Some(name.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ByteSource for MemSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.bytes.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.bytes.len() - start);
        buf[..n].copy_from_slice(&self.bytes[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn type_tag(&self) -> &'static str {
        "MemSource"
    }
}
