//! Sequential reading over a random-access source.

use std::io::{self, Read};

use super::SharedSource;

/// Reads a [`ByteSource`](super::ByteSource) front to back.
pub struct SourceReader {
    source: SharedSource,
    offset: u64,
}

impl SourceReader {
    pub fn new(source: SharedSource) -> Self {
        Self { source, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.offset
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read_at(buf, self.offset)?;
        self.offset += n as u64;
        Ok(n)
    }
}
