//! Transparent gzip detection and streaming decompression.

use std::io::{self, Read};

use flate2::read::MultiGzDecoder;
use thiserror::Error;

use crate::source::{read_full_at, ByteSource, SharedSource, SourceReader};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest decompressed kernel accepted by default (1 GiB).
pub const DEFAULT_DECOMPRESSED_LIMIT: u64 = 1 << 30;

/// A gzip stream inflated past its allowed size.
#[derive(Debug, Error)]
#[error("decompressed image exceeds {limit} bytes")]
pub struct LimitExceeded {
    pub limit: u64,
}

/// Returns true if the source starts with the gzip magic bytes.
pub fn is_gzip(source: &dyn ByteSource) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let n = read_full_at(source, &mut magic, 0)?;
    Ok(n == magic.len() && magic == GZIP_MAGIC)
}

/// Decompressing reader over a source, failing once more than `limit`
/// bytes have come out.
pub struct Gunzip {
    decoder: MultiGzDecoder<SourceReader>,
    limit: u64,
    produced: u64,
}

impl Gunzip {
    pub fn new(source: SharedSource, limit: u64) -> Self {
        Self {
            decoder: MultiGzDecoder::new(SourceReader::new(source)),
            limit,
            produced: 0,
        }
    }

    /// Bytes decompressed so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl Read for Gunzip {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.produced += n as u64;
        if self.produced > self.limit {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                LimitExceeded { limit: self.limit },
            ));
        }
        Ok(n)
    }
}

/// True if `err` came from a [`Gunzip`] hitting its limit.
pub fn is_limit_exceeded(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<LimitExceeded>())
}

/// True if `err` means the data had a gzip header but was not a valid
/// gzip stream (bad header, corrupt deflate data, checksum mismatch or
/// truncation).
pub fn is_corrupt(err: &io::Error) -> bool {
    !is_limit_exceeded(err)
        && matches!(
            err.kind(),
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
        )
}
