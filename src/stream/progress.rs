//! Progress markers for long copies.

use std::io::{self, Read, Write};

/// One marker per 5 MiB copied.
pub const DEFAULT_INTERVAL: u64 = 5 * 1024 * 1024;

/// Wraps a reader and writes `symbol` to `out` every `interval` bytes read.
///
/// Runs inline with the copy loop. Output is diagnostic only, so write
/// errors on `out` are ignored.
pub struct ProgressReader<R, W> {
    inner: R,
    out: W,
    symbol: &'static str,
    interval: u64,
    pending: u64,
}

impl<R: Read, W: Write> ProgressReader<R, W> {
    pub fn new(inner: R, out: W, symbol: &'static str, interval: u64) -> Self {
        Self {
            inner,
            out,
            symbol,
            interval: interval.max(1),
            pending: 0,
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.inner, self.out)
    }
}

impl<R: Read, W: Write> Read for ProgressReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pending += n as u64;
        if self.pending >= self.interval {
            while self.pending >= self.interval {
                let _ = self.out.write_all(self.symbol.as_bytes());
                self.pending -= self.interval;
            }
            let _ = self.out.flush();
        }
        Ok(n)
    }
}
