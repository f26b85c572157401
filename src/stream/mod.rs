//! Stream filters applied while copying a source.

pub mod gzip;
pub mod progress;

pub use progress::{ProgressReader, DEFAULT_INTERVAL};
