//! Boot images as seen by a boot menu.
//!
//! A menu only needs [`BootImage`]: a label to show, a rank to sort by, a
//! way to edit the command line, and `load` to hand the image to kexec.

mod linux;

use std::fmt;

use crate::error::LoadError;

pub use linux::{ImageSummary, LinuxImage, MaterializedImage};

/// Something a boot menu can rank, show and load.
///
/// Construction, `label` and `rank` are pure and safe to call from many
/// threads. `load` must not run concurrently for two images on one machine.
pub trait BootImage: fmt::Display {
    /// Explicit name, or a description derived from the image's parts.
    fn label(&self) -> String;

    fn rank(&self) -> i32;

    /// Replace the command line with `f(current)`.
    fn edit(&mut self, f: &dyn Fn(&str) -> String);

    /// Prepare the image and load it with kexec.
    fn load(&self, verbose: bool) -> Result<(), LoadError>;

    /// Verbose multi-line rendering for diagnostics.
    fn string_form(&self) -> String {
        self.to_string()
    }
}
