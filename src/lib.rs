//! kexec-image library exports.
//!
//! Prepares a Linux kernel and initramfs for kexec: sources are resolved
//! into read-only files (reused in place when already on tmpfs/ramfs,
//! otherwise copied), a device tree is appended to the initrd, and the
//! chosen kexec syscall is issued.
//!
//! The binary in `main.rs` is a thin CLI over these modules; they are
//! exposed here for integration tests and for boot menus.

pub mod config;
pub mod error;
pub mod fsclass;
pub mod image;
pub mod kexec;
pub mod materialize;
pub mod source;
pub mod stream;

pub use error::{Component, LoadError};
pub use image::{BootImage, LinuxImage, MaterializedImage};
pub use kexec::{Kexec, KexecOptions, LinuxKexec, Strategy};
pub use materialize::{MaterializedFile, Materializer};
pub use source::{ByteSource, SharedSource};
