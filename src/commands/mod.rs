//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `load` - Materialize an image and load it with kexec
//! - `show` - Display an image's label and details
//! - `exec` - Jump into a previously loaded image

mod exec;
mod load;
mod show;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use kexec_image::source::LazyFile;
use kexec_image::{BootImage, LinuxImage};

pub use exec::cmd_exec;
pub use load::cmd_load;
pub use show::cmd_show;

/// Flags describing one Linux boot image.
#[derive(Args, Debug, Clone)]
pub struct ImageArgs {
    /// Kernel image (bzImage, Image, optionally gzip-compressed)
    #[arg(long)]
    pub kernel: Option<PathBuf>,

    /// Initial ramdisk
    #[arg(long)]
    pub initrd: Option<PathBuf>,

    /// Device tree blob, appended to the initrd
    #[arg(long)]
    pub dtb: Option<PathBuf>,

    /// Kernel command line
    #[arg(long, default_value = "")]
    pub cmdline: String,

    /// Extra command line arguments (repeatable)
    #[arg(long)]
    pub append: Vec<String>,

    /// Label to show instead of the derived one
    #[arg(long)]
    pub name: Option<String>,

    /// Menu rank
    #[arg(long, default_value_t = 0)]
    pub rank: i32,

    /// Use kexec_load instead of kexec_file_load
    #[arg(long)]
    pub load_syscall: bool,
}

impl ImageArgs {
    /// Build the image. Files are opened lazily, on first read.
    pub fn to_image(&self, default_load_syscall: bool) -> LinuxImage {
        let mut image = LinuxImage {
            name: self.name.clone(),
            kernel: self.kernel.as_ref().map(|p| Arc::new(LazyFile::new(p)) as _),
            initrd: self.initrd.as_ref().map(|p| Arc::new(LazyFile::new(p)) as _),
            cmdline: self.cmdline.clone(),
            boot_rank: self.rank,
            load_syscall: self.load_syscall || default_load_syscall,
            ..LinuxImage::default()
        };
        image.kexec_opts.device_tree = self.dtb.as_ref().map(|p| Arc::new(LazyFile::new(p)) as _);

        if !self.append.is_empty() {
            let extra = self.append.join(" ");
            image.edit(&|cmdline| {
                if cmdline.is_empty() {
                    extra.clone()
                } else {
                    format!("{} {}", cmdline, extra)
                }
            });
        }
        image
    }
}
