//! kexec-image - load a Linux kernel and initramfs with kexec.
//!
//! Kernel, initrd and device tree are resolved into read-only files
//! (reused in place on tmpfs/ramfs, copied otherwise), the device tree is
//! appended to the initrd, and the kernel is loaded with kexec_file_load or
//! kexec_load.

mod commands;
mod logger;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use commands::ImageArgs;
use kexec_image::config::Config;
use logger::StdoutLogger;

#[derive(Parser)]
#[command(name = "kexec-image")]
#[command(about = "Load a Linux kernel and initramfs with kexec")]
#[command(
    after_help = "QUICK START:\n  kexec-image show --kernel /boot/vmlinuz\n  kexec-image load --kernel /boot/vmlinuz --initrd /boot/initrd.img --cmdline \"root=/dev/vda\"\n  kexec-image exec"
)]
struct Cli {
    /// Log resolved files and show copy progress
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding .env (default: current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an image with kexec
    Load {
        #[command(flatten)]
        image: ImageArgs,

        /// Reboot into the image once it is loaded
        #[arg(long)]
        exec: bool,
    },

    /// Show an image's label and details without loading it
    Show {
        #[command(flatten)]
        image: ImageArgs,

        /// Print a JSON summary
        #[arg(long)]
        json: bool,
    },

    /// Execute a previously loaded image
    Exec,

    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    StdoutLogger::new(LevelFilter::Warn)
        .init()
        .context("Failed to install logger")?;

    let base_dir = match cli.config_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let config = Config::load(&base_dir);
    let verbose = cli.verbose || config.verbose;
    if verbose {
        log::set_max_level(LevelFilter::Info);
    }

    match cli.command {
        Commands::Load { image, exec } => {
            let image = image.to_image(config.load_syscall);
            commands::cmd_load(&image, &config, verbose, exec)?;
        }

        Commands::Show { image, json } => {
            let image = image.to_image(config.load_syscall);
            commands::cmd_show(&image, json)?;
        }

        Commands::Exec => {
            commands::cmd_exec()?;
        }

        Commands::Config => {
            config.print();
        }
    }

    Ok(())
}
