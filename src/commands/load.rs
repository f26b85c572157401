//! Load command - materialize an image and hand it to kexec.

use anyhow::{Context, Result};

use kexec_image::config::Config;
use kexec_image::{BootImage, Kexec, LinuxImage, LinuxKexec};

/// Execute the load command.
pub fn cmd_load(image: &LinuxImage, config: &Config, verbose: bool, exec: bool) -> Result<()> {
    println!("Loading {}", image.label());
    if verbose {
        print!("{}", image.string_form());
    }

    image
        .load_with(&LinuxKexec, &config.materializer(), verbose)
        .with_context(|| format!("Failed to load {}", image.label()))?;

    println!("Loaded via {}", image.strategy());

    if exec {
        println!("Executing...");
        LinuxKexec
            .execute()
            .context("kexec reboot failed. Is an image loaded and are you root?")?;
    }
    Ok(())
}
