//! Show command - displays an image without loading it.

use anyhow::Result;

use kexec_image::{BootImage, LinuxImage};

/// Execute the show command.
pub fn cmd_show(image: &LinuxImage, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&image.summary())?);
        return Ok(());
    }

    println!("Label: {}", image.label());
    println!("Rank:  {}", image.rank());
    print!("{}", image.string_form());
    Ok(())
}
