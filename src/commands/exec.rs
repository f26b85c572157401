//! Exec command - jump into an already loaded kernel.

use anyhow::{Context, Result};

use kexec_image::{Kexec, LinuxKexec};

/// Execute the exec command. Only returns on failure.
pub fn cmd_exec() -> Result<()> {
    LinuxKexec
        .execute()
        .context("kexec reboot failed. Was an image loaded first?")
}
