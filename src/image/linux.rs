//! Linux kernel + initramfs boot images.

use std::fmt;

use log::info;
use serde::Serialize;

use super::BootImage;
use crate::error::{Component, LoadError};
use crate::kexec::{Kexec, KexecOptions, LinuxKexec, Strategy};
use crate::materialize::{MaterializedFile, Materializer};
use crate::source::{cat_initrds, describe, SharedSource};

/// A Linux kernel, optional initrd and command line, before loading.
///
/// Holds references to its sources but never open files of its own; files
/// only exist inside the [`MaterializedImage`] built by each `load`.
#[derive(Clone, Default)]
pub struct LinuxImage {
    pub name: Option<String>,
    /// Required. A missing kernel fails at load time, not construction.
    pub kernel: Option<SharedSource>,
    pub initrd: Option<SharedSource>,
    pub cmdline: String,
    pub boot_rank: i32,
    /// Use `kexec_load` instead of `kexec_file_load`.
    pub load_syscall: bool,
    pub kexec_opts: KexecOptions,
}

impl LinuxImage {
    pub fn new(kernel: SharedSource) -> Self {
        Self {
            kernel: Some(kernel),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_initrd(mut self, initrd: SharedSource) -> Self {
        self.initrd = Some(initrd);
        self
    }

    pub fn with_device_tree(mut self, dtb: SharedSource) -> Self {
        self.kexec_opts.device_tree = Some(dtb);
        self
    }

    pub fn with_cmdline(mut self, cmdline: impl Into<String>) -> Self {
        self.cmdline = cmdline.into();
        self
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.boot_rank = rank;
        self
    }

    pub fn with_load_syscall(mut self, load_syscall: bool) -> Self {
        self.load_syscall = load_syscall;
        self
    }

    pub fn strategy(&self) -> Strategy {
        Strategy::from_load_syscall(self.load_syscall)
    }

    /// The initrd as it will be materialized: the configured initrd followed
    /// by the device tree, or the device tree alone.
    ///
    /// Composition is a wrapper; nothing is read until materialization.
    pub fn effective_initrd(&self) -> Option<SharedSource> {
        match (&self.initrd, &self.kexec_opts.device_tree) {
            (Some(initrd), Some(dtb)) => Some(cat_initrds(initrd.clone(), dtb.clone())),
            (None, Some(dtb)) => Some(dtb.clone()),
            (initrd, None) => initrd.clone(),
        }
    }

    /// Resolve kernel and initrd into read-only files.
    ///
    /// If the initrd fails, the already materialized kernel is released
    /// before the error is returned.
    pub fn materialize(
        &self,
        materializer: &Materializer,
        verbose: bool,
    ) -> Result<MaterializedImage, LoadError> {
        let kernel = self.kernel.as_ref().ok_or(LoadError::MissingKernel)?;

        let kernel = materializer
            .materialize(kernel, verbose)
            .map_err(LoadError::materialize(Component::Kernel))?;
        let kernel_len = kernel
            .file()
            .metadata()
            .map_err(LoadError::materialize(Component::Kernel))?
            .len();
        if kernel_len == 0 {
            return Err(LoadError::Materialize {
                component: Component::Kernel,
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "kernel image is empty"),
            });
        }

        let initrd = match self.effective_initrd() {
            Some(initrd) => Some(
                materializer
                    .materialize_verbatim(&initrd, verbose)
                    .map_err(LoadError::materialize(Component::Initrd))?,
            ),
            None => None,
        };

        Ok(MaterializedImage {
            name: self.name.clone(),
            kernel,
            initrd,
            cmdline: self.cmdline.clone(),
            strategy: self.strategy(),
            kexec_opts: self.kexec_opts.clone(),
        })
    }

    /// Materialize and load through `kexec`, scratch files in `materializer`.
    pub fn load_with(
        &self,
        kexec: &dyn Kexec,
        materializer: &Materializer,
        verbose: bool,
    ) -> Result<(), LoadError> {
        let image = self.materialize(materializer, verbose)?;
        if verbose {
            image.log_resolved();
        }
        image.dispatch(kexec)
    }

    /// Serializable overview for `show --json`.
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            label: self.label(),
            rank: self.boot_rank,
            kernel: self.kernel.as_ref().map(|k| describe(k.as_ref())),
            initrd: self.initrd.as_ref().map(|i| describe(i.as_ref())),
            dtb: self
                .kexec_opts
                .device_tree
                .as_ref()
                .map(|d| describe(d.as_ref())),
            cmdline: self.cmdline.clone(),
            syscall: self.strategy().syscall_name(),
        }
    }
}

fn describe_opt(source: Option<&SharedSource>) -> String {
    source
        .map(|s| describe(s.as_ref()))
        .unwrap_or_else(|| "<none>".to_string())
}

impl BootImage for LinuxImage {
    fn label(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        let mut parts = vec![format!("kernel={}", describe_opt(self.kernel.as_ref()))];
        if let Some(initrd) = &self.initrd {
            parts.push(format!("initrd={}", describe(initrd.as_ref())));
        }
        if let Some(dtb) = &self.kexec_opts.device_tree {
            parts.push(format!("dtb={}", describe(dtb.as_ref())));
        }
        format!("Linux({})", parts.join(" "))
    }

    fn rank(&self) -> i32 {
        self.boot_rank
    }

    fn edit(&mut self, f: &dyn Fn(&str) -> String) {
        self.cmdline = f(&self.cmdline);
    }

    fn load(&self, verbose: bool) -> Result<(), LoadError> {
        self.load_with(&LinuxKexec, &Materializer::default(), verbose)
    }
}

impl fmt::Display for LinuxImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LinuxImage(")?;
        writeln!(f, "  Name: {}", self.name.as_deref().unwrap_or(""))?;
        writeln!(f, "  Kernel: {}", describe_opt(self.kernel.as_ref()))?;
        writeln!(f, "  Initrd: {}", describe_opt(self.initrd.as_ref()))?;
        writeln!(f, "  Cmdline: {}", self.cmdline)?;
        writeln!(f, "  Syscall: {}", self.strategy())?;
        writeln!(f, "  KexecOpts: {}", self.kexec_opts)?;
        writeln!(f, ")")
    }
}

/// A [`LinuxImage`] whose kernel and initrd are open read-only files.
///
/// Exists only between materialization and the syscall. Dropping it closes
/// every handle and unlinks scratch copies.
#[derive(Debug)]
pub struct MaterializedImage {
    pub name: Option<String>,
    pub kernel: MaterializedFile,
    pub initrd: Option<MaterializedFile>,
    pub cmdline: String,
    pub strategy: Strategy,
    pub kexec_opts: KexecOptions,
}

impl MaterializedImage {
    fn log_resolved(&self) {
        info!("Kernel: {}", self.kernel.path().display());
        if let Some(initrd) = &self.initrd {
            info!("Initrd: {}", initrd.path().display());
        }
        info!("Command line: {}", self.cmdline);
        info!("KexecOpts: {}", self.kexec_opts);
    }

    /// Issue the chosen syscall, then release every resource.
    pub fn dispatch(self, kexec: &dyn Kexec) -> Result<(), LoadError> {
        let initrd = self.initrd.as_ref().map(|i| i.file());
        match self.strategy {
            Strategy::DirectLoad => kexec.load(
                self.kernel.file(),
                initrd,
                &self.cmdline,
                &self.kexec_opts,
            ),
            Strategy::FileLoad => kexec.file_load(self.kernel.file(), initrd, &self.cmdline),
        }
        .map_err(LoadError::syscall(self.strategy))
    }
}

/// Overview of a [`LinuxImage`] for machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub label: String,
    pub rank: i32,
    pub kernel: Option<String>,
    pub initrd: Option<String>,
    pub dtb: Option<String>,
    pub cmdline: String,
    pub syscall: &'static str,
}
