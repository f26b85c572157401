//! Error kinds surfaced by [`BootImage::load`](crate::image::BootImage::load).

use std::fmt;
use std::io;

use thiserror::Error;

use crate::kexec::Strategy;

/// Which boot component a materialization failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Kernel,
    Initrd,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Kernel => f.write_str("kernel"),
            Component::Initrd => f.write_str("initrd"),
        }
    }
}

/// Failure of a single `load` invocation.
///
/// Each variant is constructed at the site that failed. Cleanup of already
/// materialized files happens before the error reaches the caller.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No kernel source configured. Detected before any I/O.
    #[error("kernel image is empty, nothing to execute")]
    MissingKernel,

    /// Classifying, copying, syncing or reopening a source failed.
    #[error("failed to materialize {component}: {source}")]
    Materialize {
        component: Component,
        #[source]
        source: io::Error,
    },

    /// The kernel rejected the kexec syscall.
    #[error("{strategy} syscall failed: {source}")]
    Syscall {
        strategy: Strategy,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    pub(crate) fn materialize(component: Component) -> impl FnOnce(io::Error) -> Self {
        move |source| LoadError::Materialize { component, source }
    }

    pub(crate) fn syscall(strategy: Strategy) -> impl FnOnce(io::Error) -> Self {
        move |source| LoadError::Syscall { strategy, source }
    }

    /// The component a materialization failure is attributed to, if any.
    pub fn component(&self) -> Option<Component> {
        match self {
            LoadError::Materialize { component, .. } => Some(*component),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_kernel_message() {
        let err = LoadError::MissingKernel;
        assert_eq!(err.to_string(), "kernel image is empty, nothing to execute");
        assert!(err.component().is_none());
    }

    #[test]
    fn test_materialize_error_names_component() {
        let err = LoadError::materialize(Component::Initrd)(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "short read",
        ));
        assert_eq!(err.component(), Some(Component::Initrd));
        assert!(err.to_string().contains("initrd"));
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn test_syscall_error_names_strategy() {
        let err = LoadError::syscall(Strategy::FileLoad)(io::Error::from_raw_os_error(libc::EPERM));
        let msg = err.to_string();
        assert!(msg.contains("kexec_file_load"), "got: {}", msg);
        assert!(std::error::Error::source(&err).is_some());
    }
}
