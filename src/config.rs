//! Configuration management for kexec-image.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file; command-line
//! flags take precedence over both.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::warn;

use crate::materialize::Materializer;
use crate::stream::DEFAULT_INTERVAL;

/// kexec-image configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Where scratch copies of kernels and initrds go (default: system temp dir)
    pub scratch_dir: PathBuf,
    /// Use kexec_load instead of kexec_file_load (default: false)
    pub load_syscall: bool,
    /// Log resolved files and show copy progress (default: false)
    pub verbose: bool,
    /// Bytes between progress dots (default: 5 MiB)
    pub progress_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            load_syscall: false,
            verbose: false,
            progress_interval: DEFAULT_INTERVAL,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from `base_dir/.env` and the environment.
    pub fn load(base_dir: &Path) -> Self {
        let mut vars = HashMap::new();

        let env_path = base_dir.join(".env");
        if env_path.exists() {
            match dotenvy::from_path_iter(&env_path) {
                Ok(iter) => {
                    for item in iter {
                        match item {
                            Ok((key, value)) => {
                                vars.insert(key, value);
                            }
                            Err(e) => warn!("skipping bad line in {}: {}", env_path.display(), e),
                        }
                    }
                }
                Err(e) => warn!("cannot read {}: {}", env_path.display(), e),
            }
        }

        // Environment variables override .env file
        vars.extend(std::env::vars());

        Self::from_vars(&vars, base_dir)
    }

    /// Build configuration from already collected variables.
    ///
    /// Relative scratch paths are resolved against `base_dir`. Unparseable
    /// values fall back to the default with a warning.
    pub fn from_vars(vars: &HashMap<String, String>, base_dir: &Path) -> Self {
        let defaults = Self::default();

        let scratch_dir = vars
            .get("KEXEC_SCRATCH_DIR")
            .filter(|s| !s.is_empty())
            .map(|s| {
                let path = PathBuf::from(s);
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            })
            .unwrap_or(defaults.scratch_dir);

        let flag = |key: &str, default: bool| match vars.get(key) {
            None => default,
            Some(value) => parse_bool(value).unwrap_or_else(|| {
                warn!("{}={} is not a boolean, using {}", key, value, default);
                default
            }),
        };

        let progress_interval = match vars.get("KEXEC_PROGRESS_INTERVAL") {
            None => defaults.progress_interval,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!(
                        "KEXEC_PROGRESS_INTERVAL={} is not a positive integer, using {}",
                        value, defaults.progress_interval
                    );
                    defaults.progress_interval
                }
            },
        };

        Self {
            scratch_dir,
            load_syscall: flag("KEXEC_LOAD_SYSCALL", defaults.load_syscall),
            verbose: flag("KEXEC_VERBOSE", defaults.verbose),
            progress_interval,
        }
    }

    /// Materializer writing scratch copies where this configuration says.
    pub fn materializer(&self) -> Materializer {
        Materializer::new(&self.scratch_dir).with_progress_interval(self.progress_interval)
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  KEXEC_SCRATCH_DIR: {}", self.scratch_dir.display());
        println!("  KEXEC_LOAD_SYSCALL: {}", self.load_syscall);
        println!("  KEXEC_VERBOSE: {}", self.verbose);
        println!("  KEXEC_PROGRESS_INTERVAL: {}", self.progress_interval);
        if self.scratch_dir.is_dir() {
            println!("  Scratch dir: FOUND");
        } else {
            println!("  Scratch dir: NOT FOUND (copies will fail)");
        }
    }
}
