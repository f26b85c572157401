//! Shared test utilities for kexec-image tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::{FileExt, MetadataExt};
use std::path::{Path, PathBuf};

use kexec_image::fsclass::{access_mode, is_memory_backed, AccessMode};
use kexec_image::source::ByteSource;
use kexec_image::{Kexec, KexecOptions, Materializer};
use tempfile::TempDir;

/// Test environment with a scratch area and an asset directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Where the materializer puts copies
    pub scratch: PathBuf,
    /// Where tests put kernels, initrds and device trees
    pub assets: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let scratch = temp_dir.path().join("scratch");
        let assets = temp_dir.path().join("assets");
        fs::create_dir_all(&scratch).expect("Failed to create scratch dir");
        fs::create_dir_all(&assets).expect("Failed to create assets dir");

        Self {
            _temp_dir: temp_dir,
            scratch,
            assets,
        }
    }

    pub fn materializer(&self) -> Materializer {
        Materializer::new(&self.scratch)
    }

    /// Number of files currently in the scratch area.
    pub fn scratch_count(&self) -> usize {
        fs::read_dir(&self.scratch)
            .expect("Failed to read scratch dir")
            .count()
    }

    /// Write an asset file and return its path.
    pub fn asset(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.assets.join(name);
        fs::write(&path, content).expect("Failed to write asset");
        path
    }
}

/// A temp dir on tmpfs, or None if /dev/shm is not memory-backed here.
pub fn tmpfs_dir() -> Option<TempDir> {
    let shm = Path::new("/dev/shm");
    if !matches!(is_memory_backed(shm), Ok(true)) {
        eprintln!("Skipping: /dev/shm is not tmpfs on this host");
        return None;
    }
    Some(TempDir::new_in(shm).expect("Failed to create dir in /dev/shm"))
}

/// Number of descriptors this process has open.
pub fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd")
        .expect("Failed to read /proc/self/fd")
        .count()
}

/// (device, inode) of an open file.
pub fn identity(file: &File) -> (u64, u64) {
    let meta = file.metadata().expect("Failed to stat file");
    (meta.dev(), meta.ino())
}

/// What a file looked like when the kexec layer received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenFile {
    pub content: Vec<u8>,
    pub access: AccessMode,
    pub identity: (u64, u64),
}

fn see(file: &File) -> SeenFile {
    // Positional read: a reused file shares its offset with the caller.
    let len = file.metadata().expect("Failed to stat file").len();
    let mut content = vec![0; len as usize];
    file.read_exact_at(&mut content, 0).expect("Failed to read file");
    SeenFile {
        content,
        access: access_mode(file).expect("Failed to query access mode"),
        identity: identity(file),
    }
}

/// One recorded kexec call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Load {
        kernel: SeenFile,
        initrd: Option<SeenFile>,
        cmdline: String,
        options: String,
    },
    FileLoad {
        kernel: SeenFile,
        initrd: Option<SeenFile>,
        cmdline: String,
    },
    Execute,
}

/// Kexec backend that records its arguments instead of calling the kernel.
#[derive(Default)]
pub struct RecordingKexec {
    calls: RefCell<Vec<Call>>,
    fail_with: Option<i32>,
}

impl RecordingKexec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every syscall fails with `errno`.
    pub fn failing(errno: i32) -> Self {
        Self {
            calls: RefCell::default(),
            fail_with: Some(errno),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn result(&self) -> io::Result<()> {
        match self.fail_with {
            Some(errno) => Err(io::Error::from_raw_os_error(errno)),
            None => Ok(()),
        }
    }
}

impl Kexec for RecordingKexec {
    fn load(
        &self,
        kernel: &File,
        initrd: Option<&File>,
        cmdline: &str,
        opts: &KexecOptions,
    ) -> io::Result<()> {
        self.calls.borrow_mut().push(Call::Load {
            kernel: see(kernel),
            initrd: initrd.map(see),
            cmdline: cmdline.to_string(),
            options: opts.to_string(),
        });
        self.result()
    }

    fn file_load(&self, kernel: &File, initrd: Option<&File>, cmdline: &str) -> io::Result<()> {
        self.calls.borrow_mut().push(Call::FileLoad {
            kernel: see(kernel),
            initrd: initrd.map(see),
            cmdline: cmdline.to_string(),
        });
        self.result()
    }

    fn execute(&self) -> io::Result<()> {
        self.calls.borrow_mut().push(Call::Execute);
        self.result()
    }
}

/// Source whose first `good` bytes read fine and then fails.
pub struct FailingSource {
    pub good: u64,
}

impl ByteSource for FailingSource {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset < self.good {
            let n = buf.len().min((self.good - offset) as usize);
            buf[..n].fill(b'x');
            return Ok(n);
        }
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "network source dropped"))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.good * 2)
    }

    fn type_tag(&self) -> &'static str {
        "FailingSource"
    }
}

/// gzip-compress `bytes`.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).expect("Failed to compress");
    enc.finish().expect("Failed to finish gzip stream")
}
