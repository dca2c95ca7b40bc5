//! Lease backend on advisory file locks.
//!
//! Every process that points at the same lease directory (a local disk or a
//! shared mount honoring `flock`) is serialized per key. The kernel drops a
//! lock when its holder exits, so a crashed publisher never strands a key;
//! the timeout is recorded on the handle but not enforced here.
//!
//! Lock files are reused per key and never deleted: unlinking a file another
//! process has open would let two holders lock different inodes for one key.
//! The directory therefore keeps one small file per package version ever
//! published; prune it offline, while no publisher is running.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use sha2::{Digest, Sha256};
use ulid::Ulid;

use super::{LeaseBackend, LeaseError, LeaseHandle, LeaseResult};

/// Advisory-lock lease table rooted at a directory.
#[derive(Debug)]
pub struct FileLeaseBackend {
    dir: PathBuf,
    /// Open lock files by lease token.
    held: Mutex<HashMap<Ulid, (PathBuf, File)>>,
}

impl FileLeaseBackend {
    /// Lease file extension
    const LEASE_EXTENSION: &'static str = "lease";

    /// Open a lease table, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> LeaseResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            held: Mutex::new(HashMap::new()),
        })
    }

    /// The lease directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lock file for a key. Keys carry `/` and `@`, so the name is a digest.
    pub fn lease_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{}.{}", digest, Self::LEASE_EXTENSION))
    }

    fn held(&self) -> MutexGuard<'_, HashMap<Ulid, (PathBuf, File)>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Try to take an exclusive lock on the file.
    #[cfg(unix)]
    fn try_lock_exclusive(path: &Path) -> io::Result<File> {
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)?;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

        if result == 0 {
            Ok(file)
        } else {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lease held"))
            } else {
                Err(err)
            }
        }
    }

    /// Try to take an exclusive lock on the file (non-Unix fallback).
    #[cfg(not(unix))]
    fn try_lock_exclusive(path: &Path) -> io::Result<File> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "lease held"))
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(unix)]
    fn unlock(_path: &Path, file: File) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn unlock(path: &Path, file: File) -> io::Result<()> {
        drop(file);
        fs::remove_file(path)
    }
}

impl LeaseBackend for FileLeaseBackend {
    fn acquire(&self, key: &str, timeout: Duration) -> LeaseResult<LeaseHandle> {
        let path = self.lease_path(key);

        let mut file = match Self::try_lock_exclusive(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(LeaseError::Contention { key: key.to_string() });
            }
            Err(e) => return Err(LeaseError::Io(e)),
        };

        let handle = LeaseHandle::new(key, timeout);

        // Holder note for operators inspecting the directory.
        file.set_len(0)?;
        writeln!(file, "{} {}", handle.token, key)?;

        self.held().insert(handle.token, (path, file));
        Ok(handle)
    }

    fn release(&self, handle: &LeaseHandle) -> LeaseResult<()> {
        let entry = self.held().remove(&handle.token);
        match entry {
            Some((path, file)) => Self::unlock(&path, file).map_err(LeaseError::Io),
            None => Ok(()),
        }
    }
}
