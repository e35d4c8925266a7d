//! Advisory lock file guarding one record file.
//!
//! Each record file `<name>.csv` gets a sibling `<name>.csv.lock`. Holding
//! an exclusive OS lock on it excludes other store instances (in this or
//! another process on the same machine) for the whole read-modify-write.
//!
//! - The lock is released when `FileLock` is dropped (closing the handle)
//! - The lock file is created if it doesn't exist and never deleted
//! - [`FileLock::acquire`] blocks; [`FileLock::try_acquire`] does not

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

use super::sibling_path;

/// Exclusive lock on a record file's companion lock file.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Lock file path for a record file.
    #[must_use]
    pub fn lock_path_for(target: &Path) -> PathBuf {
        sibling_path(target, ".lock")
    }

    /// Waits until the lock for `target` can be taken.
    ///
    /// # Errors
    /// - `ErrorKind::PermissionDenied` if the lock file cannot be created
    pub fn acquire(target: &Path) -> IoResult<Self> {
        Self::open(target, true)
    }

    /// Takes the lock for `target` without waiting.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if another holder has it
    pub fn try_acquire(target: &Path) -> IoResult<Self> {
        Self::open(target, false)
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(target: &Path, wait: bool) -> IoResult<Self> {
        let lock_path = Self::lock_path_for(target);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        Self::lock(&file, wait)?;

        Ok(Self {
            _file: file,
            path: lock_path,
        })
    }

    #[cfg(unix)]
    fn lock(file: &File, wait: bool) -> IoResult<()> {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        let op = if wait {
            libc::LOCK_EX
        } else {
            libc::LOCK_EX | libc::LOCK_NB
        };

        loop {
            let result = unsafe { libc::flock(fd, op) };
            if result == 0 {
                return Ok(());
            }

            let errno = IoError::last_os_error();
            match errno.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EWOULDBLOCK) => {
                    return Err(IoError::new(
                        ErrorKind::WouldBlock,
                        "record file is locked by another writer",
                    ));
                }
                _ => return Err(errno),
            }
        }
    }

    #[cfg(windows)]
    fn lock(file: &File, wait: bool) -> IoResult<()> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::{
            LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
        };

        let flags = if wait {
            LOCKFILE_EXCLUSIVE_LOCK
        } else {
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY
        };

        let handle = file.as_raw_handle() as HANDLE;
        let result = unsafe {
            let mut overlapped = std::mem::zeroed::<windows_sys::Win32::System::IO::OVERLAPPED>();
            LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
        };

        if result == 0 {
            let err = IoError::last_os_error();
            if wait {
                return Err(err);
            }
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("record file is locked by another writer: {err}"),
            ));
        }

        Ok(())
    }

    #[cfg(not(any(unix, windows)))]
    fn lock(_file: &File, _wait: bool) -> IoResult<()> {
        tracing::warn!("file locking not supported on this platform; relying on in-process lock only");
        Ok(())
    }
}
