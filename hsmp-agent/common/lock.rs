use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};

use crate::error::{HsmpError, Result};

/// Exclusive advisory lock on a well-known file, released on drop
///
/// Every process driving the mailbox takes this lock for a whole
/// transaction, so at most one message is in flight system-wide.
pub struct LockGuard {
    file: File,
}

impl LockGuard {
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o666)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    HsmpError::PermissionDenied(format!("Failed to open {}: {e}", path.display()))
                } else {
                    HsmpError::IoError(e)
                }
            })?;

        loop {
            match flock(file.as_raw_fd(), FlockArg::LockExclusive) {
                Ok(()) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(HsmpError::NixError(e)),
            }
        }

        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = flock(self.file.as_raw_fd(), FlockArg::Unlock);
    }
}
