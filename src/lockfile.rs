// Cross-process advisory lock around the load/sweep/mutate/save cycle
//
// One invocation at a time gets the store: the lock file next to the
// store is held via flock(LOCK_EX) for the entire critical section and
// released by the OS when the guard drops, so a crashed holder never
// wedges the pool.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("timed out waiting for lock on {}", path.display())]
    Timeout { path: PathBuf },

    #[error("io error on lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// RAII guard for the store lock. The flock is released when the guard
/// drops (or the process dies).
pub struct StoreLock {
    _lock_file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquire the advisory lock for `store_path`, polling until
    /// success or timeout. The lock file lives next to the store.
    pub fn acquire(store_path: &Path) -> Result<Self, LockError> {
        let path = store_path.with_extension("lock");
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        let start = Instant::now();
        loop {
            if try_flock_exclusive(&lock_file).map_err(io_err)? {
                debug!(path = %path.display(), "store lock acquired");
                return Ok(Self {
                    _lock_file: lock_file,
                    path,
                });
            }
            if start.elapsed() >= LOCK_TIMEOUT {
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Try to take an exclusive flock on `file` without blocking. `Ok(false)`
/// means another process holds it.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: flock is a standard POSIX call on a file descriptor
        // owned by `file`, which outlives this call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}
