//! An inter-process lock around a transport.
//!
//! A serial device may be shared by unrelated processes on the same host, so
//! exchanges are serialized with an advisory lock file rather than an
//! in-process mutex. The lock file is keyed by the backend's name, which for
//! serial ports is the device path.
//!
//! The lock is an OS file lock on the lock file ([`File::try_lock`]), so it is
//! released when the holder exits, even if it crashes. The lock file itself is
//! never removed, and a leftover file does not hold the lock.

use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// How long to wait between attempts to take a held lock.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A lock keyed by a transport's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportLock {
	path: PathBuf,
	timeout: Duration,
}

impl TransportLock {
	/// Create a lock for the transport named `name`, with its lock file in
	/// `dir`.
	///
	/// Acquiring the lock fails with a [`TimedOut`](io::ErrorKind::TimedOut)
	/// error if it is held for longer than `timeout`.
	pub fn new<P: Into<PathBuf>>(dir: P, name: &str, timeout: Duration) -> Self {
		let mut path = dir.into();
		path.push(format!("mks647c-{}.lock", sanitize(name)));
		TransportLock { path, timeout }
	}

	/// The path of the lock file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// How long [`acquire`](TransportLock::acquire) waits for a held lock.
	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Block until the lock is taken or the timeout elapses.
	///
	/// The lock is held until the returned guard is dropped.
	pub fn acquire(&self) -> io::Result<LockGuard> {
		let deadline = Instant::now() + self.timeout;
		loop {
			if let Some(file) = try_lock(&self.path)? {
				log::trace!("acquired lock {}", self.path.display());
				return Ok(LockGuard {
					file,
					path: self.path.clone(),
				});
			}
			if Instant::now() >= deadline {
				return Err(io::Error::new(
					io::ErrorKind::TimedOut,
					format!(
						"timed out after {:?} waiting for lock {}",
						self.timeout,
						self.path.display()
					),
				));
			}
			thread::sleep(POLL_INTERVAL);
		}
	}
}

/// Holds a [`TransportLock`] until dropped.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
	file: File,
	path: PathBuf,
}

impl Drop for LockGuard {
	fn drop(&mut self) {
		if let Err(e) = self.file.unlock() {
			log::debug!("failed to unlock {}: {e}", self.path.display());
		}
		log::trace!("released lock {}", self.path.display());
	}
}

/// Turn a backend name into something usable in a file name.
fn sanitize(name: &str) -> String {
	name.chars()
		.map(|c| {
			if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
				c
			} else {
				'_'
			}
		})
		.collect()
}

/// Open the lock file and try to lock it without blocking.
///
/// Returns `None` if another holder has it.
fn try_lock(path: &Path) -> io::Result<Option<File>> {
	let file = OpenOptions::new()
		.read(true)
		.write(true)
		.create(true)
		.truncate(false)
		.open(path)?;
	match file.try_lock() {
		Ok(()) => Ok(Some(file)),
		Err(TryLockError::WouldBlock) => Ok(None),
		Err(TryLockError::Error(e)) => Err(e),
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use static_assertions::assert_impl_all;

	assert_impl_all!(TransportLock: Send, Sync);
	assert_impl_all!(LockGuard: Send);

	#[test]
	fn lock_file_name() {
		let lock = TransportLock::new("/tmp", "/dev/ttyUSB0", Duration::ZERO);
		assert_eq!(lock.path(), Path::new("/tmp/mks647c-_dev_ttyUSB0.lock"));
		assert_eq!(sanitize("COM3"), "COM3");
		assert_eq!(sanitize("<mock 1:2>"), "_mock_1_2_");
	}

	#[test]
	fn held_lock_blocks_until_released() {
		let dir = tempfile::tempdir().unwrap();
		let lock = TransportLock::new(dir.path(), "port", Duration::from_millis(50));
		let other = TransportLock::new(dir.path(), "port", Duration::from_millis(50));

		let guard = lock.acquire().unwrap();
		let err = other.acquire().unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::TimedOut);

		drop(guard);
		let _guard = other.acquire().unwrap();
	}

	#[test]
	fn locks_are_keyed_by_name() {
		let dir = tempfile::tempdir().unwrap();
		let a = TransportLock::new(dir.path(), "a", Duration::ZERO);
		let b = TransportLock::new(dir.path(), "b", Duration::ZERO);
		let _a = a.acquire().unwrap();
		let _b = b.acquire().unwrap();
	}

	#[test]
	fn waiter_gets_lock_after_release() {
		let dir = tempfile::tempdir().unwrap();
		let lock = TransportLock::new(dir.path(), "port", Duration::from_secs(5));
		let guard = lock.acquire().unwrap();

		let waiter = {
			let lock = lock.clone();
			thread::spawn(move || lock.acquire().map(drop))
		};
		thread::sleep(Duration::from_millis(20));
		drop(guard);
		waiter.join().unwrap().unwrap();
	}

	#[test]
	fn leftover_lock_file_does_not_block() {
		let dir = tempfile::tempdir().unwrap();
		let lock = TransportLock::new(dir.path(), "port", Duration::ZERO);
		std::fs::write(lock.path(), b"").unwrap();
		drop(lock.acquire().unwrap());
		assert!(lock.path().exists());
		let _guard = lock.acquire().unwrap();
	}

	#[test]
	fn missing_directory_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let lock = TransportLock::new(dir.path().join("missing"), "port", Duration::ZERO);
		assert_eq!(lock.acquire().unwrap_err().kind(), io::ErrorKind::NotFound);
	}
}
