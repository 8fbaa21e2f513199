//! Types that can exchange (read/write) bytes with a connected controller.
//!
//! The [`Backend`] trait represents all such types. The free functions
//! [`read_until`] and [`read_bytes`] implement the blocking reads the protocol
//! needs on top of any backend.

use std::io;
use std::time::Duration;

use serialport as sp;

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow reading and writing bytes with a connected controller.
pub trait Backend: io::Read + io::Write + private::Sealed {
	/// Set the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error>;

	/// Get the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance. Processes sharing a device must see the same name, as it
	/// keys the inter-process [lock](crate::lock).
	fn name(&self) -> Option<String>;
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

impl<C: Backend + ?Sized> Backend for &mut C {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

/// Read bytes until `delimiter` has been read.
///
/// The returned bytes include the delimiter. Blocks until the delimiter is
/// found or the backend's read timeout elapses, in which case the timeout
/// error is returned and the bytes read so far are discarded. Reaching the end
/// of the stream is an [`UnexpectedEof`](io::ErrorKind::UnexpectedEof) error.
pub fn read_until<B: Backend + ?Sized>(backend: &mut B, delimiter: &[u8]) -> io::Result<Vec<u8>> {
	debug_assert!(!delimiter.is_empty());
	let mut buf = Vec::with_capacity(32);
	for byte in io::Read::bytes(&mut *backend) {
		buf.push(byte?);
		if buf.ends_with(delimiter) {
			return Ok(buf);
		}
	}
	Err(io::Error::new(
		io::ErrorKind::UnexpectedEof,
		format!(
			"stream ended before the delimiter {:?} (read {:?})",
			String::from_utf8_lossy(delimiter),
			String::from_utf8_lossy(&buf)
		),
	))
}

/// Read up to `n` bytes.
///
/// Blocks until `n` bytes have been read or a read times out. A timeout after
/// at least one byte ends the read early with the bytes read so far; a timeout
/// before any byte is returned as an error. Fewer than `n` bytes are also
/// returned if the stream ends.
pub fn read_bytes<B: Backend + ?Sized>(backend: &mut B, n: usize) -> io::Result<Vec<u8>> {
	let mut buf = vec![0; n];
	let mut filled = 0;
	while filled < n {
		match io::Read::read(&mut *backend, &mut buf[filled..]) {
			Ok(0) => break,
			Ok(count) => filled += count,
			Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
			Err(e) if e.kind() == io::ErrorKind::TimedOut && filled > 0 => break,
			Err(e) => return Err(e),
		}
	}
	buf.truncate(filled);
	Ok(buf)
}

/// A platform agnostic serial port backend.
//
// The `serialport` crate exposes two platform specific serial ports, `COMPort`
// and `TTYPort` for windows and unix, respectively. Wrapping whichever one the
// platform uses in a new type keeps callers free of both dynamic dispatch and
// an extra type parameter.
#[derive(Debug)]
pub struct Serial(pub(crate) ExternSerial);

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read(buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.flush()
	}
}

impl Backend for Serial {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		// serialport has no infinite timeout, so use the largest one.
		Ok(self.0.set_timeout(timeout.unwrap_or(Duration::MAX))?)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(Some(self.0.timeout()))
	}
	fn name(&self) -> Option<String> {
		self.0.name()
	}
}

/// A mock backend for use in testing.
///
/// It has the following features:
///   * It records all data written to it.
///   * It can be filled with data for reading.
///   * Specific errors can be inserted for calls to `read`, `write`, `flush`,
///     and `set_read_timeout`.
///
/// Reading from an empty mock fails immediately with a
/// [`TimedOut`](io::ErrorKind::TimedOut) error, as a real port would after
/// its timeout.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug)]
pub struct Mock {
	/// Identifies the mock, and therefore its lock.
	name: String,
	/// The buffer data is read from
	buffer: io::Cursor<Vec<u8>>,
	/// Everything written so far.
	written: Vec<u8>,
	/// The error to surface on the next read, if any. It is only surfaced once.
	read_error: Option<io::Error>,
	/// The error to surface on the next write, if any. It is only surfaced once.
	write_error: Option<io::Error>,
	/// The error to surface on the next flush, if any. It is only surfaced once.
	flush_error: Option<io::Error>,
	/// The error to surface on the next set_read_timeout, if any. It is only surfaced once.
	set_read_timeout_error: Option<io::Error>,
	/// The read timeout, which is ignored.
	ignored_read_timeout: Option<Duration>,
}

#[cfg(any(test, feature = "mock"))]
impl Mock {
	/// Create a new Mock backend with a name unique to this process.
	pub fn new() -> Self {
		use std::sync::atomic::{AtomicUsize, Ordering};
		static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
		Mock::with_name(format!(
			"<mock {}:{}>",
			std::process::id(),
			NEXT_ID.fetch_add(1, Ordering::Relaxed)
		))
	}
	/// Create a new Mock backend with a specific name.
	///
	/// Mocks with the same name share a lock.
	pub fn with_name<S: Into<String>>(name: S) -> Self {
		Mock {
			name: name.into(),
			buffer: io::Cursor::new(Vec::new()),
			written: Vec::new(),
			read_error: None,
			write_error: None,
			flush_error: None,
			set_read_timeout_error: None,
			ignored_read_timeout: Some(Duration::ZERO),
		}
	}
	/// Append data to the read buffer.
	///
	/// The data is not validated in any way.
	pub fn append_data<T: AsRef<[u8]>>(&mut self, bytes: T) {
		self.buffer.get_mut().extend_from_slice(bytes.as_ref());
	}
	/// Clear the read buffer.
	pub fn clear_buffer(&mut self) {
		self.buffer.get_mut().clear();
		self.buffer.set_position(0);
	}
	/// Whether the mock has any data available or not
	pub fn is_empty(&self) -> bool {
		self.buffer.position() >= self.buffer.get_ref().len() as u64
	}
	/// The bytes written to the mock so far.
	pub fn written(&self) -> &[u8] {
		&self.written
	}
	/// Take the bytes written to the mock so far, clearing the record.
	pub fn take_written(&mut self) -> Vec<u8> {
		std::mem::take(&mut self.written)
	}
	/// Set the error for the next `read`, if any.
	pub fn read_error(&mut self, err: Option<io::Error>) {
		self.read_error = err;
	}
	/// Set the error for the next `write`, if any.
	pub fn write_error(&mut self, err: Option<io::Error>) {
		self.write_error = err;
	}
	/// Set the error for the next `flush`, if any.
	pub fn flush_error(&mut self, err: Option<io::Error>) {
		self.flush_error = err;
	}
	/// Set the error for the next `set_read_timeout`, if any.
	pub fn set_read_timeout_error(&mut self, err: Option<io::Error>) {
		self.set_read_timeout_error = err;
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for Mock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Backend for Mock {
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		if let Some(err) = self.set_read_timeout_error.take() {
			Err(err)
		} else {
			self.ignored_read_timeout = timeout;
			Ok(())
		}
	}

	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(self.ignored_read_timeout)
	}

	fn name(&self) -> Option<String> {
		Some(self.name.clone())
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Read for Mock {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if let Some(err) = self.read_error.take() {
			Err(err)
		} else if self.is_empty() {
			Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			))
		} else {
			io::Read::read(&mut self.buffer, buf)
		}
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Write for Mock {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if let Some(err) = self.write_error.take() {
			Err(err)
		} else {
			self.written.extend_from_slice(buf);
			Ok(buf.len())
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		if let Some(err) = self.flush_error.take() {
			Err(err)
		} else {
			Ok(())
		}
	}
}

mod private {
	pub trait Sealed {}

	impl Sealed for super::Serial {}
	#[cfg(any(test, feature = "mock"))]
	impl Sealed for super::Mock {}
	impl<C: super::Backend + ?Sized> Sealed for Box<C> {}
	impl<C: super::Backend + ?Sized> Sealed for &mut C {}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Write as _;

	#[test]
	fn read_until_includes_delimiter() {
		let mut mock = Mock::new();
		mock.append_data(b"550\r\nE 3\r\n");
		assert_eq!(read_until(&mut mock, b"\n").unwrap(), b"550\r\n");
		assert_eq!(read_until(&mut mock, b"\r\n").unwrap(), b"E 3\r\n");
	}

	#[test]
	fn read_until_times_out() {
		let mut mock = Mock::new();
		mock.append_data(b"550\r");
		let err = read_until(&mut mock, b"\n").unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::TimedOut);
	}

	#[test]
	fn read_bytes_stops_at_n_or_timeout() {
		let mut mock = Mock::new();
		mock.append_data(b"abcdef");
		assert_eq!(read_bytes(&mut mock, 4).unwrap(), b"abcd");
		assert_eq!(read_bytes(&mut mock, 0).unwrap(), b"");
		assert_eq!(read_bytes(&mut mock, 4).unwrap(), b"ef");
		assert_eq!(
			read_bytes(&mut mock, 4).unwrap_err().kind(),
			io::ErrorKind::TimedOut
		);
	}

	#[test]
	fn mock_records_writes() {
		let mut mock = Mock::new();
		mock.write_all(b"FS 3R\r\n").unwrap();
		mock.write_error(Some(io::Error::new(io::ErrorKind::Other, "boom")));
		assert!(mock.write_all(b"lost").is_err());
		mock.write_all(b"PRR\r\n").unwrap();
		assert_eq!(mock.take_written(), b"FS 3R\r\nPRR\r\n");
		assert!(mock.written().is_empty());
	}

	#[test]
	fn mock_names() {
		assert_ne!(Mock::new().name(), Mock::new().name());
		assert_eq!(Mock::with_name("a").name().as_deref(), Some("a"));
	}
}
