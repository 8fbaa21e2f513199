//! Options for opening a port.

use super::Port;
use crate::{
	backend::{Backend, Serial},
	error::Error,
	lock::TransportLock,
};
use serialport as sp;
use std::{path::PathBuf, time::Duration};

/// Options for configuring and opening a serial port.
///
/// The line settings default to what the controller ships with: 9600 baud,
/// 8 data bits, odd parity, 1 stop bit and no flow control.
///
/// ## Example
///
/// ```rust
/// # use mks647c::port::OpenSerialOptions;
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let mut port = OpenSerialOptions::new()
///     .timeout(Some(Duration::from_millis(500)))
///     .lock_dir("/run/lock")
///     .open("/dev/ttyUSB0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenSerialOptions {
	/// The baud rate.
	baud_rate: u32,
	/// The parity bit.
	parity: sp::Parity,
	/// The read timeout.
	timeout: Option<Duration>,
	/// The directory holding lock files. `None` means the OS temp directory.
	lock_dir: Option<PathBuf>,
	/// How long to wait for another process to release the port.
	lock_timeout: Duration,
	/// The read timeout while draining the port.
	drain_timeout: Duration,
	/// The maximum number of reads while draining the port.
	drain_attempts: usize,
}

impl OpenSerialOptions {
	/// The default baud rate: 9600.
	pub const DEFAULT_BAUD_RATE: u32 = 9600;
	/// The default read timeout: 1 second.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
	/// The default lock timeout: 10 seconds.
	pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
	/// The default drain timeout: 100 milliseconds.
	pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
	/// The default number of drain reads: 64.
	pub const DEFAULT_DRAIN_ATTEMPTS: usize = 64;

	/// Create a set of options with the defaults.
	///
	/// Equivalent to [`default`](OpenSerialOptions::default).
	pub fn new() -> Self {
		OpenSerialOptions {
			baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
			parity: sp::Parity::Odd,
			timeout: Some(OpenSerialOptions::DEFAULT_TIMEOUT),
			lock_dir: None,
			lock_timeout: OpenSerialOptions::DEFAULT_LOCK_TIMEOUT,
			drain_timeout: OpenSerialOptions::DEFAULT_DRAIN_TIMEOUT,
			drain_attempts: OpenSerialOptions::DEFAULT_DRAIN_ATTEMPTS,
		}
	}

	/// Set a custom baud rate.
	///
	/// The default is 9600.
	pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
		self.baud_rate = baud_rate;
		self
	}

	/// Set the parity.
	///
	/// The default is [`Odd`](sp::Parity::Odd).
	pub fn parity(&mut self, parity: sp::Parity) -> &mut Self {
		self.parity = parity;
		self
	}

	/// Set a custom read timeout.
	///
	/// If duration is `None`, reads will block indefinitely. The default is 1 second.
	pub fn timeout(&mut self, duration: Option<Duration>) -> &mut Self {
		self.timeout = duration;
		self
	}

	/// Set the directory lock files are created in.
	///
	/// Every process sharing a device must use the same directory. The
	/// default is [`std::env::temp_dir`].
	pub fn lock_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
		self.lock_dir = Some(dir.into());
		self
	}

	/// Set how long an exchange waits for another process to release the port.
	///
	/// The default is 10 seconds.
	pub fn lock_timeout(&mut self, duration: Duration) -> &mut Self {
		self.lock_timeout = duration;
		self
	}

	/// Set the read timeout used by [`Port::clear`].
	///
	/// The default is 100 milliseconds.
	pub fn drain_timeout(&mut self, duration: Duration) -> &mut Self {
		self.drain_timeout = duration;
		self
	}

	/// Set the maximum number of reads [`Port::clear`] makes.
	///
	/// The default is 64.
	pub fn drain_attempts(&mut self, attempts: usize) -> &mut Self {
		self.drain_attempts = attempts;
		self
	}

	/// Open a [`Serial`] port at the specified path.
	fn open_serial_port(&self, path: &str) -> Result<Serial, Error> {
		sp::new(path, self.baud_rate)
			.data_bits(sp::DataBits::Eight)
			.parity(self.parity)
			.flow_control(sp::FlowControl::None)
			.stop_bits(sp::StopBits::One)
			.timeout(self.timeout.unwrap_or(Duration::MAX))
			.baud_rate(self.baud_rate)
			.open_native()
			.map(Serial)
			.map_err(Into::into)
	}

	/// Open the port at the specified path with the custom options.
	pub fn open(&self, path: &str) -> Result<Port<Serial>, Error> {
		Ok(self.open_backend(self.open_serial_port(path)?))
	}

	/// Open the port at the specified path with the custom options.
	///
	/// The type of the underlying backend is erased via dynamic dispatch,
	/// which does have runtime overhead. [`OpenSerialOptions::open`] should
	/// generally be used instead, except when the type of the underlying
	/// backend may not be known at compile time.
	pub fn open_dyn(&self, path: &str) -> Result<Port<Box<dyn Backend>>, Error> {
		Ok(self.open_backend(Box::new(self.open_serial_port(path)?)))
	}

	/// Wrap an already open backend in a port using these options.
	///
	/// The line settings and read timeout do not apply; only the lock and
	/// drain options are used.
	pub fn open_backend<B: Backend>(&self, backend: B) -> Port<B> {
		let dir = self.lock_dir.clone().unwrap_or_else(std::env::temp_dir);
		let lock = TransportLock::new(dir, &super::backend_name(&backend), self.lock_timeout);
		Port::from_backend(backend, lock, self.drain_timeout, self.drain_attempts)
	}
}

impl Default for OpenSerialOptions {
	fn default() -> Self {
		Self::new()
	}
}
