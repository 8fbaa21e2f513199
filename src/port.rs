//! Types for opening and using a serial port connected to a controller.
//!
//! A [`Port`] dispatches [`ChannelMessage`]s: every exchange writes one
//! command frame, reads one response frame and classifies it. Writes elicit a
//! response just like queries do.
//!
//! ## Example
//!
//! ```rust
//! # use mks647c::{message::ChannelMessage, port::Port, response::ResponseKind};
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! port.clear()?;
//!
//! // Read the flow setpoint of channel 3.
//! let query = ChannelMessage::query("FS")
//!     .with_channel(3)
//!     .with_response_kind(ResponseKind::Integer);
//! let reply = port.query(&query)?;
//! println!("setpoint: {:?}", reply.value_1().as_int());
//!
//! // Change it.
//! port.write(&ChannelMessage::write("FS", 500.0).with_channel(3))?;
//! # Ok(())
//! # }
//! ```

mod options;
#[cfg(test)]
mod test;

use crate::{
	backend::{self, Backend, Serial, UNKNOWN_BACKEND_NAME},
	error::Error,
	lock::TransportLock,
	message::{ChannelMessage, LINE_FEED},
	response::{Reply, Response, ResponseGrammar},
	timeout_guard::TimeoutGuard,
};
pub use options::*;
use std::{io, time::Duration};

/// The number of bytes requested by each drain read.
const DRAIN_CHUNK: usize = 256;

/// The direction a frame was sent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
	/// The frame was transmitted to the controller.
	Tx,
	/// The frame was received from the controller.
	Recv,
}

/// A port connected to a controller.
///
/// Each exchange holds the port's inter-process [lock](crate::lock) from
/// before the command is written until the response has been read, whether or
/// not the exchange succeeds.
pub struct Port<B> {
	/// The underlying backend
	backend: B,
	/// Serializes exchanges across processes.
	lock: TransportLock,
	/// The read timeout used while draining.
	drain_timeout: Duration,
	/// The maximum number of drain reads.
	drain_attempts: usize,
	/// If populated, the error that has "poisoned" the port. This error MUST be
	/// reported before the port is used for communication again.
	///
	/// A [`TimeoutGuard`] that cannot restore the original timeout when it is
	/// dropped poisons the port instead of panicking.
	poison: Option<io::Error>,
}

impl<B: Backend> std::fmt::Debug for Port<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Port")
			.field("name", &self.backend.name())
			.field("lock", &self.lock.path())
			.finish_non_exhaustive()
	}
}

impl Port<Serial> {
	/// Open the serial port at the specified path using the default options.
	///
	/// Alternatively, use [`Port::open_serial_options`] to customize how the port is opened.
	///
	/// ## Example
	///
	/// ```rust
	/// # use mks647c::port::Port;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut port = Port::open_serial("/dev/ttyUSB0")?;
	/// // Or equivalently
	/// let mut port = Port::open_serial_options().open("/dev/ttyUSB0")?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn open_serial(path: &str) -> Result<Port<Serial>, Error> {
		OpenSerialOptions::new().open(path)
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Port<crate::backend::Mock> {
	/// Open a port backed by a new [`Mock`](crate::backend::Mock), with the
	/// default options.
	pub fn open_mock() -> Self {
		OpenSerialOptions::new().open_backend(crate::backend::Mock::new())
	}
}

/// The backend's name, or a placeholder.
fn backend_name<B: Backend>(backend: &B) -> String {
	backend
		.name()
		.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string())
}

impl<B: Backend> Port<B> {
	/// Create a `Port` from a [`Backend`] type.
	fn from_backend(
		backend: B,
		lock: TransportLock,
		drain_timeout: Duration,
		drain_attempts: usize,
	) -> Self {
		Port {
			backend,
			lock,
			drain_timeout,
			drain_attempts,
			poison: None,
		}
	}

	/// Check if the port is poisoned and report the error if it exists.
	fn check_poisoned(&mut self) -> Result<(), io::Error> {
		if let Some(poison) = self.poison.take() {
			Err(poison)
		} else {
			Ok(())
		}
	}

	fn log_frame(&self, direction: Direction, frame: &[u8]) {
		let label = match direction {
			Direction::Tx => "TX:  ",
			Direction::Recv => "RECV:",
		};
		log::debug!(
			"{} {label} {}",
			backend_name(&self.backend),
			String::from_utf8_lossy(frame).trim_end()
		);
	}

	/// Send a query and return the controller's reply.
	///
	/// Device errors and empty responses are returned as [`Error::Device`]
	/// and [`Error::NoData`], respectively.
	///
	/// ## Example
	///
	/// ```rust
	/// # use mks647c::{message::ChannelMessage, port::Port};
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// # let mut port = Port::open_serial("...")?;
	/// let reply = port.query(&ChannelMessage::query("PR").with_channel(1))?;
	/// # Ok(())
	/// # }
	/// ```
	pub fn query(&mut self, message: &ChannelMessage) -> Result<Reply, Error> {
		Ok(self.exchange(message)?.classify()?)
	}

	/// Send a write and return the controller's reply.
	///
	/// The controller answers writes too, so this behaves exactly like
	/// [`query`](Port::query).
	pub fn write(&mut self, message: &ChannelMessage) -> Result<Reply, Error> {
		Ok(self.exchange(message)?.classify()?)
	}

	/// Send a message and return the parsed, but unclassified, response.
	///
	/// Only a response that does not match its grammar is an error; empty and
	/// error responses are returned as is.
	pub fn exchange(&mut self, message: &ChannelMessage) -> Result<Response, Error> {
		self.check_poisoned()?;
		let command = message.generate()?;

		let _lock = self.lock.acquire()?;
		self.log_frame(Direction::Tx, &command);
		io::Write::write_all(&mut self.backend, &command)?;
		io::Write::flush(&mut self.backend)?;

		let frame = backend::read_until(&mut self.backend, &[LINE_FEED])?;
		self.log_frame(Direction::Recv, &frame);
		Ok(ResponseGrammar::shared(message.response_kind()).read(&frame)?)
	}

	/// Discard any bytes waiting to be read.
	///
	/// Reads with the drain timeout until a read returns nothing or the drain
	/// attempts are used up. Timeouts and other read errors end the drain and
	/// are not reported. Returns the number of bytes discarded.
	pub fn clear(&mut self) -> Result<usize, Error> {
		self.check_poisoned()?;
		let _lock = self.lock.acquire()?;
		let attempts = self.drain_attempts;
		let timeout = self.drain_timeout;
		let mut guard = self.timeout_guard(Some(timeout))?;

		let mut drained = 0;
		for _ in 0..attempts {
			match backend::read_bytes(&mut guard.backend, DRAIN_CHUNK) {
				Ok(bytes) if bytes.is_empty() => break,
				Ok(bytes) => {
					log::trace!(
						"{} drained {:?}",
						backend_name(&guard.backend),
						String::from_utf8_lossy(&bytes)
					);
					drained += bytes.len();
				}
				Err(e) => {
					if e.kind() != io::ErrorKind::TimedOut {
						log::debug!("{} drain stopped: {e}", backend_name(&guard.backend));
					}
					break;
				}
			}
		}
		Ok(drained)
	}

	/// Set the port's read timeout and return a [`TimeoutGuard`] that resets
	/// it when dropped.
	///
	/// ## Example
	///
	/// ```rust
	/// # use mks647c::{message::ChannelMessage, port::Port};
	/// # use std::time::Duration;
	/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
	/// let mut port = Port::open_serial("/dev/ttyUSB0")?;
	/// {
	///     let mut guard = port.timeout_guard(Some(Duration::from_secs(5)))?;
	///     // Exchanges within this scope use a 5 second timeout.
	///     guard.write(&ChannelMessage::write("AZ", 1.0).with_channel(2))?;
	/// }
	/// // The guard is dropped and the timeout is reset.
	/// # Ok(())
	/// # }
	/// ```
	pub fn timeout_guard(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<TimeoutGuard<'_, B, Self>, io::Error> {
		self.check_poisoned()?;

		TimeoutGuard::new(self, timeout)
	}

	/// Set the port's read timeout, returning the previous one.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn set_read_timeout(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<Option<Duration>, io::Error> {
		let old = self.backend.read_timeout()?;
		self.backend.set_read_timeout(timeout)?;
		Ok(old)
	}

	/// Get the read timeout.
	///
	/// If it is `None`, reads will block indefinitely.
	pub fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		self.backend.read_timeout()
	}

	/// Get the "name" of the port's backend.
	///
	/// For serial ports this is the path passed to [`Port::open_serial`].
	pub fn name(&self) -> Option<String> {
		self.backend.name()
	}

	/// Get the lock serializing this port's exchanges.
	pub fn lock(&self) -> &TransportLock {
		&self.lock
	}

	/// Get a referenced to the backend.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Get a mutable reference to the backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Consume the port and return the underlying backend.
	pub fn into_backend(self) -> B {
		self.backend
	}
}

impl<B: Backend> crate::timeout_guard::Port<B> for Port<B> {
	fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}
	fn poison(&mut self, e: io::Error) {
		self.poison = Some(e);
	}
}
