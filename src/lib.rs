//! A library for communicating with MKS 647C gas flow and pressure
//! controllers over a serial port.
//!
//! The controller speaks a line-based ASCII protocol: the host sends a command
//! frame such as `FS 3R\r\n` (read the flow setpoint of channel 3) and the
//! controller answers with a value (`550\r\n`), an error (`E 3\r\n`) or an
//! empty line.
//!
//! * [`grammar`] is a small bidirectional grammar engine. One grammar tree both
//!   parses frames and generates them.
//! * [`message`] and [`response`] define the protocol's frames with it.
//! * [`port`] dispatches messages over a [`backend`], holding an inter-process
//!   [`lock`] for each exchange.
//!
//! ## Example
//!
//! ```rust
//! # use mks647c::{message::ChannelMessage, port::Port, response::ResponseKind};
//! # fn wrapper() -> Result<(), mks647c::error::Error> {
//! let mut port = Port::open_serial("/dev/ttyUSB0")?;
//! let query = ChannelMessage::query("FS")
//!     .with_channel(3)
//!     .with_response_kind(ResponseKind::Integer);
//! match port.query(&query) {
//!     Ok(reply) => println!("setpoint: {:?}", reply.value_1()),
//!     Err(e) if e.is_device_error() => println!("the controller refused: {e}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Two-letter command codes, legal ranges and unit conversions are up to the
//! caller.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod error;
pub mod grammar;
pub mod lock;
pub mod message;
pub mod port;
pub mod response;
pub mod timeout_guard;
