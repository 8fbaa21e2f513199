use super::*;
use crate::{
	backend::Mock,
	error::DeviceErrorKind,
	response::ResponseKind,
};
use static_assertions::assert_impl_all;
use tempfile::TempDir;

assert_impl_all!(Port<Serial>: Send, std::fmt::Debug);
assert_impl_all!(Port<Box<dyn Backend + Send>>: Send);

/// Open a mock port whose lock lives in a fresh directory.
fn mock_port() -> (Port<Mock>, TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let port = OpenSerialOptions::new()
		.lock_dir(dir.path())
		.lock_timeout(Duration::from_millis(20))
		.drain_attempts(4)
		.open_backend(Mock::new());
	(port, dir)
}

fn fs_query() -> ChannelMessage {
	ChannelMessage::query("FS")
		.with_channel(3)
		.with_response_kind(ResponseKind::Integer)
}

#[test]
fn query_round_trip() {
	let _ = simple_logger::init_with_level(log::Level::Trace);
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"550\r\n");

	let reply = port.query(&fs_query()).unwrap();
	assert_eq!(reply.value_1().as_int(), Some(550));
	assert_eq!(reply.value_2(), None);
	assert_eq!(port.backend().written(), b"FS 3R\r\n");
}

#[test]
fn write_reads_a_response() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b" 100.0\r\n");

	let reply = port
		.write(&ChannelMessage::write("FS", 100.0).with_channel(3))
		.unwrap();
	assert_eq!(reply.number(), Some(100.0));
	assert_eq!(port.backend().written(), b"FS 3 100\r\n");
	assert!(port.backend().is_empty());
}

#[test]
fn consecutive_exchanges_read_one_frame_each() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"1\r\n2\r\n");
	assert_eq!(port.query(&fs_query()).unwrap().value_1().as_int(), Some(1));
	assert_eq!(port.query(&fs_query()).unwrap().value_1().as_int(), Some(2));
	assert_eq!(port.backend().written(), b"FS 3R\r\nFS 3R\r\n");
}

#[test]
fn device_error() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"E 3\r\n");

	let err = port.query(&fs_query()).unwrap_err();
	assert!(err.is_device_error());
	match err {
		Error::Device(e) => {
			assert_eq!(e.code(), 3);
			assert_eq!(e.kind(), DeviceErrorKind::InvalidExpression);
		}
		other => panic!("unexpected {other:?}"),
	}
}

#[test]
fn no_data() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"\r\n");
	assert!(matches!(port.query(&fs_query()), Err(Error::NoData(_))));
}

#[test]
fn exchange_returns_unclassified_responses() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"E 1\r\n\r\n");

	let response = port.exchange(&fs_query()).unwrap();
	assert_eq!(response.error_code(), Some(1));
	let response = port.exchange(&fs_query()).unwrap();
	assert!(!response.has_data());
}

#[test]
fn malformed_response() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"12.5\r\n");

	match port.query(&fs_query()) {
		Err(Error::MalformedResponse(e)) => assert_eq!(e.as_bytes(), b"12.5\r\n"),
		other => panic!("unexpected {other:?}"),
	}
}

#[test]
fn generate_error_writes_nothing() {
	let (mut port, _dir) = mock_port();
	let mut message = ChannelMessage::new();
	message.set_query();

	assert!(matches!(
		port.query(&message),
		Err(Error::MissingParameter(_))
	));
	assert!(port.backend().written().is_empty());
}

#[test]
fn timeout() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"55");

	let err = port.query(&fs_query()).unwrap_err();
	assert!(err.is_timeout());
}

#[test]
fn lock_is_released_after_a_failed_read() {
	let (mut port, _dir) = mock_port();
	port.backend_mut()
		.read_error(Some(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));

	let err = port.query(&fs_query()).unwrap_err();
	assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));

	// Another process can take the lock.
	let other = TransportLock::new(
		port.lock().path().parent().unwrap(),
		&port.name().unwrap(),
		Duration::ZERO,
	);
	assert_eq!(other.path(), port.lock().path());
	drop(other.acquire().unwrap());

	// And the next exchange is not blocked.
	port.backend_mut().append_data(b"7\r\n");
	assert_eq!(port.query(&fs_query()).unwrap().value_1().as_int(), Some(7));
}

#[test]
fn lock_is_released_after_a_failed_write() {
	let (mut port, _dir) = mock_port();
	port.backend_mut()
		.write_error(Some(io::Error::new(io::ErrorKind::Other, "boom")));
	assert!(port.query(&fs_query()).is_err());

	port.backend_mut().append_data(b"8\r\n");
	assert_eq!(port.query(&fs_query()).unwrap().value_1().as_int(), Some(8));
}

#[test]
fn held_lock_blocks_exchanges() {
	let (mut port, _dir) = mock_port();
	port.backend_mut().append_data(b"9\r\n");
	let held = port.lock().clone().acquire().unwrap();

	let err = port.query(&fs_query()).unwrap_err();
	assert!(err.is_timeout());
	assert!(port.backend().written().is_empty());

	drop(held);
	assert_eq!(port.query(&fs_query()).unwrap().value_1().as_int(), Some(9));
}

#[test]
fn clear_drains_and_restores_the_timeout() {
	let (mut port, _dir) = mock_port();
	port.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
	port.backend_mut().append_data(b"junk\r\nmore junk");

	assert_eq!(port.clear().unwrap(), 15);
	assert!(port.backend().is_empty());
	assert_eq!(port.read_timeout().unwrap(), Some(Duration::from_secs(2)));

	assert_eq!(port.clear().unwrap(), 0);
}

#[test]
fn clear_is_bounded_by_attempts() {
	let (mut port, _dir) = mock_port();
	let data = vec![b'x'; DRAIN_CHUNK * 5];
	port.backend_mut().append_data(&data);

	assert_eq!(port.clear().unwrap(), DRAIN_CHUNK * 4);
	assert!(!port.backend().is_empty());
}

#[test]
fn clear_swallows_read_errors() {
	let (mut port, _dir) = mock_port();
	port.backend_mut()
		.read_error(Some(io::Error::new(io::ErrorKind::Other, "noise")));
	assert_eq!(port.clear().unwrap(), 0);
}

#[test]
fn failed_timeout_restore_poisons_the_port() {
	let (mut port, _dir) = mock_port();
	{
		let mut guard = port.timeout_guard(Some(Duration::from_millis(1))).unwrap();
		guard
			.backend_mut()
			.set_read_timeout_error(Some(io::Error::new(io::ErrorKind::Other, "stuck")));
	}
	port.backend_mut().append_data(b"1\r\n");

	let err = port.query(&fs_query()).unwrap_err();
	assert!(matches!(err, Error::Io(_)));
	assert!(port.backend().written().is_empty());

	// The poison is only reported once.
	assert_eq!(port.query(&fs_query()).unwrap().value_1().as_int(), Some(1));
}

#[test]
fn open_mock_uses_a_unique_lock() {
	let a = Port::open_mock();
	let b = Port::open_mock();
	assert_ne!(a.lock().path(), b.lock().path());
	assert!(format!("{a:?}").contains("Port"));
}
