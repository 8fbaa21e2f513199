//! The response grammar, the [`Response`] record and its classification.
//!
//! A response frame is either empty, a value (optionally followed by a second
//! value), or an error block, and is always terminated by `\r\n`:
//!
//! ```text
//! \r\n
//! <value 1>[ <value 2>]\r\n
//! E <code>\r\n
//! ```

use crate::error::{
	ClassifyError, DeviceError, GrammarDefinitionError, MalformedResponseError, NoDataError,
};
use crate::grammar::{
	Concat, ConstantToken, IntegerToken, Match, Optional, Or, Syntax, UntilByteToken, Value,
	Values, WhitespaceToken,
};
use crate::message::CARRIAGE_RETURN;
use std::sync::LazyLock;

/// The marker starting an error block.
pub(crate) const ERROR_MARKER: &str = "E";

/// The names of the values in a response.
pub mod key {
	/// Whether the frame carries a payload.
	pub const HAS_PAYLOAD: &str = "has_payload";
	/// Which of [`ERROR`] or [`VALUE`] the payload is.
	pub const PAYLOAD: &str = "payload";
	/// The error branch.
	pub const ERROR: &str = "error";
	/// The value branch.
	pub const VALUE: &str = "value";
	/// The `E` marker.
	pub const ERROR_MARKER: &str = "error_marker";
	/// Whether a space follows the error marker.
	pub const HAS_ERROR_SPACE: &str = "has_error_space";
	/// The space following the error marker.
	pub const ERROR_SPACE: &str = "error_space";
	/// The device error code.
	pub const ERROR_CODE: &str = "error_code";
	/// The first value.
	pub const VALUE_1: &str = "value_1";
	/// Whether a second value is present.
	pub const HAS_VALUE_2: &str = "has_value_2";
	/// The space preceding the second value.
	pub const VALUE_2_SPACE: &str = "value_2_space";
	/// The second value.
	pub const VALUE_2: &str = "value_2";
	/// The `\r\n` terminator.
	pub const TERMINATOR: &str = "terminator";
}

/// How the values of a response are read.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResponseKind {
	/// The first value is the text up to the carriage return.
	///
	/// A raw value absorbs the rest of the line, so raw responses never
	/// carry a second value.
	#[default]
	Raw,
	/// One or two space-separated integers.
	Integer,
}

static RAW: LazyLock<ResponseGrammar> = LazyLock::new(|| {
	ResponseGrammar::new(ResponseKind::Raw).expect("Invalid raw response grammar")
});
static INTEGER: LazyLock<ResponseGrammar> = LazyLock::new(|| {
	ResponseGrammar::new(ResponseKind::Integer).expect("Invalid integer response grammar")
});

/// The grammar of a response frame.
#[derive(Debug)]
pub struct ResponseGrammar {
	kind: ResponseKind,
	syntax: Concat,
}

impl ResponseGrammar {
	/// Build the grammar for responses of the given kind.
	///
	/// Grammars are immutable, so prefer the instances returned by
	/// [`shared`](ResponseGrammar::shared).
	pub fn new(kind: ResponseKind) -> Result<Self, GrammarDefinitionError> {
		let value_token = |name: &str| -> Box<dyn Syntax> {
			match kind {
				ResponseKind::Raw => UntilByteToken::new(name, CARRIAGE_RETURN).boxed(),
				ResponseKind::Integer => IntegerToken::new(name).boxed(),
			}
		};

		let error = Concat::new(
			key::ERROR,
			vec![
				ConstantToken::new(key::ERROR_MARKER, ERROR_MARKER)?.boxed(),
				Optional::new(key::HAS_ERROR_SPACE, WhitespaceToken::new(key::ERROR_SPACE))
					.boxed(),
				IntegerToken::new(key::ERROR_CODE).boxed(),
			],
		);
		let value = Concat::new(
			key::VALUE,
			vec![
				value_token(key::VALUE_1),
				Optional::new(
					key::HAS_VALUE_2,
					Concat::new(
						"value_2_block",
						vec![
							WhitespaceToken::new(key::VALUE_2_SPACE).boxed(),
							value_token(key::VALUE_2),
						],
					),
				)
				.boxed(),
			],
		);

		let syntax = Concat::new(
			"response",
			vec![
				// A raw value would also match an error block, so errors are
				// tried first. Once `E <code>` matches there is no retry as a
				// value, so `E3 A` is malformed.
				Optional::new(
					key::HAS_PAYLOAD,
					Or::new(key::PAYLOAD, vec![error.boxed(), value.boxed()]),
				)
				.boxed(),
				ConstantToken::new(key::TERMINATOR, "\r\n")?.boxed(),
			],
		);
		Ok(ResponseGrammar { kind, syntax })
	}

	/// The process-wide instance of the grammar for `kind`.
	pub fn shared(kind: ResponseKind) -> &'static ResponseGrammar {
		match kind {
			ResponseKind::Raw => &RAW,
			ResponseKind::Integer => &INTEGER,
		}
	}

	/// The kind of response the grammar reads.
	pub fn kind(&self) -> ResponseKind {
		self.kind
	}

	/// The underlying grammar tree.
	pub fn syntax(&self) -> &dyn Syntax {
		&self.syntax
	}

	/// Parse a response frame at the start of `input`.
	pub fn parse(&self, input: &[u8]) -> Option<Match> {
		self.syntax.parse(input)
	}

	/// Read a complete response frame.
	///
	/// The frame must match the grammar exactly, with no trailing bytes.
	pub fn read(&self, frame: &[u8]) -> Result<Response, MalformedResponseError> {
		match self.parse(frame) {
			Some(m) if m.len == frame.len() => Ok(Response { values: m.values }),
			_ => Err(MalformedResponseError::new(frame)),
		}
	}
}

/// A parsed response frame.
///
/// A response is not yet a success: it may be empty or carry a device error.
/// Use [`classify`](Response::classify) to find out.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	values: Values,
}

impl Response {
	/// Whether the frame carried a value or an error.
	pub fn has_data(&self) -> bool {
		self.values.flag(key::HAS_PAYLOAD)
	}

	/// Whether the frame carried an error block.
	pub fn has_error(&self) -> bool {
		self.has_data() && self.values.str(key::PAYLOAD) == Some(key::ERROR)
	}

	/// The device error code, if the frame carried an error block.
	pub fn error_code(&self) -> Option<i64> {
		if self.has_error() {
			self.values.int(key::ERROR_CODE)
		} else {
			None
		}
	}

	/// The first value, if the frame carried one.
	pub fn value_1(&self) -> Option<&Value> {
		if self.has_data() && !self.has_error() {
			self.values.get(key::VALUE_1)
		} else {
			None
		}
	}

	/// The second value, if the frame carried one.
	pub fn value_2(&self) -> Option<&Value> {
		if self.values.flag(key::HAS_VALUE_2) {
			self.values.get(key::VALUE_2)
		} else {
			None
		}
	}

	/// All parsed values.
	pub fn values(&self) -> &Values {
		&self.values
	}

	/// Turn the response into a successful [`Reply`], or the reason it is
	/// not one.
	pub fn classify(self) -> Result<Reply, ClassifyError> {
		if !self.has_data() {
			return Err(NoDataError::new().into());
		}
		if let Some(code) = self.error_code() {
			return Err(DeviceError::new(code).into());
		}
		let mut values = self.values;
		let value_2 = if values.flag(key::HAS_VALUE_2) {
			values.remove(key::VALUE_2)
		} else {
			None
		};
		match values.remove(key::VALUE_1) {
			Some(value_1) => Ok(Reply { value_1, value_2 }),
			None => Err(NoDataError::new().into()),
		}
	}
}

/// The values of a successful response.
///
/// Values are not converted to physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
	value_1: Value,
	value_2: Option<Value>,
}

impl Reply {
	/// The first value.
	pub fn value_1(&self) -> &Value {
		&self.value_1
	}

	/// The second value, for two-field responses.
	pub fn value_2(&self) -> Option<&Value> {
		self.value_2.as_ref()
	}

	/// The first value as a number.
	///
	/// Raw text is trimmed and may use either `.` or `,` as the decimal
	/// separator.
	pub fn number(&self) -> Option<f64> {
		match &self.value_1 {
			Value::Str(s) => s.trim().replace(',', ".").parse().ok(),
			other => other.as_float(),
		}
	}

	/// Consume the reply, returning its values.
	pub fn into_values(self) -> (Value, Option<Value>) {
		(self.value_1, self.value_2)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::error::DeviceErrorKind;

	fn read(kind: ResponseKind, frame: &[u8]) -> Response {
		ResponseGrammar::shared(kind).read(frame).unwrap()
	}

	#[test]
	fn integer_value() {
		let response = read(ResponseKind::Integer, b"550\r\n");
		assert!(response.has_data());
		assert!(!response.has_error());
		assert_eq!(response.error_code(), None);
		assert_eq!(response.value_1(), Some(&Value::Int(550)));
		assert_eq!(response.value_2(), None);

		let reply = response.classify().unwrap();
		assert_eq!(reply.value_1().as_int(), Some(550));
		assert_eq!(reply.number(), Some(550.0));
	}

	#[test]
	fn two_integer_values() {
		let reply = read(ResponseKind::Integer, b"1 -12\r\n").classify().unwrap();
		assert_eq!(reply.value_1().as_int(), Some(1));
		assert_eq!(reply.value_2().and_then(Value::as_int), Some(-12));
	}

	#[test]
	fn raw_value() {
		let reply = read(ResponseKind::Raw, b" 100,0\r\n").classify().unwrap();
		assert_eq!(reply.value_1().as_str(), Some(" 100,0"));
		assert_eq!(reply.value_2(), None);
		assert_eq!(reply.number(), Some(100.0));

		let reply = read(ResponseKind::Raw, b"EXTERN\r\n").classify().unwrap();
		assert_eq!(reply.value_1().as_str(), Some("EXTERN"));
	}

	#[test]
	fn device_errors() {
		for kind in [ResponseKind::Raw, ResponseKind::Integer] {
			let response = read(kind, b"E 3\r\n");
			assert!(response.has_data());
			assert!(response.has_error());
			assert_eq!(response.error_code(), Some(3));
			assert_eq!(response.value_1(), None);
			match response.classify() {
				Err(ClassifyError::Device(e)) => {
					assert_eq!(e.code(), 3);
					assert_eq!(e.kind(), DeviceErrorKind::InvalidExpression);
				}
				other => panic!("unexpected {other:?}"),
			}
		}

		let response = read(ResponseKind::Integer, b"E9\r\n");
		match response.classify() {
			Err(ClassifyError::Device(e)) => {
				assert_eq!(e.code(), 9);
				assert_eq!(e.kind(), DeviceErrorKind::Unknown);
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn error_branch_wins_once_a_code_is_read() {
		let grammar = ResponseGrammar::shared(ResponseKind::Raw);

		// No code after the marker: the frame is a raw value.
		let reply = grammar.read(b"E\r\n").unwrap().classify().unwrap();
		assert_eq!(reply.value_1().as_str(), Some("E"));

		// A code followed by anything else is not retried as a raw value.
		for frame in [&b"E3 A\r\n"[..], &b"E 1.5\r\n"[..]] {
			let err = grammar.read(frame).unwrap_err();
			assert_eq!(err.as_bytes(), frame);
		}
	}

	#[test]
	fn no_data() {
		for kind in [ResponseKind::Raw, ResponseKind::Integer] {
			let response = read(kind, b"\r\n");
			assert!(!response.has_data());
			assert!(!response.has_error());
			assert_eq!(response.classify(), Err(NoDataError::new().into()));
		}
	}

	#[test]
	fn malformed() {
		let grammar = ResponseGrammar::shared(ResponseKind::Integer);
		for frame in [
			&b"550"[..],
			&b"550\r"[..],
			&b"abc\r\n"[..],
			&b"E \r\n"[..],
			&b"550\r\n\r\n"[..],
			&b""[..],
		] {
			let err = grammar.read(frame).unwrap_err();
			assert_eq!(err.as_bytes(), frame);
		}
		assert!(ResponseGrammar::shared(ResponseKind::Raw).read(b"12").is_err());
	}

	#[test]
	fn parse_reports_consumed_length() {
		let grammar = ResponseGrammar::shared(ResponseKind::Integer);
		let m = grammar.parse(b"550\r\ngarbage").unwrap();
		assert_eq!(m.len, 5);
		assert_eq!(m.values.int(key::VALUE_1), Some(550));
	}
}
