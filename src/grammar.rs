//! A small bidirectional grammar engine.
//!
//! A grammar is an immutable tree of [`Syntax`] nodes: primitive
//! [tokens](token) at the leaves and [composites](composite) above them. The
//! same tree both parses bytes into a [`Values`] set and generates bytes from
//! one, so a message format is written down exactly once.
//!
//! Parsing never raises for input it does not recognize. It returns `None`
//! ("no match") and the caller decides what that means. Errors are reserved
//! for defective grammar definitions ([`GrammarDefinitionError`]) and for
//! values that cannot be generated ([`GenerateError`]).
//!
//! ## Example
//!
//! ```
//! # use mks647c::grammar::{Concat, ConstantToken, IntegerToken, Optional, Syntax, Values, WhitespaceToken};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let grammar = Concat::new("frame", vec![
//!     ConstantToken::new("marker", "E")?.boxed(),
//!     Optional::new("has_space", WhitespaceToken::new("space")).boxed(),
//!     IntegerToken::new("code").boxed(),
//! ]);
//!
//! let matched = grammar.parse(b"E 3\r\n").unwrap();
//! assert_eq!(matched.len, 3);
//! assert_eq!(matched.values.int("code"), Some(3));
//!
//! let values = Values::new().with("has_space", true).with("space", " ").with("code", 4);
//! assert_eq!(grammar.generate_bytes(&values)?, b"E 4");
//! # Ok(())
//! # }
//! ```
//!
//! [`GrammarDefinitionError`]: crate::error::GrammarDefinitionError

pub mod composite;
pub mod token;
mod value;

pub use composite::{Concat, Optional, Or, Repeat};
pub use token::{
	ConstantToken, FixedLengthToken, FloatToken, IntegerToken, RegexToken, UntilByteToken,
	UntilStringToken, WhitespaceToken, WordToken,
};
pub use value::{Value, Values};

use crate::error::{GenerateError, InvalidParameterError, MissingParameterError};

/// A successful parse: the values recognized and how many bytes they span.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
	/// The values produced by the node and its children.
	pub values: Values,
	/// The number of input bytes the values account for.
	pub len: usize,
}

impl Match {
	/// Create a match.
	pub fn new(values: Values, len: usize) -> Self {
		Match { values, len }
	}
}

/// A node in a grammar.
///
/// Nodes hold no per-call state, so a grammar can be shared freely between
/// threads and reused for every message of its shape.
pub trait Syntax: std::fmt::Debug + Send + Sync {
	/// The node's name. It is both the key the node contributes when parsing
	/// and the key it reads when generating.
	fn name(&self) -> &str;

	/// Try to recognize a prefix of `input`.
	///
	/// Returns `None` if the node does not match at the start of `input`.
	fn parse(&self, input: &[u8]) -> Option<Match>;

	/// Append the bytes for `values` to `out`.
	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError>;

	/// Generate into a new buffer.
	fn generate_bytes(&self, values: &Values) -> Result<Vec<u8>, GenerateError> {
		let mut out = Vec::new();
		self.generate(values, &mut out)?;
		Ok(out)
	}

	/// Box the node so it can be placed in a composite.
	fn boxed(self) -> Box<dyn Syntax>
	where
		Self: Sized + 'static,
	{
		Box::new(self)
	}
}

impl<S: Syntax + ?Sized> Syntax for Box<S> {
	fn name(&self) -> &str {
		(**self).name()
	}
	fn parse(&self, input: &[u8]) -> Option<Match> {
		(**self).parse(input)
	}
	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		(**self).generate(values, out)
	}
}

/// The name of a node together with the value it falls back to when
/// generating without an explicit one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Field {
	name: String,
	default: Option<Value>,
}

impl Field {
	pub(crate) fn new<N: Into<String>>(name: N) -> Self {
		Field {
			name: name.into(),
			default: None,
		}
	}

	pub(crate) fn name(&self) -> &str {
		&self.name
	}

	pub(crate) fn set_default(&mut self, value: Option<Value>) {
		self.default = value;
	}

	/// Look up the value of this field, falling back to the default.
	pub(crate) fn lookup<'v>(&'v self, values: &'v Values) -> Result<&'v Value, GenerateError> {
		values
			.get(&self.name)
			.or(self.default.as_ref())
			.ok_or_else(|| MissingParameterError::new(self.name.as_str()).into())
	}

	/// Look up the value of this field and convert it to text.
	pub(crate) fn lookup_text(&self, values: &Values) -> Result<String, GenerateError> {
		let value = self.lookup(values)?;
		value
			.to_text()
			.ok_or_else(|| self.invalid(format!("expected text or a number, got a {}", value.type_name())))
	}

	/// Build an [`InvalidParameterError`] for this field.
	pub(crate) fn invalid<R: Into<Box<str>>>(&self, reason: R) -> GenerateError {
		InvalidParameterError::new(self.name.as_str(), reason).into()
	}

	/// A single-entry value set holding `value` under this field's name.
	pub(crate) fn single<V: Into<Value>>(&self, value: V) -> Values {
		Values::new().with(self.name.as_str(), value)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use static_assertions::assert_impl_all;

	assert_impl_all!(Box<dyn Syntax>: Send, Sync, Syntax);
	assert_impl_all!(Concat: Send, Sync);
	assert_impl_all!(Or: Send, Sync);

	#[test]
	fn field_default() {
		let mut field = Field::new("ws");
		assert!(matches!(
			field.lookup(&Values::new()),
			Err(GenerateError::MissingParameter(e)) if e.name() == "ws"
		));
		field.set_default(Some(Value::from(" ")));
		assert_eq!(field.lookup_text(&Values::new()).unwrap(), " ");
		let values = Values::new().with("ws", "\t");
		assert_eq!(field.lookup_text(&values).unwrap(), "\t");
	}

	#[test]
	fn field_rejects_non_text() {
		let field = Field::new("p");
		let values = Values::new().with("p", true);
		assert!(matches!(
			field.lookup_text(&values),
			Err(GenerateError::InvalidParameter(_))
		));
	}
}
