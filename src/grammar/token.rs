//! Primitive grammar tokens.
//!
//! Each token recognizes a single field at the start of its input and emits a
//! single field when generating. Content tokens never match zero bytes.

use super::{Field, Match, Syntax, Value, Values};
use crate::error::{GenerateError, GrammarDefinitionError};
use regex::bytes::Regex;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\A-?[0-9]+").expect("Invalid integer regex"));
static INTEGER_EXACT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\A-?[0-9]+\z").expect("Invalid integer regex"));
static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\A[-+]?(?:[0-9]+(?:[.,][0-9]*)?|[.,][0-9]+)(?:[eE][-+]?[0-9]+)?")
		.expect("Invalid float regex")
});
static WORD: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\A[A-Za-z0-9_]+").expect("Invalid word regex"));

/// Whether the byte separates words. Line terminators are not separators.
fn is_separator(byte: u8) -> bool {
	matches!(byte, b' ' | b'\t')
}

/// Implement `Syntax::name` plus the default-value builder methods for a
/// token with a `field: Field` member.
macro_rules! impl_field_builders {
	($name:ident) => {
		impl $name {
			/// Set the value emitted when generating without an explicit value.
			#[must_use]
			pub fn with_default<V: Into<Value>>(mut self, value: V) -> Self {
				self.field.set_default(Some(value.into()));
				self
			}

			/// Remove any default value, making the value mandatory when generating.
			#[must_use]
			pub fn without_default(mut self) -> Self {
				self.field.set_default(None);
				self
			}
		}
	};
}

/// Matches exactly `len` bytes, whatever they are.
///
/// Lengths are counted in bytes, not characters, in both directions. The
/// matched bytes must be valid UTF-8.
#[derive(Debug, Clone)]
pub struct FixedLengthToken {
	field: Field,
	len: usize,
}

impl FixedLengthToken {
	/// Create a token matching `len` bytes. `len` must not be zero.
	pub fn new<N: Into<String>>(name: N, len: usize) -> Result<Self, GrammarDefinitionError> {
		if len == 0 {
			return Err(GrammarDefinitionError::new(
				"a fixed length token must have a non-zero length",
			));
		}
		Ok(FixedLengthToken {
			field: Field::new(name),
			len,
		})
	}
}
impl_field_builders! { FixedLengthToken }

impl Syntax for FixedLengthToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let bytes = input.get(..self.len)?;
		let text = std::str::from_utf8(bytes).ok()?;
		Some(Match::new(self.field.single(text), self.len))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if text.len() != self.len {
			return Err(self.field.invalid(format!(
				"must be exactly {} bytes long, got {text:?}",
				self.len
			)));
		}
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches a regular expression at the start of the input.
///
/// The produced value is the text of the first capture group if the pattern
/// has one, otherwise the whole match.
#[derive(Debug, Clone)]
pub struct RegexToken {
	field: Field,
	/// The pattern anchored at the start of the input.
	prefix: Regex,
	/// The pattern anchored at both ends, for validating generated values.
	exact: Regex,
}

impl RegexToken {
	/// Create a token from a regular expression.
	pub fn new<N: Into<String>>(name: N, pattern: &str) -> Result<Self, GrammarDefinitionError> {
		let compile = |anchored: String| {
			Regex::new(&anchored).map_err(|e| GrammarDefinitionError::new(e.to_string()))
		};
		Ok(RegexToken {
			field: Field::new(name),
			prefix: compile(format!(r"\A(?:{pattern})"))?,
			exact: compile(format!(r"\A(?:{pattern})\z"))?,
		})
	}
}
impl_field_builders! { RegexToken }

impl Syntax for RegexToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let captures = self.prefix.captures(input)?;
		let whole = captures.get(0)?;
		if whole.is_empty() {
			return None;
		}
		let value = captures.get(1).unwrap_or(whole);
		let text = std::str::from_utf8(value.as_bytes()).ok()?;
		Some(Match::new(self.field.single(text), whole.end()))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if !self.exact.is_match(text.as_bytes()) {
			return Err(self.field.invalid(format!(
				"{text:?} does not match the pattern {}",
				self.prefix.as_str()
			)));
		}
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches an optionally negative decimal integer.
#[derive(Debug, Clone)]
pub struct IntegerToken {
	field: Field,
}

impl IntegerToken {
	/// Create an integer token.
	pub fn new<N: Into<String>>(name: N) -> Self {
		IntegerToken {
			field: Field::new(name),
		}
	}
}
impl_field_builders! { IntegerToken }

impl Syntax for IntegerToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let found = INTEGER.find(input)?;
		// The match is ASCII, so it is valid UTF-8.
		let number: i64 = std::str::from_utf8(found.as_bytes()).ok()?.parse().ok()?;
		Some(Match::new(self.field.single(number), found.end()))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = match self.field.lookup(values)? {
			Value::Int(i) => i.to_string(),
			Value::Str(s) if INTEGER_EXACT.is_match(s.as_bytes()) => s.clone(),
			other => return Err(self.field.invalid(format!("{other:?} is not an integer"))),
		};
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches a decimal number with an optional fraction and exponent.
///
/// Either `.` or `,` is accepted as the decimal separator. Numbers are
/// always generated with `.`.
#[derive(Debug, Clone)]
pub struct FloatToken {
	field: Field,
}

impl FloatToken {
	/// Create a float token.
	pub fn new<N: Into<String>>(name: N) -> Self {
		FloatToken {
			field: Field::new(name),
		}
	}
}
impl_field_builders! { FloatToken }

impl Syntax for FloatToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let found = FLOAT.find(input)?;
		let text = std::str::from_utf8(found.as_bytes()).ok()?.replace(',', ".");
		let number: f64 = text.parse().ok()?;
		Some(Match::new(self.field.single(number), found.end()))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let value = self.field.lookup(values)?;
		let text = match value {
			Value::Float(f) if f.is_finite() => f.to_string(),
			Value::Int(i) => i.to_string(),
			other => return Err(self.field.invalid(format!("{other:?} is not a finite number"))),
		};
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches a fixed literal.
///
/// The literal is its own default, so composites emit it without callers
/// having to supply it. Matching ignores ASCII case unless the token is made
/// [case sensitive](ConstantToken::case_sensitive).
#[derive(Debug, Clone)]
pub struct ConstantToken {
	field: Field,
	literal: String,
	case_sensitive: bool,
}

impl ConstantToken {
	/// Create a token matching `literal`, which must not be empty.
	pub fn new<N: Into<String>>(name: N, literal: &str) -> Result<Self, GrammarDefinitionError> {
		if literal.is_empty() {
			return Err(GrammarDefinitionError::new("a constant token must not be empty"));
		}
		let mut field = Field::new(name);
		field.set_default(Some(Value::from(literal)));
		Ok(ConstantToken {
			field,
			literal: literal.to_string(),
			case_sensitive: false,
		})
	}

	/// Set whether matching is case sensitive.
	#[must_use]
	pub fn case_sensitive(mut self, value: bool) -> Self {
		self.case_sensitive = value;
		self
	}

	/// The literal this token matches.
	pub fn literal(&self) -> &str {
		&self.literal
	}

	fn matches(&self, candidate: &[u8]) -> bool {
		if self.case_sensitive {
			candidate == self.literal.as_bytes()
		} else {
			candidate.eq_ignore_ascii_case(self.literal.as_bytes())
		}
	}
}
impl_field_builders! { ConstantToken }

impl Syntax for ConstantToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let len = self.literal.len();
		let candidate = input.get(..len)?;
		if !self.matches(candidate) {
			return None;
		}
		let text = std::str::from_utf8(candidate).ok()?;
		Some(Match::new(self.field.single(text), len))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if !self.matches(text.as_bytes()) {
			return Err(self
				.field
				.invalid(format!("expected {:?}, got {text:?}", self.literal)));
		}
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches one or more spaces or tabs.
#[derive(Debug, Clone)]
pub struct WhitespaceToken {
	field: Field,
}

impl WhitespaceToken {
	/// Create a whitespace token.
	pub fn new<N: Into<String>>(name: N) -> Self {
		WhitespaceToken {
			field: Field::new(name),
		}
	}
}
impl_field_builders! { WhitespaceToken }

impl Syntax for WhitespaceToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let len = input.iter().take_while(|b| is_separator(**b)).count();
		if len == 0 {
			return None;
		}
		// Separators are ASCII.
		let text = std::str::from_utf8(&input[..len]).ok()?;
		Some(Match::new(self.field.single(text), len))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if text.is_empty() || !text.bytes().all(is_separator) {
			return Err(self
				.field
				.invalid(format!("{text:?} is not a run of spaces or tabs")));
		}
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches one or more ASCII letters, digits, or underscores.
#[derive(Debug, Clone)]
pub struct WordToken {
	field: Field,
}

impl WordToken {
	/// Create a word token.
	pub fn new<N: Into<String>>(name: N) -> Self {
		WordToken {
			field: Field::new(name),
		}
	}
}
impl_field_builders! { WordToken }

impl Syntax for WordToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let found = WORD.find(input)?;
		let text = std::str::from_utf8(found.as_bytes()).ok()?;
		Some(Match::new(self.field.single(text), found.end()))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if WORD.find(text.as_bytes()).map(|m| m.end()) != Some(text.len()) {
			return Err(self.field.invalid(format!("{text:?} is not a single word")));
		}
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches everything up to, but not including, a terminator byte.
///
/// The terminator is neither consumed nor generated; it belongs to whichever
/// node follows. An empty match, or a missing terminator, is no match.
#[derive(Debug, Clone)]
pub struct UntilByteToken {
	field: Field,
	terminator: u8,
}

impl UntilByteToken {
	/// Create a token reading up to `terminator`.
	pub fn new<N: Into<String>>(name: N, terminator: u8) -> Self {
		UntilByteToken {
			field: Field::new(name),
			terminator,
		}
	}
}
impl_field_builders! { UntilByteToken }

impl Syntax for UntilByteToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let pos = input.iter().position(|b| *b == self.terminator)?;
		if pos == 0 {
			return None;
		}
		let text = std::str::from_utf8(&input[..pos]).ok()?;
		Some(Match::new(self.field.single(text), pos))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if text.is_empty() || text.as_bytes().contains(&self.terminator) {
			return Err(self.field.invalid(format!(
				"{text:?} must be non-empty and must not contain the terminator {:?}",
				char::from(self.terminator)
			)));
		}
		out.extend_from_slice(text.as_bytes());
		Ok(())
	}
}

/// Matches everything up to a terminator string, and the terminator itself.
///
/// The value excludes the terminator, but the consumed length includes it and
/// generation appends it.
#[derive(Debug, Clone)]
pub struct UntilStringToken {
	field: Field,
	terminator: String,
}

impl UntilStringToken {
	/// Create a token reading through `terminator`, which must not be empty.
	pub fn new<N: Into<String>>(name: N, terminator: &str) -> Result<Self, GrammarDefinitionError> {
		if terminator.is_empty() {
			return Err(GrammarDefinitionError::new("a terminator must not be empty"));
		}
		Ok(UntilStringToken {
			field: Field::new(name),
			terminator: terminator.to_string(),
		})
	}

	fn find(&self, haystack: &[u8]) -> Option<usize> {
		let needle = self.terminator.as_bytes();
		haystack
			.windows(needle.len())
			.position(|window| window == needle)
	}
}
impl_field_builders! { UntilStringToken }

impl Syntax for UntilStringToken {
	fn name(&self) -> &str {
		self.field.name()
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let pos = self.find(input)?;
		let text = std::str::from_utf8(&input[..pos]).ok()?;
		Some(Match::new(
			self.field.single(text),
			pos + self.terminator.len(),
		))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let text = self.field.lookup_text(values)?;
		if self.find(text.as_bytes()).is_some() {
			return Err(self.field.invalid(format!(
				"{text:?} must not contain the terminator {:?}",
				self.terminator
			)));
		}
		out.extend_from_slice(text.as_bytes());
		out.extend_from_slice(self.terminator.as_bytes());
		Ok(())
	}
}
