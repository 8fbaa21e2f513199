//! Grammar nodes built from other nodes.

use super::{Match, Syntax, Value, Values};
use crate::error::{GenerateError, InvalidParameterError, MissingParameterError};

/// An ordered sequence of nodes that must all match.
///
/// The node itself contributes no value; the values of the children are
/// merged, so sibling names must be distinct.
#[derive(Debug)]
pub struct Concat {
	name: String,
	children: Vec<Box<dyn Syntax>>,
}

impl Concat {
	/// Create a sequence of `children`.
	pub fn new<N: Into<String>>(name: N, children: Vec<Box<dyn Syntax>>) -> Self {
		Concat {
			name: name.into(),
			children,
		}
	}
}

impl Syntax for Concat {
	fn name(&self) -> &str {
		&self.name
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let mut values = Values::new();
		let mut len = 0;
		for child in &self.children {
			let m = child.parse(&input[len..])?;
			values.merge(m.values);
			len += m.len;
		}
		Some(Match::new(values, len))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		for child in &self.children {
			child.generate(values, out)?;
		}
		Ok(())
	}
}

/// A choice between nodes.
///
/// When parsing, the first child that matches wins and the node records the
/// winning child's name under its own name. Children are tried in order, so
/// if more than one could match, the one listed first is chosen.
///
/// When generating, the node's value selects the branches to emit: either the
/// name of a single branch (as produced by parsing) or a [`Value::Map`] whose
/// keys name every branch to emit, in the order the branches are listed.
#[derive(Debug)]
pub struct Or {
	name: String,
	children: Vec<Box<dyn Syntax>>,
}

impl Or {
	/// Create a choice between `children`.
	pub fn new<N: Into<String>>(name: N, children: Vec<Box<dyn Syntax>>) -> Self {
		Or {
			name: name.into(),
			children,
		}
	}

	fn invalid<R: Into<Box<str>>>(&self, reason: R) -> GenerateError {
		InvalidParameterError::new(self.name.as_str(), reason).into()
	}
}

impl Syntax for Or {
	fn name(&self) -> &str {
		&self.name
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		self.children.iter().find_map(|child| {
			let mut m = child.parse(input)?;
			m.values.insert(self.name.as_str(), child.name());
			Some(m)
		})
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		let selector = values
			.get(&self.name)
			.ok_or_else(|| MissingParameterError::new(self.name.as_str()))?;
		match selector {
			Value::Str(branch) => {
				let child = self
					.children
					.iter()
					.find(|child| child.name() == branch)
					.ok_or_else(|| self.invalid(format!("there is no branch named {branch:?}")))?;
				child.generate(values, out)
			}
			Value::Map(branches) => {
				for child in &self.children {
					if branches.contains_key(child.name()) {
						child.generate(values, out)?;
					}
				}
				Ok(())
			}
			other => Err(self.invalid(format!(
				"expected a branch name or a map of branches, got a {}",
				other.type_name()
			))),
		}
	}
}

/// Zero or one occurrence of a node.
///
/// Parsing never fails: the node records whether its child matched as a
/// [`Value::Flag`] under its own name, and consumes nothing when it did not.
/// Generation emits the child only when that flag is `true`.
#[derive(Debug)]
pub struct Optional {
	name: String,
	child: Box<dyn Syntax>,
}

impl Optional {
	/// Make `child` optional, with its presence recorded under `name`.
	pub fn new<N, S>(name: N, child: S) -> Self
	where
		N: Into<String>,
		S: Syntax + 'static,
	{
		Optional {
			name: name.into(),
			child: Box::new(child),
		}
	}
}

impl Syntax for Optional {
	fn name(&self) -> &str {
		&self.name
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		Some(match self.child.parse(input) {
			Some(mut m) => {
				m.values.insert(self.name.as_str(), true);
				m
			}
			None => Match::new(Values::new().with(self.name.as_str(), false), 0),
		})
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		match values.get(&self.name) {
			None | Some(Value::Flag(false)) => Ok(()),
			Some(Value::Flag(true)) => self.child.generate(values, out),
			Some(other) => Err(InvalidParameterError::new(
				self.name.as_str(),
				format!("expected a presence flag, got a {}", other.type_name()),
			)
			.into()),
		}
	}
}

/// Zero or more occurrences of a node, matched greedily.
///
/// The matches are recorded in order as a [`Value::List`] under the node's
/// name; the number of repetitions is the length of the list. Repetition
/// stops at the first failed or empty match.
#[derive(Debug)]
pub struct Repeat {
	name: String,
	child: Box<dyn Syntax>,
}

impl Repeat {
	/// Repeat `child`, recording the matches under `name`.
	pub fn new<N, S>(name: N, child: S) -> Self
	where
		N: Into<String>,
		S: Syntax + 'static,
	{
		Repeat {
			name: name.into(),
			child: Box::new(child),
		}
	}
}

impl Syntax for Repeat {
	fn name(&self) -> &str {
		&self.name
	}

	fn parse(&self, input: &[u8]) -> Option<Match> {
		let mut items = Vec::new();
		let mut len = 0;
		while let Some(m) = self.child.parse(&input[len..]) {
			if m.len == 0 {
				break;
			}
			len += m.len;
			items.push(m.values);
		}
		Some(Match::new(
			Values::new().with(self.name.as_str(), Value::List(items)),
			len,
		))
	}

	fn generate(&self, values: &Values, out: &mut Vec<u8>) -> Result<(), GenerateError> {
		match values.get(&self.name) {
			None => Ok(()),
			Some(Value::List(items)) => {
				for item in items {
					self.child.generate(item, out)?;
				}
				Ok(())
			}
			Some(other) => Err(InvalidParameterError::new(
				self.name.as_str(),
				format!("expected a list, got a {}", other.type_name()),
			)
			.into()),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::grammar::{ConstantToken, FloatToken, IntegerToken, WhitespaceToken, WordToken};

	fn number_list() -> Concat {
		Concat::new(
			"list",
			vec![
				IntegerToken::new("first").boxed(),
				Optional::new(
					"has_second",
					Concat::new(
						"second_block",
						vec![
							WhitespaceToken::new("sep").with_default(" ").boxed(),
							IntegerToken::new("second").boxed(),
						],
					),
				)
				.boxed(),
				ConstantToken::new("end", ";").unwrap().boxed(),
			],
		)
	}

	#[test]
	fn concat_sums_lengths() {
		let grammar = number_list();
		let m = grammar.parse(b"12 34;garbage").unwrap();
		assert_eq!(m.len, 6);
		assert_eq!(m.values.int("first"), Some(12));
		assert_eq!(m.values.int("second"), Some(34));
		assert!(m.values.flag("has_second"));

		// Trailing bytes after the match never change the result.
		for tail in [&b""[..], &b"\r\n"[..], &b"12 34;"[..], &b"\xff\xfe"[..]] {
			let mut input = b"12 34;".to_vec();
			input.extend_from_slice(tail);
			assert_eq!(grammar.parse(&input), Some(m.clone()));
		}
	}

	#[test]
	fn concat_no_match_aborts() {
		let grammar = number_list();
		assert_eq!(grammar.parse(b"12 34"), None);
		assert_eq!(grammar.parse(b"x;"), None);
	}

	#[test]
	fn optional_absent_consumes_nothing() {
		let grammar = number_list();
		let m = grammar.parse(b"12;").unwrap();
		assert_eq!(m.len, 3);
		assert!(!m.values.flag("has_second"));
		assert_eq!(m.values.get("has_second"), Some(&Value::Flag(false)));
		assert_eq!(m.values.get("second"), None);

		// An optional on its own always matches.
		let optional = Optional::new("maybe", IntegerToken::new("n"));
		let m = optional.parse(b"abc").unwrap();
		assert_eq!(m.len, 0);
		assert_eq!(m.values, Values::new().with("maybe", false));
	}

	#[test]
	fn optional_generate() {
		let grammar = number_list();
		let values = Values::new().with("first", 1).with("second", 2);
		assert_eq!(grammar.generate_bytes(&values).unwrap(), b"1;");
		let values = values.with("has_second", true);
		assert_eq!(grammar.generate_bytes(&values).unwrap(), b"1 2;");
		let values = Values::new().with("first", 1).with("has_second", 3);
		assert!(matches!(
			grammar.generate_bytes(&values),
			Err(GenerateError::InvalidParameter(_))
		));
	}

	#[test]
	fn or_first_listed_branch_wins() {
		// Both branches match "123", so the first one listed is chosen.
		let grammar = Or::new(
			"either",
			vec![
				IntegerToken::new("int").boxed(),
				FloatToken::new("float").boxed(),
			],
		);
		let m = grammar.parse(b"123").unwrap();
		assert_eq!(m.values.str("either"), Some("int"));
		assert_eq!(m.values.int("int"), Some(123));
		assert_eq!(m.values.get("float"), None);

		let grammar = Or::new(
			"either",
			vec![
				FloatToken::new("float").boxed(),
				IntegerToken::new("int").boxed(),
			],
		);
		let m = grammar.parse(b"123").unwrap();
		assert_eq!(m.values.str("either"), Some("float"));
		assert_eq!(m.values.float("float"), Some(123.0));
	}

	#[test]
	fn or_no_match() {
		let grammar = Or::new(
			"either",
			vec![
				IntegerToken::new("int").boxed(),
				ConstantToken::new("marker", "E").unwrap().boxed(),
			],
		);
		assert_eq!(grammar.parse(b"x"), None);
		assert_eq!(grammar.parse(b"e").unwrap().values.str("either"), Some("marker"));
	}

	#[test]
	fn or_generate() {
		let grammar = Or::new(
			"either",
			vec![
				WordToken::new("word").boxed(),
				IntegerToken::new("int").boxed(),
			],
		);
		let values = Values::new().with("word", "abc").with("int", 5);

		// A branch name selects that branch.
		let by_name = values.clone().with("either", "int");
		assert_eq!(grammar.generate_bytes(&by_name).unwrap(), b"5");

		// A map selects every branch it names, in listed order.
		let by_map = values
			.clone()
			.with("either", Values::new().with("int", true).with("word", true));
		assert_eq!(grammar.generate_bytes(&by_map).unwrap(), b"abc5");
		let none = values.clone().with("either", Values::new());
		assert_eq!(grammar.generate_bytes(&none).unwrap(), b"");

		assert!(matches!(
			grammar.generate_bytes(&values),
			Err(GenerateError::MissingParameter(_))
		));
		let unknown = values.with("either", "float");
		assert!(matches!(
			grammar.generate_bytes(&unknown),
			Err(GenerateError::InvalidParameter(_))
		));
	}

	#[test]
	fn or_parse_then_generate() {
		let grammar = Or::new(
			"either",
			vec![
				IntegerToken::new("int").boxed(),
				WordToken::new("word").boxed(),
			],
		);
		let m = grammar.parse(b"abc").unwrap();
		assert_eq!(grammar.generate_bytes(&m.values).unwrap(), b"abc");
	}

	#[test]
	fn repeat() {
		let item = Concat::new(
			"item",
			vec![
				IntegerToken::new("n").boxed(),
				ConstantToken::new("comma", ",").unwrap().boxed(),
			],
		);
		let grammar = Repeat::new("items", item);
		let m = grammar.parse(b"1,22,3x").unwrap();
		assert_eq!(m.len, 5);
		let items = m.values.get("items").unwrap().as_list().unwrap();
		assert_eq!(items.len(), 2);
		assert_eq!(items[0].int("n"), Some(1));
		assert_eq!(items[1].int("n"), Some(22));

		// No repetitions is still a match.
		let m = grammar.parse(b"x").unwrap();
		assert_eq!(m.len, 0);
		assert_eq!(m.values.get("items").unwrap().as_list().unwrap().len(), 0);

		assert_eq!(grammar.generate_bytes(&m.values).unwrap(), b"");
		let again = grammar.parse(b"4,5,").unwrap();
		assert_eq!(grammar.generate_bytes(&again.values).unwrap(), b"4,5,");
	}

	#[test]
	fn repeat_stops_on_empty_match() {
		let grammar = Repeat::new("items", Optional::new("maybe", IntegerToken::new("n")));
		let m = grammar.parse(b"abc").unwrap();
		assert_eq!(m.len, 0);
	}
}
