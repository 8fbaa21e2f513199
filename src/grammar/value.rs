//! The Named Value Set exchanged between grammar nodes.

/// A single value produced by parsing or consumed by generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	/// Free text.
	Str(String),
	/// An integer.
	Int(i64),
	/// A floating point number.
	Float(f64),
	/// A presence flag, as written by [`Optional`](super::Optional) nodes.
	Flag(bool),
	/// A nested value set, used to select branches of an [`Or`](super::Or).
	Map(Values),
	/// The ordered matches of a [`Repeat`](super::Repeat).
	List(Vec<Values>),
}

impl Value {
	/// The value as text, if it is [`Value::Str`].
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s.as_str()),
			_ => None,
		}
	}

	/// The value as an integer, if it is [`Value::Int`].
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	/// The value as a float. Integers are widened.
	#[allow(clippy::cast_precision_loss)]
	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Float(f) => Some(*f),
			Value::Int(i) => Some(*i as f64),
			_ => None,
		}
	}

	/// The value as a presence flag, if it is [`Value::Flag`].
	pub fn as_flag(&self) -> Option<bool> {
		match self {
			Value::Flag(b) => Some(*b),
			_ => None,
		}
	}

	/// The nested value set, if it is [`Value::Map`].
	pub fn as_map(&self) -> Option<&Values> {
		match self {
			Value::Map(m) => Some(m),
			_ => None,
		}
	}

	/// The repeated matches, if it is [`Value::List`].
	pub fn as_list(&self) -> Option<&[Values]> {
		match self {
			Value::List(l) => Some(l.as_slice()),
			_ => None,
		}
	}

	/// The text a token would emit for this value.
	///
	/// Only scalar text and numbers have a textual form.
	pub(crate) fn to_text(&self) -> Option<String> {
		match self {
			Value::Str(s) => Some(s.clone()),
			Value::Int(i) => Some(i.to_string()),
			Value::Float(f) if f.is_finite() => Some(f.to_string()),
			_ => None,
		}
	}

	/// A short name of the variant for error messages.
	pub(crate) fn type_name(&self) -> &'static str {
		match self {
			Value::Str(_) => "text",
			Value::Int(_) => "integer",
			Value::Float(_) => "float",
			Value::Flag(_) => "flag",
			Value::Map(_) => "map",
			Value::List(_) => "list",
		}
	}
}

impl From<&str> for Value {
	fn from(other: &str) -> Self {
		Value::Str(other.to_string())
	}
}

impl From<String> for Value {
	fn from(other: String) -> Self {
		Value::Str(other)
	}
}

impl From<i64> for Value {
	fn from(other: i64) -> Self {
		Value::Int(other)
	}
}

impl From<i32> for Value {
	fn from(other: i32) -> Self {
		Value::Int(other.into())
	}
}

impl From<u8> for Value {
	fn from(other: u8) -> Self {
		Value::Int(other.into())
	}
}

impl From<f64> for Value {
	fn from(other: f64) -> Self {
		Value::Float(other)
	}
}

impl From<bool> for Value {
	fn from(other: bool) -> Self {
		Value::Flag(other)
	}
}

impl From<Values> for Value {
	fn from(other: Values) -> Self {
		Value::Map(other)
	}
}

/// An ordered mapping from field name to [`Value`].
///
/// Every [`parse`](super::Syntax::parse) produces one and every
/// [`generate`](super::Syntax::generate) consumes one. Keys keep their
/// insertion order; inserting an existing key replaces the value in place.
///
/// ## Example
///
/// ```
/// # use mks647c::grammar::{Value, Values};
/// let mut values = Values::new();
/// values.insert("Command", "FS");
/// values.insert("Channel", 3);
/// assert_eq!(values.str("Command"), Some("FS"));
/// assert_eq!(values.int("Channel"), Some(3));
/// assert_eq!(values.get("Query"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values(Vec<(String, Value)>);

impl Values {
	/// Create an empty set.
	pub fn new() -> Self {
		Values(Vec::new())
	}

	/// Insert a value, returning the previous value of the key, if any.
	pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<Value>
	where
		K: Into<String>,
		V: Into<Value>,
	{
		let key = key.into();
		let value = value.into();
		if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
			Some(std::mem::replace(&mut slot.1, value))
		} else {
			self.0.push((key, value));
			None
		}
	}

	/// Builder-style [`insert`](Values::insert).
	#[must_use]
	pub fn with<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.insert(key, value);
		self
	}

	/// Move every entry of `other` into `self`.
	///
	/// Sibling grammar nodes use disjoint names, so in practice no key is
	/// overwritten.
	pub fn merge(&mut self, other: Values) {
		for (key, value) in other.0 {
			if let Some(previous) = self.insert(key.as_str(), value) {
				log::trace!("value for '{key}' replaced while merging (was {previous:?})");
			}
		}
	}

	/// Get the value of a key.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	/// Whether the key is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Remove a key, returning its value.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		let index = self.0.iter().position(|(k, _)| k == key)?;
		Some(self.0.remove(index).1)
	}

	/// The text stored under `key`.
	pub fn str(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(Value::as_str)
	}

	/// The integer stored under `key`.
	pub fn int(&self, key: &str) -> Option<i64> {
		self.get(key).and_then(Value::as_int)
	}

	/// The number stored under `key`, widening integers.
	pub fn float(&self, key: &str) -> Option<f64> {
		self.get(key).and_then(Value::as_float)
	}

	/// The presence flag stored under `key`. An absent flag reads as `false`.
	pub fn flag(&self, key: &str) -> bool {
		self.get(key).and_then(Value::as_flag).unwrap_or(false)
	}

	/// The number of entries.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether there are no entries.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterate over the entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Iterate over the keys in insertion order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|(k, _)| k.as_str())
	}
}

impl<K, V> FromIterator<(K, V)> for Values
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut values = Values::new();
		for (key, value) in iter {
			values.insert(key, value);
		}
		values
	}
}

impl IntoIterator for Values {
	type Item = (String, Value);
	type IntoIter = std::vec::IntoIter<(String, Value)>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
