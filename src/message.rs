//! The command message grammar and the [`ChannelMessage`] data record.
//!
//! A command frame looks like
//!
//! ```text
//! <cmd>[ <channel>]R\r\n              (query)
//! <cmd>[ <channel>] <p1>[ <p2>][ <p3>]\r\n   (write)
//! ```
//!
//! where `<cmd>` is a two character command code. Some commands are read
//! without the `R` marker, so the marker can be switched off per message.

use crate::error::{GenerateError, GrammarDefinitionError, InvalidParameterError};
use crate::grammar::{
	Concat, ConstantToken, FixedLengthToken, FloatToken, IntegerToken, Match, Optional, Or,
	Syntax, Values, WhitespaceToken,
};
use crate::response::ResponseKind;
use std::sync::LazyLock;

/// The carriage return byte.
pub(crate) const CARRIAGE_RETURN: u8 = b'\r';

/// The line feed byte.
pub(crate) const LINE_FEED: u8 = b'\n';

/// The marker requesting the current value of a parameter.
pub(crate) const QUERY_MARKER: &str = "R";

/// The names of the values in a command message.
pub mod key {
	/// The two character command code.
	pub const COMMAND: &str = "command";
	/// Whether a space follows the command code.
	pub const HAS_SPACE: &str = "has_space";
	/// The space following the command code.
	pub const SPACE: &str = "space";
	/// Whether a channel number is present.
	pub const HAS_CHANNEL: &str = "has_channel";
	/// The channel number.
	pub const CHANNEL: &str = "channel";
	/// Which of [`QUERY`] or [`WRITE`] the message is.
	pub const INTENT: &str = "intent";
	/// The query branch.
	pub const QUERY: &str = "query";
	/// The write branch.
	pub const WRITE: &str = "write";
	/// Whether the query marker is present.
	pub const HAS_QUERY_MARKER: &str = "has_query_marker";
	/// The query marker.
	pub const QUERY_MARKER: &str = "query_marker";
	/// Whether a space precedes the first parameter.
	pub const HAS_WRITE_SPACE: &str = "has_write_space";
	/// The space preceding the first parameter.
	pub const WRITE_SPACE: &str = "write_space";
	/// The first parameter.
	pub const PARAMETER_1: &str = "parameter_1";
	/// Whether a second parameter is present.
	pub const HAS_PARAMETER_2: &str = "has_parameter_2";
	/// The space preceding the second parameter.
	pub const PARAMETER_2_SPACE: &str = "parameter_2_space";
	/// The second parameter.
	pub const PARAMETER_2: &str = "parameter_2";
	/// Whether a third parameter is present.
	pub const HAS_PARAMETER_3: &str = "has_parameter_3";
	/// The space preceding the third parameter.
	pub const PARAMETER_3_SPACE: &str = "parameter_3_space";
	/// The third parameter.
	pub const PARAMETER_3: &str = "parameter_3";
	/// The mandatory carriage return.
	pub const CARRIAGE_RETURN: &str = "carriage_return";
	/// Whether the trailing line feed is present.
	pub const HAS_LINE_FEED: &str = "has_line_feed";
	/// The trailing line feed.
	pub const LINE_FEED: &str = "line_feed";
}

static SHARED: LazyLock<MessageGrammar> =
	LazyLock::new(|| MessageGrammar::new().expect("Invalid command message grammar"));

/// The grammar of a command message.
#[derive(Debug)]
pub struct MessageGrammar {
	syntax: Concat,
}

impl MessageGrammar {
	/// Build the grammar.
	///
	/// Grammars are immutable, so prefer the instance returned by
	/// [`shared`](MessageGrammar::shared).
	pub fn new() -> Result<Self, GrammarDefinitionError> {
		let space = |name: &str| WhitespaceToken::new(name).with_default(" ");
		let extra_parameter = |flag: &str, space_name: &str, name: &str| {
			Optional::new(
				flag,
				Concat::new(
					format!("{name}_block"),
					vec![space(space_name).boxed(), FloatToken::new(name).boxed()],
				),
			)
		};

		let write = Concat::new(
			key::WRITE,
			vec![
				Optional::new(key::HAS_WRITE_SPACE, space(key::WRITE_SPACE)).boxed(),
				FloatToken::new(key::PARAMETER_1).boxed(),
				extra_parameter(
					key::HAS_PARAMETER_2,
					key::PARAMETER_2_SPACE,
					key::PARAMETER_2,
				)
				.boxed(),
				extra_parameter(
					key::HAS_PARAMETER_3,
					key::PARAMETER_3_SPACE,
					key::PARAMETER_3,
				)
				.boxed(),
			],
		);
		let query = Concat::new(
			key::QUERY,
			vec![Optional::new(
				key::HAS_QUERY_MARKER,
				ConstantToken::new(key::QUERY_MARKER, QUERY_MARKER)?,
			)
			.boxed()],
		);

		let syntax = Concat::new(
			"message",
			vec![
				FixedLengthToken::new(key::COMMAND, 2)?.boxed(),
				Optional::new(key::HAS_SPACE, space(key::SPACE)).boxed(),
				Optional::new(key::HAS_CHANNEL, IntegerToken::new(key::CHANNEL)).boxed(),
				// The query branch always matches (its marker is optional), so
				// it must be tried last.
				Or::new(key::INTENT, vec![write.boxed(), query.boxed()]).boxed(),
				ConstantToken::new(key::CARRIAGE_RETURN, "\r")?.boxed(),
				Optional::new(
					key::HAS_LINE_FEED,
					ConstantToken::new(key::LINE_FEED, "\n")?,
				)
				.boxed(),
			],
		);
		Ok(MessageGrammar { syntax })
	}

	/// The process-wide instance of the grammar.
	pub fn shared() -> &'static MessageGrammar {
		&SHARED
	}

	/// The underlying grammar tree.
	pub fn syntax(&self) -> &dyn Syntax {
		&self.syntax
	}

	/// Generate the bytes of `message`.
	pub fn generate(&self, message: &ChannelMessage) -> Result<Vec<u8>, GenerateError> {
		message.validate()?;
		self.syntax.generate_bytes(&message.to_values())
	}

	/// Parse a command frame at the start of `input`.
	pub fn parse(&self, input: &[u8]) -> Option<Match> {
		self.syntax.parse(input)
	}

	/// Parse a command frame back into a [`ChannelMessage`].
	pub fn parse_message(&self, input: &[u8]) -> Option<ChannelMessage> {
		ChannelMessage::from_values(&self.parse(input)?.values)
	}
}

/// Whether a message reads or writes a value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Intent {
	/// Read the current value.
	Query,
	/// Set a new value.
	Write,
}

impl Intent {
	fn branch(self) -> &'static str {
		match self {
			Intent::Query => key::QUERY,
			Intent::Write => key::WRITE,
		}
	}
}

/// The fields of one outgoing command message.
///
/// ## Example
///
/// ```
/// # use mks647c::message::ChannelMessage;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut message = ChannelMessage::new();
/// message.set_command("FS").set_channel(3).set_query();
/// assert_eq!(message.generate()?, b"FS 3R\r\n");
///
/// let message = ChannelMessage::write("FS", 100.0).with_channel(3);
/// assert_eq!(message.generate()?, b"FS 3 100\r\n");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
	command: Option<String>,
	channel: Option<i64>,
	intent: Option<Intent>,
	parameters: [Option<f64>; 3],
	query_marker: bool,
	response: ResponseKind,
}

impl Default for ChannelMessage {
	fn default() -> Self {
		ChannelMessage {
			command: None,
			channel: None,
			intent: None,
			parameters: [None; 3],
			query_marker: true,
			response: ResponseKind::default(),
		}
	}
}

impl ChannelMessage {
	/// Create an empty message. The command code and intent must be set
	/// before it can be generated.
	pub fn new() -> Self {
		ChannelMessage::default()
	}

	/// Create a query for `command`.
	pub fn query<C: Into<String>>(command: C) -> Self {
		let mut message = ChannelMessage::new();
		message.set_command(command).set_query();
		message
	}

	/// Create a write of `value` for `command`.
	pub fn write<C: Into<String>>(command: C, value: f64) -> Self {
		let mut message = ChannelMessage::new();
		message.set_command(command).set_write().set_parameter_1(value);
		message
	}

	/// Builder-style [`set_channel`](ChannelMessage::set_channel).
	#[must_use]
	pub fn with_channel(mut self, channel: i64) -> Self {
		self.set_channel(channel);
		self
	}

	/// Builder-style [`set_response_kind`](ChannelMessage::set_response_kind).
	#[must_use]
	pub fn with_response_kind(mut self, kind: ResponseKind) -> Self {
		self.set_response_kind(kind);
		self
	}

	/// Set the two character command code.
	pub fn set_command<C: Into<String>>(&mut self, command: C) -> &mut Self {
		self.command = Some(command.into());
		self
	}

	/// Address a channel. Channel `0` addresses all channels on commands that
	/// support it; the legal range is up to the caller.
	pub fn set_channel(&mut self, channel: i64) -> &mut Self {
		self.channel = Some(channel);
		self
	}

	/// Remove the channel, for device-global commands.
	pub fn clear_channel(&mut self) -> &mut Self {
		self.channel = None;
		self
	}

	/// Make the message a query.
	pub fn set_query(&mut self) -> &mut Self {
		self.intent = Some(Intent::Query);
		self
	}

	/// Make the message a write.
	pub fn set_write(&mut self) -> &mut Self {
		self.intent = Some(Intent::Write);
		self
	}

	/// Set the first parameter.
	pub fn set_parameter_1(&mut self, value: f64) -> &mut Self {
		self.parameters[0] = Some(value);
		self
	}

	/// Set the second parameter.
	pub fn set_parameter_2(&mut self, value: f64) -> &mut Self {
		self.parameters[1] = Some(value);
		self
	}

	/// Set the third parameter.
	pub fn set_parameter_3(&mut self, value: f64) -> &mut Self {
		self.parameters[2] = Some(value);
		self
	}

	/// Set whether a query carries the `R` marker. Defaults to `true`.
	pub fn set_optional_query(&mut self, enable: bool) -> &mut Self {
		self.query_marker = enable;
		self
	}

	/// Set the grammar the reply to this message is parsed with.
	pub fn set_response_kind(&mut self, kind: ResponseKind) -> &mut Self {
		self.response = kind;
		self
	}

	/// The command code.
	pub fn command(&self) -> Option<&str> {
		self.command.as_deref()
	}

	/// The channel.
	pub fn channel(&self) -> Option<i64> {
		self.channel
	}

	/// Whether the message is a query or a write.
	pub fn intent(&self) -> Option<Intent> {
		self.intent
	}

	/// The first parameter.
	pub fn parameter_1(&self) -> Option<f64> {
		self.parameters[0]
	}

	/// The second parameter.
	pub fn parameter_2(&self) -> Option<f64> {
		self.parameters[1]
	}

	/// The third parameter.
	pub fn parameter_3(&self) -> Option<f64> {
		self.parameters[2]
	}

	/// Whether a query carries the `R` marker.
	pub fn optional_query(&self) -> bool {
		self.query_marker
	}

	/// The grammar the reply to this message is parsed with.
	pub fn response_kind(&self) -> ResponseKind {
		self.response
	}

	/// Generate the bytes of the message with the shared grammar.
	pub fn generate(&self) -> Result<Vec<u8>, GenerateError> {
		MessageGrammar::shared().generate(self)
	}

	/// Check constraints that span more than one field.
	fn validate(&self) -> Result<(), GenerateError> {
		if self.intent == Some(Intent::Write)
			&& self.parameters[2].is_some()
			&& self.parameters[1].is_none()
		{
			return Err(InvalidParameterError::new(
				key::PARAMETER_3,
				"a third parameter requires a second parameter",
			)
			.into());
		}
		Ok(())
	}

	/// The values the grammar generates the message from.
	pub fn to_values(&self) -> Values {
		let mut values = Values::new();
		if let Some(command) = &self.command {
			values.insert(key::COMMAND, command.as_str());
		}
		values.insert(key::HAS_SPACE, self.channel.is_some());
		values.insert(key::HAS_CHANNEL, self.channel.is_some());
		if let Some(channel) = self.channel {
			values.insert(key::CHANNEL, channel);
		}
		if let Some(intent) = self.intent {
			values.insert(key::INTENT, intent.branch());
		}
		values.insert(key::HAS_QUERY_MARKER, self.query_marker);
		values.insert(key::HAS_WRITE_SPACE, true);
		let optional = [
			None,
			Some(key::HAS_PARAMETER_2),
			Some(key::HAS_PARAMETER_3),
		];
		let names = [key::PARAMETER_1, key::PARAMETER_2, key::PARAMETER_3];
		for ((value, name), flag) in self.parameters.iter().zip(names).zip(optional) {
			if let Some(flag) = flag {
				values.insert(flag, value.is_some());
			}
			if let Some(value) = value {
				values.insert(name, *value);
			}
		}
		values.insert(key::HAS_LINE_FEED, true);
		values
	}

	/// Rebuild a message from parsed values.
	///
	/// Returns `None` if the values lack a command code or an intent.
	pub fn from_values(values: &Values) -> Option<Self> {
		let intent = match values.str(key::INTENT)? {
			key::QUERY => Intent::Query,
			key::WRITE => Intent::Write,
			_ => return None,
		};
		let mut message = ChannelMessage::new();
		message.set_command(values.str(key::COMMAND)?);
		message.intent = Some(intent);
		if values.flag(key::HAS_CHANNEL) {
			message.channel = values.int(key::CHANNEL);
		}
		if intent == Intent::Query {
			message.query_marker = values.flag(key::HAS_QUERY_MARKER);
		} else {
			message.parameters[0] = values.float(key::PARAMETER_1);
			if values.flag(key::HAS_PARAMETER_2) {
				message.parameters[1] = values.float(key::PARAMETER_2);
			}
			if values.flag(key::HAS_PARAMETER_3) {
				message.parameters[2] = values.float(key::PARAMETER_3);
			}
		}
		Some(message)
	}
}
