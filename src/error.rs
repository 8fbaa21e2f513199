//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! However, most APIs return more than one kind of error and so will return one
//! of the higher level [enums](#enums), such as [`GenerateError`],
//! [`ClassifyError`], or [`Error`]. The error types are convertible to the
//! higher level enums, allowing them to be used with `?`:
//!
//! ```
//! use mks647c::error::{Error, GenerateError};
//!
//! fn foo() -> Result<(), GenerateError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! Errors fall into two groups that are never merged:
//!
//!  * grammar-level errors, such as [`MissingParameterError`] or
//!    [`MalformedResponseError`], which point at a defect in a message
//!    definition or a corrupt frame, and
//!  * device-level errors, [`DeviceError`], which the controller reported in
//!    an otherwise well-formed response.

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Implement `is_timeout()` for an error enum with an `Io` variant.
macro_rules! impl_is_timeout {
    ($name:ident) => {
        impl $name {
            /// A convenience function for determining if the error is due to the
            /// port timing out.
            pub fn is_timeout(&self) -> bool {
                matches!(self, $name::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
            }
        }
    };
}

macro_rules! impl_from_serialport_error {
    ($name:ident) => {
        impl From<serialport::Error> for $name {
            fn from(other: serialport::Error) -> Self {
                use std::io;

                match other.kind() {
                    serialport::ErrorKind::NoDevice => $name::SerialDeviceInUseOrDisconnected(
                        SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
                    ),
                    serialport::ErrorKind::InvalidInput => $name::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        other.description,
                    )),
                    serialport::ErrorKind::Unknown => {
                        $name::Io(io::Error::new(io::ErrorKind::Other, other.description))
                    }
                    serialport::ErrorKind::Io(kind) => {
                        $name::Io(io::Error::new(kind, other.description))
                    }
                }
            }
        }
    };
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// Simple implementations of From and TryFrom with other error enums can be
/// added by appending a succinct impl block, which assumes that:
///   * it is being implemented for this error enum,
///   * each variant has a single tuple value, and can be converted to the value
///     in this enum with its own From implementation.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     // This defines the enum and From/TryFrom between ThisError and A and B.
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
///
///     // This implements a simple From/TryFrom between ThisError and OtherType.
///     impl From<OtherType> {
///         FromVariantA => VariantA,
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
        // Additional information for From/TryFrom impl blocks.
        $(
            impl From<$from_t:ident>
            {
                $($from_variant:ident => $to_variant:ident),+
                $(,)?
            }
        )*
    ) => {
        // Define the error enum itself
        $(
            #[$attr]
        )*
        #[allow(missing_docs)]
        pub enum $name {
            $(
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {}

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => e.fmt(f)
                    ),+
                }
            }
        }

        // Allow the enum to be convertible from an infallible error
        impl From<std::convert::Infallible> for $name {
            fn from(_: std::convert::Infallible) -> Self {
                unreachable!();
            }
        }

        // Conversions with underlying errors
        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        #[allow(unreachable_patterns)]
                        value => Err(value)
                    }
                }
            }
        )+

        // Conversions from other enum errors
        $(
            impl From<$from_t> for $name {
                fn from(other: $from_t) -> Self {
                    match other {
                        $($from_t::$from_variant(e) => $name::$to_variant(From::from(e))),+
                    }
                }
            }

            impl TryFrom<$name> for $from_t {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $(
                            $name::$to_variant(e) => Ok($from_t::$from_variant(From::from(e)))
                        ),+
                        ,
                        #[allow(unreachable_patterns)]
                        _ => Err(other)
                    }
                }
            }
        )*
    };
}

/// Implement the `new()` and `as_bytes()` methods for errors storing bytes.
macro_rules! impl_for_type_containing_bytes {
    (
        $name:ident
    ) => {
        impl $name {
            /// Create a instance of the error
            pub(crate) fn new<R: AsRef<[u8]>>(bytes: R) -> Self {
                $name(Box::from(bytes.as_ref()))
            }

            /// Get the offending bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

macro_rules! define_error_codes {
    // Entry point.
    //
    // Serves to concatenate the parts of the name before defining the constants.
    (
        $(
            $num:literal: $($name_word:ident)+
        ),+
        $(,)?
    ) => {
        paste::paste! {
            define_error_codes!{@with_concatenated_name
                $(
                    $num: $($name_word)+, [< $($name_word:camel)+ >]
                 ),+
            }
        }
    };
    (@with_concatenated_name
        $(
            $num:literal: $($name_word:ident)+, $name:ident
        ),+
    ) => {
        paste::paste! {
            pub mod device_code {
                //! Error codes reported by the controller in an `E <code>` response.
                //!
                //! The codes in numerical order are:
                #![doc =
                $( "* `" $num "`: [`" $name:snake:upper "`]\n\n" )+
                ]

                $(
                    #[doc = $(" " $name_word " ")+ "(code `" $num "`)." ]
                    pub const [< $name:snake:upper >] : i64 = $num;
                )+

                /// Get the name of an error code.
                ///
                /// If the error code is not recognized, `None` is returned.
                /// The contents of the returned string may change.
                pub const fn name(code: i64) -> Option<&'static str> {
                    match code {
                        $(
                            $num => Some(stringify!($($name_word)+)),
                        )+
                        _ => None,
                    }
                }
            }
        }
    };
}

define_error_codes! {
    0: Channel Error,
    1: Unknown Command,
    2: Syntax Error,
    3: Invalid Expression,
    4: Invalid Value,
    5: Autozero Error,
}

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl_error_display! {
    SerialDeviceInUseOrDisconnectedError,
    self =>
    "the specified device is either disconnected or already in use by another process: {}", self.0
}

/// A grammar node was constructed with an invalid definition, such as an
/// empty literal or a pattern that is not a valid regular expression.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct GrammarDefinitionError(Box<str>);

impl GrammarDefinitionError {
    pub(crate) fn new<S: Into<Box<str>>>(reason: S) -> Self {
        GrammarDefinitionError(reason.into())
    }
}

impl_error_display! {
    GrammarDefinitionError,
    self => "invalid grammar definition: {}", self.0
}

/// A value required to generate a message was not supplied and the grammar
/// node has no default for it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MissingParameterError(Box<str>);

impl MissingParameterError {
    pub(crate) fn new<S: Into<Box<str>>>(name: S) -> Self {
        MissingParameterError(name.into())
    }

    /// The name of the missing parameter.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl_error_display! {
    MissingParameterError,
    self => "no value given for parameter '{}'", self.0
}

/// A value supplied to generate a message was of the wrong type or did not
/// satisfy its grammar node's format.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InvalidParameterError {
    name: Box<str>,
    reason: Box<str>,
}

impl InvalidParameterError {
    pub(crate) fn new<N, R>(name: N, reason: R) -> Self
    where
        N: Into<Box<str>>,
        R: Into<Box<str>>,
    {
        InvalidParameterError {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// The name of the offending parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Why the value was rejected.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl_error_display! {
    InvalidParameterError,
    self => "invalid value for parameter '{}': {}", self.name, self.reason
}

error_enum! {
    /// A message could not be generated from the supplied values.
    #[derive(Debug, PartialEq, Eq, Hash)]
    #[non_exhaustive]
    pub enum GenerateError {
        MissingParameter(MissingParameterError),
        InvalidParameter(InvalidParameterError),
    }
}

/// A received frame did not match the response grammar.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MalformedResponseError(Box<[u8]>);

impl_error_display! {
    MalformedResponseError,
    self => "response is malformed: {:?}", String::from_utf8_lossy(&self.0)
}
impl_for_type_containing_bytes! { MalformedResponseError }

/// A well-formed response carried neither a value nor an error code.
#[derive(Debug, Default, PartialEq, Eq, Hash)]
pub struct NoDataError(());

impl NoDataError {
    pub(crate) const fn new() -> Self {
        NoDataError(())
    }
}

impl_error_display! {
    NoDataError,
    self => "no data received"
}

/// The classification of a [`DeviceError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// No channel or an unknown channel was addressed.
    Channel,
    /// The command code is not known to the device.
    UnknownCommand,
    /// The command had a bad length.
    Syntax,
    /// The command contained an invalid expression.
    InvalidExpression,
    /// A parameter was out of range.
    InvalidValue,
    /// Autozero was requested while the channel was not disabled.
    Autozero,
    /// The code is not one the device documents.
    Unknown,
}

impl DeviceErrorKind {
    /// Classify a device error code.
    pub const fn from_code(code: i64) -> Self {
        match code {
            device_code::CHANNEL_ERROR => DeviceErrorKind::Channel,
            device_code::UNKNOWN_COMMAND => DeviceErrorKind::UnknownCommand,
            device_code::SYNTAX_ERROR => DeviceErrorKind::Syntax,
            device_code::INVALID_EXPRESSION => DeviceErrorKind::InvalidExpression,
            device_code::INVALID_VALUE => DeviceErrorKind::InvalidValue,
            device_code::AUTOZERO_ERROR => DeviceErrorKind::Autozero,
            _ => DeviceErrorKind::Unknown,
        }
    }
}

/// The device answered with an error response (`E <code>`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DeviceError {
    code: i64,
}

impl DeviceError {
    pub(crate) const fn new(code: i64) -> Self {
        DeviceError { code }
    }

    /// The raw error code sent by the device.
    pub const fn code(&self) -> i64 {
        self.code
    }

    /// The classification of the error code.
    pub const fn kind(&self) -> DeviceErrorKind {
        DeviceErrorKind::from_code(self.code)
    }

    /// Get the name of the error.
    ///
    /// If the error code is not recognized, `None` is returned.
    pub const fn name(&self) -> Option<&'static str> {
        device_code::name(self.code)
    }
}

impl_error_display! {
    DeviceError,
    self => "device reported an error: [{}] {}",
    self.code,
    self.name().unwrap_or("<Unknown error code>")
}

error_enum! {
    /// A parsed response did not carry a value.
    #[derive(Debug, PartialEq, Eq, Hash)]
    #[non_exhaustive]
    pub enum ClassifyError {
        NoData(NoDataError),
        Device(DeviceError),
    }
}

error_enum! {
    /// Any error returned by this library.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        MissingParameter(MissingParameterError),
        InvalidParameter(InvalidParameterError),
        MalformedResponse(MalformedResponseError),
        NoData(NoDataError),
        Device(DeviceError),
    }

    impl From<GenerateError> {
        MissingParameter => MissingParameter,
        InvalidParameter => InvalidParameter,
    }

    impl From<ClassifyError> {
        NoData => NoData,
        Device => Device,
    }
}
impl_is_timeout! { Error }
impl_from_serialport_error! { Error }

impl Error {
    /// Whether the error was reported by the device, rather than by the
    /// transport or the protocol layer.
    pub fn is_device_error(&self) -> bool {
        matches!(self, Error::Device(_))
    }
}

#[cfg(test)]
mod test {
    use super::device_code::*;
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Error: From<GenerateError>, From<ClassifyError>, From<std::io::Error>);
    assert_impl_all!(GenerateError: TryFrom<Error>);
    assert_impl_all!(ClassifyError: TryFrom<Error>);
    assert_impl_all!(Error: Send, Sync);

    #[test]
    fn device_error_code_names() {
        assert_eq!(name(CHANNEL_ERROR), Some("Channel Error"));
        assert_eq!(name(AUTOZERO_ERROR), Some("Autozero Error"));
        assert_eq!(name(INVALID_EXPRESSION), Some("Invalid Expression"));
        assert_eq!(name(99), None);
    }

    #[test]
    fn device_error_classification_is_total() {
        let expected = [
            (0, DeviceErrorKind::Channel),
            (1, DeviceErrorKind::UnknownCommand),
            (2, DeviceErrorKind::Syntax),
            (3, DeviceErrorKind::InvalidExpression),
            (4, DeviceErrorKind::InvalidValue),
            (5, DeviceErrorKind::Autozero),
        ];
        for (code, kind) in expected {
            let err = DeviceError::new(code);
            assert_eq!(err.kind(), kind);
            assert_eq!(err.code(), code);
        }
        for code in [-1, 6, 42, i64::MAX, i64::MIN] {
            let err = DeviceError::new(code);
            assert_eq!(err.kind(), DeviceErrorKind::Unknown);
            assert_eq!(err.code(), code);
            assert_eq!(err.name(), None);
        }
    }

    #[test]
    fn display() {
        assert_eq!(
            DeviceError::new(3).to_string(),
            "device reported an error: [3] Invalid Expression"
        );
        assert_eq!(
            DeviceError::new(17).to_string(),
            "device reported an error: [17] <Unknown error code>"
        );
        assert_eq!(
            MissingParameterError::new("Command").to_string(),
            "no value given for parameter 'Command'"
        );
    }

    #[test]
    fn conversions() {
        let err: Error = GenerateError::from(MissingParameterError::new("Channel")).into();
        assert!(matches!(err, Error::MissingParameter(_)));
        assert!(GenerateError::try_from(err).is_ok());

        let err: Error = ClassifyError::from(DeviceError::new(4)).into();
        assert!(err.is_device_error());
        assert!(GenerateError::try_from(err).is_err());

        let err = Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "t"));
        assert!(err.is_timeout());
        assert!(!err.is_device_error());
    }
}
