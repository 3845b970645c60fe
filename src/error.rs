use std::error::Error as StdError;
use std::fmt;

/// The error type returned by every fallible operation in this crate.
///
/// Every failure carries an [`ErrorKind`], so callers can enumerate all
/// failure paths statically instead of matching on message strings.
#[derive(Debug)]
pub struct Error {
    inner: Box<ErrorImpl>,
}

#[derive(Debug)]
struct ErrorImpl {
    kind: ErrorKind,
    message: String,
    cause: Option<Error>,
}

/// Every way a transaction builder can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A monetary amount is zero or otherwise unusable.
    InvalidAmount,
    /// A fee rate is zero.
    InvalidFeeRate,
    /// An address does not parse for the target network.
    InvalidAddress,
    /// A public key has the wrong length or encoding.
    InvalidPublicKey,
    /// An absolute lock height is not strictly below the height/time cutoff.
    InvalidLockHeight,
    /// A script cannot be decompiled, or its timelock operand is absent or
    /// out of range.
    InvalidScript,
    /// A slashing rate outside the open interval (0, 1).
    InvalidRate,
    /// A fee value that must be strictly positive is not.
    InvalidFeeValue,
    /// An output index does not reference an output of the source
    /// transaction.
    IndexOutOfRange,
    /// The selected inputs cannot cover the required outputs and fee.
    InsufficientFunds,
    /// A would-be output does not strictly exceed the dust limit.
    DustOutput,
}

impl Error {
    fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            inner: Box::new(ErrorImpl {
                kind,
                message,
                cause: None,
            }),
        }
    }

    /// The kind of failure this error represents.
    ///
    /// Contextualizing an error does not change its kind.
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub(crate) fn invalid_amount(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidAmount, message.into())
    }

    pub(crate) fn invalid_fee_rate(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidFeeRate, message.into())
    }

    pub(crate) fn invalid_address(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidAddress, message.into())
    }

    pub(crate) fn invalid_public_key(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidPublicKey, message.into())
    }

    pub(crate) fn invalid_lock_height(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidLockHeight, message.into())
    }

    pub(crate) fn invalid_script(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidScript, message.into())
    }

    pub(crate) fn invalid_rate(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidRate, message.into())
    }

    pub(crate) fn invalid_fee_value(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidFeeValue, message.into())
    }

    pub(crate) fn index_out_of_range(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexOutOfRange, message.into())
    }

    pub(crate) fn insufficient_funds(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::InsufficientFunds, message.into())
    }

    pub(crate) fn dust_output(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::DustOutput, message.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = self;
        loop {
            write!(f, "{}", err.inner.message)?;
            err = match err.inner.cause.as_ref() {
                None => break,
                Some(err) => err,
            };
            write!(f, ": ")?;
        }
        Ok(())
    }
}

impl StdError for Error {}

/// A trait for contextualizing error values.
///
/// This makes it easy to contextualize either `Error` or `Result<T, Error>`.
/// Specifically, in the latter case, it absolves one of the need to call
/// `map_err` everywhere one wants to add context to an error.
pub trait ErrorContext {
    /// Prepend `message` to the error's causal chain, keeping its
    /// [`ErrorKind`] intact.
    fn context(self, message: impl Into<String>) -> Self;

    /// Like `context`, but hides message construction within a closure.
    ///
    /// This avoids paying for the contextual message in the happy path.
    fn with_context<S: Into<String>>(self, message: impl FnOnce() -> S) -> Self;
}

impl ErrorContext for Error {
    fn context(self, message: impl Into<String>) -> Error {
        let mut err = Error::new(self.kind(), message.into());
        err.inner.cause = Some(self);
        err
    }

    fn with_context<S: Into<String>>(self, message: impl FnOnce() -> S) -> Error {
        self.context(message())
    }
}

impl<T> ErrorContext for Result<T, Error> {
    fn context(self, message: impl Into<String>) -> Result<T, Error> {
        self.map_err(|err| err.context(message))
    }

    fn with_context<S: Into<String>>(self, message: impl FnOnce() -> S) -> Result<T, Error> {
        self.map_err(|err| err.context(message()))
    }
}
