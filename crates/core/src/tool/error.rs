use std::borrow::Cow;
use std::fmt::{self, Display};

/// The kind of error a tool call failed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The arguments did not match the tool's input schema.
    InvalidInput,
    /// The model asked for a tool no attached server provides.
    UnknownTool,
    /// The server ran the tool and reported a failure.
    ExecutionError,
    /// The request never produced an answer, e.g. it timed out.
    Unavailable,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "Invalid input"),
            ErrorKind::UnknownTool => write!(f, "Unknown tool"),
            ErrorKind::ExecutionError => write!(f, "Execution error"),
            ErrorKind::Unavailable => write!(f, "Tool unavailable"),
        }
    }
}

/// Describes a failed tool call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Error {
    /// Creates a new error with the `InvalidInput` kind.
    #[inline]
    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    /// Creates a new error with the `UnknownTool` kind.
    #[inline]
    pub fn unknown_tool() -> Self {
        Self::new(ErrorKind::UnknownTool)
    }

    /// Creates a new error with the `ExecutionError` kind.
    #[inline]
    pub fn execution_error() -> Self {
        Self::new(ErrorKind::ExecutionError)
    }

    /// Creates a new error with the `Unavailable` kind.
    #[inline]
    pub fn unavailable() -> Self {
        Self::new(ErrorKind::Unavailable)
    }

    #[inline]
    fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Attaches a reason to the error.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the error.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason.as_deref() {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {}
