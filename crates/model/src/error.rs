use std::error::Error;
use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The model provider is rate limited.
    RateLimitExceeded,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "content moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "rate limit exceeded"),
            ErrorKind::Other => write!(f, "model error"),
        }
    }
}

/// Errors surfaced by a [`ModelProvider`](crate::ModelProvider) or one of
/// its responses. The runner only looks at the [`ErrorKind`] and the
/// display text.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Classifies this error.
    fn kind(&self) -> ErrorKind;
}
