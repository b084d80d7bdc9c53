use std::time::Duration;

use thiserror::Error;

use crate::server::SessionState;

/// A request that failed on the wire.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// No response arrived in time. The request id is abandoned and a late
    /// response to it is dropped.
    #[error("`{method}` timed out after {after:?}")]
    Timeout {
        /// The JSON-RPC method.
        method: String,
        /// The timeout that elapsed.
        after: Duration,
    },
    /// The server answered with something that doesn't fit the protocol.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// The session doesn't admit requests in its current state.
    #[error("session is {0}")]
    NotReady(SessionState),
    /// The session shut down while the request was pending.
    #[error("session closed")]
    SessionClosed,
    /// The server answered with a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Server {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the server.
        message: String,
    },
}

impl ProtocolError {
    #[inline]
    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedResponse(reason.into())
    }

    /// Returns `true` for [`ProtocolError::Timeout`].
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
