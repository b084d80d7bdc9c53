use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::protocol::ProtocolError;

/// Failure to bring a tool server session to the ready state.
///
/// Launch errors are fatal for the session; nothing is retried.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The executable does not exist or cannot be found on `PATH`.
    #[error("tool server executable `{}` not found", .0.display())]
    NotFound(PathBuf),
    /// The path exists but is not an executable file.
    #[error("tool server executable `{}` is not executable", .0.display())]
    NotExecutable(PathBuf),
    /// The OS refused to spawn the process.
    #[error("failed to spawn tool server `{name}`: {source}")]
    Spawn {
        /// Server name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A standard stream of the child could not be captured.
    #[error("failed to capture {0} of the tool server")]
    MissingPipe(&'static str),
    /// The handshake didn't complete inside the startup window.
    #[error("tool server `{name}` did not complete the handshake within {after:?}")]
    HandshakeTimeout {
        /// Server name.
        name: String,
        /// The configured startup window.
        after: Duration,
    },
    /// The handshake failed.
    #[error("handshake with tool server `{name}` failed: {source}")]
    Handshake {
        /// Server name.
        name: String,
        /// What went wrong on the wire.
        #[source]
        source: ProtocolError,
    },
}
