use std::time::Duration;

use thiserror::Error;

use crate::model_client::ModelError;
use crate::protocol::ProtocolError;

/// Why a turn failed.
///
/// Individual tool failures don't end up here; the model sees them as
/// tool results and may recover.
#[derive(Debug, Error)]
pub enum RunError {
    /// The model kept asking for tools past the step budget.
    #[error("step limit of {max_steps} model calls exceeded")]
    StepLimitExceeded {
        /// The configured budget.
        max_steps: usize,
    },
    /// A tool server shut down under the turn.
    #[error("tool server `{server}` is no longer available")]
    SessionUnavailable {
        /// Server name.
        server: String,
    },
    /// Listing a server's tools failed.
    #[error("failed to list tools of `{server}`: {source}")]
    ToolDiscovery {
        /// Server name.
        server: String,
        /// The underlying failure.
        #[source]
        source: ProtocolError,
    },
    /// Two attached servers expose the same tool name.
    #[error("tool `{tool}` is provided by both `{first}` and `{second}`")]
    DuplicateTool {
        /// The clashing tool name.
        tool: String,
        /// The server attached first.
        first: String,
        /// The server attached later.
        second: String,
    },
    /// The model provider failed.
    #[error("model request failed: {0}")]
    Model(#[from] ModelError),
    /// The model didn't finish answering in time.
    #[error("model did not answer within {0:?}")]
    ModelTimeout(Duration),
}
