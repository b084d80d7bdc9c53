//! Tool-server lifecycle and turn orchestration.
//!
//! - [`server`]: launches a tool server subprocess, performs the handshake
//!   and tears it down again.
//! - [`protocol`]: the JSON-RPC client multiplexing requests over the
//!   subprocess's stdio.
//! - [`tool`]: discovered tool definitions, invocation types and the
//!   per-session tool cache.
//! - [`Agent`] and [`Runner`]: drive a conversation turn through the model
//!   and the attached tool servers.
//! - [`trace`]: nestable spans grouping turns for observability.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod protocol;
mod runner;
pub mod server;
pub mod tool;
pub mod trace;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentBuilder};
pub use conversation::{ConversationTurn, ToolCallRecord};
pub use model_client::ModelError;
pub use runner::{RunConfig, RunError, Runner};
pub use server::{ServerConfig, ServerConfigBuilder, ServerSession, SessionState};
