//! JSON-RPC 2.0 over a tool server's standard streams.
//!
//! Each frame is a single JSON object terminated by `\n`. Requests carry a
//! numeric id allocated per session; responses are matched to their caller
//! by that id, so several requests can be in flight at once and complete in
//! any order.

mod client;
mod error;
mod frame;
mod messages;

pub use client::ProtocolClient;
pub use error::ProtocolError;
pub(crate) use messages::InitializeResult;
