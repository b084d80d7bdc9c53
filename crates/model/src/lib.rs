//! The provider-neutral model protocol used by the agent runner.
//!
//! A model provider turns a [`ModelRequest`] (instructions, history, tool
//! definitions) into a streamed [`ModelResponse`] that yields text deltas,
//! tool call requests and a finish reason. The runner never talks to a
//! concrete backend directly; it only sees the types in this crate.
//!
//! Nothing here performs I/O. Backends live in their own crates.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
