mod chunks;
mod sse;

pub use chunks::Chunks;
pub use chunks::Error as ChunksError;
pub use sse::Sse;
