use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific history message the runner carries verbatim.
///
/// Some backends need their own message shape echoed back on the next
/// request (an assistant message with the exact tool call ids, reasoning
/// fields and so on). The provider wraps that value here; the runner only
/// stores and replays it, and the same provider unwraps it again with
/// [`OpaqueMessage::to_raw`].
///
/// Equality and hashing only look at the `id`, which must be unique within
/// one conversation.
#[derive(Clone)]
pub struct OpaqueMessage {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Wraps a provider value under the given message id.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        Self {
            id: Arc::from(id.into()),
            value: Arc::new(value),
        }
    }

    /// Returns the message id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the wrapped value if it has type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.id).finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
