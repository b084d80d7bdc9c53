use crate::error::ModelProviderError;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// A chat-completion backend.
///
/// Providers are treated as stateless: the runner may issue requests from
/// several tasks, and the returned future must not borrow `self`.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// Sends a request to the model.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
