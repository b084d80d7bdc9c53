use std::fmt::{self, Debug, Formatter};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Builder for [`OpenAIConfig`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct OpenAIConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Creates a builder without an API key, for local endpoints that
    /// don't check authorization.
    #[inline]
    pub fn without_api_key() -> Self {
        Self::default()
    }

    /// Sets the default model.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL, e.g. `http://localhost:11434/v1`.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        OpenAIConfig {
            api_key: self.api_key.filter(|key| !key.is_empty()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfig {
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
    pub(crate) base_url: String,
}

impl OpenAIConfig {
    /// The model used when a request doesn't name one.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[inline]
    pub(crate) fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}
