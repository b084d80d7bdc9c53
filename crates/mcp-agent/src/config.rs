//! Everything the binary reads from the environment, validated up front.

use std::fmt::{self, Debug, Formatter};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use mcp_agent_core::{ServerConfig, ServerConfigBuilder};
use mcp_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use thiserror::Error;

const GITHUB_SERVER_NAME: &str = "Github MCP server";
const LANGFUSE_TRACES_PATH: &str = "/api/public/otel/v1/traces";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{var} must start with `{prefix}`")]
    InvalidPrefix {
        var: &'static str,
        prefix: &'static str,
    },
    #[error("GITHUB_MCP_SERVER_BINARY path does not exist: {}", .0.display())]
    BinaryNotFound(PathBuf),
    #[error("GITHUB_MCP_SERVER_BINARY is not executable: {}", .0.display())]
    BinaryNotExecutable(PathBuf),
}

/// Reads a variable. Empty values count as unset.
pub trait Env {
    fn get(&self, key: &str) -> Option<String>;

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }
}

/// The process environment.
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

/// Loads `path` into the process environment. Returns `false` when there
/// is no such file. Variables that are already set keep their value.
pub fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(err) if err.not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

/// `OPENAI_BASE_URL` and `OPENAI_MODEL_NAME` are required. The API key may
/// be left out for local endpoints.
pub fn openai_config(env: &impl Env) -> Result<OpenAIConfig, ConfigError> {
    let base_url = env.require("OPENAI_BASE_URL")?;
    let model = env.require("OPENAI_MODEL_NAME")?;
    let builder = match env.get("OPENAI_API_KEY") {
        Some(api_key) => OpenAIConfigBuilder::with_api_key(api_key),
        None => OpenAIConfigBuilder::without_api_key(),
    };
    Ok(builder.with_base_url(base_url).with_model(model).build())
}

/// The GitHub MCP server binary and its credential.
#[derive(Clone)]
pub struct GithubServer {
    binary: PathBuf,
    token: String,
}

impl GithubServer {
    pub fn from_env(env: &impl Env) -> Result<Self, ConfigError> {
        let token = env.require("GITHUB_PERSONAL_ACCESS_TOKEN")?;
        let binary = PathBuf::from(env.require("GITHUB_MCP_SERVER_BINARY")?);
        check_executable(&binary)?;
        Ok(Self { binary, token })
    }

    /// Runs `<binary> stdio` with only the token added to the default
    /// environment.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfigBuilder::new(GITHUB_SERVER_NAME, self.binary.to_string_lossy())
            .with_arg("stdio")
            .with_env("GITHUB_PERSONAL_ACCESS_TOKEN", self.token.clone())
            .cache_tools_list(true)
            .build()
    }
}

impl Debug for GithubServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubServer")
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

fn check_executable(path: &Path) -> Result<(), ConfigError> {
    let Ok(metadata) = std::fs::metadata(path) else {
        return Err(ConfigError::BinaryNotFound(path.to_path_buf()));
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if !metadata.is_file() || metadata.permissions().mode() & 0o111 == 0 {
            return Err(ConfigError::BinaryNotExecutable(path.to_path_buf()));
        }
    }
    #[cfg(not(unix))]
    {
        if !metadata.is_file() {
            return Err(ConfigError::BinaryNotExecutable(path.to_path_buf()));
        }
    }
    Ok(())
}

/// Where spans go: Langfuse's OTLP/HTTP endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    endpoint: String,
    authorization: String,
}

impl TelemetryConfig {
    pub fn new(host: &str, public_key: &str, secret_key: &str) -> Self {
        let credentials = STANDARD.encode(format!("{public_key}:{secret_key}"));
        Self {
            endpoint: format!("{}{LANGFUSE_TRACES_PATH}", host.trim_end_matches('/')),
            authorization: format!("Basic {credentials}"),
        }
    }

    pub fn from_env(env: &impl Env) -> Result<Self, ConfigError> {
        let public_key = env.require("LANGFUSE_PUBLIC_KEY")?;
        if !public_key.starts_with("pk-lf") {
            return Err(ConfigError::InvalidPrefix {
                var: "LANGFUSE_PUBLIC_KEY",
                prefix: "pk-lf",
            });
        }
        let secret_key = env.require("LANGFUSE_SECRET_KEY")?;
        if !secret_key.starts_with("sk-lf") {
            return Err(ConfigError::InvalidPrefix {
                var: "LANGFUSE_SECRET_KEY",
                prefix: "sk-lf",
            });
        }
        let host = env.require("LANGFUSE_HOST")?;
        Ok(Self::new(&host, &public_key, &secret_key))
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[inline]
    pub fn authorization(&self) -> &str {
        &self.authorization
    }
}

impl Debug for TelemetryConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("endpoint", &self.endpoint)
            .field("authorization", &"<redacted>")
            .finish()
    }
}
