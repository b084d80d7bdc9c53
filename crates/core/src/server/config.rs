use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

/// Variables passed through from the parent environment unless the caller
/// says otherwise.
pub const DEFAULT_INHERITED_ENV: &[&str] =
    &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for [`ServerConfig`].
#[derive(Clone)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Starts a configuration for the executable `command`.
    ///
    /// A bare name is looked up on `PATH`; anything with a path separator
    /// is used as is.
    pub fn new<N: Into<String>, C: Into<String>>(name: N, command: C) -> Self {
        Self {
            config: ServerConfig {
                name: name.into(),
                command: command.into(),
                args: vec![],
                env: BTreeMap::new(),
                inherit_env: DEFAULT_INHERITED_ENV
                    .iter()
                    .map(|s| (*s).to_owned())
                    .collect(),
                cache_tools_list: true,
                startup_timeout: DEFAULT_STARTUP_TIMEOUT,
                shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
        }
    }

    /// Appends a command-line argument.
    #[inline]
    pub fn with_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Appends several command-line arguments.
    #[inline]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    #[inline]
    pub fn with_env<K: Into<String>, V: Into<String>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Replaces the list of variables inherited from the parent process.
    #[inline]
    pub fn inherit_env<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.inherit_env = names.into_iter().map(Into::into).collect();
        self
    }

    /// Whether discovered tools are cached for the session lifetime.
    #[inline]
    pub fn cache_tools_list(mut self, enabled: bool) -> Self {
        self.config.cache_tools_list = enabled;
        self
    }

    /// Upper bound for spawning plus the handshake.
    #[inline]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    /// Grace period between closing stdin and killing the process.
    #[inline]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Timeout for requests whose caller doesn't pass one.
    #[inline]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}

/// How to launch and talk to one tool server.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub(crate) name: String,
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) inherit_env: Vec<String>,
    pub(crate) cache_tools_list: bool,
    pub(crate) startup_timeout: Duration,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) request_timeout: Duration,
}

impl ServerConfig {
    /// The server name used in logs and errors.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executable.
    #[inline]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The command-line arguments.
    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Debug for ServerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Values are usually credentials.
        let env_keys: Vec<_> = self.env.keys().collect();
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &env_keys)
            .field("inherit_env", &self.inherit_env)
            .field("cache_tools_list", &self.cache_tools_list)
            .field("startup_timeout", &self.startup_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = ServerConfigBuilder::new("github", "github-mcp-server")
            .with_arg("stdio")
            .with_env("GITHUB_PERSONAL_ACCESS_TOKEN", "ghp_secret")
            .cache_tools_list(false)
            .build();
        assert_eq!(config.name(), "github");
        assert_eq!(config.args(), ["stdio"]);
        assert!(!config.cache_tools_list);
        assert!(config.inherit_env.iter().any(|v| v == "PATH"));

        let printed = format!("{config:?}");
        assert!(printed.contains("GITHUB_PERSONAL_ACCESS_TOKEN"));
        assert!(!printed.contains("ghp_secret"));
    }
}
