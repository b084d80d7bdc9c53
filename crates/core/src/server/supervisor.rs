//! Process-level plumbing: finding the executable, preparing its
//! environment and spawning it with piped stdio.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::config::ServerConfig;
use super::error::LaunchError;

/// Finds the executable for `command`. Names containing a path separator
/// are taken literally; bare names are searched on `PATH`.
pub(crate) fn resolve_command(command: &str) -> Result<PathBuf, LaunchError> {
    let path = Path::new(command);
    if path.components().count() <= 1 && !path.is_absolute() {
        return which::which(command).map_err(|err| {
            debug!("`{command}` not found on PATH: {err}");
            LaunchError::NotFound(path.to_path_buf())
        });
    }

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return Err(LaunchError::NotFound(path.to_path_buf())),
    };
    if !metadata.is_file() || !is_executable(&metadata) {
        return Err(LaunchError::NotExecutable(path.to_path_buf()));
    }
    Ok(path.to_path_buf())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

/// Builds the command line. The child sees only the inherited allow-list
/// plus the configured overrides.
pub(crate) fn build_command(config: &ServerConfig, program: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(&config.args).env_clear();
    for key in &config.inherit_env {
        if let Some(value) = std::env::var_os(key) {
            cmd.env(key, value);
        }
    }
    cmd.envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

pub(crate) fn spawn(config: &ServerConfig) -> Result<Child, LaunchError> {
    let program = resolve_command(&config.command)?;
    debug!(
        "spawning tool server `{}`: {} {:?}",
        config.name,
        program.display(),
        config.args
    );
    build_command(config, &program)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            name: config.name.clone(),
            source,
        })
}

/// Forwards the child's stderr to the log, line by line.
pub(crate) fn drain_stderr<R>(name: String, stderr: R) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{name}] {line}");
        }
    })
}
