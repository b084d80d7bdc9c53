//! Launching real subprocesses through `/bin/sh`.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use mcp_agent_core::server::LaunchError;
use mcp_agent_core::{ServerConfigBuilder, ServerSession, SessionState};
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Answers `initialize` (id 1) and `tools/list` (id 2), then idles until
/// stdin closes.
const STUB_SERVER: &str = r#"#!/bin/sh
read -r _initialize
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"sh-stub","version":"1.0"}}}'
read -r _initialized
read -r _list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"get_me","description":"Who am I","inputSchema":{"type":"object"}}]}}'
echo "stub: idle, token=${GITHUB_PERSONAL_ACCESS_TOKEN}" >&2
cat >/dev/null
"#;

/// Handshakes, then ignores stdin closing.
const STUBBORN_SERVER: &str = r#"#!/bin/sh
read -r _initialize
echo '{"jsonrpc":"2.0","id":1,"result":{"serverInfo":{"name":"stubborn"}}}'
exec sleep 30
"#;

const SILENT_SERVER: &str = "#!/bin/sh\nexec sleep 30\n";

fn write_script(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mcp-agent-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_owned()
}

/// Runs the script through `/bin/sh` rather than executing the freshly
/// written file, which can fail with `ETXTBSY` while other tests fork.
fn sh_config(name: &str, script: &Path) -> ServerConfigBuilder {
    ServerConfigBuilder::new(name, "/bin/sh").with_arg(path_str(script))
}

#[tokio::test]
async fn test_start_list_stop() {
    timeout(TEST_TIMEOUT, async {
        let script = write_script("stub.sh", STUB_SERVER);
        let config = sh_config("github", &script)
            .with_env("GITHUB_PERSONAL_ACCESS_TOKEN", "ghp_test")
            .build();

        let session = ServerSession::start(config).await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.server_info().unwrap().name, "sh-stub");

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "get_me");
        // Served from the cache; the stub would not answer a second listing.
        assert_eq!(session.list_tools().await.unwrap().len(), 1);

        let started = Instant::now();
        session.stop().await;
        assert_eq!(session.state(), SessionState::Closed);
        // `cat` exits on EOF, well inside the grace period.
        assert!(started.elapsed() < Duration::from_secs(4));
        session.stop().await;
        assert_eq!(session.state(), SessionState::Closed);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_stop_kills_after_grace_period() {
    timeout(TEST_TIMEOUT, async {
        let script = write_script("stubborn.sh", STUBBORN_SERVER);
        let config = sh_config("stubborn", &script)
            .shutdown_timeout(Duration::from_millis(200))
            .build();
        let session = ServerSession::start(config).await.unwrap();

        let started = Instant::now();
        session.stop().await;
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Closed);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_handshake_timeout() {
    timeout(TEST_TIMEOUT, async {
        let script = write_script("silent.sh", SILENT_SERVER);
        let config = sh_config("silent", &script)
            .startup_timeout(Duration::from_millis(300))
            .build();

        let started = Instant::now();
        let err = ServerSession::start(config).await.unwrap_err();
        assert!(matches!(err, LaunchError::HandshakeTimeout { .. }), "{err}");
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(5));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_launch_errors() {
    let config = ServerConfigBuilder::new("missing", "/nonexistent/github-mcp-server").build();
    assert!(matches!(
        ServerSession::start(config).await,
        Err(LaunchError::NotFound(_))
    ));

    let config = ServerConfigBuilder::new("missing", "github-mcp-server-not-installed").build();
    assert!(matches!(
        ServerSession::start(config).await,
        Err(LaunchError::NotFound(_))
    ));

    let script = write_script("not-executable.sh", SILENT_SERVER);
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
    let config = ServerConfigBuilder::new("plain", path_str(&script)).build();
    assert!(matches!(
        ServerSession::start(config).await,
        Err(LaunchError::NotExecutable(_))
    ));
}

#[tokio::test]
async fn test_exit_during_session() {
    timeout(TEST_TIMEOUT, async {
        let script = write_script(
            "exits.sh",
            "#!/bin/sh\nread -r _\necho '{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}'\nread -r _\nsleep 0.2\nexit 0\n",
        );
        let config = sh_config("exits", &script).build();
        let session = ServerSession::start(config).await.unwrap();
        assert!(session.server_info().is_none());

        while session.state() != SessionState::Closed {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(session.list_tools().await.is_err());
        session.stop().await;
    })
    .await
    .unwrap();
}
