use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tokio::time::timeout;

use super::*;
use crate::testing::{FakeReply, FakeServer, fake_session};
use crate::tool::{ErrorKind, ToolOutcome};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn invocation(call_id: &str, tool: &str, arguments: Value) -> ToolInvocationRequest {
    ToolInvocationRequest {
        call_id: call_id.to_owned(),
        tool: tool.to_owned(),
        arguments,
    }
}

/// Answers `echo` with its `tag` argument after `delay_ms`.
fn echo_server() -> FakeServer {
    FakeServer::new()
        .with_tool("echo", json!({ "type": "object" }))
        .on_call(|name, args| match name {
            "echo" => FakeReply::delayed(
                args["delay_ms"].as_u64().unwrap_or(0),
                FakeReply::Ok(json!({
                    "content": [{ "type": "text", "text": args["tag"] }],
                    "structuredContent": { "tag": args["tag"] },
                })),
            ),
            "never" => FakeReply::Silent,
            "broken" => FakeReply::ToolError("repository not found".to_owned()),
            "rejected" => FakeReply::RpcError(-32602, "invalid params".to_owned()),
            _ => FakeReply::RpcError(-32601, "no such tool".to_owned()),
        })
}

#[tokio::test]
async fn test_handshake() {
    timeout(TEST_TIMEOUT, async {
        let (session, handle) = fake_session("github", echo_server()).await;
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.name(), "github");

        let info = session.server_info().unwrap();
        assert_eq!(info.name, "fake-server");
        assert_eq!(info.version.as_deref(), Some("0.1.0"));
        assert_eq!(info.protocol_version.as_deref(), Some("2024-11-05"));

        // Anything sent after the handshake is seen after it.
        session.list_tools().await.unwrap();

        let received = handle.received();
        assert_eq!(received[0]["method"], "initialize");
        assert_eq!(received[0]["id"], 1);
        assert_eq!(received[0]["params"]["protocolVersion"], "2024-11-05");
        assert_eq!(received[1]["method"], "notifications/initialized");
        assert!(received[1].get("id").is_none());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_handshake_timeout() {
    timeout(TEST_TIMEOUT, async {
        let config = ServerConfigBuilder::new("silent", "fake-server")
            .startup_timeout(Duration::from_millis(100))
            .build();
        let started = Instant::now();
        let (result, _handle) = FakeServer::new().ignore_handshake().connect(config).await;
        assert!(matches!(
            result,
            Err(LaunchError::HandshakeTimeout { ref name, .. }) if name == "silent"
        ));
        assert!(started.elapsed() >= Duration::from_millis(100));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_slow_handshake_within_startup_window() {
    timeout(TEST_TIMEOUT, async {
        let config = ServerConfigBuilder::new("slow", "fake-server")
            .startup_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_millis(100))
            .build();
        let started = Instant::now();
        let (result, _handle) = FakeServer::new().handshake_delay(300).connect(config).await;
        let session = result.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(session.state(), SessionState::Ready);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_undecodable_output_is_skipped() {
    timeout(TEST_TIMEOUT, async {
        let server = echo_server().handshake_noise(b"log: \xff\xfe caf\xe9\n");
        let (session, handle) = fake_session("noisy", server).await;
        assert_eq!(session.list_tools().await.unwrap().len(), 1);

        handle.send_bytes(b"\xc3\x28 not utf-8\n").await;
        let result = session
            .invoke(invocation("c1", "echo", json!({ "tag": "still here" })), None)
            .await
            .unwrap();
        assert_eq!(result.outcome, ToolOutcome::Success(json!({ "tag": "still here" })));
        assert_eq!(session.state(), SessionState::Ready);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_out_of_order_responses() {
    timeout(TEST_TIMEOUT, async {
        let (session, _handle) = fake_session("echo", echo_server()).await;

        // Earlier requests answer later.
        let calls = (0..5u64).map(|i| {
            let session = Arc::clone(&session);
            async move {
                let args = json!({ "tag": format!("call-{i}"), "delay_ms": 250 - i * 50 });
                session
                    .invoke(invocation(&format!("id-{i}"), "echo", args), None)
                    .await
            }
        });
        let results = futures_util::future::join_all(calls).await;

        for (i, result) in results.into_iter().enumerate() {
            let result = result.unwrap();
            assert_eq!(result.call_id, format!("id-{i}"));
            assert_eq!(
                result.outcome,
                ToolOutcome::Success(json!({ "tag": format!("call-{i}") }))
            );
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_timeout_discards_late_response() {
    timeout(TEST_TIMEOUT, async {
        let (session, _handle) = fake_session("echo", echo_server()).await;

        let started = Instant::now();
        let err = session
            .invoke(
                invocation("slow", "echo", json!({ "tag": "late", "delay_ms": 300 })),
                Some(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(100));

        let err = session
            .invoke(
                invocation("stuck", "never", json!({})),
                Some(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Timeout { ref method, .. } if method == "tools/call"));

        // Let the late response arrive, then make sure it doesn't leak into
        // the next request.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let result = session
            .invoke(invocation("fresh", "echo", json!({ "tag": "fresh" })), None)
            .await
            .unwrap();
        assert_eq!(result.call_id, "fresh");
        assert_eq!(result.outcome, ToolOutcome::Success(json!({ "tag": "fresh" })));
        assert_eq!(session.state(), SessionState::Ready);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_tool_failures_are_results() {
    timeout(TEST_TIMEOUT, async {
        let (session, _handle) = fake_session("echo", echo_server()).await;

        let result = session
            .invoke(invocation("a", "broken", json!({})), None)
            .await
            .unwrap();
        let ToolOutcome::Failure(err) = &result.outcome else {
            panic!("expected a failure, got {result:?}");
        };
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert_eq!(err.reason(), "repository not found");

        let result = session
            .invoke(invocation("b", "rejected", json!({})), None)
            .await
            .unwrap();
        assert_eq!(
            result.to_model_content(),
            "Error: invalid params (code -32602)"
        );
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_tool_cache_discovers_once() {
    timeout(TEST_TIMEOUT, async {
        let server = FakeServer::new()
            .with_tool("list_commits", json!({ "type": "object" }))
            .with_tool("get_me", json!({ "type": "object" }));
        let (session, handle) = fake_session("github", server).await;

        let (a, b, c) = tokio::join!(
            session.list_tools(),
            session.list_tools(),
            session.list_tools()
        );
        for tools in [a, b, c] {
            let names: Vec<_> = tools.unwrap().iter().map(|t| t.name().to_owned()).collect();
            assert_eq!(names, ["list_commits", "get_me"]);
        }
        session.list_tools().await.unwrap();
        assert_eq!(handle.list_calls(), 1);

        session.invalidate_tools();
        session.list_tools().await.unwrap();
        assert_eq!(handle.list_calls(), 2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_tool_cache_disabled() {
    timeout(TEST_TIMEOUT, async {
        let server = FakeServer::new().with_tool("get_me", json!({}));
        let config = ServerConfigBuilder::new("github", "fake-server")
            .cache_tools_list(false)
            .build();
        let (session, handle) = server.connect(config).await;
        let session = session.unwrap();

        for _ in 0..3 {
            session.list_tools().await.unwrap();
        }
        assert_eq!(handle.list_calls(), 3);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_paginated_listing() {
    timeout(TEST_TIMEOUT, async {
        let server = FakeServer::new()
            .with_tool("a", json!({}))
            .with_tool("b", json!({}))
            .with_tool("c", json!({}))
            .page_size(2);
        let (session, handle) = fake_session("paged", server).await;

        let tools = session.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(handle.list_calls(), 2);

        let cursors: Vec<_> = handle
            .received()
            .into_iter()
            .filter(|msg| msg["method"] == "tools/list")
            .map(|msg| msg["params"]["cursor"].clone())
            .collect();
        assert_eq!(cursors, [Value::Null, json!("2")]);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_duplicate_tools_are_malformed() {
    timeout(TEST_TIMEOUT, async {
        let server = FakeServer::new()
            .with_tool("get_me", json!({}))
            .with_tool("get_me", json!({}));
        let (session, _handle) = fake_session("dup", server).await;
        assert!(matches!(
            session.list_tools().await,
            Err(ProtocolError::MalformedResponse(_))
        ));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    timeout(TEST_TIMEOUT, async {
        let (session, _handle) = fake_session("echo", echo_server()).await;
        session.list_tools().await.unwrap();

        session.stop().await;
        assert_eq!(session.state(), SessionState::Closed);
        session.stop().await;
        assert_eq!(session.state(), SessionState::Closed);

        assert!(matches!(
            session.invoke(invocation("x", "echo", json!({})), None).await,
            Err(ProtocolError::NotReady(SessionState::Closed))
        ));
        assert!(matches!(
            session.list_tools().await,
            Err(ProtocolError::NotReady(SessionState::Closed))
        ));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_stop_during_invocation() {
    timeout(TEST_TIMEOUT, async {
        let (session, _handle) = fake_session("echo", echo_server()).await;

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                session
                    .invoke(invocation("x", "never", json!({})), None)
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::join!(session.stop(), session.stop());
        assert!(matches!(
            pending.await.unwrap(),
            Err(ProtocolError::SessionClosed)
        ));
        assert_eq!(session.state(), SessionState::Closed);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_server_exit_closes_session() {
    timeout(TEST_TIMEOUT, async {
        let (session, handle) = fake_session("echo", echo_server()).await;
        session.list_tools().await.unwrap();

        handle.disconnect().await;
        session.state.wait_for(SessionState::Closed).await;
        assert!(matches!(
            session.list_tools().await,
            Err(ProtocolError::NotReady(SessionState::Closed))
        ));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_server_requests_are_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (session, handle) = fake_session("echo", echo_server()).await;

        handle.send_raw("this is not json").await;
        handle
            .send_raw(r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#)
            .await;
        handle
            .send_raw(r#"{"jsonrpc":"2.0","id":"srv-1","method":"roots/list"}"#)
            .await;

        let reply = loop {
            let reply = handle
                .received()
                .into_iter()
                .find(|msg| msg["id"] == "srv-1");
            match reply {
                Some(reply) => break reply,
                None => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };
        assert_eq!(reply["error"]["code"], -32601);
        assert_eq!(session.state(), SessionState::Ready);

        // Request ids keep counting from where the handshake left off.
        session.list_tools().await.unwrap();
        let list = handle
            .received()
            .into_iter()
            .find(|msg| msg["method"] == "tools/list")
            .unwrap();
        assert_eq!(list["id"], 2);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_generic_call() {
    timeout(TEST_TIMEOUT, async {
        let (session, _handle) = fake_session("echo", echo_server()).await;
        let err = session
            .client()
            .call("prompts/list", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Server { code: -32601, .. }));
    })
    .await
    .unwrap();
}
