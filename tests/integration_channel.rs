//! End-to-end scenarios over the in-process channel transport: the
//! initialize handshake, version negotiation, tool listing and calls,
//! lifecycle rejection, resource subscriptions, pagination, logging and
//! sampling.

use duplex_mcp::prelude::*;
use duplex_mcp::transport::traits::TransportEvents;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn connected() -> (McpServer, McpClient, SessionId) {
    let (server_transport, client_transport) = ChannelTransport::pair();
    let session = server_transport.session();

    let server = McpServer::new("test-server", "1.0.0");
    server.serve(server_transport, "").await.unwrap();

    let client = McpClient::new("X", "1");
    client.connect(client_transport, "").await.unwrap();

    (server, client, session)
}

/// Give spawned handler tasks a moment to run
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn echo_tool_set() -> Arc<ToolSet> {
    Arc::new(
        ToolSet::anonymous().method(
            ToolMethod::new("echo", |args| {
                ToolOutput::Text(args[0].as_str().unwrap_or_default().to_string())
            })
            .with_description("Echo a message")
            .param("message", ParamKind::String),
        ),
    )
}

#[tokio::test]
async fn initialize_handshake() {
    let (server, client, session) = connected().await;

    let result = client.initialize().await.unwrap();
    assert_eq!(result.protocol_version, "2025-03-26");
    assert_eq!(result.server_info.name, "test-server");
    assert!(result.capabilities.resources.is_some());

    settle().await;
    assert!(server.is_initialized(session).await);
    assert_eq!(client.server_info().await.unwrap().name, "test-server");
}

#[tokio::test]
async fn version_fallback_rejects_unknown_version() {
    // Drive the wire directly so the frame can carry a bogus version.
    let (server_transport, mut probe) = ChannelTransport::pair();
    let session = server_transport.session();
    let server = McpServer::new("test-server", "1.0.0");
    server.serve(server_transport, "").await.unwrap();

    let mut probe_events = probe.take_events().unwrap();
    probe.start("").await.unwrap();

    probe
        .send(
            session,
            json!({
                "jsonrpc": "2.0", "id": 0, "method": "initialize",
                "params": {
                    "clientInfo": { "name": "X", "version": "1" },
                    "protocolVersion": "9999-99-99",
                    "capabilities": {}
                }
            }),
        )
        .await
        .unwrap();

    let response = next_received(&mut probe_events).await;
    assert_eq!(response["id"], json!(0));
    assert_eq!(response["error"]["code"], json!(20241105));
    assert_eq!(
        response["error"]["message"],
        json!("Protocol Version 9999-99-99 is not supported")
    );
}

#[tokio::test]
async fn negotiating_the_older_version_sticks() {
    let (server_transport, mut probe) = ChannelTransport::pair();
    let session = server_transport.session();
    let server = McpServer::new("test-server", "1.0.0");
    server.serve(server_transport, "").await.unwrap();

    let mut probe_events = probe.take_events().unwrap();
    probe.start("").await.unwrap();

    probe
        .send(
            session,
            json!({
                "jsonrpc": "2.0", "id": 0, "method": "initialize",
                "params": {
                    "clientInfo": { "name": "X", "version": "1" },
                    "protocolVersion": "2024-11-05",
                    "capabilities": {}
                }
            }),
        )
        .await
        .unwrap();

    let response = next_received(&mut probe_events).await;
    assert_eq!(response["result"]["protocolVersion"], json!("2024-11-05"));
}

#[tokio::test]
async fn old_version_session_never_sees_annotations() {
    let (server_transport, mut probe) = ChannelTransport::pair();
    let session = server_transport.session();
    let server = McpServer::new("test-server", "1.0.0");
    server.serve(server_transport, "").await.unwrap();

    let mut probe_events = probe.take_events().unwrap();
    probe.start("").await.unwrap();

    probe
        .send(
            session,
            json!({
                "jsonrpc": "2.0", "id": 0, "method": "initialize",
                "params": {
                    "clientInfo": { "name": "X", "version": "1" },
                    "protocolVersion": "2024-11-05",
                    "capabilities": {}
                }
            }),
        )
        .await
        .unwrap();
    next_received(&mut probe_events).await;
    probe
        .send(session, json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await
        .unwrap();
    settle().await;

    let mut resource = Resource::new("file:///a", "a");
    resource.annotations = Some(Annotations {
        audience: Some(vec![Role::User]),
        priority: Some(1.0),
    });
    server
        .append_resource(session, resource, ResourceContents::text("file:///a", "x"))
        .await
        .unwrap();

    probe
        .send(session, json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" }))
        .await
        .unwrap();
    // A coalesced list_changed notification may arrive ahead of the reply.
    let response = loop {
        let frame = next_received(&mut probe_events).await;
        if frame["id"] == json!(1) {
            break frame;
        }
    };
    let listed = &response["result"]["resources"][0];
    assert_eq!(listed["uri"], json!("file:///a"));
    assert!(
        listed.get("annotations").is_none(),
        "2024-11-05 sessions must not see annotations"
    );
}

#[tokio::test]
async fn re_initialize_is_rejected() {
    let (server_transport, mut probe) = ChannelTransport::pair();
    let session = server_transport.session();
    let server = McpServer::new("test-server", "1.0.0");
    server.serve(server_transport, "").await.unwrap();

    let mut probe_events = probe.take_events().unwrap();
    probe.start("").await.unwrap();

    let init = json!({
        "jsonrpc": "2.0", "id": 0, "method": "initialize",
        "params": {
            "clientInfo": { "name": "X", "version": "1" },
            "protocolVersion": "2025-03-26",
            "capabilities": {}
        }
    });
    probe.send(session, init.clone()).await.unwrap();
    next_received(&mut probe_events).await;
    probe
        .send(session, json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
        .await
        .unwrap();
    settle().await;

    let mut second = init;
    second["id"] = json!(1);
    probe.send(session, second).await.unwrap();
    let response = next_received(&mut probe_events).await;
    assert_eq!(response["error"]["code"], json!(1));
    assert_eq!(response["error"]["message"], json!("Initialized"));
}

#[tokio::test]
async fn tool_listing_and_call() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    server
        .register_tool_set(session, echo_tool_set())
        .await
        .unwrap();

    let tools = client.list_tools(None).await.unwrap();
    assert_eq!(tools.tools.len(), 1);
    let tool = &tools.tools[0];
    assert_eq!(tool.name, "echo");
    let schema = serde_json::to_value(&tool.input_schema).unwrap();
    assert_eq!(schema["properties"]["message"]["type"], json!("string"));
    assert_eq!(schema["required"], json!(["message"]));

    let args = json!({ "message": "Hello" });
    let result = client
        .call_tool("echo", Some(args.as_object().unwrap().clone()))
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&result.content).unwrap(),
        json!([{ "type": "text", "text": "Hello" }])
    );
    assert_eq!(result.is_error, None);
}

#[tokio::test]
async fn tool_call_with_bad_arguments_flags_error() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;
    server
        .register_tool_set(session, echo_tool_set())
        .await
        .unwrap();

    let args = json!({ "message": 42 });
    let result = client
        .call_tool("echo", Some(args.as_object().unwrap().clone()))
        .await
        .unwrap();
    assert!(result.content.is_empty());
    assert_eq!(result.is_error, Some(true));
}

#[tokio::test]
async fn requests_before_initialized_are_rejected_except_ping() {
    let (_server, client, _session) = connected().await;

    // No initialize at all: ping succeeds, everything else is code 1.
    client.ping().await.unwrap();

    let err = client.list_tools(None).await.unwrap_err();
    match err {
        McpError::Rpc { code, message } => {
            assert_eq!(code, 1);
            assert!(message.contains("Not initialized"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn resource_subscription_and_update() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    let updates = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = updates.clone();
    client
        .on_resource_updated(move |uri| {
            seen.lock().unwrap().push(uri);
        })
        .await;

    server
        .append_resource(
            session,
            Resource::new("file:///greeting.txt", "greeting"),
            ResourceContents::text("file:///greeting.txt", "hello"),
        )
        .await
        .unwrap();

    client.subscribe_resource("file:///greeting.txt").await.unwrap();
    server
        .replace_resource(
            session,
            "file:///greeting.txt",
            Resource::new("file:///greeting.txt", "greeting"),
            ResourceContents::text("file:///greeting.txt", "hello again"),
        )
        .await
        .unwrap();
    settle().await;
    assert_eq!(
        *updates.lock().unwrap(),
        vec!["file:///greeting.txt".to_string()]
    );

    // After unsubscribe a replacement stays silent.
    client
        .unsubscribe_resource("file:///greeting.txt")
        .await
        .unwrap();
    server
        .replace_resource(
            session,
            "file:///greeting.txt",
            Resource::new("file:///greeting.txt", "greeting"),
            ResourceContents::text("file:///greeting.txt", "goodbye"),
        )
        .await
        .unwrap();
    settle().await;
    assert_eq!(updates.lock().unwrap().len(), 1);

    let contents = client.read_resource("file:///greeting.txt").await.unwrap();
    assert_eq!(
        contents.contents,
        vec![ResourceContents::text("file:///greeting.txt", "goodbye")]
    );
}

#[tokio::test]
async fn list_pagination_uses_fifty_per_page() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    for i in 0..60 {
        server
            .append_resource(
                session,
                Resource::new(format!("file:///{i:03}.txt"), format!("{i:03}")),
                ResourceContents::text(format!("file:///{i:03}.txt"), "x".to_string()),
            )
            .await
            .unwrap();
    }

    let first = client.list_resources(None).await.unwrap();
    assert_eq!(first.resources.len(), 50);
    assert_eq!(first.next_cursor.as_deref(), Some("50"));
    assert_eq!(first.resources[0].name, "000");

    let second = client.list_resources(first.next_cursor).await.unwrap();
    assert_eq!(second.resources.len(), 10);
    assert_eq!(second.resources[0].name, "050");
    assert_eq!(second.next_cursor, None);
}

#[tokio::test]
async fn burst_mutations_emit_one_list_changed() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    let changes = Arc::new(std::sync::Mutex::new(0));
    let counter = changes.clone();
    client
        .on_notification(
            methods::RESOURCES_LIST_CHANGED,
            move |_notification| {
                *counter.lock().unwrap() += 1;
            },
        )
        .await;

    {
        // All five mutations land in one event-loop cycle.
        let state = server.session(session).await.unwrap();
        let mut state = state.lock().await;
        for i in 0..5 {
            state.append_resource(
                Resource::new(format!("file:///{i}"), format!("{i}")),
                ResourceContents::text(format!("file:///{i}"), "x".to_string()),
            );
        }
    }

    settle().await;
    assert_eq!(*changes.lock().unwrap(), 1);
}

#[tokio::test]
async fn prompts_roundtrip() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    server
        .append_prompt(
            session,
            Prompt::new("greeting").with_description("Say hello"),
            PromptMessage::user_text("Hello, {name}!"),
        )
        .await
        .unwrap();

    let prompts = client.list_prompts(None).await.unwrap();
    assert_eq!(prompts.prompts.len(), 1);
    assert_eq!(prompts.prompts[0].name, "greeting");

    let materialized = client.get_prompt("greeting", None).await.unwrap();
    assert_eq!(materialized.messages.len(), 1);
    assert_eq!(
        materialized.messages[0].content,
        MessageContent::text("Hello, {name}!")
    );
}

#[tokio::test]
async fn logging_respects_session_level() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    let messages = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = messages.clone();
    client
        .on_notification(methods::LOGGING_MESSAGE, move |notification| {
            if let ServerNotification::LoggingMessage(params) = notification {
                seen.lock().unwrap().push(params.level);
            }
        })
        .await;

    // Nothing is delivered before the client picks a level.
    server
        .log(session, LoggingLevel::Error, None, json!("dropped"))
        .await
        .unwrap();

    client.set_logging_level(LoggingLevel::Warning).await.unwrap();
    server
        .log(session, LoggingLevel::Info, None, json!("below threshold"))
        .await
        .unwrap();
    server
        .log(session, LoggingLevel::Error, None, json!("delivered"))
        .await
        .unwrap();

    settle().await;
    assert_eq!(*messages.lock().unwrap(), vec![LoggingLevel::Error]);
}

#[tokio::test]
async fn progress_notifications_reach_the_client() {
    let (server, client, session) = connected().await;
    client.initialize().await.unwrap();
    settle().await;

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    client
        .on_notification(methods::PROGRESS, move |notification| {
            if let ServerNotification::Progress(params) = notification {
                sink.lock().unwrap().push((params.progress, params.total));
            }
        })
        .await;

    server
        .notify_progress(session, RequestId::Number(4), 0.5, Some(1.0))
        .await
        .unwrap();
    settle().await;

    assert_eq!(*seen.lock().unwrap(), vec![(0.5, Some(1.0))]);
}

#[tokio::test]
async fn sampling_round_trip_through_client_handler() {
    struct CannedSampler;

    #[async_trait]
    impl ClientRequestHandler for CannedSampler {
        async fn handle_create_message(
            &self,
            params: CreateMessageParams,
        ) -> McpResult<CreateMessageResult> {
            assert_eq!(params.messages.len(), 1);
            Ok(CreateMessageResult {
                role: Role::Assistant,
                content: MessageContent::text("A haiku about MCP"),
                model: "test-model".to_string(),
                stop_reason: Some("endTurn".to_string()),
            })
        }
    }

    let (server, client, session) = connected().await;
    client.set_request_handler(CannedSampler).await;
    client.initialize().await.unwrap();
    settle().await;

    let result = server
        .create_message(
            session,
            CreateMessageParams {
                messages: vec![SamplingMessage::user_text("write a haiku")],
                model_preferences: None,
                system_prompt: None,
                include_context: None,
                temperature: None,
                max_tokens: 64,
                stop_sequences: None,
                metadata: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(result.role, Role::Assistant);
    assert_eq!(result.model, "test-model");
}

#[tokio::test]
async fn roots_listing_records_on_session() {
    let (server, client, session) = connected().await;
    client
        .set_request_handler(
            DefaultClientRequestHandler::new().with_root("file:///workspace", Some("Workspace")),
        )
        .await;
    client.initialize().await.unwrap();
    settle().await;

    let roots = server.list_roots(session).await.unwrap();
    assert_eq!(roots.roots.len(), 1);
    assert_eq!(roots.roots[0].uri, "file:///workspace");

    let state = server.session(session).await.unwrap();
    let (recorded, _) = state.lock().await.roots(None);
    assert_eq!(recorded.len(), 1);

    // Announcing a roots change drops the stale recording.
    client.notify_roots_changed().await.unwrap();
    settle().await;
    let (recorded, _) = state.lock().await.roots(None);
    assert!(recorded.is_empty());
}

#[tokio::test]
async fn batch_requests_answered_in_input_order() {
    let (server_transport, mut probe) = ChannelTransport::pair();
    let session = server_transport.session();
    let server = McpServer::new("test-server", "1.0.0");
    server.serve(server_transport, "").await.unwrap();

    let mut probe_events = probe.take_events().unwrap();
    probe.start("").await.unwrap();

    probe
        .send(
            session,
            json!([
                { "jsonrpc": "2.0", "id": 10, "method": "ping" },
                { "jsonrpc": "2.0", "id": 11, "method": "tools/list" }
            ]),
        )
        .await
        .unwrap();

    let response = next_received(&mut probe_events).await;
    let items = response.as_array().expect("batch response");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], json!(10));
    assert!(items[0]["result"].is_object());
    assert_eq!(items[1]["id"], json!(11));
    // tools/list in a pre-initialize batch is a lifecycle error.
    assert_eq!(items[1]["error"]["code"], json!(1));
}

#[tokio::test]
async fn unanswered_request_times_out_locally() {
    // A probe server that accepts the session but never replies.
    let (silent, client_transport) = ChannelTransport::pair();
    let mut silent = silent;
    let _silent_events = silent.take_events().unwrap();
    silent.start("").await.unwrap();

    let client = McpClient::with_config(
        "X",
        "1",
        duplex_mcp::client::ClientConfig {
            request_timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        },
    );
    client.connect(client_transport, "").await.unwrap();

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, McpError::Timeout(_)));
}

async fn next_received(events: &mut TransportEvents) -> Value {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("transport closed")
        {
            TransportEvent::Received(_, value) => return value,
            _ => continue,
        }
    }
}
