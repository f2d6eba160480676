#![cfg(feature = "remote")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use mdprovider::{RetryPolicy, ToolCall};
use mdtooling::rpc::{
    CallToolResult, PromptArgument, PromptDescriptor, RpcRequest, RpcResponse, error_codes,
};
use mdtooling::{
    ParameterKind, RemoteToolRuntime, ReturnShape, ToolDescriptor, ToolErrorKind,
    ToolExecutionContext, ToolOutput, ToolParameter, ToolRuntime,
};
use serde_json::{Value, json};

#[derive(Default)]
struct ScriptedRegistry {
    unavailable_calls: AtomicU32,
    methods: Mutex<Vec<String>>,
}

fn summary_prompt() -> PromptDescriptor {
    PromptDescriptor {
        name: "stock_summary_prompt".to_string(),
        description: "Summarize a stock".to_string(),
        arguments: vec![PromptArgument {
            name: "ticker".to_string(),
            description: "Ticker symbol".to_string(),
            required: true,
        }],
    }
}

fn sector_descriptor() -> ToolDescriptor {
    ToolDescriptor::new("sector_info", "Sector and industry", ReturnShape::Mapping)
        .with_parameter(ToolParameter::required("ticker", ParameterKind::String))
}

async fn handle(
    State(registry): State<Arc<ScriptedRegistry>>,
    Json(request): Json<RpcRequest>,
) -> Response {
    registry
        .methods
        .lock()
        .expect("methods lock")
        .push(request.method.clone());

    let Some(id) = request.id.clone() else {
        return StatusCode::ACCEPTED.into_response();
    };

    let response = match request.method.as_str() {
        "initialize" => RpcResponse::success(id, json!({"protocolVersion": "2025-03-26"})),
        "tools/list" => {
            RpcResponse::success(id, json!({"tools": [sector_descriptor().to_wire()]}))
        }
        "prompts/list" => RpcResponse::success(id, json!({"prompts": [summary_prompt()]})),
        "tools/call" => {
            if registry
                .unavailable_calls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }

            let params = request.params.unwrap_or(Value::Null);
            if params["name"] != "sector_info" {
                RpcResponse::error(id, error_codes::INVALID_PARAMS, "unknown tool")
            } else {
                let output = ToolOutput::success(json!({
                    "sector": "Technology",
                    "industry": "Semiconductors",
                    "ticker": params["arguments"]["ticker"],
                }));
                let result = serde_json::to_value(CallToolResult::from_output(&output))
                    .expect("result should serialize");
                RpcResponse::success(id, result)
            }
        }
        _ => RpcResponse::error(id, error_codes::METHOD_NOT_FOUND, "method not found"),
    };

    Json(response).into_response()
}

async fn spawn_registry(registry: Arc<ScriptedRegistry>) -> String {
    let app = Router::new()
        .route("/mcp", post(handle))
        .with_state(registry);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{address}/mcp")
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        ..RetryPolicy::new(max_attempts)
    }
}

fn sector_call(name: &str) -> ToolCall {
    ToolCall {
        id: "call_1".to_string(),
        name: name.to_string(),
        arguments: "{\"ticker\":\"NVDA\"}".to_string(),
    }
}

#[tokio::test]
async fn connect_discovers_the_catalog() {
    let registry = Arc::new(ScriptedRegistry::default());
    let endpoint = spawn_registry(registry.clone()).await;

    let runtime = RemoteToolRuntime::new(endpoint)
        .connect()
        .await
        .expect("connect should succeed");

    assert_eq!(runtime.descriptors(), vec![sector_descriptor()]);
    assert_eq!(
        registry.methods.lock().expect("methods lock").clone(),
        vec!["initialize", "notifications/initialized", "tools/list"]
    );
}

#[tokio::test]
async fn tool_calls_round_trip_structured_values() {
    let endpoint = spawn_registry(Arc::new(ScriptedRegistry::default())).await;
    let runtime = RemoteToolRuntime::new(endpoint)
        .connect()
        .await
        .expect("connect should succeed");

    let result = runtime
        .execute(sector_call("sector_info"), ToolExecutionContext::new("s-1"))
        .await
        .expect("call should succeed");

    assert_eq!(result.tool_call_id, "call_1");
    assert!(!result.is_error());
    assert_eq!(
        result.output.value,
        json!({"sector": "Technology", "industry": "Semiconductors", "ticker": "NVDA"})
    );
}

#[tokio::test]
async fn unavailable_registry_is_retried_before_succeeding() {
    let registry = Arc::new(ScriptedRegistry {
        unavailable_calls: AtomicU32::new(2),
        ..ScriptedRegistry::default()
    });
    let endpoint = spawn_registry(registry.clone()).await;
    let runtime = RemoteToolRuntime::new(endpoint)
        .with_retry_policy(fast_retry(3))
        .connect()
        .await
        .expect("connect should succeed");

    let result = runtime
        .execute(sector_call("sector_info"), ToolExecutionContext::new("s-2"))
        .await
        .expect("third attempt should succeed");

    assert!(!result.is_error());
    let calls = registry
        .methods
        .lock()
        .expect("methods lock")
        .iter()
        .filter(|method| method.as_str() == "tools/call")
        .count();
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn exhausted_retries_surface_a_transport_error() {
    let registry = Arc::new(ScriptedRegistry {
        unavailable_calls: AtomicU32::new(10),
        ..ScriptedRegistry::default()
    });
    let endpoint = spawn_registry(registry).await;
    let runtime = RemoteToolRuntime::new(endpoint)
        .with_retry_policy(fast_retry(2))
        .connect()
        .await
        .expect("connect should succeed");

    let error = runtime
        .execute(sector_call("sector_info"), ToolExecutionContext::new("s-3"))
        .await
        .expect_err("registry stays unavailable");

    assert_eq!(error.kind, ToolErrorKind::Transport);
    assert_eq!(error.tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn unknown_tools_are_invalid_arguments() {
    let endpoint = spawn_registry(Arc::new(ScriptedRegistry::default())).await;
    let runtime = RemoteToolRuntime::new(endpoint)
        .connect()
        .await
        .expect("connect should succeed");

    let error = runtime
        .execute(sector_call("stock_quote"), ToolExecutionContext::new("s-4"))
        .await
        .expect_err("unknown tool fails");

    assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
}

#[tokio::test]
async fn unreachable_registry_fails_to_connect() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("listener address");
    drop(listener);

    let error = RemoteToolRuntime::new(format!("http://{address}/mcp"))
        .with_retry_policy(fast_retry(2))
        .connect()
        .await
        .expect_err("nothing is listening");

    assert_eq!(error.kind, ToolErrorKind::Transport);
}

#[tokio::test]
async fn prompts_are_listed_from_the_registry() {
    let registry = Arc::new(ScriptedRegistry::default());
    let endpoint = spawn_registry(registry.clone()).await;
    let runtime = RemoteToolRuntime::new(endpoint)
        .connect()
        .await
        .expect("connect should succeed");

    let prompts = runtime.list_prompts().await.expect("prompts should list");

    assert_eq!(prompts, vec![summary_prompt()]);
    assert_eq!(
        registry.methods.lock().expect("methods lock").last().map(String::as_str),
        Some("prompts/list")
    );
}

#[tokio::test]
async fn silent_registry_times_out_instead_of_hanging() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("listener address");
    let held = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::clone(&held);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            accepted.lock().expect("sockets lock").push(socket);
        }
    });

    let connecting = RemoteToolRuntime::new(format!("http://{address}/mcp"))
        .with_request_timeout(Duration::from_millis(100))
        .with_retry_policy(fast_retry(2))
        .connect();
    let error = tokio::time::timeout(Duration::from_secs(5), connecting)
        .await
        .expect("request timeout should fire first")
        .expect_err("registry never answers");

    assert_eq!(error.kind, ToolErrorKind::Timeout);
    assert!(error.retryable);
    assert!(!held.lock().expect("sockets lock").is_empty());
}
