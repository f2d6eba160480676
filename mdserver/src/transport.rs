//! JSON-RPC over HTTP: `POST /mcp` for protocol traffic, `GET /health` for health checks.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mdobserve::{
    MetricsObservabilityHooks, Observers, SafeToolHooks, TracingObservabilityHooks,
};
use mdprovider::ToolCall;
use mdtooling::rpc::{
    CallToolParams, CallToolResult, GetPromptParams, JSONRPC_VERSION, PROTOCOL_VERSION,
    RpcRequest, RpcResponse, error_codes, methods,
};
use mdtooling::{
    DefaultToolRuntime, ToolError, ToolExecutionContext, ToolRegistry, ToolRuntime,
    ToolRuntimeHooks,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::prompts::PromptCatalog;

const SESSION_HEADER: &str = "mcp-session-id";
const ANONYMOUS_SESSION: &str = "anonymous";

/// Read-only state shared by every request.
pub struct RegistryState {
    runtime: DefaultToolRuntime,
    prompts: PromptCatalog,
}

impl RegistryState {
    pub fn new(registry: ToolRegistry) -> Self {
        let hooks: Arc<dyn ToolRuntimeHooks> =
            Arc::new(SafeToolHooks::new(Observers(
                TracingObservabilityHooks,
                MetricsObservabilityHooks,
            )));

        Self {
            runtime: DefaultToolRuntime::new(Arc::new(registry)).with_hooks(hooks),
            prompts: PromptCatalog::default(),
        }
    }

    pub fn with_tool_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.runtime = self.runtime.with_hooks(hooks);
        self
    }

    async fn dispatch(
        &self,
        id: &Value,
        method: &str,
        params: Option<Value>,
        session: &str,
    ) -> Result<Value, RpcFault> {
        match method {
            methods::INITIALIZE => Ok(initialize_result()),
            methods::INITIALIZED | methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => {
                let tools = self
                    .runtime
                    .descriptors()
                    .iter()
                    .map(|descriptor| descriptor.to_wire())
                    .collect::<Vec<_>>();
                Ok(json!({ "tools": tools }))
            }
            methods::TOOLS_CALL => {
                let params = parse_params::<CallToolParams>(params)?;
                self.call_tool(id, params, session).await
            }
            methods::PROMPTS_LIST => Ok(json!({ "prompts": self.prompts.descriptors() })),
            methods::PROMPTS_GET => {
                let params = parse_params::<GetPromptParams>(params)?;
                let result = self.prompts.render(&params).map_err(RpcFault::from)?;
                to_result(&result)
            }
            other => Err(RpcFault::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method '{other}' not found"),
            )),
        }
    }

    async fn call_tool(
        &self,
        id: &Value,
        params: CallToolParams,
        session: &str,
    ) -> Result<Value, RpcFault> {
        let tool_call = ToolCall {
            id: format!("rpc-{id}"),
            name: params.name,
            arguments: Value::Object(params.arguments).to_string(),
        };

        let result = self
            .runtime
            .execute(tool_call, ToolExecutionContext::new(session))
            .await
            .map_err(RpcFault::from)?;

        to_result(&CallToolResult::from_output(&result.output))
    }
}

#[derive(Debug)]
struct RpcFault {
    code: i64,
    message: String,
}

impl RpcFault {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ToolError> for RpcFault {
    fn from(error: ToolError) -> Self {
        let code = if error.is_user_error() {
            error_codes::INVALID_PARAMS
        } else {
            error_codes::INTERNAL_ERROR
        };
        Self::new(code, error.message)
    }
}

fn parse_params<T>(params: Option<Value>) -> Result<T, RpcFault>
where
    T: DeserializeOwned,
{
    let params = params.ok_or_else(|| RpcFault::new(error_codes::INVALID_PARAMS, "missing params"))?;
    serde_json::from_value(params)
        .map_err(|err| RpcFault::new(error_codes::INVALID_PARAMS, format!("invalid params: {err}")))
}

fn to_result<T>(value: &T) -> Result<Value, RpcFault>
where
    T: Serialize,
{
    serde_json::to_value(value).map_err(|err| RpcFault::new(error_codes::INTERNAL_ERROR, err.to_string()))
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {"listChanged": false},
            "prompts": {"listChanged": false},
        },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

pub fn router(state: Arc<RegistryState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp", post(handle_rpc))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves `router(state)` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<RegistryState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_rpc(
    State(state): State<Arc<RegistryState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let value = match serde_json::from_slice::<Value>(&body) {
        Ok(value) => value,
        Err(err) => {
            return reply(RpcResponse::error(
                Value::Null,
                error_codes::PARSE_ERROR,
                format!("parse error: {err}"),
            ));
        }
    };

    let fallback_id = value.get("id").cloned().unwrap_or(Value::Null);
    let request = match serde_json::from_value::<RpcRequest>(value) {
        Ok(request) if request.jsonrpc == JSONRPC_VERSION => request,
        Ok(request) => {
            return reply(RpcResponse::error(
                fallback_id,
                error_codes::INVALID_REQUEST,
                format!("unsupported jsonrpc version '{}'", request.jsonrpc),
            ));
        }
        Err(err) => {
            return reply(RpcResponse::error(
                fallback_id,
                error_codes::INVALID_REQUEST,
                format!("invalid request: {err}"),
            ));
        }
    };

    let Some(id) = request.id.clone() else {
        tracing::debug!(
            phase = "rpc",
            event = "notification",
            method = %request.method,
            "notification received"
        );
        return StatusCode::ACCEPTED.into_response();
    };

    let session = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(ANONYMOUS_SESSION);

    let response = match state
        .dispatch(&id, &request.method, request.params, session)
        .await
    {
        Ok(result) => RpcResponse::success(id, result),
        Err(fault) => {
            tracing::debug!(
                phase = "rpc",
                event = "request_rejected",
                method = %request.method,
                session,
                code = fault.code,
                error = %fault.message,
                "request rejected"
            );
            RpcResponse::error(id, fault.code, fault.message)
        }
    };

    reply(response)
}

fn reply(response: RpcResponse) -> Response {
    Json(response).into_response()
}
