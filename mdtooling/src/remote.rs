//! Tool runtime backed by a registry reached over JSON-RPC HTTP.
//!
//! [`RemoteToolRuntime::connect`] performs the `initialize` handshake and
//! caches the registry's catalog; [`ToolRuntime::execute`] forwards each call
//! as `tools/call`, retrying retryable transport failures with the configured
//! [`RetryPolicy`]. Every request is bounded by the runtime's request timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use mdprovider::{RetryPolicy, ToolCall};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Value, json};

use crate::rpc::{
    CallToolParams, CallToolResult, PROTOCOL_VERSION, PromptDescriptor, RpcError, RpcRequest,
    RpcResponse, error_codes, methods,
};
use crate::{
    NoopToolRuntimeHooks, ToolDescriptor, ToolError, ToolErrorKind, ToolExecutionContext,
    ToolExecutionResult, ToolFuture, ToolRuntime, ToolRuntimeHooks, parse_json_object,
};

const SESSION_HEADER: &str = "mcp-session-id";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RemoteToolRuntime {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
    hooks: Arc<dyn ToolRuntimeHooks>,
    descriptors: RwLock<Vec<ToolDescriptor>>,
    session: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl RemoteToolRuntime {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            hooks: Arc::new(NoopToolRuntimeHooks),
            descriptors: RwLock::new(Vec::new()),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Upper bound on one HTTP exchange, body included. An expired request
    /// is a retryable [`ToolErrorKind::Timeout`].
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Initializes the protocol session and loads the tool catalog.
    pub async fn connect(self) -> Result<Self, ToolError> {
        self.initialize().await?;
        self.discover().await?;
        Ok(self)
    }

    pub async fn initialize(&self) -> Result<Value, ToolError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let result = self.call(methods::INITIALIZE, Some(params), None).await?;
        self.notify(methods::INITIALIZED).await?;
        Ok(result)
    }

    /// Fetches `tools/list` and replaces the cached catalog.
    pub async fn discover(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let result = self.call(methods::TOOLS_LIST, Some(json!({})), None).await?;
        let entries = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("tools/list result has no 'tools' array"))?;

        let descriptors = entries
            .iter()
            .map(ToolDescriptor::from_wire)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| malformed(err.message))?;

        let mut cached = self
            .descriptors
            .write()
            .map_err(|_| ToolError::other("descriptor cache lock poisoned"))?;
        cached.clone_from(&descriptors);
        Ok(descriptors)
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, ToolError> {
        let result = self.call(methods::PROMPTS_LIST, Some(json!({})), None).await?;
        let prompts = result
            .get("prompts")
            .cloned()
            .ok_or_else(|| malformed("prompts/list result has no 'prompts' array"))?;
        serde_json::from_value(prompts).map_err(|err| malformed(err.to_string()))
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        tool_call: Option<&ToolCall>,
    ) -> Result<Value, ToolError> {
        let request = RpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);
        let mut attempt = 1;

        loop {
            match self.send(&request).await {
                Ok(value) => return Ok(value),
                Err(error) if self.retry_policy.should_retry(attempt, &error) => {
                    let delay = self.retry_policy.backoff_for_attempt(attempt);
                    tracing::warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "registry request failed; retrying"
                    );
                    if let Some(tool_call) = tool_call {
                        self.hooks
                            .on_call_retry(tool_call, attempt, delay, &error);
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let request = RpcRequest::notification(method);
        let response = self.post(&request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), method));
        }
        Ok(())
    }

    async fn post(&self, request: &RpcRequest) -> Result<reqwest::Response, ToolError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(self.request_timeout)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(request);

        if let Some(session) = self.session_id()? {
            builder = builder.header(SESSION_HEADER, session);
        }

        builder
            .send()
            .await
            .map_err(|err| request_error(err, "registry unreachable"))
    }

    async fn send(&self, request: &RpcRequest) -> Result<Value, ToolError> {
        let response = self.post(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &request.method));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            self.remember_session(session)?;
        }

        let event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|err| request_error(err, "failed to read registry response"))?;

        let payload = if event_stream {
            last_sse_payload(&body)
                .ok_or_else(|| malformed("event stream carried no data frame"))?
        } else {
            body.as_str()
        };

        let envelope: RpcResponse =
            serde_json::from_str(payload).map_err(|err| malformed(err.to_string()))?;

        match (envelope.result, envelope.error) {
            (_, Some(error)) => Err(rpc_error(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(malformed("response has neither result nor error")),
        }
    }

    fn session_id(&self) -> Result<Option<String>, ToolError> {
        self.session
            .lock()
            .map(|session| session.clone())
            .map_err(|_| ToolError::other("session lock poisoned"))
    }

    fn remember_session(&self, session: &str) -> Result<(), ToolError> {
        let mut current = self
            .session
            .lock()
            .map_err(|_| ToolError::other("session lock poisoned"))?;
        *current = Some(session.to_string());
        Ok(())
    }

    async fn invoke(&self, tool_call: &ToolCall) -> Result<ToolExecutionResult, ToolError> {
        let arguments = parse_json_object(&tool_call.arguments)?;
        let params = CallToolParams {
            name: tool_call.name.clone(),
            arguments,
        };
        let params = serde_json::to_value(params).map_err(|err| ToolError::other(err.to_string()))?;

        let result = self
            .call(methods::TOOLS_CALL, Some(params), Some(tool_call))
            .await?;
        let result: CallToolResult =
            serde_json::from_value(result).map_err(|err| malformed(err.to_string()))?;

        Ok(ToolExecutionResult::from_call(tool_call, result.into_output()))
    }
}

impl std::fmt::Debug for RemoteToolRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteToolRuntime")
            .field("endpoint", &self.endpoint)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl ToolRuntime for RemoteToolRuntime {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.descriptors
            .read()
            .map(|descriptors| descriptors.clone())
            .unwrap_or_default()
    }

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolExecutionResult, ToolError>> {
        Box::pin(async move {
            self.hooks.on_call_started(&tool_call, &context);
            let started = Instant::now();

            match self.invoke(&tool_call).await {
                Ok(result) => {
                    self.hooks
                        .on_call_completed(&tool_call, &context, &result, started.elapsed());
                    Ok(result)
                }
                Err(error) => {
                    let error = error
                        .with_tool_name(&tool_call.name)
                        .with_tool_call_id(&tool_call.id);
                    self.hooks
                        .on_call_failed(&tool_call, &context, &error, started.elapsed());
                    Err(error)
                }
            }
        })
    }
}

fn malformed(message: impl Into<String>) -> ToolError {
    ToolError::new(
        ToolErrorKind::Transport,
        format!("malformed registry response: {}", message.into()),
        false,
    )
}

fn request_error(err: reqwest::Error, context: &str) -> ToolError {
    if err.is_timeout() {
        ToolError::timeout(format!("registry request timed out: {err}"))
    } else {
        ToolError::transport(format!("{context}: {err}"))
    }
}

fn status_error(status: u16, method: &str) -> ToolError {
    let message = format!("registry returned HTTP {status} for '{method}'");
    match status {
        408 | 429 | 500..=599 => ToolError::transport(message),
        _ => ToolError::new(ToolErrorKind::Transport, message, false),
    }
}

fn rpc_error(error: RpcError) -> ToolError {
    match error.code {
        error_codes::INVALID_PARAMS => ToolError::invalid_arguments(error.message),
        error_codes::METHOD_NOT_FOUND => ToolError::not_found(error.message),
        _ => ToolError::new(
            ToolErrorKind::Other,
            format!("registry error {}: {}", error.code, error.message),
            false,
        ),
    }
}

fn last_sse_payload(body: &str) -> Option<&str> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|payload| !payload.is_empty())
        .last()
}
