#![cfg(feature = "provider-openai")]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use futures_util::{StreamExt, stream};
use mdprovider::adapters::openai::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ChunkStream, OpenAiHttpTransport,
    OpenAiProvider, OpenAiTransport,
};
use mdprovider::{
    Message, ModelProvider, ModelRequest, ProviderError, ProviderErrorKind, ProviderFuture,
    ProviderId, RetryPolicy, Role, SecretString, SecureCredentialManager, StopReason, StreamEvent,
    ToolCall, ToolDefinition,
};

#[derive(Debug, Default)]
struct FakeTransport {
    captured_keys: Mutex<Vec<String>>,
    captured_requests: Mutex<Vec<ChatCompletionRequest>>,
    scripted_failures: Mutex<VecDeque<ProviderError>>,
}

impl FakeTransport {
    fn failing_first(errors: Vec<ProviderError>) -> Self {
        Self {
            scripted_failures: Mutex::new(errors.into()),
            ..Self::default()
        }
    }

    fn record(
        &self,
        request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> Result<(), ProviderError> {
        self.captured_requests
            .lock()
            .expect("request lock")
            .push(request);
        self.captured_keys
            .lock()
            .expect("key lock")
            .push(api_key.expose().to_string());

        match self.scripted_failures.lock().expect("failure lock").pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn chunk(json: &str) -> ChatCompletionChunk {
    serde_json::from_str(json).expect("chunk should parse")
}

impl OpenAiTransport for FakeTransport {
    fn complete<'a>(
        &'a self,
        request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ChatCompletion, ProviderError>> {
        Box::pin(async move {
            self.record(request, api_key)?;
            let completion = serde_json::from_str(
                r#"{
                    "model": "gpt-4.1-mini",
                    "choices": [{
                        "message": {
                            "content": null,
                            "tool_calls": [{
                                "id": "call_1",
                                "type": "function",
                                "function": {"name": "analyst_price_targets", "arguments": "{\"ticker\":\"NVDA\"}"}
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }],
                    "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
                }"#,
            )
            .expect("completion should parse");
            Ok(completion)
        })
    }

    fn stream<'a>(
        &'a self,
        request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.record(request, api_key)?;
            let chunks = stream::iter(vec![
                Ok(chunk(r#"{"model":"gpt-4.1-mini","choices":[{"delta":{"content":"NVDA closed"}}]}"#)),
                Ok(chunk(r#"{"choices":[{"delta":{"content":" higher"},"finish_reason":"stop"}]}"#)),
            ]);
            Ok(Box::pin(chunks) as ChunkStream<'a>)
        })
    }
}

fn credentials() -> Arc<SecureCredentialManager> {
    let credentials = Arc::new(SecureCredentialManager::new());
    credentials
        .set_openai_api_key("sk-live-123")
        .expect("key should set");
    credentials
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
        ..RetryPolicy::new(max_attempts)
    }
}

fn ask(text: &str) -> ModelRequest {
    ModelRequest::new("gpt-4.1-mini", vec![Message::new(Role::User, text)])
}

#[tokio::test]
async fn complete_maps_chat_completion_to_provider_response() {
    let transport = Arc::new(FakeTransport::default());
    let provider = OpenAiProvider::new(credentials(), transport.clone());
    let history = vec![
        Message::new(Role::System, "You are a market analyst."),
        Message::new(Role::User, "Where do analysts see NVDA?"),
        Message::assistant_tool_calls(vec![ToolCall {
            id: "call_0".to_string(),
            name: "sector_info".to_string(),
            arguments: "{\"ticker\":\"NVDA\"}".to_string(),
        }]),
        Message::tool_result("call_0", "{\"sector\":\"Technology\"}"),
    ];
    let request = ModelRequest::new("gpt-4.1-mini", history)
        .with_temperature(0.0)
        .with_tools(vec![ToolDefinition {
            name: "analyst_price_targets".to_string(),
            description: "Analyst price targets".to_string(),
            input_schema: "{\"type\":\"object\"}".to_string(),
        }]);

    let response = provider
        .complete(request)
        .await
        .expect("completion should succeed");
    assert_eq!(response.provider, ProviderId::OpenAi);
    assert_eq!(response.stop_reason, StopReason::ToolUse);
    assert_eq!(response.usage.total_tokens, 10);
    assert_eq!(response.tool_calls()[0].name, "analyst_price_targets");
    assert!(response.text().is_empty());

    let keys = transport.captured_keys.lock().expect("key lock").clone();
    assert_eq!(keys, vec!["sk-live-123".to_string()]);

    let captured = transport.captured_requests.lock().expect("request lock");
    assert_eq!(captured[0].model, "gpt-4.1-mini");
    assert_eq!(captured[0].messages.len(), 4);
    assert_eq!(captured[0].tools.len(), 1);
    assert_eq!(captured[0].temperature, Some(0.0));
    assert!(!captured[0].stream);
}

#[tokio::test]
async fn blank_model_uses_the_configured_fallback() {
    let transport = Arc::new(FakeTransport::default());
    let provider =
        OpenAiProvider::new(credentials(), transport.clone()).with_fallback_model("gpt-4.1");
    let request = ModelRequest::new(" ", vec![Message::new(Role::User, "hi")]);

    provider
        .complete(request)
        .await
        .expect("completion should succeed");
    let captured = transport.captured_requests.lock().expect("request lock");
    assert_eq!(captured[0].model, "gpt-4.1");
}

#[tokio::test]
async fn stream_yields_deltas_then_complete_response() {
    let transport = Arc::new(FakeTransport::default());
    let provider = OpenAiProvider::new(credentials(), transport.clone());

    let events = provider
        .stream(ask("NVDA?"))
        .await
        .expect("stream should open")
        .collect::<Vec<_>>()
        .await;

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0].as_ref().expect("first event"),
        &StreamEvent::TextDelta("NVDA closed".to_string())
    );
    match events[2].as_ref().expect("last event") {
        StreamEvent::ResponseComplete(response) => {
            assert_eq!(response.text(), "NVDA closed higher");
            assert_eq!(response.stop_reason, StopReason::EndTurn);
        }
        other => panic!("unexpected terminal event: {other:?}"),
    }

    let captured = transport.captured_requests.lock().expect("request lock");
    assert!(captured[0].stream);
}

#[tokio::test]
async fn transient_failures_are_retried_with_policy() {
    let transport = Arc::new(FakeTransport::failing_first(vec![
        ProviderError::unavailable("overloaded"),
        ProviderError::rate_limited("slow down"),
    ]));
    let provider =
        OpenAiProvider::new(credentials(), transport.clone()).with_retry_policy(fast_retry(3));

    let response = provider
        .complete(ask("hi"))
        .await
        .expect("third attempt should succeed");
    assert_eq!(response.stop_reason, StopReason::ToolUse);
    assert_eq!(
        transport.captured_requests.lock().expect("request lock").len(),
        3
    );
}

#[tokio::test]
async fn non_retryable_failures_surface_immediately() {
    let transport = Arc::new(FakeTransport::failing_first(vec![
        ProviderError::authentication("bad key"),
    ]));
    let provider =
        OpenAiProvider::new(credentials(), transport.clone()).with_retry_policy(fast_retry(3));

    let error = provider
        .complete(ask("hi"))
        .await
        .expect_err("auth failure should surface");
    assert_eq!(error.kind, ProviderErrorKind::Authentication);
    assert_eq!(
        transport.captured_requests.lock().expect("request lock").len(),
        1
    );
}

#[tokio::test]
async fn missing_openai_credentials_returns_auth_error() {
    let transport = Arc::new(FakeTransport::default());
    let provider = OpenAiProvider::new(Arc::new(SecureCredentialManager::new()), transport);

    let error = provider
        .complete(ask("hi"))
        .await
        .expect_err("missing creds should fail");
    assert_eq!(error.kind, ProviderErrorKind::Authentication);
    assert_eq!(error.message, "no OpenAI API key configured");
}

const SSE_BODY: &str = "data: {\"model\":\"gpt-4.1-mini\",\"choices\":[{\"delta\":{\"content\":\"KO pays\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\" quarterly\"},\"finish_reason\":\"stop\"}]}\n\n\
data: [DONE]\n\n";

async fn completions_endpoint(headers: axum::http::HeaderMap) -> axum::response::Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer sk-live-123");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
            .into_response();
    }

    ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response()
}

async fn spawn_completions_server() -> String {
    let app = Router::new().route("/v1/chat/completions", post(completions_endpoint));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let address = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{address}/v1/")
}

#[tokio::test]
async fn http_transport_decodes_server_sent_events() {
    let base_url = spawn_completions_server().await;
    let transport = OpenAiHttpTransport::new(reqwest::Client::new()).with_base_url(base_url);
    assert!(transport.completions_url().ends_with("/v1/chat/completions"));
    let provider = OpenAiProvider::new(credentials(), Arc::new(transport));

    let events = provider
        .stream(ask("Does KO pay dividends?"))
        .await
        .expect("stream should open")
        .collect::<Vec<_>>()
        .await;

    let deltas = events
        .iter()
        .filter_map(|event| match event {
            Ok(StreamEvent::TextDelta(text)) => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(deltas, vec!["KO pays", " quarterly"]);
    match events.last().expect("terminal event") {
        Ok(StreamEvent::ResponseComplete(response)) => {
            assert_eq!(response.text(), "KO pays quarterly");
        }
        other => panic!("unexpected terminal event: {other:?}"),
    }
}

#[tokio::test]
async fn http_transport_classifies_error_statuses() {
    let base_url = spawn_completions_server().await;
    let credentials = Arc::new(SecureCredentialManager::new());
    credentials
        .set_openai_api_key("sk-wrong")
        .expect("key should set");
    let transport = OpenAiHttpTransport::new(reqwest::Client::new()).with_base_url(base_url);
    let provider = OpenAiProvider::new(credentials, Arc::new(transport));

    let error = provider
        .complete(ask("hi"))
        .await
        .expect_err("401 should fail");
    assert_eq!(error.kind, ProviderErrorKind::Authentication);
    assert_eq!(error.message, "Incorrect API key provided");
}
