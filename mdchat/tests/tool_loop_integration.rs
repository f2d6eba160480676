use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use mdchat::prelude::*;
use mdchat::{ChatTurnHooks, step_budget_message};
use mdprovider::{
    BoxedEventStream, Message, ModelProvider, ModelRequest, ModelResponse, OutputItem,
    ProviderError, ProviderFuture, ProviderId, Role, StopReason, TokenUsage, ToolCall,
    ReplayEventStream,
};
use mdtooling::{
    DefaultToolRuntime, ParameterKind, ReturnShape, ToolDescriptor, ToolError, ToolErrorKind,
    ToolExecutionContext, ToolFuture, ToolOutput, ToolParameter, ToolRegistry, required_string,
};
use serde_json::json;

enum Scripted {
    Respond(ModelResponse),
    Fail(ProviderError),
}

struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    repeat_tool_calls: bool,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat_tool_calls: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests the same tool on every call, forever.
    fn relentless() -> Self {
        Self {
            repeat_tool_calls: true,
            ..Self::new(Vec::new())
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    fn next(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
        let mut requests = self.requests.lock().expect("requests lock");
        requests.push(request);

        if self.repeat_tool_calls {
            return Ok(tool_call_response(
                &format!("call_{}", requests.len()),
                "stock_summary",
                "{\"ticker\":\"aapl\"}",
            ));
        }

        match self.script.lock().expect("script lock").pop_front() {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(ProviderError::other("script exhausted")),
        }
    }
}

impl ModelProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
        Box::pin(async move { self.next(request) })
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            let response = self.next(request)?;
            Ok(Box::pin(ReplayEventStream::from_response(response)) as BoxedEventStream<'a>)
        })
    }
}

struct UnreachableRegistry;

impl ToolRuntime for UnreachableRegistry {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        vec![summary_descriptor()]
    }

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        _context: ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolExecutionResult, ToolError>> {
        Box::pin(async move {
            Err(ToolError::transport("registry unreachable after 3 attempts")
                .with_tool_call_id(tool_call.id))
        })
    }
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl ChatTurnHooks for RecordingHooks {
    fn on_turn_started(&self, session_id: &SessionId) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("start:{session_id}"));
    }

    fn on_turn_finished(&self, result: &ChatTurnResult, _elapsed: Duration) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("complete:{:?}", result.outcome));
    }

    fn on_turn_failed(&self, _session_id: &SessionId, error: &ChatError, _elapsed: Duration) {
        self.events
            .lock()
            .expect("events lock")
            .push(format!("failure:{:?}", error.kind));
    }
}

fn summary_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "stock_summary",
        "Latest close, volume, and date for a ticker",
        ReturnShape::Text,
    )
    .with_parameter(ToolParameter::required("ticker", ParameterKind::String))
}

fn market_tools() -> Arc<DefaultToolRuntime> {
    let mut registry = ToolRegistry::new();
    registry.register_fn(summary_descriptor(), |args, _context| async move {
        let ticker = required_string(&args, "ticker")?.to_uppercase();
        Ok(ToolOutput::success(format!(
            "{ticker} Summary:\nClose Price: $189.84\nVolume: 48201835\nDate: 2024-05-03\n"
        )))
    });

    Arc::new(DefaultToolRuntime::new(Arc::new(registry)))
}

fn tool_call_response(id: &str, name: &str, arguments: &str) -> ModelResponse {
    ModelResponse {
        provider: ProviderId::OpenAi,
        model: "gpt-4.1-mini".to_string(),
        output: vec![OutputItem::ToolCall(ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        })],
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage {
            input_tokens: 20,
            output_tokens: 5,
            total_tokens: 25,
        },
    }
}

fn answer(text: &str) -> Scripted {
    Scripted::Respond(ModelResponse {
        provider: ProviderId::OpenAi,
        model: "gpt-4.1-mini".to_string(),
        output: vec![OutputItem::Message(Message::new(Role::Assistant, text))],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage {
            input_tokens: 30,
            output_tokens: 10,
            total_tokens: 40,
        },
    })
}

fn call(id: &str, name: &str) -> Scripted {
    Scripted::Respond(tool_call_response(id, name, "{\"ticker\":\"aapl\"}"))
}

fn session(id: &str) -> ChatSession {
    ChatSession::new(id, "gpt-4.1-mini")
}

#[tokio::test]
async fn tool_loop_persists_the_full_reason_act_history() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("call_1", "stock_summary"),
        answer("AAPL closed at $189.84."),
    ]));
    let store = Arc::new(InMemoryConversationStore::new());
    let service = ChatService::builder(provider.clone())
        .store(store.clone())
        .tool_runtime(market_tools())
        .build();

    let result = service
        .run_turn(ChatTurnRequest::new(session("conversation_1"), "How did AAPL close?"))
        .await
        .expect("turn should complete");

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert_eq!(result.assistant_message, "AAPL closed at $189.84.");
    assert_eq!(result.steps, 2);
    assert_eq!(result.tool_executions.len(), 1);
    assert!(
        result.tool_executions[0]
            .output
            .render()
            .starts_with("AAPL Summary:")
    );

    let saved = store
        .load_messages(&SessionId::from("conversation_1"))
        .await
        .expect("load history");
    let roles = saved.iter().map(|message| message.role).collect::<Vec<_>>();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert!(saved[1].has_tool_calls());
    assert_eq!(saved[2].tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn unknown_tools_are_reported_back_to_the_model() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("call_1", "options_chain"),
        answer("I cannot look up options."),
    ]));
    let service = ChatService::builder(provider.clone())
        .tool_runtime(market_tools())
        .build();

    let result = service
        .run_turn(ChatTurnRequest::new(session("conversation_2"), "Options for AAPL?"))
        .await
        .expect("turn should complete");

    assert_eq!(result.outcome, TurnOutcome::Completed);
    assert!(result.tool_executions[0].is_error());

    let requests = provider.requests.lock().expect("requests lock");
    let tool_turn = requests[1]
        .messages
        .iter()
        .find(|message| message.role == Role::Tool)
        .expect("tool turn sent to the model");
    let payload: serde_json::Value =
        serde_json::from_str(&tool_turn.content).expect("error payload is JSON");
    assert!(payload["error"].is_string());
}

#[tokio::test]
async fn relentless_tool_requests_abort_at_the_default_budget() {
    let provider = Arc::new(ScriptedProvider::relentless());
    let store = Arc::new(InMemoryConversationStore::new());
    let service = ChatService::builder(provider.clone())
        .store(store.clone())
        .tool_runtime(market_tools())
        .build();

    let result = service
        .run_turn(ChatTurnRequest::new(session("conversation_3"), "Keep going"))
        .await
        .expect("abort is an outcome, not an error");

    assert_eq!(result.outcome, TurnOutcome::Aborted);
    assert_eq!(result.steps, 8);
    assert_eq!(provider.request_count(), 8);
    assert_eq!(result.tool_executions.len(), 7);
    assert_eq!(result.assistant_message, step_budget_message(8));

    let saved = store
        .load_messages(&SessionId::from("conversation_3"))
        .await
        .expect("load history");
    let last = saved.last().expect("history is not empty");
    assert_eq!(
        last,
        &Message::new(
            Role::Assistant,
            "I could not complete this request within 8 tool steps."
        )
    );
}

#[tokio::test]
async fn transport_faults_fail_the_turn_without_persisting_it() {
    let provider = Arc::new(ScriptedProvider::new(vec![call("call_1", "stock_summary")]));
    let store = Arc::new(InMemoryConversationStore::new());
    let hooks = Arc::new(RecordingHooks::default());
    let service = ChatService::builder(provider)
        .store(store.clone())
        .tool_runtime(Arc::new(UnreachableRegistry))
        .hooks(hooks.clone())
        .build();

    let error = service
        .run_turn(ChatTurnRequest::new(session("conversation_4"), "AAPL?"))
        .await
        .expect_err("transport fault fails the turn");

    assert_eq!(error.kind, ChatErrorKind::Tooling);
    assert_eq!(error.phase, Some(ChatErrorPhase::Tooling));
    assert!(matches!(
        &error.source,
        Some(mdchat::ChatErrorSource::Tool(tool)) if tool.kind == ToolErrorKind::Transport
    ));
    assert!(
        store
            .load_messages(&SessionId::from("conversation_4"))
            .await
            .expect("load history")
            .is_empty()
    );
    assert_eq!(
        hooks.events.lock().expect("events lock").clone(),
        vec!["start:conversation_4", "failure:Tooling"]
    );
}

#[tokio::test]
async fn provider_faults_fail_the_turn_without_persisting_it() {
    let provider = Arc::new(ScriptedProvider::new(vec![Scripted::Fail(
        ProviderError::authentication("invalid api key"),
    )]));
    let store = Arc::new(InMemoryConversationStore::new());
    let service = ChatService::new(provider, store.clone());

    let error = service
        .run_turn(ChatTurnRequest::new(session("conversation_5"), "hi"))
        .await
        .expect_err("provider fault fails the turn");

    assert_eq!(error.kind, ChatErrorKind::Provider);
    assert!(error.is_user_error());
    assert!(
        store
            .load_messages(&SessionId::from("conversation_5"))
            .await
            .expect("load history")
            .is_empty()
    );
}

#[tokio::test]
async fn reusing_a_session_id_continues_the_conversation() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        answer("Hello!"),
        answer("You asked about greetings."),
        answer("Nice to meet you."),
    ]));
    let store = Arc::new(InMemoryConversationStore::new());
    let service = ChatService::new(provider.clone(), store.clone());

    service
        .run_turn(ChatTurnRequest::new(session("conversation_6"), "hi"))
        .await
        .expect("first turn");
    service
        .run_turn(ChatTurnRequest::new(session("conversation_6"), "what did I ask?"))
        .await
        .expect("second turn");
    service
        .run_turn(ChatTurnRequest::new(session("conversation_7"), "hello"))
        .await
        .expect("fresh session");

    let requests = provider.requests.lock().expect("requests lock");
    let contents = |request: &ModelRequest| {
        request
            .messages
            .iter()
            .map(|message| message.content.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(
        contents(&requests[1]),
        vec!["hi", "Hello!", "what did I ask?"]
    );
    assert_eq!(contents(&requests[2]), vec!["hello"]);

    let saved = store
        .load_messages(&SessionId::from("conversation_6"))
        .await
        .expect("load history");
    assert_eq!(saved.len(), 4);
}

#[tokio::test]
async fn stream_turn_reports_tool_progress_before_the_answer() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("call_1", "stock_summary"),
        answer("AAPL closed at $189.84."),
    ]));
    let store = Arc::new(InMemoryConversationStore::new());
    let hooks = Arc::new(RecordingHooks::default());
    let service = ChatService::builder(provider.clone())
        .store(store.clone())
        .tool_runtime(market_tools())
        .hooks(hooks.clone())
        .build();

    let request =
        ChatTurnRequest::new(session("conversation_8"), "How did AAPL close?").enable_streaming();
    let mut events = service.stream_turn(request).await.expect("stream opens");

    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        collected.push(event.expect("event should be ok"));
    }

    assert_eq!(collected.len(), 4);
    assert!(matches!(&collected[0], ChatEvent::ToolCallStarted(call) if call.id == "call_1"));
    assert!(matches!(&collected[1], ChatEvent::ToolCallFinished(result) if !result.is_error()));
    assert_eq!(
        collected[2],
        ChatEvent::TextDelta("AAPL closed at $189.84.".to_string())
    );
    let ChatEvent::TurnComplete(result) = &collected[3] else {
        panic!("last event should complete the turn");
    };
    assert_eq!(result.steps, 2);
    assert_eq!(result.assistant_message, "AAPL closed at $189.84.");

    assert!(
        provider
            .requests
            .lock()
            .expect("requests lock")
            .iter()
            .all(|request| request.options.stream)
    );
    assert_eq!(
        store
            .load_messages(&SessionId::from("conversation_8"))
            .await
            .expect("load history")
            .len(),
        4
    );
    assert_eq!(
        hooks.events.lock().expect("events lock").clone(),
        vec!["start:conversation_8", "complete:Completed"]
    );
}

#[tokio::test]
async fn tool_results_reach_the_model_with_structured_payloads() {
    let mut registry = ToolRegistry::new();
    registry.register_fn(
        ToolDescriptor::new("sector_info", "Sector and industry", ReturnShape::Mapping)
            .with_parameter(ToolParameter::required("ticker", ParameterKind::String)),
        |_args, _context| async move {
            Ok(ToolOutput::success(
                json!({"sector": "Technology", "industry": "Consumer Electronics"}),
            ))
        },
    );
    let provider = Arc::new(ScriptedProvider::new(vec![
        call("call_1", "sector_info"),
        answer("Apple is a Technology company."),
    ]));
    let service = ChatService::builder(provider.clone())
        .tool_runtime(Arc::new(DefaultToolRuntime::new(Arc::new(registry))))
        .build();

    service
        .run_turn(ChatTurnRequest::new(session("conversation_9"), "AAPL sector?"))
        .await
        .expect("turn should complete");

    let requests = provider.requests.lock().expect("requests lock");
    let tool_turn = requests[1]
        .messages
        .last()
        .expect("tool turn is the latest message");
    let payload: serde_json::Value =
        serde_json::from_str(&tool_turn.content).expect("mapping renders as JSON");
    assert_eq!(
        payload,
        json!({"sector": "Technology", "industry": "Consumer Electronics"})
    );
}
