//! Reason-act turn orchestration over a model provider and a tool runtime.
//!
//! A turn is driven by [`TurnState`]: the model is asked for a decision, any
//! requested tools run in order, their results become tool turns, and the
//! model is asked again until it answers or the step budget runs out.

use std::sync::Arc;
use std::time::Instant;

use async_stream::try_stream;
use futures_util::StreamExt;
use mdcommon::{GenerationOptions, TraceId};
use mdprovider::{
    Message, ModelProvider, ModelRequest, ModelResponse, OutputItem, Role, StopReason,
    StreamEvent, TokenUsage, ToolCall, ToolDefinition,
};
use mdtooling::{
    DefaultToolRuntime, ToolErrorKind, ToolExecutionContext, ToolExecutionResult, ToolOutput,
    ToolRuntime,
};

use crate::{
    ChatError, ChatEvent, ChatEventStream, ChatSession, ChatTurnHooks, ChatTurnRequest,
    ChatTurnResult, ConversationStore, InMemoryConversationStore, NoopChatTurnHooks,
    TurnOutcome, TurnState,
};

pub const DEFAULT_MAX_STEPS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatPolicy {
    /// Upper bound on model round trips within one turn.
    pub max_steps: u32,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl ChatPolicy {
    pub fn with_max_steps(max_steps: u32) -> Self {
        Self {
            max_steps: max_steps.max(1),
        }
    }
}

pub fn step_budget_message(max_steps: u32) -> String {
    format!("I could not complete this request within {max_steps} tool steps.")
}

#[derive(Clone)]
pub struct ChatService {
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn ConversationStore>,
    tools: Arc<dyn ToolRuntime>,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatTurnHooks>,
}

pub struct ChatServiceBuilder {
    provider: Arc<dyn ModelProvider>,
    store: Option<Arc<dyn ConversationStore>>,
    tools: Option<Arc<dyn ToolRuntime>>,
    policy: ChatPolicy,
    hooks: Arc<dyn ChatTurnHooks>,
}

impl ChatServiceBuilder {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            store: None,
            tools: None,
            policy: ChatPolicy::default(),
            hooks: Arc::new(NoopChatTurnHooks),
        }
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn tool_runtime(mut self, tools: Arc<dyn ToolRuntime>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn policy(mut self, policy: ChatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_steps(self, max_steps: u32) -> Self {
        self.policy(ChatPolicy::with_max_steps(max_steps))
    }

    pub fn hooks(mut self, hooks: Arc<dyn ChatTurnHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> ChatService {
        ChatService {
            provider: self.provider,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryConversationStore::new())),
            tools: self
                .tools
                .unwrap_or_else(|| Arc::new(DefaultToolRuntime::default())),
            policy: self.policy,
            hooks: self.hooks,
        }
    }
}

impl ChatService {
    pub fn builder(provider: Arc<dyn ModelProvider>) -> ChatServiceBuilder {
        ChatServiceBuilder::new(provider)
    }

    pub fn new(provider: Arc<dyn ModelProvider>, store: Arc<dyn ConversationStore>) -> Self {
        Self::builder(provider).store(store).build()
    }

    pub fn policy(&self) -> ChatPolicy {
        self.policy
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .descriptors()
            .iter()
            .map(|descriptor| descriptor.definition())
            .collect()
    }

    pub async fn run_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnResult, ChatError> {
        if request.options.stream {
            return Err(ChatError::invalid_request(
                "use stream_turn for streaming requests",
            ));
        }

        let session_id = request.session.id.clone();
        let started = Instant::now();
        self.hooks.on_turn_started(&session_id);

        let outcome = self.drive_turn(request).await;
        match &outcome {
            Ok(result) => self.hooks.on_turn_finished(result, started.elapsed()),
            Err(error) => self
                .hooks
                .on_turn_failed(&session_id, error, started.elapsed()),
        }

        outcome
    }

    pub async fn stream_turn<'a>(
        &'a self,
        request: ChatTurnRequest,
    ) -> Result<ChatEventStream<'a>, ChatError> {
        let session_id = request.session.id.clone();
        let started = Instant::now();
        self.hooks.on_turn_started(&session_id);

        let mut machine = match self.begin_turn(request).await {
            Ok(machine) => machine,
            Err(error) => {
                self.hooks
                    .on_turn_failed(&session_id, &error, started.elapsed());
                return Err(error);
            }
        };

        let events: ChatEventStream<'a> = Box::pin(try_stream! {
            loop {
                let pending_calls = match &machine.state {
                    TurnState::AwaitingModel => None,
                    TurnState::AwaitingTool(calls) => Some(calls.clone()),
                    TurnState::Done(_) | TurnState::Aborted(_) => break,
                };

                match pending_calls {
                    None => {
                        let request = machine.model_request(true)?;
                        let mut provider_events =
                            self.provider.stream(request).await.map_err(ChatError::from)?;
                        let mut assembly = StreamAssembly::default();

                        while let Some(event) = provider_events.next().await {
                            match event.map_err(ChatError::from)? {
                                StreamEvent::TextDelta(delta) => {
                                    assembly.text.push_str(&delta);
                                    yield ChatEvent::TextDelta(delta);
                                }
                                StreamEvent::ToolCallDelta(call) => assembly.push_call(call),
                                StreamEvent::ResponseComplete(response) => {
                                    assembly.response = Some(response);
                                }
                            }
                        }

                        let response = assembly
                            .into_response(self.provider.id(), &machine.session.model);
                        machine.accept_response(response);
                    }
                    Some(calls) => {
                        for call in calls {
                            yield ChatEvent::ToolCallStarted(call.clone());
                            let result = self.execute_tool(call, machine.tool_context()).await?;
                            machine.record_execution(result.clone());
                            yield ChatEvent::ToolCallFinished(result);
                        }
                        machine.resume();
                    }
                }
            }

            let (result, transcript) = machine.finish();
            self.store
                .append_messages(&result.session_id, transcript)
                .await?;
            yield ChatEvent::TurnComplete(result);
        });

        let hooks = self.hooks.clone();
        let observed = events.inspect(move |item| match item {
            Ok(ChatEvent::TurnComplete(result)) => {
                hooks.on_turn_finished(result, started.elapsed());
            }
            Err(error) => hooks.on_turn_failed(&session_id, error, started.elapsed()),
            Ok(_) => {}
        });

        Ok(Box::pin(observed))
    }

    async fn drive_turn(&self, request: ChatTurnRequest) -> Result<ChatTurnResult, ChatError> {
        let mut machine = self.begin_turn(request).await?;

        loop {
            let pending_calls = match &machine.state {
                TurnState::AwaitingModel => None,
                TurnState::AwaitingTool(calls) => Some(calls.clone()),
                TurnState::Done(_) | TurnState::Aborted(_) => break,
            };

            match pending_calls {
                None => {
                    let response = self.provider.complete(machine.model_request(false)?).await?;
                    machine.accept_response(response);
                }
                Some(calls) => {
                    for call in calls {
                        let result = self.execute_tool(call, machine.tool_context()).await?;
                        machine.record_execution(result);
                    }
                    machine.resume();
                }
            }
        }

        let (result, transcript) = machine.finish();
        self.store
            .append_messages(&result.session_id, transcript)
            .await?;

        Ok(result)
    }

    async fn begin_turn(&self, request: ChatTurnRequest) -> Result<TurnMachine, ChatError> {
        if request.user_input.trim().is_empty() {
            return Err(ChatError::invalid_request("user_input must not be empty"));
        }

        let ChatTurnRequest {
            session,
            user_input,
            options,
            trace_id,
        } = request;

        let prior = self.store.load_messages(&session.id).await?;

        let mut context = Vec::with_capacity(prior.len() + 1);
        if let Some(system_prompt) = &session.system_prompt {
            context.push(Message::new(Role::System, system_prompt.clone()));
        }
        context.extend(prior);

        let mut machine = TurnMachine {
            session,
            options,
            trace_id,
            context,
            transcript: Vec::new(),
            tools: self.tool_definitions(),
            state: TurnState::AwaitingModel,
            max_steps: self.policy.max_steps.max(1),
            steps: 0,
            usage: TokenUsage::default(),
            stop_reason: StopReason::Other,
            executions: Vec::new(),
        };
        machine.push(Message::new(Role::User, user_input));

        Ok(machine)
    }

    /// Runs one call. Anything short of a transport fault or an expired
    /// registry request becomes a tool turn the model can read.
    async fn execute_tool(
        &self,
        call: ToolCall,
        context: ToolExecutionContext,
    ) -> Result<ToolExecutionResult, ChatError> {
        match self.tools.execute(call.clone(), context).await {
            Ok(result) => Ok(result),
            Err(error)
                if matches!(error.kind, ToolErrorKind::Transport | ToolErrorKind::Timeout) =>
            {
                Err(error.into())
            }
            Err(error) => Ok(ToolExecutionResult::from_call(
                &call,
                ToolOutput::failure(error.message),
            )),
        }
    }
}

struct TurnMachine {
    session: ChatSession,
    options: GenerationOptions,
    trace_id: Option<TraceId>,
    /// System prompt and persisted history.
    context: Vec<Message>,
    /// Messages produced by this turn, persisted once it ends.
    transcript: Vec<Message>,
    tools: Vec<ToolDefinition>,
    state: TurnState,
    max_steps: u32,
    steps: u32,
    usage: TokenUsage,
    stop_reason: StopReason,
    executions: Vec<ToolExecutionResult>,
}

impl TurnMachine {
    fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    fn model_request(&self, stream: bool) -> Result<ModelRequest, ChatError> {
        let mut messages = self.context.clone();
        messages.extend(self.transcript.iter().cloned());

        let mut options = self.options;
        options.stream = stream;

        let mut request = ModelRequest::new(self.session.model.clone(), messages)
            .with_options(options)
            .with_tools(self.tools.clone())
            .with_metadata("session_id", self.session.id.as_str());
        if let Some(trace_id) = &self.trace_id {
            request = request.with_metadata("trace_id", trace_id.as_str());
        }

        request.validate()?;
        Ok(request)
    }

    fn tool_context(&self) -> ToolExecutionContext {
        let context = ToolExecutionContext::new(self.session.id.clone());
        match &self.trace_id {
            Some(trace_id) => context.with_trace_id(trace_id.clone()),
            None => context,
        }
    }

    fn accept_response(&mut self, response: ModelResponse) {
        self.steps += 1;
        self.usage.accumulate(response.usage);
        self.stop_reason = response.stop_reason;

        let text = response.text();
        let calls = response.tool_calls();

        if calls.is_empty() {
            self.push(Message::new(Role::Assistant, text.clone()));
            self.state = TurnState::Done(text);
        } else if self.steps >= self.max_steps {
            let reason = step_budget_message(self.max_steps);
            tracing::warn!(
                phase = "chat",
                event = "step_budget_exhausted",
                session_id = %self.session.id,
                steps = self.steps,
                pending_calls = calls.len(),
                "turn aborted after exhausting its step budget"
            );
            self.push(Message::new(Role::Assistant, reason.clone()));
            self.state = TurnState::Aborted(reason);
        } else {
            self.push(Message::new(Role::Assistant, text).with_tool_calls(calls.clone()));
            self.state = TurnState::AwaitingTool(calls);
        }
    }

    fn record_execution(&mut self, result: ToolExecutionResult) {
        self.push(result.clone().into_message());
        self.executions.push(result);
    }

    fn resume(&mut self) {
        self.state = TurnState::AwaitingModel;
    }

    fn finish(self) -> (ChatTurnResult, Vec<Message>) {
        let (assistant_message, outcome) = match self.state {
            TurnState::Aborted(reason) => (reason, TurnOutcome::Aborted),
            TurnState::Done(answer) => (answer, TurnOutcome::Completed),
            TurnState::AwaitingModel | TurnState::AwaitingTool(_) => {
                (String::new(), TurnOutcome::Completed)
            }
        };

        let result = ChatTurnResult {
            session_id: self.session.id,
            assistant_message,
            outcome,
            tool_executions: self.executions,
            steps: self.steps,
            stop_reason: self.stop_reason,
            usage: self.usage,
        };

        (result, self.transcript)
    }
}

/// Rebuilds a response from deltas when a stream ends without `ResponseComplete`.
#[derive(Default)]
struct StreamAssembly {
    text: String,
    calls: Vec<ToolCall>,
    response: Option<ModelResponse>,
}

impl StreamAssembly {
    fn push_call(&mut self, call: ToolCall) {
        match self.calls.iter_mut().find(|known| known.id == call.id) {
            Some(known) => *known = call,
            None => self.calls.push(call),
        }
    }

    fn into_response(self, provider: mdprovider::ProviderId, model: &str) -> ModelResponse {
        if let Some(response) = self.response {
            return response;
        }

        let stop_reason = if self.calls.is_empty() {
            StopReason::Other
        } else {
            StopReason::ToolUse
        };

        let mut output = Vec::with_capacity(self.calls.len() + 1);
        if !self.text.is_empty() {
            output.push(OutputItem::Message(Message::new(Role::Assistant, self.text)));
        }
        output.extend(self.calls.into_iter().map(OutputItem::ToolCall));

        ModelResponse {
            provider,
            model: model.to_string(),
            output,
            stop_reason,
            usage: TokenUsage::default(),
        }
    }
}
