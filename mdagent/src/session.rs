//! The interactive loop: one `User: ` prompt per line of input, one
//! `AI: ` reply per completed turn.

use std::io;

use futures_util::StreamExt;
use mdchat::{ChatError, ChatEvent, ChatService, ChatSession, ChatTurnRequest, ChatTurnResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const USER_PROMPT: &str = "User: ";
pub const REPLY_PREFIX: &str = "AI: ";

/// A chat service bound to one session.
pub struct Agent {
    chat: ChatService,
    session: ChatSession,
    temperature: f32,
    stream: bool,
}

impl Agent {
    pub fn new(chat: ChatService, session: ChatSession) -> Self {
        Self {
            chat,
            session,
            temperature: 0.0,
            stream: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    fn request(&self, input: &str) -> ChatTurnRequest {
        ChatTurnRequest::new(self.session.clone(), input).with_temperature(self.temperature)
    }

    pub async fn respond(&self, input: &str) -> Result<ChatTurnResult, ChatError> {
        self.chat.run_turn(self.request(input)).await
    }

    /// Runs one streamed turn, writing text to `output` as it arrives.
    async fn respond_streaming<W>(
        &self,
        input: &str,
        output: &mut W,
    ) -> Result<ChatTurnResult, TurnFailure>
    where
        W: AsyncWrite + Unpin,
    {
        let mut events = self
            .chat
            .stream_turn(self.request(input).enable_streaming())
            .await?;
        let mut printed = false;
        let mut completed = None;

        while let Some(event) = events.next().await {
            match event {
                Ok(ChatEvent::TextDelta(delta)) => {
                    if !printed {
                        output.write_all(REPLY_PREFIX.as_bytes()).await?;
                        printed = true;
                    }
                    output.write_all(delta.as_bytes()).await?;
                    output.flush().await?;
                }
                Ok(ChatEvent::ToolCallStarted(call)) => {
                    tracing::debug!(
                        phase = "session",
                        event = "tool_call_started",
                        tool_name = %call.name,
                        tool_call_id = %call.id,
                        "tool call started"
                    );
                }
                Ok(ChatEvent::ToolCallFinished(result)) => {
                    tracing::debug!(
                        phase = "session",
                        event = "tool_call_finished",
                        tool_name = %result.tool_name,
                        is_error = result.output.is_error,
                        "tool call finished"
                    );
                }
                Ok(ChatEvent::TurnComplete(result)) => completed = Some(result),
                Err(error) => {
                    if printed {
                        output.write_all(b"\n").await?;
                    }
                    return Err(error.into());
                }
            }
        }

        let Some(result) = completed else {
            if printed {
                output.write_all(b"\n").await?;
            }
            return Err(ChatError::provider("stream ended before the turn completed").into());
        };

        match (printed, result.is_aborted()) {
            (false, _) => {
                let line = format!("{REPLY_PREFIX}{}\n", result.assistant_message);
                output.write_all(line.as_bytes()).await?;
            }
            (true, true) => {
                let line = format!("\n{REPLY_PREFIX}{}\n", result.assistant_message);
                output.write_all(line.as_bytes()).await?;
            }
            (true, false) => output.write_all(b"\n").await?,
        }

        Ok(result)
    }
}

enum TurnFailure {
    Chat(ChatError),
    Io(io::Error),
}

impl From<ChatError> for TurnFailure {
    fn from(value: ChatError) -> Self {
        Self::Chat(value)
    }
}

impl From<io::Error> for TurnFailure {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: usize,
    pub failed_turns: usize,
}

pub fn is_exit_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "exit" | "quit")
}

/// Reads user lines from `input` until `exit`, `quit`, or end of input.
///
/// A failed turn is reported on `output` and the loop continues; only I/O
/// errors end the session early.
pub async fn run_session<R, W>(agent: &Agent, input: R, mut output: W) -> io::Result<SessionSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut summary = SessionSummary::default();

    loop {
        output.write_all(USER_PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if is_exit_command(message) {
            break;
        }

        summary.turns += 1;
        let outcome = if agent.stream {
            agent.respond_streaming(message, &mut output).await
        } else {
            match agent.respond(message).await {
                Ok(result) => {
                    let line = format!("{REPLY_PREFIX}{}\n", result.assistant_message);
                    output.write_all(line.as_bytes()).await?;
                    Ok(result)
                }
                Err(error) => Err(TurnFailure::Chat(error)),
            }
        };

        match outcome {
            Ok(result) => {
                tracing::info!(
                    phase = "session",
                    event = "turn_complete",
                    session_id = %result.session_id,
                    steps = result.steps,
                    tool_calls = result.tool_executions.len(),
                    aborted = result.is_aborted(),
                    "turn complete"
                );
            }
            Err(TurnFailure::Io(error)) => return Err(error),
            Err(TurnFailure::Chat(error)) => {
                summary.failed_turns += 1;
                tracing::error!(
                    phase = "session",
                    event = "turn_failed",
                    session_id = %agent.session.id,
                    kind = ?error.kind,
                    %error,
                    "turn failed"
                );
                let line = format!("Error: {}\n", error.message);
                output.write_all(line.as_bytes()).await?;
            }
        }
    }

    output.flush().await?;
    Ok(summary)
}
