//! Subprocess executor for command-backed agents.
//!
//! This module spawns an external reasoning command and speaks a small
//! NDJSON protocol with it over stdin/stdout:
//!
//! - vitalflow writes one request line: `{"type":"request","stage":..,"instruction":..,"context":..}`
//! - the command writes `thought`, `tool_call`, `text`, `ask`, `error`
//!   and `done` lines
//! - every `ask` line is answered with `{"type":"answer","answer":".."}`
//!
//! Anything the command writes to stderr is captured and reported when
//! it exits unsuccessfully, so a rate limit message printed by the command
//! reaches the retry classifier.

use crate::agents::base::{AgentError, AgentEvent, AgentStream, StageRequest, StageTools};
use serde_json::json;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Answer written back when a command asks outside the inquiry stage.
const ASK_UNAVAILABLE: &str = "Error: ask_patient is not available for this stage.";

/// CLI executor for command-backed agents.
pub struct CliExecutor;

impl CliExecutor {
    /// Build the request line sent to the command.
    pub fn request_line(request: &StageRequest) -> String {
        let line = json!({
            "type": "request",
            "subject_id": request.subject_id,
            "stage": request.stage,
            "instruction": request.instruction,
            "context": request.context,
        });
        format!("{}\n", line)
    }

    /// Execute a command for one stage and translate its NDJSON output
    /// into agent events.
    ///
    /// # Arguments
    ///
    /// * `command` - The command to execute
    /// * `args` - Command line arguments
    /// * `request` - The stage request, written to stdin as the first line
    /// * `tools` - Tools the command may call through `ask` lines
    ///
    /// # Returns
    ///
    /// A stream of agent events. Empty lines are skipped. Lines that are
    /// not valid JSON or not valid UTF-8 yield `AgentError::StreamParseError`
    /// and end the stream; the child is killed when the stream is dropped.
    pub fn execute(
        command: String,
        args: Vec<String>,
        request: &StageRequest,
        tools: StageTools,
    ) -> AgentStream {
        let request_line = Self::request_line(request);

        let stream = async_stream::stream! {
            let mut cmd = Command::new(&command);
            cmd.args(&args);
            cmd.stdin(Stdio::piped());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(AgentError::NotAvailable(format!(
                        "Failed to spawn command '{}': {}",
                        command, e
                    )));
                    return;
                }
            };

            let (mut stdin, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
                _ => {
                    yield Err(AgentError::ExecutionError(
                        "Failed to capture command stdio".to_string()
                    ));
                    return;
                }
            };

            // Drain stderr concurrently so a chatty command cannot block on a full pipe
            let stderr_task = tokio::spawn(async move {
                let mut buffer = String::new();
                let mut stderr = stderr;
                let _ = stderr.read_to_string(&mut buffer).await;
                buffer
            });

            if let Err(e) = write_line(&mut stdin, &request_line).await {
                yield Err(AgentError::ExecutionError(format!("Failed to send request: {}", e)));
                return;
            }

            let mut lines = BufReader::new(stdout).lines();
            let mut finished = false;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(AgentError::StreamParseError(format!(
                            "Failed to read output of '{}': {}",
                            command, e
                        )));
                        return;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let message = match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => value,
                    Err(e) => {
                        yield Err(AgentError::StreamParseError(format!(
                            "Failed to parse JSON: {} (line: {})",
                            e, line
                        )));
                        return;
                    }
                };

                let text = |key: &str| {
                    message
                        .get(key)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string()
                };

                match message.get("type").and_then(|t| t.as_str()) {
                    Some("thought") => yield Ok(AgentEvent::Thought(text("content"))),
                    Some("tool_call") => yield Ok(AgentEvent::ToolCall(text("content"))),
                    Some("text") => yield Ok(AgentEvent::MessageChunk(text("content"))),
                    Some("ask") => {
                        let question = text("question");
                        yield Ok(AgentEvent::ToolCall(format!("ask_patient: {}", question)));
                        let answer = match &tools.ask {
                            Some(ask) => ask.ask(&question).await,
                            None => ASK_UNAVAILABLE.to_string(),
                        };
                        let reply = format!("{}\n", json!({ "type": "answer", "answer": answer }));
                        if let Err(e) = write_line(&mut stdin, &reply).await {
                            yield Err(AgentError::ExecutionError(format!("Failed to send answer: {}", e)));
                            return;
                        }
                    }
                    Some("error") => {
                        yield Err(AgentError::ApiError(text("message")));
                        return;
                    }
                    Some("done") => {
                        finished = true;
                        break;
                    }
                    other => {
                        tracing::debug!("Ignoring agent message of type {:?}", other);
                    }
                }
            }

            drop(stdin);
            let status = child.wait().await;
            let stderr_output = stderr_task.await.unwrap_or_default();

            match status {
                Ok(status) if status.success() || finished => yield Ok(AgentEvent::Completed),
                Ok(status) => {
                    yield Err(AgentError::ApiError(format!(
                        "Command '{}' exited with {}: {}",
                        command,
                        status,
                        stderr_output.trim()
                    )));
                }
                Err(e) => {
                    yield Err(AgentError::ExecutionError(format!(
                        "Failed to wait for command '{}': {}",
                        command, e
                    )));
                }
            }
        };

        Box::pin(stream)
    }
}

async fn write_line(stdin: &mut tokio::process::ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}
