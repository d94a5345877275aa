//! Agent transport that drives the agent command-line tool over stdio.
//!
//! The child process is started in streaming JSON mode: every query is one JSON
//! line on stdin and the response is a sequence of newline-delimited JSON frames
//! on stdout, closed by a `result` frame.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{
    AgentError, Completion, ContentBlock, Message, MessageStream, RemoteAgent, StreamEvent,
};
use crate::cli::PermissionMode;
use crate::config::{CREDENTIAL_ENV, Credential, RuntimeConfig};

const STARTUP_GRACE: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to start the agent process.
#[derive(Debug, Clone)]
pub struct AgentLaunch {
    pub command: String,
    pub working_dir: PathBuf,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub max_buffer_size: usize,
    pub credential: Credential,
}

impl AgentLaunch {
    pub fn from_config(cfg: &RuntimeConfig, credential: Credential) -> Self {
        Self {
            command: cfg.agent_command.clone(),
            working_dir: cfg.docs_root.clone(),
            model: cfg.model.clone(),
            allowed_tools: cfg.allowed_tools.clone(),
            permission_mode: cfg.permission_mode,
            max_buffer_size: cfg.max_buffer_size,
            credential,
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--input-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--permission-mode".to_string(),
            self.permission_mode.as_flag().to_string(),
        ];
        if !self.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(self.allowed_tools.join(","));
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }
}

pub struct CliAgent {
    launch: AgentLaunch,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    in_flight: bool,
}

impl CliAgent {
    pub fn new(launch: AgentLaunch) -> Self {
        Self {
            launch,
            child: None,
            stdin: None,
            stdout: None,
            in_flight: false,
        }
    }

    async fn next_event(&mut self) -> Result<StreamEvent, AgentError> {
        let limit = self.launch.max_buffer_size;
        let reader = self.stdout.as_mut().ok_or(AgentError::NotConnected)?;

        loop {
            match read_frame(reader, limit).await? {
                Frame::Eof => return Err(AgentError::Closed),
                Frame::Oversized => {
                    warn!(limit, "discarded oversized agent frame");
                    return Err(AgentError::PayloadTooLarge { limit });
                }
                Frame::Line(line) => {
                    if let Some(event) = parse_wire_line(&line)? {
                        return Ok(event);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl RemoteAgent for CliAgent {
    fn name(&self) -> &str {
        &self.launch.command
    }

    async fn connect(&mut self) -> Result<(), AgentError> {
        if self.child.is_some() {
            return Ok(());
        }

        info!(
            command = %self.launch.command,
            cwd = %self.launch.working_dir.display(),
            permission_mode = self.launch.permission_mode.as_flag(),
            "Spawning agent process"
        );

        let mut cmd = Command::new(&self.launch.command);
        cmd.args(self.launch.args())
            .current_dir(&self.launch.working_dir)
            .env(CREDENTIAL_ENV, self.launch.credential.expose())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            command: self.launch.command.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Protocol("agent stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Protocol("agent stdout is not piped".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(line = %line, "agent stderr");
                }
            });
        }

        // Bad flags or a rejected credential make the process exit right away.
        tokio::time::sleep(STARTUP_GRACE).await;
        if let Some(status) = child.try_wait()? {
            return Err(AgentError::StartupExit {
                status: status.to_string(),
            });
        }

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        self.child = Some(child);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), AgentError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.in_flight = false;
        // Closing stdin is the agent's cue to finish.
        drop(self.stdin.take());
        self.stdout = None;

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                info!(status = %status, "Agent process exited");
            }
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => {
                warn!(
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "Agent process did not exit in time; killing it"
                );
                child.kill().await?;
            }
        }
        Ok(())
    }

    async fn query(&mut self, prompt: &str) -> Result<(), AgentError> {
        if self.in_flight {
            return Err(AgentError::QueryInFlight);
        }
        let stdin = self.stdin.as_mut().ok_or(AgentError::NotConnected)?;

        let frame = json!({
            "type": "user",
            "message": { "role": "user", "content": prompt },
            "parent_tool_use_id": null,
            "session_id": "default"
        });
        let mut line =
            serde_json::to_string(&frame).map_err(|e| AgentError::Protocol(e.to_string()))?;
        line.push('\n');

        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        self.in_flight = true;
        debug!(prompt_chars = prompt.chars().count(), "Query written to agent");
        Ok(())
    }

    fn receive_response(&mut self) -> MessageStream<'_> {
        Box::pin(futures::stream::unfold(self, |agent| async move {
            if !agent.in_flight {
                return None;
            }
            let item = agent.next_event().await;
            if matches!(
                item,
                Ok(StreamEvent::Completed(_))
                    | Err(AgentError::Closed)
                    | Err(AgentError::NotConnected)
                    | Err(AgentError::Io(_))
            ) {
                agent.in_flight = false;
            }
            Some((item, agent))
        }))
    }

    async fn discard_response(&mut self) -> Result<(), AgentError> {
        while self.in_flight {
            match self.next_event().await {
                Ok(StreamEvent::Completed(_)) => self.in_flight = false,
                Ok(StreamEvent::Message(_)) => {}
                Err(AgentError::PayloadTooLarge { .. }) | Err(AgentError::Protocol(_)) => {}
                Err(err) => {
                    self.in_flight = false;
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

/// One newline-delimited unit read from the agent's stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// The line was longer than the limit and has been skipped.
    Oversized,
    Eof,
}

/// Read one line, never buffering more than `limit` bytes of it.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut oversized = false;
    let mut eof = false;

    loop {
        let (consumed, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                eof = true;
                (0, true)
            } else {
                let newline = available.iter().position(|b| *b == b'\n');
                let content = &available[..newline.unwrap_or(available.len())];
                if !oversized {
                    if buf.len() + content.len() > limit {
                        oversized = true;
                        buf = Vec::new();
                    } else {
                        buf.extend_from_slice(content);
                    }
                }
                (
                    newline.map_or(available.len(), |pos| pos + 1),
                    newline.is_some(),
                )
            }
        };
        reader.consume(consumed);
        if done {
            break;
        }
    }

    if oversized {
        return Ok(Frame::Oversized);
    }
    if eof && buf.is_empty() {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Frame::Line(String::from_utf8_lossy(&buf).into_owned()))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    Assistant {
        message: WireMessage,
    },
    User {
        message: WireMessage,
    },
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        num_turns: Option<u64>,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Plain(String),
    Blocks(Vec<WireBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    ToolResult {
        #[serde(default)]
        content: Option<Value>,
    },
    #[serde(other)]
    Other,
}

fn flatten_tool_result(content: Option<Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

fn convert_blocks(blocks: Vec<WireBlock>) -> Vec<ContentBlock> {
    blocks
        .into_iter()
        .filter_map(|block| match block {
            WireBlock::Text { text } => Some(ContentBlock::Text { text }),
            WireBlock::ToolUse { name, input } => Some(ContentBlock::ToolInvocation { name, input }),
            WireBlock::ToolResult { content } => Some(ContentBlock::ToolResult {
                content: flatten_tool_result(content),
            }),
            WireBlock::Other => None,
        })
        .collect()
}

/// Map one stdout line to a stream event. Frames the console does not care
/// about (system notices, our own echoed prompt) map to `None`.
pub fn parse_wire_line(line: &str) -> Result<Option<StreamEvent>, AgentError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let frame = serde_json::from_str::<WireFrame>(trimmed)
        .map_err(|e| AgentError::Protocol(e.to_string()))?;

    let blocks = match frame {
        WireFrame::Assistant { message } => match message.content {
            Some(WireContent::Plain(text)) => vec![ContentBlock::Text { text }],
            Some(WireContent::Blocks(blocks)) => convert_blocks(blocks),
            None => Vec::new(),
        },
        WireFrame::User { message } => match message.content {
            Some(WireContent::Blocks(blocks)) => convert_blocks(blocks)
                .into_iter()
                .filter(|block| matches!(block, ContentBlock::ToolResult { .. }))
                .collect(),
            _ => Vec::new(),
        },
        WireFrame::Result {
            subtype,
            is_error,
            num_turns,
            duration_ms,
            total_cost_usd,
        } => {
            return Ok(Some(StreamEvent::Completed(Completion {
                is_error,
                subtype,
                num_turns,
                duration_ms,
                total_cost_usd,
            })));
        }
        WireFrame::Other => Vec::new(),
    };

    if blocks.is_empty() {
        Ok(None)
    } else {
        Ok(Some(StreamEvent::Message(Message::new(blocks))))
    }
}
