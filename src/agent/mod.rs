//! Contract for the remote document-analysis agent.
//!
//! The console only ever talks to the agent through [`RemoteAgent`]: connect
//! once, issue one query at a time, drain the streamed response, disconnect.
//! [`subprocess::CliAgent`] is the production transport.

pub mod subprocess;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use serde_json::{Map, Value};

/// One typed unit inside a streamed message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolInvocation { name: String, input: Map<String, Value> },
    ToolResult { content: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    pub fn new(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }
}

/// Summary the agent reports when it has finished answering a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub is_error: bool,
    pub subtype: Option<String>,
    pub num_turns: Option<u64>,
    pub duration_ms: Option<u64>,
    pub total_cost_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(Message),
    /// Explicit end of the response for the current query.
    Completed(Completion),
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to spawn agent command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("agent process exited during startup ({status})")]
    StartupExit { status: String },
    #[error("agent is not connected")]
    NotConnected,
    #[error("a query is already in flight; drain its response first")]
    QueryInFlight,
    #[error("JSON message exceeded maximum buffer size of {limit} bytes (payload too large)")]
    PayloadTooLarge { limit: usize },
    #[error("agent transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed agent frame: {0}")]
    Protocol(String),
    #[error("agent closed the response stream before signalling completion")]
    Closed,
}

pub type MessageStream<'a> =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, AgentError>> + Send + 'a>>;

#[async_trait]
pub trait RemoteAgent: Send {
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), AgentError>;

    /// Safe to call more than once; later calls are no-ops.
    async fn disconnect(&mut self) -> Result<(), AgentError>;

    /// Starts a query. The answer arrives through [`RemoteAgent::receive_response`].
    async fn query(&mut self, prompt: &str) -> Result<(), AgentError>;

    /// Response for the last query, ending after [`StreamEvent::Completed`].
    fn receive_response(&mut self) -> MessageStream<'_>;

    /// Throw away whatever is left of an abandoned response so the next
    /// query starts on a clean stream.
    async fn discard_response(&mut self) -> Result<(), AgentError>;
}
