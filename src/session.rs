use std::fmt;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::agent::{MessageStream, RemoteAgent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Querying,
    Streaming,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Querying => "querying",
            SessionState::Streaming => "streaming",
        };
        f.write_str(label)
    }
}

/// The single connection to the remote agent for the life of the process.
pub struct Session {
    agent: Box<dyn RemoteAgent>,
    state: SessionState,
    disconnect_attempted: bool,
    connected_at: Option<DateTime<Local>>,
    queries_completed: usize,
}

impl Session {
    pub fn new(agent: Box<dyn RemoteAgent>) -> Self {
        Self {
            agent,
            state: SessionState::Disconnected,
            disconnect_attempted: false,
            connected_at: None,
            queries_completed: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connected_at(&self) -> Option<DateTime<Local>> {
        self.connected_at
    }

    pub fn queries_completed(&self) -> usize {
        self.queries_completed
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.state != SessionState::Disconnected {
            bail!("cannot connect: session is already {}", self.state);
        }

        self.state = SessionState::Connecting;
        info!(agent = self.agent.name(), "Connecting to remote agent");
        match self.agent.connect().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                self.connected_at = Some(Local::now());
                info!(agent = self.agent.name(), "Remote agent connected");
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Disconnected;
                Err(anyhow::Error::new(err).context("failed to connect to remote agent"))
            }
        }
    }

    /// Issue a query and hand back its response stream.
    ///
    /// Refused unless the session is idle and connected, so at most one query
    /// is ever in flight.
    pub async fn send(&mut self, prompt: &str) -> Result<MessageStream<'_>> {
        if self.state != SessionState::Connected {
            bail!("cannot send a query while the session is {}", self.state);
        }

        self.state = SessionState::Querying;
        self.agent
            .query(prompt)
            .await
            .context("failed to send the query to the agent")?;
        self.state = SessionState::Streaming;
        Ok(self.agent.receive_response())
    }

    /// Mark the current response as fully consumed.
    pub fn finish_turn(&mut self) {
        if self.state == SessionState::Streaming {
            self.state = SessionState::Connected;
            self.queries_completed += 1;
        }
    }

    /// Return to `Connected` after a failed turn, discarding whatever is left
    /// of the abandoned response.
    pub async fn recover(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            SessionState::Querying | SessionState::Streaming
        ) {
            return Ok(());
        }

        let drained = self.agent.discard_response().await;
        self.state = SessionState::Connected;
        drained.context("failed to discard the abandoned response")
    }

    /// Runs at most once. A session that never connected makes no remote call.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.disconnect_attempted {
            return Ok(());
        }
        self.disconnect_attempted = true;

        if self.state == SessionState::Disconnected {
            return Ok(());
        }

        info!(agent = self.agent.name(), "Disconnecting from remote agent");
        let result = self.agent.disconnect().await;
        self.state = SessionState::Disconnected;
        if let Err(err) = &result {
            warn!(error = %err, "Remote agent disconnect failed");
        }
        result.context("failed to disconnect from the remote agent")
    }
}
