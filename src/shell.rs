use std::time::Instant;

use anyhow::Result;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agent::subprocess::{AgentLaunch, CliAgent};
use crate::commands::{
    ChatCommandAction, CommandContext, ParsedInput, dispatch_chat_command, parse_input,
};
use crate::config::RuntimeConfig;
use crate::console::Console;
use crate::debug::DebugTracer;
use crate::error::{categorize_query_error, render_error_message};
use crate::input::{InputEvent, LineReader, RustylineReader};
use crate::markdown::render_markdown;
use crate::policy::wrap_prompt;
use crate::session::Session;
use crate::streaming::{RenderedAnswer, render_response};
use crate::telemetry::TelemetrySink;
use crate::theme::{self, DIM, GREEN, RED, YELLOW};

pub const CONFIRM_PROMPT: &str = "Confirm exit? [y/n] (n) ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryOutcome {
    Continue,
    Interrupted,
}

enum TurnOutcome {
    Finished(Result<RenderedAnswer>),
    Interrupted,
}

/// Interactive loop around one connected [`Session`].
pub struct ChatShell {
    cfg: RuntimeConfig,
    session: Session,
    console: Console,
    tracer: DebugTracer,
    input: Box<dyn LineReader>,
    interrupts: mpsc::UnboundedReceiver<()>,
    telemetry: TelemetrySink,
}

impl ChatShell {
    pub fn new(
        cfg: RuntimeConfig,
        session: Session,
        console: Console,
        input: Box<dyn LineReader>,
        interrupts: mpsc::UnboundedReceiver<()>,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            cfg,
            session,
            console,
            tracer: DebugTracer::default(),
            input,
            interrupts,
            telemetry,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tracer(&self) -> &DebugTracer {
        &self.tracer
    }

    /// Drive the loop until the user leaves, then disconnect. Disconnect runs
    /// on every exit path, including loop errors.
    pub async fn run(&mut self) -> Result<()> {
        let outcome = self.drive().await;
        if let Err(err) = &outcome {
            warn!(error = %err, "Chat loop ended with an error");
        }

        let _ = self.console.notice(DIM, "Disconnecting...");
        let closed = self.session.disconnect().await;
        self.telemetry.emit(
            "session.closed",
            json!({
                "queries_completed": self.session.queries_completed(),
                "clean": closed.is_ok() && outcome.is_ok(),
            }),
        );

        match &closed {
            Ok(()) => {
                let _ = self.console.notice(GREEN, "Disconnected.");
            }
            Err(err) => {
                let _ = self.console.notice(
                    RED,
                    &format!(
                        "Disconnect failed: {}",
                        render_error_message(err, self.cfg.show_sensitive_config)
                    ),
                );
            }
        }
        let _ = self.console.flush();

        outcome.and(closed)
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            let prompt = theme::build_prompt(self.tracer.enabled());
            match self.input.read_line(&prompt)? {
                InputEvent::Eof => {
                    self.console.notice(YELLOW, "Goodbye!")?;
                    return Ok(());
                }
                InputEvent::Interrupted => {
                    if self.confirm_exit()? {
                        return Ok(());
                    }
                }
                InputEvent::Line(line) => match parse_input(&line) {
                    ParsedInput::Empty => {}
                    ParsedInput::Command(command) => {
                        let ctx = CommandContext {
                            console: &mut self.console,
                            tracer: &mut self.tracer,
                            session: &self.session,
                            cfg: &self.cfg,
                        };
                        if dispatch_chat_command(command, ctx)? == ChatCommandAction::Exit {
                            return Ok(());
                        }
                    }
                    ParsedInput::Query(query) => {
                        if self.run_query(&query).await? == QueryOutcome::Interrupted {
                            return Ok(());
                        }
                    }
                },
            }
        }
    }

    /// One confirmation per interrupt. A second interrupt exits outright.
    fn confirm_exit(&mut self) -> Result<bool> {
        self.console
            .notice(YELLOW, "Press Ctrl+C again to exit, or type /quit.")?;
        self.console.flush()?;

        loop {
            match self.input.read_line(CONFIRM_PROMPT)? {
                InputEvent::Interrupted | InputEvent::Eof => {
                    self.console.notice(YELLOW, "Goodbye!")?;
                    return Ok(true);
                }
                InputEvent::Line(answer) => match answer.trim().to_ascii_lowercase().as_str() {
                    "y" | "yes" => {
                        self.console.notice(YELLOW, "Goodbye!")?;
                        return Ok(true);
                    }
                    "" | "n" | "no" => return Ok(false),
                    _ => self.console.notice(YELLOW, "Please answer y or n.")?,
                },
            }
        }
    }

    async fn run_query(&mut self, query: &str) -> Result<QueryOutcome> {
        // Interrupts that arrived while nothing was streaming are stale.
        while self.interrupts.try_recv().is_ok() {}

        self.tracer.begin_query();
        let prompt = wrap_prompt(query, &self.cfg.policy);
        info!(
            query_chars = query.chars().count(),
            prompt_chars = prompt.chars().count(),
            "Dispatching query"
        );
        self.telemetry.emit(
            "query.started",
            json!({ "query_chars": query.chars().count() }),
        );

        self.console.notice(DIM, "Processing your question...")?;
        self.console.flush()?;
        let started = Instant::now();

        let outcome = {
            let Self {
                session,
                console,
                tracer,
                interrupts,
                telemetry,
                ..
            } = self;
            let turn = async {
                let stream = session.send(&prompt).await?;
                render_response(stream, tracer, console, telemetry).await
            };
            tokio::select! {
                result = turn => TurnOutcome::Finished(result),
                Some(()) = interrupts.recv() => TurnOutcome::Interrupted,
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            TurnOutcome::Interrupted => {
                warn!(elapsed_ms, "Interrupted while streaming; abandoning the response");
                self.telemetry.emit(
                    "query.failed",
                    json!({ "category": "INTERRUPTED", "elapsed_ms": elapsed_ms }),
                );
                self.console.blank()?;
                self.console
                    .notice(YELLOW, "Interrupted. Closing the session...")?;
                Ok(QueryOutcome::Interrupted)
            }
            TurnOutcome::Finished(Ok(answer)) => {
                self.session.finish_turn();
                info!(
                    elapsed_ms,
                    tool_calls = answer.tool_invocations,
                    answer_chars = answer.text.chars().count(),
                    "Query completed"
                );
                self.telemetry.emit(
                    "query.completed",
                    json!({
                        "elapsed_ms": elapsed_ms,
                        "answer_chars": answer.text.chars().count(),
                        "tool_invocations": answer.tool_invocations,
                        "is_error": answer.completion.is_error,
                    }),
                );
                Ok(QueryOutcome::Continue)
            }
            TurnOutcome::Finished(Err(err)) => {
                let category = categorize_query_error(&err);
                warn!(category = category.code(), error = %err, "Query failed");
                self.telemetry.emit(
                    "query.failed",
                    json!({ "category": category.code(), "elapsed_ms": elapsed_ms }),
                );

                if let Err(recover_err) = self.session.recover().await {
                    warn!(error = %recover_err, "Could not resynchronise with the agent");
                }

                let message = render_error_message(&err, self.cfg.show_sensitive_config);
                self.console
                    .notice(RED, &format!("Query failed: {message}"))?;
                for line in category.hint().lines() {
                    self.console.notice(YELLOW, line.trim())?;
                }
                self.console.flush()?;
                Ok(QueryOutcome::Continue)
            }
        }
    }
}

fn render_welcome(console: &mut Console) -> Result<()> {
    match render_markdown(theme::WELCOME_MARKDOWN, console.width()) {
        Ok(rendered) => console.raw(rendered.as_bytes())?,
        Err(err) => {
            warn!(error = %err, "markdown rendering failed for the welcome text");
            console.line(theme::WELCOME_MARKDOWN)?;
        }
    }
    console.blank()?;
    Ok(())
}

async fn forward_interrupts(tx: mpsc::UnboundedSender<()>) {
    loop {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl+C; mid-stream interrupts are disabled");
            return;
        }
        if tx.send(()).is_err() {
            return;
        }
    }
}

/// Entry point of the `chat` command.
///
/// The credential is checked before anything reaches stdout; a failed connect
/// is returned to the caller and ends the process.
pub async fn run_chat(cfg: &RuntimeConfig, telemetry: TelemetrySink) -> Result<()> {
    let credential = cfg.require_credential()?;
    let input = RustylineReader::new()?;
    let mut console = Console::stdout();
    let mut session = Session::new(Box::new(CliAgent::new(AgentLaunch::from_config(
        cfg, credential,
    ))));

    render_welcome(&mut console)?;
    session.connect().await?;

    console.panel("Agent status", &theme::connected_lines(cfg), GREEN)?;
    console.blank()?;
    console.line(&theme::startup_hint())?;
    console.blank()?;
    console.flush()?;

    telemetry.emit(
        "chat.started",
        json!({
            "docs_root": cfg.docs_root.display().to_string(),
            "agent_command": cfg.agent_command,
            "permission_mode": cfg.permission_mode.as_flag(),
            "allowed_tools": cfg.allowed_tools,
        }),
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(forward_interrupts(tx));

    let mut shell = ChatShell::new(
        cfg.clone(),
        session,
        console,
        Box::new(input),
        rx,
        telemetry,
    );
    let result = shell.run().await;
    forwarder.abort();
    result
}
