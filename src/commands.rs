use std::io::Write;

use anyhow::Result;
use crossterm::QueueableCommand;
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};

use crate::config::RuntimeConfig;
use crate::console::Console;
use crate::debug::DebugTracer;
use crate::documents::render_document_listing;
use crate::session::Session;
use crate::theme::{self, CYAN, DIM, GREEN, RED, YELLOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    ListDocuments,
    Status,
    ToggleDebug,
    Clear,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    Empty,
    Command(ChatCommand),
    Query(String),
}

/// Classify one input line. Commands match exactly and case-sensitively;
/// everything else that is not blank goes to the agent.
pub fn parse_input(raw: &str) -> ParsedInput {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParsedInput::Empty;
    }

    let command = match trimmed {
        "/help" => ChatCommand::Help,
        "/list" => ChatCommand::ListDocuments,
        "/status" => ChatCommand::Status,
        "/debug" => ChatCommand::ToggleDebug,
        "/clear" => ChatCommand::Clear,
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        _ => return ParsedInput::Query(trimmed.to_string()),
    };
    ParsedInput::Command(command)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommandAction {
    Continue,
    Exit,
}

/// Everything a local command may read or touch.
pub struct CommandContext<'a> {
    pub console: &'a mut Console,
    pub tracer: &'a mut DebugTracer,
    pub session: &'a Session,
    pub cfg: &'a RuntimeConfig,
}

pub fn dispatch_chat_command(
    command: ChatCommand,
    ctx: CommandContext<'_>,
) -> Result<ChatCommandAction> {
    let CommandContext {
        console,
        tracer,
        session,
        cfg,
    } = ctx;

    match command {
        ChatCommand::Help => {
            console.panel("Help", &theme::help_lines(), CYAN)?;
        }
        ChatCommand::ListDocuments => {
            console.notice(CYAN, "Scanning the documents root...")?;
            if let Err(err) = render_document_listing(&cfg.docs_root, console) {
                tracing::warn!(error = %err, "document listing failed");
                console.notice(RED, &format!("Failed to list documents: {err:#}"))?;
            }
        }
        ChatCommand::Status => {
            console.panel("Agent status", &status_lines(session, tracer, cfg), GREEN)?;
        }
        ChatCommand::ToggleDebug => {
            if tracer.toggle() {
                console.notice(CYAN, "Debug mode enabled")?;
                console.notice(
                    DIM,
                    "Tool calls and their results will be shown for each question.",
                )?;
            } else {
                console.notice(CYAN, "Debug mode disabled")?;
            }
        }
        ChatCommand::Clear => {
            let out = console.writer();
            out.queue(Clear(ClearType::All))?.queue(MoveTo(0, 0))?;
            out.flush()?;
        }
        ChatCommand::Quit => {
            console.notice(YELLOW, "Goodbye!")?;
            return Ok(ChatCommandAction::Exit);
        }
    }

    console.flush()?;
    Ok(ChatCommandAction::Continue)
}

pub fn status_lines(session: &Session, tracer: &DebugTracer, cfg: &RuntimeConfig) -> Vec<String> {
    let connected_since = session
        .connected_at()
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let debug = if tracer.enabled() { "on" } else { "off" };

    vec![
        format!("Documents root:    {}", cfg.docs_root.display()),
        format!("Session state:     {}", session.state()),
        format!("Agent command:     {}", session.agent_name()),
        format!("Model:             {}", cfg.model_label()),
        format!("Permission mode:   {}", cfg.permission_mode.as_flag()),
        format!("Allowed tools:     {}", cfg.allowed_tools.join(", ")),
        format!("Debug mode:        {debug}"),
        format!("Last tool calls:   {}", tracer.invocation_count()),
        format!("Completed queries: {}", session.queries_completed()),
        format!("Connected since:   {connected_since}"),
    ]
}
