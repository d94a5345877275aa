use std::io;

use serde_json::{Map, Value};

use crate::console::Console;
use crate::theme::{BLUE, DIM, GREEN, RESET};

pub const PREVIEW_CHARS: usize = 200;
pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugState {
    pub enabled: bool,
    pub invocation_count: usize,
}

/// Owns the debug flag and the per-query tool-call counter.
///
/// The counter only moves while debug mode is on; `/debug` is the only thing
/// that flips the flag.
#[derive(Debug, Default)]
pub struct DebugTracer {
    state: DebugState,
}

impl DebugTracer {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: DebugState {
                enabled,
                invocation_count: 0,
            },
        }
    }

    pub fn state(&self) -> DebugState {
        self.state
    }

    pub fn enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn invocation_count(&self) -> usize {
        self.state.invocation_count
    }

    /// Returns the new value of the flag.
    pub fn toggle(&mut self) -> bool {
        self.state.enabled = !self.state.enabled;
        self.state.enabled
    }

    pub fn begin_query(&mut self) {
        self.state.invocation_count = 0;
    }

    pub fn on_tool_invocation(
        &mut self,
        name: &str,
        input: &Map<String, Value>,
        console: &mut Console,
    ) -> io::Result<()> {
        if !self.state.enabled {
            return Ok(());
        }
        self.state.invocation_count += 1;

        let input_json =
            serde_json::to_string(input).unwrap_or_else(|_| "<unserializable input>".to_string());
        console.panel(
            &format!("Tool call #{}", self.state.invocation_count),
            &[
                format!("Tool: {BLUE}{name}{RESET}"),
                format!("Input: {DIM}{input_json}{RESET}"),
            ],
            BLUE,
        )
    }

    pub fn on_tool_result(&mut self, content: &str, console: &mut Console) -> io::Result<()> {
        if !self.state.enabled {
            return Ok(());
        }
        // Results that arrive before any invocation are numbered as the first.
        console.panel_verbatim(
            &format!("Tool result #{}", self.state.invocation_count.max(1)),
            &[truncate_preview(content, PREVIEW_CHARS)],
            GREEN,
        )
    }

    /// One-line statistic after the answer, when there is something to report.
    pub fn summary_line(&self) -> Option<String> {
        if self.state.enabled && self.state.invocation_count > 0 {
            Some(format!(
                "This turn used {} tool call(s).",
                self.state.invocation_count
            ))
        } else {
            None
        }
    }
}

/// First `limit` characters of `content`, plus [`ELLIPSIS`] when cut.
pub fn truncate_preview(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &content[..cut]),
        None => content.to_string(),
    }
}
