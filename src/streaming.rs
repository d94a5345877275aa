use anyhow::{Context, Result};
use futures::StreamExt;
use serde_json::json;

use crate::agent::{Completion, ContentBlock, MessageStream, StreamEvent};
use crate::console::Console;
use crate::debug::DebugTracer;
use crate::markdown::render_markdown;
use crate::telemetry::TelemetrySink;
use crate::theme::{DIM, GREEN, YELLOW, visible_width};

pub const NO_TEXTUAL_RESPONSE: &str = "No textual response from the agent.";
pub const ANSWER_TITLE: &str = "Agent answer";

/// Outcome of one fully consumed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedAnswer {
    /// Every text block of the response, concatenated in arrival order.
    pub text: String,
    pub tool_invocations: usize,
    pub completion: Completion,
}

/// Drain `stream` and render the final answer.
///
/// Tool blocks go to the tracer as they arrive; the answer itself is rendered
/// only after the agent signals completion. A stream that ends without
/// [`StreamEvent::Completed`] is an error and nothing is rendered.
pub async fn render_response(
    mut stream: MessageStream<'_>,
    tracer: &mut DebugTracer,
    console: &mut Console,
    telemetry: &TelemetrySink,
) -> Result<RenderedAnswer> {
    let mut buffer = String::new();
    let mut completion = None;

    while let Some(item) = stream.next().await {
        let event = item.context("failed while receiving the agent response")?;
        match event {
            StreamEvent::Message(message) => {
                for block in &message.blocks {
                    match block {
                        ContentBlock::Text { text } => buffer.push_str(text),
                        ContentBlock::ToolInvocation { name, input } => {
                            tracing::info!(
                                tool = %name,
                                lifecycle = "requested",
                                "Tool call requested"
                            );
                            telemetry.emit("tool.requested", json!({ "tool": name }));
                            tracer.on_tool_invocation(name, input, console)?;
                        }
                        ContentBlock::ToolResult { content } => {
                            tracing::info!(
                                lifecycle = "result",
                                bytes = content.len(),
                                "Tool result received"
                            );
                            telemetry.emit("tool.result", json!({ "bytes": content.len() }));
                            tracer.on_tool_result(content, console)?;
                        }
                    }
                }
            }
            StreamEvent::Completed(done) => {
                completion = Some(done);
                break;
            }
        }
    }

    let Some(completion) = completion else {
        return Err(anyhow::anyhow!(
            "agent response ended without a completion signal"
        ));
    };

    render_answer(&buffer, console)?;

    if let Some(line) = tracer.summary_line() {
        console.notice(DIM, &line)?;
    }
    if tracer.enabled() {
        console.notice(DIM, &completion_stats(&completion))?;
    }
    if completion.is_error {
        console.notice(
            YELLOW,
            &format!(
                "Warning: the agent reported an error ({}).",
                completion.subtype.as_deref().unwrap_or("unknown")
            ),
        )?;
    }
    console.flush()?;

    Ok(RenderedAnswer {
        text: buffer,
        tool_invocations: tracer.invocation_count(),
        completion,
    })
}

fn render_answer(text: &str, console: &mut Console) -> Result<()> {
    if text.is_empty() {
        console.notice(YELLOW, NO_TEXTUAL_RESPONSE)?;
        return Ok(());
    }

    let inner = console.width().saturating_sub(4);
    // Whitespace-only answers are still answers and are shown as sent.
    let source = if text.trim().is_empty() {
        text
    } else {
        text.trim_end()
    };
    let rendered = match render_markdown(source, inner) {
        Ok(rendered) => rendered,
        Err(err) => {
            tracing::warn!(error = %err, "markdown rendering failed; showing plain text");
            text.to_string()
        }
    };

    let mut lines = rendered.lines().map(str::to_string).collect::<Vec<_>>();
    while lines.len() > 1 && lines.last().is_some_and(|line| visible_width(line) == 0) {
        lines.pop();
    }
    console.panel(ANSWER_TITLE, &lines, GREEN)?;
    Ok(())
}

fn completion_stats(completion: &Completion) -> String {
    let mut parts = Vec::new();
    if let Some(turns) = completion.num_turns {
        parts.push(format!("turns={turns}"));
    }
    if let Some(ms) = completion.duration_ms {
        parts.push(format!("duration_ms={ms}"));
    }
    if let Some(cost) = completion.total_cost_usd {
        parts.push(format!("cost_usd={cost:.4}"));
    }
    if parts.is_empty() {
        "Completion: no statistics reported".to_string()
    } else {
        format!("Completion: {}", parts.join(" "))
    }
}
