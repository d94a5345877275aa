use crate::config::CREDENTIAL_ENV;

/// Signatures that identify a response frame too large for the transport buffer.
pub const OVERSIZED_SIGNATURES: &[&str] = &[
    "exceeded maximum buffer size",
    "json message exceeded",
    "payload too large",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MissingCredential,
    ConnectFailure,
    OversizedPayload,
    GenericQueryFailure,
    InterruptedInput,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::MissingCredential => "CREDENTIAL",
            ErrorCategory::ConnectFailure => "CONNECT",
            ErrorCategory::OversizedPayload => "OVERSIZED",
            ErrorCategory::GenericQueryFailure => "QUERY",
            ErrorCategory::InterruptedInput => "INTERRUPTED",
        }
    }

    /// Fatal categories end the process before the interactive loop starts.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorCategory::MissingCredential | ErrorCategory::ConnectFailure
        )
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::MissingCredential => {
                "Export ANTHROPIC_API_KEY (https://console.anthropic.com/settings/keys) and restart."
            }
            ErrorCategory::ConnectFailure => {
                "Check that the agent command is installed and on PATH (try `kyc-cli doctor`), then retry with RUST_LOG=debug."
            }
            ErrorCategory::OversizedPayload => {
                "The agent response was too large; it probably read an oversized file.\n\
                 1. Use /list for a fast, safe document listing\n\
                 2. Ask again and say you only need file names, sizes or a summary\n\
                 3. Avoid broad questions such as 'analyse every document'\n\
                 Example: 'List every Excel file with its name and size'"
            }
            ErrorCategory::GenericQueryFailure => {
                "Make the question clear and specific; the agent will try again on the next turn."
            }
            ErrorCategory::InterruptedInput => "Press Ctrl+C again to exit, or type /quit.",
        }
    }
}

fn chain_text(err: &anyhow::Error) -> String {
    format!("{err:#}").to_ascii_lowercase()
}

pub fn is_oversized_message(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    OVERSIZED_SIGNATURES
        .iter()
        .any(|signature| lowered.contains(signature))
}

/// Classification used at the per-query boundary. Every result is recoverable.
pub fn categorize_query_error(err: &anyhow::Error) -> ErrorCategory {
    if is_oversized_message(&chain_text(err)) {
        ErrorCategory::OversizedPayload
    } else {
        ErrorCategory::GenericQueryFailure
    }
}

/// Classification used for errors that reach the top level of the process.
pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = chain_text(err);

    if msg.contains(&CREDENTIAL_ENV.to_ascii_lowercase()) {
        return ErrorCategory::MissingCredential;
    }

    if msg.contains("failed to connect")
        || msg.contains("failed to spawn")
        || msg.contains("exited during startup")
    {
        return ErrorCategory::ConnectFailure;
    }

    if msg.contains("interrupted") {
        return ErrorCategory::InterruptedInput;
    }

    categorize_query_error(err)
}

pub fn format_cli_error(err: &anyhow::Error, show_sensitive_config: bool) -> String {
    let category = categorize_error(err);
    let rendered_error = render_error_message(err, show_sensitive_config);
    format!(
        "[{}] {}\nHint: {}",
        category.code(),
        rendered_error,
        category.hint()
    )
}

pub fn render_error_message(err: &anyhow::Error, show_sensitive_config: bool) -> String {
    let text = format!("{err:#}");
    if show_sensitive_config {
        text
    } else {
        redact_sensitive_text(&text)
    }
}

/// Replace anything that looks like an API key with a redaction marker.
pub fn redact_sensitive_text(text: &str) -> String {
    text.split_inclusive(char::is_whitespace)
        .map(|token| {
            let word = token.trim_end();
            if looks_like_api_key(word) {
                format!("[REDACTED]{}", &token[word.len()..])
            } else {
                token.to_string()
            }
        })
        .collect()
}

fn looks_like_api_key(word: &str) -> bool {
    let word = word.trim_matches(|c: char| matches!(c, '"' | '\'' | ',' | ';' | '(' | ')'));
    word.starts_with("sk-") && word.len() >= 20
}
