/// Console theme: ANSI palette, prompt, boxed panels and static help text.
use crate::config::RuntimeConfig;

// ---------------------------------------------------------------------------
// ANSI color helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const CYAN: &str = "\x1b[36m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";
pub const MAGENTA: &str = "\x1b[35m";
pub const BLUE: &str = "\x1b[34m";
pub const BOLD_CYAN: &str = "\x1b[1;36m";
pub const BOLD_GREEN: &str = "\x1b[1;32m";
pub const BOLD_YELLOW: &str = "\x1b[1;33m";

pub const DEFAULT_WIDTH: usize = 80;
pub const MIN_WIDTH: usize = 40;
pub const MAX_WIDTH: usize = 100;

// ---------------------------------------------------------------------------
// Commands and examples
// ---------------------------------------------------------------------------

pub const COMMAND_PALETTE: &[(&str, &str)] = &[
    ("/help", "show this help"),
    ("/list", "list every file under the documents root"),
    ("/status", "show agent and session status"),
    ("/debug", "toggle debug mode (trace tool calls and results)"),
    ("/clear", "clear the screen"),
    ("/quit, /exit, /q", "disconnect and exit"),
    ("anything else", "sent to the agent as a question"),
];

pub const EXAMPLE_QUESTIONS: &[(&str, &str)] = &[
    ("Document list", "Which documents are there? Give me a list"),
    ("Extraction", "Extract the company name and registered capital from the business license"),
    ("Analysis", "Analyse the legal representative's credit report"),
    ("Summary", "Summarise the main customers and suppliers"),
    ("Completeness", "Check whether the company file is complete and what is missing"),
    ("Financials", "Analyse the key indicators in the financial statements"),
];

pub const WELCOME_MARKDOWN: &str = "\
# KYC document console

Ask questions about the documents under the documents root. The agent can:
- list and search company documents
- extract key facts from licences, reports and statements
- answer questions about the company file

## Large file protection

To avoid pulling huge files through the agent, every question carries rules that:
- prefer filesystem commands (`ls`, `find`) over reading content
- skip files larger than the inspection limit
- preview only the first lines of text files
- report only metadata for PDF, image, audio and video files

## Asking good questions

**Recommended:**
- `List every document with its size`
- `Which Excel files are there?`
- `What is in the financial statements folder?`

**Avoid:**
- `Analyse the content of every document`
- `Read all PDF files`

## Quick commands

- `/list` lists documents locally (fast, no agent call)
- `/debug` toggles tracing of tool calls
- `/help` shows help
- `/quit` exits
";

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

pub fn build_prompt(debug_enabled: bool) -> String {
    if debug_enabled {
        format!("{BOLD_CYAN}kyc{RESET} {DIM}[{RESET}{MAGENTA}debug{RESET}{DIM}]{RESET}{BOLD_CYAN}>{RESET} ")
    } else {
        format!("{BOLD_CYAN}kyc>{RESET} ")
    }
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

/// Strip ANSI escape sequences for visible length calculation.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub fn visible_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}

/// Greedy word wrap measured on visible characters.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut visible_len = 0;

    for word in text.split_whitespace() {
        let wlen = visible_width(word);
        let test_len = if line.is_empty() {
            wlen
        } else {
            visible_len + 1 + wlen
        };

        if test_len <= width || line.is_empty() {
            if !line.is_empty() {
                line.push(' ');
                visible_len += 1;
            }
            line.push_str(word);
            visible_len += wlen;
        } else {
            lines.push(std::mem::take(&mut line));
            line.push_str(word);
            visible_len = wlen;
        }
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Cut `text` every `width` visible columns, keeping whitespace runs and ANSI
/// escapes intact. Tabs expand to the next multiple of four.
pub fn hard_wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut visible_len = 0;
    let mut in_escape = false;

    let mut push_visible = |c: char, line: &mut String, visible_len: &mut usize| {
        if *visible_len == width {
            lines.push(std::mem::take(line));
            *visible_len = 0;
        }
        line.push(c);
        *visible_len += 1;
    };

    for c in text.chars() {
        if c == '\x1b' {
            in_escape = true;
            line.push(c);
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
            line.push(c);
        } else if c == '\t' {
            let spaces = 4 - visible_len % 4;
            for _ in 0..spaces {
                push_visible(' ', &mut line, &mut visible_len);
            }
        } else {
            push_visible(c, &mut line, &mut visible_len);
        }
    }
    lines.push(line);
    lines
}

/// Whether a line's layout depends on its whitespace (aligned columns, code).
fn is_whitespace_significant(line: &str) -> bool {
    let plain = strip_ansi(line);
    plain.contains('\t') || plain.starts_with("  ") || plain.trim_end().contains("  ")
}

/// How [`render_panel_with`] fits lines wider than the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelWrap {
    /// Word-wrap prose; lines with aligned whitespace are hard-wrapped.
    Words,
    /// Always hard-wrap so the body is shown character for character.
    Verbatim,
}

/// Render a bordered panel `width` columns wide. Body lines wider than the
/// panel are word-wrapped.
pub fn render_panel(title: &str, body: &[String], color: &str, width: usize) -> String {
    render_panel_with(title, body, color, width, PanelWrap::Words)
}

pub fn render_panel_with(
    title: &str,
    body: &[String],
    color: &str,
    width: usize,
    wrap: PanelWrap,
) -> String {
    let width = width.max(MIN_WIDTH);
    let inner = width - 4;
    let title_len = visible_width(title);
    let fill = width.saturating_sub(title_len + 5);

    let mut out = format!(
        "{color}╭─ {RESET}{BOLD}{title}{RESET}{color} {}╮{RESET}\n",
        "─".repeat(fill)
    );

    for raw in body {
        for text_line in raw.split('\n') {
            let wrapped = if wrap == PanelWrap::Verbatim
                || text_line.contains('\t')
                || (visible_width(text_line) > inner && is_whitespace_significant(text_line))
            {
                hard_wrap(text_line, inner)
            } else if visible_width(text_line) > inner {
                wrap_words(text_line, inner)
            } else {
                vec![text_line.to_string()]
            };
            for l in wrapped {
                let pad = inner.saturating_sub(visible_width(&l));
                out.push_str(&format!(
                    "{color}│{RESET} {l}{RESET}{} {color}│{RESET}\n",
                    " ".repeat(pad)
                ));
            }
        }
    }

    out.push_str(&format!("{color}╰{}╯{RESET}\n", "─".repeat(width - 2)));
    out
}

fn two_column_table(title: &str, header: (&str, &str), rows: &[(&str, &str)]) -> Vec<String> {
    let first = rows
        .iter()
        .map(|(key, _)| key.chars().count())
        .chain(std::iter::once(header.0.chars().count()))
        .max()
        .unwrap_or(0);

    let mut lines = vec![
        format!("{BOLD}{title}{RESET}"),
        format!("  {BOLD_CYAN}{:<first$}{RESET}  {BOLD_CYAN}{}{RESET}", header.0, header.1),
    ];
    for (key, value) in rows {
        lines.push(format!("  {GREEN}{key:<first$}{RESET}  {value}"));
    }
    lines
}

/// `/help` body: command table followed by example questions.
pub fn help_lines() -> Vec<String> {
    let mut lines = two_column_table("Available commands", ("Command", "Description"), COMMAND_PALETTE);
    lines.push(String::new());
    lines.extend(two_column_table(
        "Example questions",
        ("Kind", "Example"),
        EXAMPLE_QUESTIONS,
    ));
    lines
}

pub fn connected_lines(cfg: &RuntimeConfig) -> Vec<String> {
    vec![
        format!("{GREEN}✓ Agent connected{RESET}"),
        String::new(),
        format!("Working directory: {}", cfg.docs_root.display()),
        format!("Available tools:   {}", cfg.allowed_tools.join(", ")),
        format!("Permission mode:   {}", cfg.permission_mode.as_flag()),
        format!("Model:             {}", cfg.model_label()),
    ]
}

pub fn startup_hint() -> String {
    format!("{BOLD_GREEN}Start asking! Type /help for help.{RESET}")
}
