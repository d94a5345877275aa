/// Markdown to ANSI renderer built on winnow 0.7 + crossterm.
///
/// The answer is rendered only once the agent has signalled completion, so the
/// parser runs over the complete text one token at a time, writing styled
/// output into a byte sink.
use std::io::Write;

use crossterm::Command;
use crossterm::style::{self, Attribute, Stylize};
use winnow::ascii::{self, digit1, space0, space1, till_line_ending};
use winnow::combinator::{alt, preceded, repeat, terminated};
use winnow::error::{ErrMode, ModalResult, ParserError};
use winnow::prelude::*;
use winnow::stream::{AsChar, Stream};
use winnow::token::{any, one_of, take_until, take_while};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum MdError {
    Io(std::io::Error),
    Parse,
}

impl std::fmt::Display for MdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MdError::Io(e) => write!(f, "io: {e}"),
            MdError::Parse => write!(f, "parse error"),
        }
    }
}

impl std::error::Error for MdError {}

impl<I: Stream> ParserError<I> for MdError {
    type Inner = Self;

    fn from_input(_input: &I) -> Self {
        Self::Parse
    }

    fn into_inner(self) -> Result<Self::Inner, Self> {
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

pub struct ParseState {
    pub in_codeblock: bool,
    /// Delimiter that opened the current bold run, if any.
    pub bold: Option<char>,
    /// Delimiter that opened the current italic run, if any.
    pub italic: Option<char>,
    pub newline: bool,
    pub set_newline: bool,
    pub column: usize,
    pub width: Option<usize>,
}

impl ParseState {
    pub fn new(width: Option<usize>) -> Self {
        Self {
            in_codeblock: false,
            bold: None,
            italic: None,
            newline: true,
            set_newline: false,
            column: 0,
            width,
        }
    }
}

/// Render `text` to ANSI-styled output wrapped at `width` columns.
pub fn render_markdown(text: &str, width: usize) -> Result<String, MdError> {
    let mut out = Vec::<u8>::new();
    let mut state = ParseState::new(Some(width.max(1)));
    let mut input = text;

    while !input.is_empty() {
        match parse_markdown(&mut input, &mut out, &mut state) {
            Ok(()) => {
                state.newline = state.set_newline;
                state.set_newline = false;
            }
            Err(ErrMode::Cut(err)) | Err(ErrMode::Backtrack(err)) => return Err(err),
            Err(ErrMode::Incomplete(_)) => return Err(MdError::Parse),
        }
    }

    q(&mut out, style::ResetColor).map_err(flatten)?;
    q(&mut out, style::SetAttribute(Attribute::Reset)).map_err(flatten)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn flatten(err: ErrMode<MdError>) -> MdError {
    match err {
        ErrMode::Cut(e) | ErrMode::Backtrack(e) => e,
        ErrMode::Incomplete(_) => MdError::Parse,
    }
}

// ---------------------------------------------------------------------------
// Top-level parse step
// ---------------------------------------------------------------------------

/// Parse one markdown token from `i`, writing styled output to `o`.
pub fn parse_markdown(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    let start = i.checkpoint();

    macro_rules! try_parser {
        ($($parser:ident),*) => {
            $({
                i.reset(&start);
                match $parser(i, o, state) {
                    Err(ErrMode::Backtrack(_)) => {},
                    res => return res,
                }
            })*
        };
    }

    if state.in_codeblock {
        try_parser!(codeblock_end, codeblock_line_ending, codeblock_fallback);
    } else {
        try_parser!(
            codeblock_begin,
            horizontal_rule,
            heading,
            bulleted_item,
            numbered_item,
            blockquote,
            text,
            code,
            bold,
            italic,
            line_ending,
            fallback
        );
    }

    Err(ErrMode::Backtrack(MdError::Parse))
}

fn at_line_start(state: &ParseState) -> ModalResult<(), MdError> {
    if state.newline {
        Ok(())
    } else {
        Err(ErrMode::Backtrack(MdError::Parse))
    }
}

// ---------------------------------------------------------------------------
// Parsers: normal mode
// ---------------------------------------------------------------------------

fn is_text_char(t: char) -> bool {
    AsChar::is_alphanum(t) || "+,.!?\"'/:;=@%&()[]".contains(t) || !t.is_ascii()
}

/// A word, including `_` and `*` glued between word characters, so names
/// like `kyc_report_2023.xlsx` or `2*3` print verbatim.
fn text(i: &mut &str, o: &mut dyn Write, state: &mut ParseState) -> ModalResult<(), MdError> {
    let content = (
        take_while(1.., is_text_char),
        repeat::<_, _, (), _, _>(0.., (one_of(['_', '*']), take_while(1.., is_text_char))),
    )
        .take()
        .parse_next(i)?;
    advance(o, state, content.chars().count())?;
    q(o, style::Print(content))
}

fn heading(i: &mut &str, o: &mut dyn Write, state: &mut ParseState) -> ModalResult<(), MdError> {
    at_line_start(state)?;
    let level = terminated(take_while(1.., '#'), space1).parse_next(i)?;
    let print = format!("{level} ");
    advance(o, state, print.len())?;
    q(o, style::SetForegroundColor(style::Color::Magenta))?;
    q(o, style::SetAttribute(Attribute::Bold))?;
    q(o, style::Print(print))
}

fn bulleted_item(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    at_line_start(state)?;
    let (ws, _, _) = (space0, alt(("-", "*")), space1).parse_next(i)?;
    let print = format!("{ws}• ");
    advance(o, state, print.chars().count())?;
    q(o, style::Print(print))
}

fn numbered_item(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    at_line_start(state)?;
    let (ws, digits, _, _) = (space0, digit1, ".", space1).parse_next(i)?;
    let print = format!("{ws}{digits}. ");
    advance(o, state, print.len())?;
    q(o, style::Print(print))
}

fn horizontal_rule(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    at_line_start(state)?;
    (
        space0,
        alt((
            take_while(3.., '-'),
            take_while(3.., '*'),
            take_while(3.., '_'),
        )),
        space0,
        ascii::line_ending,
    )
        .parse_next(i)?;
    let rule_width = state.width.unwrap_or(40).min(40);
    state.column = 0;
    state.set_newline = true;
    q(o, style::Print(format!("{}\n", "━".repeat(rule_width).dark_grey())))
}

fn code(i: &mut &str, o: &mut dyn Write, state: &mut ParseState) -> ModalResult<(), MdError> {
    "`".parse_next(i)?;
    let content = terminated(take_until(0.., "`"), "`").parse_next(i)?;
    advance(o, state, content.chars().count())?;
    q(o, style::SetForegroundColor(style::Color::Green))?;
    q(o, style::Print(content))?;
    q(o, style::ResetColor)
}

fn bold(i: &mut &str, o: &mut dyn Write, state: &mut ParseState) -> ModalResult<(), MdError> {
    let marker = alt(("**", "__")).parse_next(i)?;
    let delim = if marker == "**" { '*' } else { '_' };
    state.bold = emphasis_toggle(*i, marker, delim, state.bold)?;
    if state.bold.is_some() {
        q(o, style::SetAttribute(Attribute::Bold))
    } else {
        q(o, style::SetAttribute(Attribute::NormalIntensity))
    }
}

fn italic(i: &mut &str, o: &mut dyn Write, state: &mut ParseState) -> ModalResult<(), MdError> {
    let delim = one_of(['*', '_']).parse_next(i)?;
    let marker = if delim == '*' { "*" } else { "_" };
    state.italic = emphasis_toggle(*i, marker, delim, state.italic)?;
    if state.italic.is_some() {
        q(o, style::SetAttribute(Attribute::Italic))
    } else {
        q(o, style::SetAttribute(Attribute::NoItalic))
    }
}

/// Decide whether a just-consumed emphasis marker opens or closes a run.
///
/// A run opens only when the marker is followed by a non-space character and
/// the same marker closes it later on the line; it closes only on the marker
/// that opened it, at a word boundary. Anything else backtracks and the
/// marker is printed literally.
fn emphasis_toggle(
    rest: &str,
    marker: &str,
    delim: char,
    open: Option<char>,
) -> ModalResult<Option<char>, MdError> {
    let next = rest.chars().next();
    match open {
        Some(opened) if opened == delim => {
            if next.is_some_and(char::is_alphanumeric) {
                Err(ErrMode::Backtrack(MdError::Parse))
            } else {
                Ok(None)
            }
        }
        Some(_) => Err(ErrMode::Backtrack(MdError::Parse)),
        None => {
            let line = rest.split('\n').next().unwrap_or_default();
            if next.is_none_or(char::is_whitespace)
                || next == Some(delim)
                || !line.contains(marker)
            {
                Err(ErrMode::Backtrack(MdError::Parse))
            } else {
                Ok(Some(delim))
            }
        }
    }
}

fn blockquote(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    at_line_start(state)?;
    (">", space0).parse_next(i)?;
    let print = "│ ";
    advance(o, state, 2)?;
    q(o, style::SetForegroundColor(style::Color::DarkGrey))?;
    q(o, style::Print(print))
}

fn line_ending(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    ascii::line_ending.parse_next(i)?;
    state.column = 0;
    state.set_newline = true;
    state.bold = None;
    state.italic = None;
    q(o, style::ResetColor)?;
    q(o, style::SetAttribute(Attribute::Reset))?;
    q(o, style::Print("\n"))
}

fn fallback(i: &mut &str, o: &mut dyn Write, state: &mut ParseState) -> ModalResult<(), MdError> {
    let c = any.parse_next(i)?;
    advance(o, state, 1)?;
    // A space that just triggered a wrap is dropped.
    if c != ' ' || state.column != 1 {
        q(o, style::Print(c))
    } else {
        state.column = 0;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsers: codeblock mode
// ---------------------------------------------------------------------------

fn codeblock_begin(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    at_line_start(state)?;
    let language = preceded("```", till_line_ending).parse_next(i)?;
    ascii::line_ending.parse_next(i)?;
    state.in_codeblock = true;
    state.set_newline = true;
    if !language.trim().is_empty() {
        q(o, style::Print(format!("{}\n", language.trim().bold())))?;
    }
    q(o, style::SetForegroundColor(style::Color::Green))
}

fn codeblock_end(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    "```".parse_next(i)?;
    state.in_codeblock = false;
    q(o, style::ResetColor)
}

fn codeblock_line_ending(
    i: &mut &str,
    o: &mut dyn Write,
    state: &mut ParseState,
) -> ModalResult<(), MdError> {
    ascii::line_ending.parse_next(i)?;
    state.set_newline = true;
    q(o, style::Print("\n"))
}

fn codeblock_fallback(
    i: &mut &str,
    o: &mut dyn Write,
    _state: &mut ParseState,
) -> ModalResult<(), MdError> {
    let c = any.parse_next(i)?;
    q(o, style::Print(c))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Track column position and emit a newline if we'd overflow the width.
fn advance(o: &mut dyn Write, state: &mut ParseState, width: usize) -> ModalResult<(), MdError> {
    if let Some(tw) = state.width {
        if state.column > 0 && state.column + width > tw {
            state.column = width;
            return q(o, style::Print('\n'));
        }
    }
    state.column += width;
    Ok(())
}

fn q(o: &mut dyn Write, cmd: impl Command) -> ModalResult<(), MdError> {
    use crossterm::QueueableCommand;
    o.queue(cmd).map_err(|e| ErrMode::Cut(MdError::Io(e)))?;
    Ok(())
}
