//! Explicit output handle. Every renderer writes through a [`Console`] so the
//! interactive shell targets stdout while tests capture into memory.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::theme;

pub struct Console {
    out: Box<dyn Write + Send>,
    width: usize,
}

impl Console {
    pub fn stdout() -> Self {
        let width = crossterm::terminal::size()
            .map(|(cols, _)| cols as usize)
            .unwrap_or(theme::DEFAULT_WIDTH);
        Self::new(Box::new(io::stdout()), width)
    }

    pub fn new(out: Box<dyn Write + Send>, width: usize) -> Self {
        Self {
            out,
            width: width.clamp(theme::MIN_WIDTH, theme::MAX_WIDTH),
        }
    }

    /// Console writing into a shared in-memory buffer.
    pub fn capturing(buffer: SharedBuffer) -> Self {
        Self::new(Box::new(buffer), theme::DEFAULT_WIDTH)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{text}")
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    pub fn raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    pub fn panel(&mut self, title: &str, body: &[String], color: &str) -> io::Result<()> {
        let rendered = theme::render_panel(title, body, color, self.width);
        self.out.write_all(rendered.as_bytes())
    }

    /// Panel whose body is shown character for character, hard-wrapped.
    pub fn panel_verbatim(&mut self, title: &str, body: &[String], color: &str) -> io::Result<()> {
        let rendered =
            theme::render_panel_with(title, body, color, self.width, theme::PanelWrap::Verbatim);
        self.out.write_all(rendered.as_bytes())
    }

    pub fn notice(&mut self, color: &str, text: &str) -> io::Result<()> {
        writeln!(self.out, "{color}{text}{}", theme::RESET)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn writer(&mut self) -> &mut (dyn Write + Send) {
        self.out.as_mut()
    }
}

/// Cloneable in-memory sink; every clone sees the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Captured output with ANSI escapes removed.
    pub fn plain(&self) -> String {
        theme::strip_ansi(&self.contents())
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
