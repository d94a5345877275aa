//! Local enumeration of the documents root, used by `/list` and `kyc-cli list`.

use std::path::Path;

use anyhow::{Result, bail};
use ignore::WalkBuilder;

use crate::console::Console;
use crate::theme::{BOLD, BOLD_CYAN, DIM, RESET, YELLOW};

pub const NO_DOCUMENTS: &str = "No documents found.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    /// 1-based position in discovery order.
    pub index: usize,
    pub name: String,
    pub size: u64,
    /// Directory relative to the documents root; `.` for the root itself.
    pub relative_dir: String,
}

/// Walk `root` recursively, skipping files whose name starts with `.`.
/// Nothing is filtered by ignore files; every regular file counts.
///
/// Within a directory, files come first in name order, then each
/// subdirectory (also in name order) is listed in full.
pub fn scan_documents(root: &Path) -> Result<Vec<DocumentEntry>> {
    if !root.is_dir() {
        bail!(
            "documents root '{}' does not exist or is not a directory",
            root.display()
        );
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_path(|a, b| {
            a.is_dir()
                .cmp(&b.is_dir())
                .then_with(|| a.file_name().cmp(&b.file_name()))
        });

    let mut entries = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable path while listing documents");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), error = %err, "cannot stat document");
                continue;
            }
        };

        let relative_dir = entry
            .path()
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(|dir| dir.to_string_lossy().replace('\\', "/"))
            .filter(|dir| !dir.is_empty())
            .unwrap_or_else(|| ".".to_string());

        entries.push(DocumentEntry {
            index: entries.len() + 1,
            name,
            size,
            relative_dir,
        });
    }

    Ok(entries)
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

pub fn listing_title(count: usize) -> String {
    format!("Documents ({count} files)")
}

/// Table rows (header first) for a non-empty listing.
pub fn format_document_table(entries: &[DocumentEntry]) -> Vec<String> {
    let sizes = entries
        .iter()
        .map(|entry| format_size(entry.size))
        .collect::<Vec<_>>();
    let index_w = entries.len().to_string().len().max(1);
    let name_w = entries
        .iter()
        .map(|entry| entry.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("File name".len());
    let size_w = sizes
        .iter()
        .map(|size| size.len())
        .max()
        .unwrap_or(0)
        .max("Size".len());

    let mut rows = vec![format!(
        "{BOLD_CYAN}{:>index_w$}  {:<name_w$}  {:>size_w$}  {}{RESET}",
        "#", "File name", "Size", "Directory"
    )];
    for (entry, size) in entries.iter().zip(&sizes) {
        rows.push(format!(
            "{DIM}{:>index_w$}{RESET}  {:<name_w$}  {:>size_w$}  {DIM}{}{RESET}",
            entry.index, entry.name, size, entry.relative_dir
        ));
    }
    rows
}

pub fn render_document_listing(root: &Path, console: &mut Console) -> Result<usize> {
    let entries = scan_documents(root)?;
    if entries.is_empty() {
        console.notice(YELLOW, NO_DOCUMENTS)?;
        return Ok(0);
    }

    console.line(&format!("{BOLD}{}{RESET}", listing_title(entries.len())))?;
    for row in format_document_table(&entries) {
        console.line(&row)?;
    }
    console.flush()?;
    Ok(entries.len())
}
