use std::fmt::Write as _;
use std::path::Path;

pub const DEFAULT_MAX_INSPECT_BYTES: u64 = 500 * 1024;
pub const DEFAULT_PREVIEW_LINES: usize = 20;
pub const DEFAULT_PREVIEW_BYTES: usize = 500;
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "pdf", "m4a", "mp3", "wav", "mp4", "avi", "mov",
];

/// Extension families used to group the skip list in the wrapped prompt.
const EXTENSION_GROUPS: &[(&str, &[&str])] = &[
    ("Images", &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff", "svg"]),
    ("PDF", &["pdf"]),
    ("Audio", &["m4a", "mp3", "wav", "flac", "aac", "ogg"]),
    ("Video", &["mp4", "avi", "mov", "mkv", "webm"]),
];

/// Limits injected into every forwarded query so the agent never pulls large
/// binary documents through its tool channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePromptPolicy {
    pub max_inspect_bytes: u64,
    pub preview_lines: usize,
    pub preview_bytes: usize,
    pub skip_extensions: Vec<String>,
}

impl Default for SafePromptPolicy {
    fn default() -> Self {
        Self {
            max_inspect_bytes: DEFAULT_MAX_INSPECT_BYTES,
            preview_lines: DEFAULT_PREVIEW_LINES,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
            skip_extensions: DEFAULT_SKIP_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl SafePromptPolicy {
    pub fn max_inspect_kb(&self) -> u64 {
        self.max_inspect_bytes / 1024
    }

    pub fn is_skipped_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.skip_extensions
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(ext))
    }

    /// Whether the agent is told to report only metadata for this file.
    pub fn is_metadata_only(&self, path: &Path, size: u64) -> bool {
        size > self.max_inspect_bytes || self.is_skipped_extension(path)
    }

    /// Skip extensions grouped by family, keeping policy order within a group.
    pub fn grouped_skip_extensions(&self) -> Vec<(&'static str, Vec<String>)> {
        let mut grouped: Vec<(&'static str, Vec<String>)> = EXTENSION_GROUPS
            .iter()
            .map(|(label, _)| (*label, Vec::new()))
            .chain(std::iter::once(("Other", Vec::new())))
            .collect();

        for ext in &self.skip_extensions {
            let normalized = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if normalized.is_empty() {
                continue;
            }
            let slot = EXTENSION_GROUPS
                .iter()
                .position(|(_, members)| members.contains(&normalized.as_str()))
                .unwrap_or(EXTENSION_GROUPS.len());
            if !grouped[slot].1.contains(&normalized) {
                grouped[slot].1.push(normalized);
            }
        }

        grouped.retain(|(_, exts)| !exts.is_empty());
        grouped
    }
}

/// Build the prompt actually sent to the agent: the user's question followed by
/// numbered inspection rules derived from `policy`.
pub fn wrap_prompt(query: &str, policy: &SafePromptPolicy) -> String {
    let kb = policy.max_inspect_kb();
    let lines = policy.preview_lines;

    let mut out = String::new();
    let _ = writeln!(out, "User question: {query}");
    out.push('\n');
    out.push_str("IMPORTANT: follow these rules when inspecting files:\n\n");

    out.push_str("1. File size limit:\n");
    out.push_str("   - Check a file's size with `ls -lh` or `stat` before reading it\n");
    let _ = writeln!(
        out,
        "   - Skip files larger than {kb} KB ({} bytes)",
        policy.max_inspect_bytes
    );
    out.push_str("   - For skipped files, report only metadata: name, size and type\n\n");

    out.push_str("2. Reading limits:\n");
    let _ = writeln!(
        out,
        "   - Use `head -n {lines}` instead of `cat`; read at most the first {lines} lines"
    );
    out.push_str("   - Excel/CSV files: read only the first few rows\n");
    let _ = writeln!(
        out,
        "   - Text files: read at most the first {} bytes",
        policy.preview_bytes
    );
    out.push('\n');

    out.push_str("3. Recommended commands:\n");
    out.push_str("   - List files: `ls -lh` or `find . -type f`\n");
    out.push_str("   - Check sizes: `du -h` or `stat`\n");
    let _ = writeln!(out, "   - Preview text: `head -n {lines} <file>`");
    out.push_str("   - Search content: `grep -n \"<keyword>\" <file> | head -n 10`\n\n");

    out.push_str("4. File types that must be skipped (report metadata only):\n");
    let groups = policy.grouped_skip_extensions();
    if groups.is_empty() {
        out.push_str("   - none\n");
    }
    for (label, exts) in groups {
        let listed = exts
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "   - {label}: {listed}");
    }
    out.push('\n');

    out.push_str("5. Strategy:\n");
    out.push_str("   - Prefer filesystem commands (ls, find, du) to gather information\n");
    out.push_str("   - Confirm a file is within the size limit before reading its content\n");
    out.push_str("   - Work in small batches; never read many files at once\n\n");

    out.push_str("Answer the user's question following these rules.\n");
    out
}
