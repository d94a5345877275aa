use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{CREDENTIAL_ENV, RuntimeConfig};
use crate::documents::{format_size, scan_documents};

/// Resolve `command` the way the process spawner would: as a path when it
/// contains a separator, otherwise through `PATH`.
pub fn find_on_path(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(command);
        if full.is_file() {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{command}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

pub fn run_doctor(cfg: &RuntimeConfig) -> Result<()> {
    println!(
        "Active profile: '{}' (config: {})",
        cfg.profile, cfg.config_path
    );

    let credential = if cfg.credential.is_some() {
        "set"
    } else {
        "missing"
    };
    println!("Credential check:");
    println!("- {CREDENTIAL_ENV}: {credential}");

    println!("Documents root: {}", cfg.docs_root.display());
    match scan_documents(&cfg.docs_root) {
        Ok(entries) => {
            let total = entries.iter().map(|entry| entry.size).sum::<u64>();
            let metadata_only = entries
                .iter()
                .filter(|entry| {
                    cfg.policy
                        .is_metadata_only(Path::new(&entry.name), entry.size)
                })
                .count();
            println!(
                "- files: {} ({}), metadata-only under current policy: {}",
                entries.len(),
                format_size(total),
                metadata_only
            );
        }
        Err(err) => {
            println!("- unavailable: {err:#}");
            println!("Tip: create the folder or pass --docs-root <dir>");
        }
    }

    match find_on_path(&cfg.agent_command) {
        Some(path) => println!(
            "Agent command: {} (found at {})",
            cfg.agent_command,
            path.display()
        ),
        None => {
            println!("Agent command: {} (not found)", cfg.agent_command);
            println!("Tip: install the agent CLI or pass --agent-command <path>");
        }
    }

    println!(
        "Agent launch: model={} permission_mode={} allowed_tools={} max_buffer_size={}",
        cfg.model_label(),
        cfg.permission_mode.as_flag(),
        cfg.allowed_tools.join(","),
        cfg.max_buffer_size
    );
    println!(
        "Prompt policy: max_inspect_kb={} preview_lines={} preview_bytes={} skip_extensions={}",
        cfg.policy.max_inspect_kb(),
        cfg.policy.preview_lines,
        cfg.policy.preview_bytes,
        cfg.policy.skip_extensions.join(",")
    );
    println!(
        "Telemetry: enabled={} path={}",
        cfg.telemetry_enabled, cfg.telemetry_path
    );

    Ok(())
}
