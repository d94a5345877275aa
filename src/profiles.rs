use anyhow::Result;

use crate::config::{ProfilesFile, RuntimeConfig};

pub fn profile_names(profiles: &ProfilesFile) -> Vec<String> {
    let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
    if !names.iter().any(|name| name == "default") {
        names.push("default".to_string());
    }
    names.sort();
    names
}

pub fn run_profiles_list(profiles: &ProfilesFile, cfg: &RuntimeConfig) -> Result<()> {
    println!("Configured profiles (active='{}'):", cfg.profile);
    for name in profile_names(profiles) {
        let marker = if name == cfg.profile { "*" } else { " " };
        let source = if profiles.profiles.contains_key(&name) {
            "configured"
        } else {
            "implicit"
        };
        println!("{marker} {name} ({source})");
    }

    Ok(())
}

pub fn run_profiles_show(cfg: &RuntimeConfig) -> Result<()> {
    println!("Active profile: {}", cfg.profile);
    println!("Config path: {}", cfg.config_path);
    println!("Documents root: {}", cfg.docs_root.display());
    println!("Agent command: {}", cfg.agent_command);
    println!("Model: {}", cfg.model_label());
    println!("Permission mode: {}", cfg.permission_mode.as_flag());
    println!("Allowed tools: {}", cfg.allowed_tools.join(", "));
    println!("Max buffer size: {} bytes", cfg.max_buffer_size);
    println!(
        "Credential: {}",
        match (&cfg.credential, cfg.show_sensitive_config) {
            (None, _) => "<missing>".to_string(),
            (Some(credential), true) => credential.expose().to_string(),
            (Some(_), false) => "<set, redacted>".to_string(),
        }
    );
    println!(
        "Policy max inspect size: {} KB",
        cfg.policy.max_inspect_kb()
    );
    println!("Policy preview lines: {}", cfg.policy.preview_lines);
    println!("Policy preview bytes: {}", cfg.policy.preview_bytes);
    println!(
        "Policy skip extensions: {}",
        if cfg.policy.skip_extensions.is_empty() {
            "<none>".to_string()
        } else {
            cfg.policy.skip_extensions.join(", ")
        }
    );
    println!("Telemetry enabled: {}", cfg.telemetry_enabled);
    println!("Telemetry path: {}", cfg.telemetry_path);
    Ok(())
}
