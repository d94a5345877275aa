use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;
use crate::policy::{
    DEFAULT_PREVIEW_BYTES, DEFAULT_PREVIEW_LINES, DEFAULT_SKIP_EXTENSIONS, SafePromptPolicy,
};

/// Environment variable holding the agent service credential.
pub const CREDENTIAL_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_DOCS_ROOT: &str = "kyc_documents";
pub const DEFAULT_AGENT_COMMAND: &str = "claude";
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;
pub const DEFAULT_ALLOWED_TOOLS: &[&str] = &["Read", "Write", "Bash", "Grep", "Glob", "Search"];

/// Service credential read once at startup. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub docs_root: PathBuf,
    pub agent_command: String,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub max_buffer_size: usize,
    pub credential: Option<Credential>,
    pub policy: SafePromptPolicy,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
    pub show_sensitive_config: bool,
}

impl RuntimeConfig {
    /// The credential is required before anything interactive is shown.
    pub fn require_credential(&self) -> Result<Credential> {
        self.credential.clone().ok_or_else(|| {
            anyhow::anyhow!(
                "{CREDENTIAL_ENV} not found in environment. Export it before starting the console \
                 (see https://console.anthropic.com/settings/keys)"
            )
        })
    }

    pub fn model_label(&self) -> &str {
        self.model.as_deref().unwrap_or("<agent-default>")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub docs_root: Option<String>,
    pub agent_command: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    pub permission_mode: Option<PermissionMode>,
    pub max_buffer_size: Option<usize>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
    pub policy: Option<PolicyConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub max_inspect_kb: Option<u64>,
    pub preview_lines: Option<usize>,
    pub preview_bytes: Option<usize>,
    pub skip_extensions: Option<Vec<String>>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check field names and permission_mode values.",
            path.display()
        )
    })
}

pub fn read_credential() -> Option<Credential> {
    std::env::var(CREDENTIAL_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(Credential::new)
}

fn merge_unique_names(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::<String>::new();
    let mut merged = Vec::<String>::new();

    for name in first.iter().chain(second.iter()) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            merged.push(trimmed.to_string());
        }
    }

    merged
}

fn resolve_policy(profile: Option<&PolicyConfig>) -> SafePromptPolicy {
    let mut policy = SafePromptPolicy::default();
    let Some(overrides) = profile else {
        return policy;
    };

    if let Some(kb) = overrides.max_inspect_kb {
        policy.max_inspect_bytes = kb.max(1) * 1024;
    }
    policy.preview_lines = overrides
        .preview_lines
        .unwrap_or(DEFAULT_PREVIEW_LINES)
        .max(1);
    policy.preview_bytes = overrides
        .preview_bytes
        .unwrap_or(DEFAULT_PREVIEW_BYTES)
        .max(1);
    if let Some(exts) = overrides.skip_extensions.as_ref() {
        policy.skip_extensions = merge_unique_names(exts, &[]);
    } else {
        policy.skip_extensions = DEFAULT_SKIP_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect();
    }
    policy
}

fn absolutize(path: &str) -> Result<PathBuf> {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}

/// Resolve CLI/env values over the selected profile over built-in defaults.
/// `credential` is passed in so the environment is consulted exactly once.
pub fn resolve_runtime_config(
    cli: &Cli,
    profiles: &ProfilesFile,
    credential: Option<Credential>,
) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let docs_root = cli
        .docs_root
        .clone()
        .or(profile.docs_root.clone())
        .unwrap_or_else(|| DEFAULT_DOCS_ROOT.to_string());

    let allowed_tools = {
        let merged = merge_unique_names(&profile.allowed_tools, &cli.allowed_tools);
        if merged.is_empty() {
            DEFAULT_ALLOWED_TOOLS.iter().map(|t| t.to_string()).collect()
        } else {
            merged
        }
    };

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        docs_root: absolutize(&docs_root)?,
        agent_command: cli
            .agent_command
            .clone()
            .or(profile.agent_command.clone())
            .unwrap_or_else(|| DEFAULT_AGENT_COMMAND.to_string()),
        model: cli.model.clone().or(profile.model.clone()),
        allowed_tools,
        permission_mode: cli
            .permission_mode
            .or(profile.permission_mode)
            .unwrap_or(PermissionMode::AcceptEdits),
        max_buffer_size: cli
            .max_buffer_size
            .or(profile.max_buffer_size)
            .unwrap_or(DEFAULT_MAX_BUFFER_SIZE)
            .max(4096),
        credential,
        policy: resolve_policy(profile.policy.as_ref()),
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(false),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".kyc/telemetry/events.jsonl".to_string()),
        show_sensitive_config: cli.show_sensitive_config,
    })
}
