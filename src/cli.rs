use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionMode {
    Default,
    AcceptEdits,
    Plan,
    BypassPermissions,
}

impl PermissionMode {
    /// Value understood by the agent command's `--permission-mode` flag.
    pub fn as_flag(self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommands {
    #[command(about = "List configured profiles and highlight the active profile")]
    List,
    #[command(about = "Show the active profile's resolved runtime settings")]
    Show,
}

const CLI_EXAMPLES: &str = "Examples:\n\
  kyc-cli\n\
  kyc-cli --docs-root ./kyc_documents chat\n\
  kyc-cli --model claude-sonnet-4-5 --permission-mode plan chat\n\
  kyc-cli --allowed-tool Read --allowed-tool Grep chat\n\
  kyc-cli list\n\
  kyc-cli doctor\n\
  kyc-cli --profile audit profiles show\n\
\n\
In chat:\n\
  - Type a question to send it to the agent.\n\
  - Use /list for a fast local document listing, /debug to trace tool calls,\n\
    /status, /clear, /help and /quit.";

#[derive(Debug, Parser)]
#[command(name = "kyc-cli")]
#[command(about = "Interactive console for a remote KYC document-analysis agent")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "KYC_DOCS_ROOT")]
    pub docs_root: Option<String>,

    #[arg(long, env = "KYC_AGENT_COMMAND")]
    pub agent_command: Option<String>,

    #[arg(long, env = "KYC_MODEL")]
    pub model: Option<String>,

    #[arg(long = "allowed-tool", env = "KYC_ALLOWED_TOOL", value_delimiter = ',')]
    pub allowed_tools: Vec<String>,

    #[arg(long, env = "KYC_PERMISSION_MODE", value_enum)]
    pub permission_mode: Option<PermissionMode>,

    #[arg(long, env = "KYC_MAX_BUFFER_SIZE")]
    pub max_buffer_size: Option<usize>,

    #[arg(long, env = "KYC_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "KYC_CONFIG", default_value = ".kyc/config.toml")]
    pub config_path: String,

    #[arg(long, env = "KYC_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "KYC_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "KYC_SHOW_SENSITIVE_CONFIG", default_value_t = false)]
    pub show_sensitive_config: bool,

    #[arg(long, env = "RUST_LOG", default_value = "error")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run the interactive console (default)")]
    Chat,
    #[command(about = "List the documents under the documents root and exit")]
    List,
    #[command(about = "Check credential, documents root and agent command availability")]
    Doctor,
    #[command(about = "Inspect profile configuration and active resolved profile state")]
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

pub fn command_label(command: Option<&Commands>) -> String {
    match command {
        None | Some(Commands::Chat) => "chat".to_string(),
        Some(Commands::List) => "list".to_string(),
        Some(Commands::Doctor) => "doctor".to_string(),
        Some(Commands::Profiles { command }) => match command {
            ProfileCommands::List => "profiles.list".to_string(),
            ProfileCommands::Show => "profiles.show".to_string(),
        },
    }
}
