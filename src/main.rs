use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use kyc_cli::cli::{Cli, Commands, ProfileCommands, command_label};
use kyc_cli::config::{load_profiles, read_credential, resolve_runtime_config};
use kyc_cli::console::Console;
use kyc_cli::doctor::run_doctor;
use kyc_cli::documents::render_document_listing;
use kyc_cli::error::{categorize_error, format_cli_error, render_error_message};
use kyc_cli::profiles::{run_profiles_list, run_profiles_show};
use kyc_cli::shell::run_chat;
use kyc_cli::telemetry::TelemetrySink;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let show_sensitive_config = cli.show_sensitive_config;
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err, show_sensitive_config));
        tracing::error!(
            category = %categorize_error(&err).code(),
            error = %render_error_message(&err, show_sensitive_config),
            "command failed"
        );
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles, read_credential())?;
    let telemetry = TelemetrySink::new(&cfg, command_label(cli.command.as_ref()));
    tracing::info!(
        profile = %cfg.profile,
        docs_root = %cfg.docs_root.display(),
        agent_command = %cfg.agent_command,
        "Resolved runtime configuration"
    );

    match &cli.command {
        None | Some(Commands::Chat) => run_chat(&cfg, telemetry).await?,
        Some(Commands::List) => {
            let mut console = Console::stdout();
            render_document_listing(&cfg.docs_root, &mut console)?;
        }
        Some(Commands::Doctor) => run_doctor(&cfg)?,
        Some(Commands::Profiles { command }) => match command {
            ProfileCommands::List => run_profiles_list(&profiles, &cfg)?,
            ProfileCommands::Show => run_profiles_show(&cfg)?,
        },
    }

    Ok(())
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::ERROR);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
