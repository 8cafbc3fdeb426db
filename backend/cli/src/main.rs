mod chain_cmd;
mod runs_cmd;
mod terminal_output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

use agentforge_config::{config_dir, config_file_path, load_and_prepare, AgentForgeConfig};
use agentforge_tools::builtin_registry;

use chain_cmd::ChainCommands;
use runs_cmd::RunCommands;
use terminal_output::{note_error, schema_summary, Table};

#[derive(Parser)]
#[command(name = "agentforge")]
#[command(about = "AgentForge — tool-driven agent runtime")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $AGENTFORGE_CONFIG_DIR/config.yaml or ~/.agentforge/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and run tool chains
    #[command(subcommand)]
    Chain(ChainCommands),
    /// Inspect persisted runs
    #[command(subcommand)]
    Runs(RunCommands),
    /// List the built-in tools
    Tools,
    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective config with defaults applied
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));

    let config = match load_and_prepare(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            note_error(&format!("{e:#}"));
            return ExitCode::FAILURE;
        }
    };

    agentforge_logging::init_logger(config.log_dir(), config.log_level());
    debug!(config = %config_path.display(), "Configuration loaded");

    match dispatch(cli.command, &config, &config_path).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands, config: &AgentForgeConfig, config_path: &Path) -> Result<ExitCode> {
    match command {
        Commands::Chain(cmd) => chain_cmd::run(cmd, config).await,
        Commands::Runs(cmd) => {
            runs_cmd::run(cmd, Path::new(config.db_path()))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools => {
            let registry = builtin_registry();
            let mut table = Table::new(["TOOL", "PARAMETERS", "DESCRIPTION"]);
            for name in registry.list() {
                let Some(tool) = registry.get(&name) else {
                    continue;
                };
                let parameters = schema_summary(&tool.parameters());
                table.row(vec![name, parameters, tool.description().to_string()]);
            }
            print!("{}", table.render());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(ConfigCommands::Show) => {
            println!("# {}", config_path.display());
            let yaml = serde_yaml::to_string(config).context("Failed to render config as YAML")?;
            print!("{yaml}");
            Ok(ExitCode::SUCCESS)
        }
    }
}
