//! Cogni CLI — run and inspect the tool runtime from a terminal.
//!
//! Commands:
//! - `tools list`   — List registered tools and whether policy permits them
//! - `tools run`    — Run one tool through the full pipeline, printing events
//! - `config show`  — Print the effective configuration
//! - `config init`  — Write a default config file
//! - `config path`  — Print the config file location

use clap::{Parser, Subcommand};
use cogni_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "cogni",
    about = "Cogni: policy-checked tool execution for AI runs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.cogni/config.toml
    #[arg(long, global = true, env = "COGNI_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and run tools
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ToolsCommand {
    /// List registered tools
    List,

    /// Run a tool and print each emitted event as a JSON line
    Run {
        /// Namespaced tool ID, e.g. core__get_time
        tool: String,

        /// Arguments as JSON text
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Tool-call ID to reuse (generated when omitted)
        #[arg(long)]
        call_id: Option<String>,

        /// Run ID (generated when omitted)
        #[arg(long)]
        run_id: Option<String>,

        /// Connection ID for tools that need one
        #[arg(long)]
        connection: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);

    // `config init` must work even when the current file is broken.
    if let Commands::Config {
        command: ConfigCommand::Init { force },
    } = &cli.command
    {
        init_tracing(cli.verbose, "pretty");
        return commands::config_cmd::init(&config_path, *force);
    }

    let config = AppConfig::load_with_env(&config_path)
        .map_err(|e| format!("Failed to load config: {e}"))?;
    init_tracing(cli.verbose, &config.telemetry.log_format);

    match cli.command {
        Commands::Tools { command } => match command {
            ToolsCommand::List => commands::tools::list(&config)?,
            ToolsCommand::Run {
                tool,
                args,
                call_id,
                run_id,
                connection,
            } => {
                let request = commands::tools::RunRequest {
                    tool,
                    args,
                    call_id,
                    run_id,
                    connection,
                };
                commands::tools::run(&config, request).await?
            }
        },
        Commands::Config { command } => match command {
            ConfigCommand::Show => commands::config_cmd::show(&config)?,
            ConfigCommand::Path => commands::config_cmd::path(&config_path),
            ConfigCommand::Init { .. } => {}
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool, log_format: &str) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
