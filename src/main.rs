use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use pipeline_stats::app::{self, AppConfig};

/// Pipeline stats aggregation service
#[derive(Parser)]
#[command(name = "pipeline-stats", version)]
#[command(about = "Collects and aggregates pipeline throughput stats", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the stats API (default command)
    Serve {
        /// Address to bind, overriding configuration
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Validate configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_verbosity(cli.verbose),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(app::error_handling::CONFIG_ERROR);
        }
    };

    app::init_logging(&config);

    let result = match cli.command {
        Some(Commands::Serve { listen }) => run_serve(config, listen).await,
        Some(Commands::CheckConfig) => check_config(&config),
        None => run_serve(config, None).await,
    };

    if let Err(e) = result {
        app::handle_fatal_error(e, cli.verbose);
    }
}

async fn run_serve(mut config: AppConfig, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = listen {
        config.listen_addr = addr;
    }
    app::run_server(config).await
}

fn check_config(config: &AppConfig) -> anyhow::Result<()> {
    config.storage.validate()?;
    let shown = AppConfig {
        storage: config.storage.redacted(),
        ..config.clone()
    };
    println!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}
