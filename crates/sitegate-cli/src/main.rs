use clap::{Parser, Subcommand};
use sitegate_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sitegate", version, about = "Timed website access control")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every tracked site and its remaining allowance
    Status {
        /// Print the stored state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn enforcement on
    Enable,
    /// Turn enforcement off
    Disable,
    /// Grant a site a fresh allowance
    Grant {
        /// Category name (e.g. "socialMedia")
        category: String,
        /// Position within the category
        index: usize,
    },
    /// Report what would happen when navigating to a URL
    Check {
        url: String,
    },
    /// Restore the default catalog and clear all allowances
    Reset,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the browser bridge on stdin/stdout
    Host,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env("SITEGATE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config);

    let result = match cli.command {
        Commands::Status { json } => commands::site::status(&config, json),
        Commands::Enable => commands::site::set_enabled(&config, true),
        Commands::Disable => commands::site::set_enabled(&config, false),
        Commands::Grant { category, index } => commands::site::grant(&config, category, index),
        Commands::Check { url } => commands::site::check(&config, &url),
        Commands::Reset => commands::site::reset(&config),
        Commands::Config { action } => commands::config::run(action),
        Commands::Host => commands::host::run(&config),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
