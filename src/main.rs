use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use mathpad::cli::setup::setup;
use mathpad::core::log::init_logging;
use std::time::Duration;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Start an interactive calculator pad
    Repl {
        /// Conversation whose variables and pad are used
        #[arg(short, long, default_value = "default")]
        session: String,
    },
    /// Evaluate expressions, one per argument, as a single turn
    Eval {
        #[arg(short, long, default_value = "default")]
        session: String,
        /// Seconds to wait for the first rates before evaluating
        #[arg(short, long, default_value_t = 5)]
        wait: u64,
        #[arg(required = true)]
        expressions: Vec<String>,
    },
    /// Show live conversion rates
    Rates {
        /// Seconds to wait for rates to arrive
        #[arg(short, long, default_value_t = 10)]
        wait: u64,
        /// Codes to show, all currencies when omitted
        codes: Vec<String>,
    },
}

impl From<Commands> for mathpad::AppCommand {
    fn from(cmd: Commands) -> mathpad::AppCommand {
        match cmd {
            Commands::Repl { session } => mathpad::AppCommand::Repl { session },
            Commands::Eval {
                session,
                wait,
                expressions,
            } => mathpad::AppCommand::Eval {
                session,
                expressions,
                wait: Duration::from_secs(wait),
            },
            Commands::Rates { wait, codes } => mathpad::AppCommand::Rates {
                codes: codes.iter().map(|code| code.to_uppercase()).collect(),
                wait: Duration::from_secs(wait),
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(cli.config_path.as_deref()),
        Some(cmd) => mathpad::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
