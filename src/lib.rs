pub mod cli;
pub mod core;
pub mod math;
pub mod providers;
pub mod store;

use crate::cli::repl::Repl;
use crate::core::aggregator;
use crate::core::config::AppConfig;
use crate::core::registry::UnitRegistry;
use crate::math::Evaluator;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    /// Interactive pad for one conversation.
    Repl { session: String },
    /// Evaluate expressions as a single turn, after waiting for rates.
    Eval {
        session: String,
        expressions: Vec<String>,
        wait: Duration,
    },
    /// Show live rates.
    Rates { codes: Vec<String>, wait: Duration },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("mathpad starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let registry = Arc::new(UnitRegistry::default());
    let sources = providers::build_sources(&config)?;
    let feed = aggregator::spawn(sources, Arc::clone(&registry), config.retry_delay());

    let result = match command {
        AppCommand::Repl { session } => {
            let store = store::open_store(&config);
            let evaluator = Evaluator::from_config(Arc::clone(&registry), &config);
            cli::repl::run(Repl {
                store: store.as_ref(),
                evaluator: &evaluator,
                conversation_id: &session,
            })
            .await
        }
        AppCommand::Eval {
            session,
            expressions,
            wait,
        } => {
            let store = store::open_store(&config);
            let evaluator = Evaluator::from_config(Arc::clone(&registry), &config);
            cli::rates::wait_for_rates(&registry, &[], wait).await;
            cli::repl::eval_once(
                Repl {
                    store: store.as_ref(),
                    evaluator: &evaluator,
                    conversation_id: &session,
                },
                &expressions,
            )
            .await
        }
        AppCommand::Rates { codes, wait } => {
            cli::rates::run(&registry, &codes, wait).await;
            Ok(())
        }
    };

    feed.shutdown().await;
    result
}
