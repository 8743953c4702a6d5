//! FacturIA CLI - Financial document to transaction pipeline
//!
//! Usage:
//!   facturia init                       Initialize database
//!   facturia import --file export.csv   Import a bank export
//!   facturia classify --file doc.pdf    Classify one document
//!   facturia pending --dir inbox/       Process downloaded attachments

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import { file } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(config_path)?;
            commands::cmd_import(&db, &config, &file)
        }
        Commands::Classify {
            file,
            sender,
            subject,
            text_file,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(config_path)?;
            let pipeline = commands::build_pipeline(&config, db)?;
            commands::cmd_classify(
                &pipeline,
                &file,
                sender,
                subject,
                text_file.as_deref(),
            )
            .await
        }
        Commands::Pending { dir } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(config_path)?;
            let pipeline = commands::build_pipeline(&config, db)?;
            commands::cmd_pending(&pipeline, &dir).await
        }
        Commands::Transactions { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_transactions_list(&db, false, None, None, 20),
                Some(TransactionsAction::List {
                    review,
                    direction,
                    category,
                    limit,
                }) => commands::cmd_transactions_list(
                    &db,
                    review,
                    direction.as_deref(),
                    category.as_deref(),
                    limit,
                ),
                Some(TransactionsAction::Edit {
                    id,
                    category,
                    amount,
                    direction,
                    date,
                    description,
                    counterparty,
                    review_reason,
                }) => {
                    let config = commands::load_config(config_path)?;
                    let edit = commands::parse_edit(
                        category,
                        amount,
                        direction.as_deref(),
                        date.as_deref(),
                        description,
                        counterparty,
                        review_reason,
                    )?;
                    commands::cmd_transactions_edit(&db, &config, id, &edit)
                }
                Some(TransactionsAction::Delete { id }) => {
                    commands::cmd_transactions_delete(&db, id)
                }
            }
        }
        Commands::Stats { from, to, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_stats(&db, from.as_deref(), to.as_deref(), json)
        }
        Commands::Categories => {
            let config = commands::load_config(config_path)?;
            commands::cmd_categories(&config)
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt, config_path).await,
    }
}
