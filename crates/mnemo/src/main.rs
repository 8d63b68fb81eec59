mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            trace,
            db,
            budget,
            recency_window,
        } => commands::replay::run(&trace, db.as_deref(), budget, recency_window),
        Commands::Status { db } => commands::status::run(&db),
        Commands::Version => commands::version::run(),
    }
}
