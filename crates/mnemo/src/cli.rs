use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mnemo")]
#[command(version)]
#[command(about = "Tool-result memory for long-running agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a recorded tool trace and print the resulting dashboard
    Replay {
        /// Path to a JSON trace file (array of tool actions)
        trace: String,

        /// Persist results to a SQLite database at this path
        #[arg(long)]
        db: Option<String>,

        /// Token budget for the active set
        #[arg(long, default_value_t = 100_000)]
        budget: usize,

        /// Number of most recent results protected from compression
        #[arg(long, default_value_t = 5)]
        recency_window: usize,
    },

    /// Inspect a memory database
    Status {
        /// Path to the SQLite database
        db: String,
    },

    /// Print version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_version() {
        let cli = Cli::try_parse_from(["mnemo", "version"]);
        assert!(cli.is_ok());
        assert!(matches!(cli.unwrap().command, Commands::Version));
    }

    #[test]
    fn test_cli_parse_replay_with_budget() {
        let cli = Cli::try_parse_from(["mnemo", "replay", "trace.json", "--budget", "2000"]);
        assert!(cli.is_ok());
        if let Commands::Replay { trace, db, budget, .. } = cli.unwrap().command {
            assert_eq!(trace, "trace.json");
            assert_eq!(db, None);
            assert_eq!(budget, 2000);
        } else {
            panic!("Expected Replay command");
        }
    }

    #[test]
    fn test_cli_parse_replay_with_db() {
        let cli = Cli::try_parse_from(["mnemo", "replay", "trace.json", "--db", "memory.db"]);
        assert!(cli.is_ok());
        if let Commands::Replay { db, .. } = cli.unwrap().command {
            assert_eq!(db.as_deref(), Some("memory.db"));
        } else {
            panic!("Expected Replay command");
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::try_parse_from(["mnemo", "status", "memory.db"]);
        assert!(cli.is_ok());
        assert!(matches!(cli.unwrap().command, Commands::Status { .. }));
    }
}
