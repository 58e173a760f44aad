use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "jitai", version, about = "Just-in-time intervention decision CLI")]
struct Cli {
    /// SQLite database path (defaults to the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full gate and pick content if allowed
    Decide(commands::decide::DecideArgs),
    /// Pick a content arm without gating
    Select(commands::decide::SelectArgs),
    /// Report how the user responded to an intervention
    Outcome(commands::outcome::OutcomeArgs),
    /// Bandit arm statistics
    Arms {
        #[command(subcommand)]
        action: commands::arms::ArmsAction,
    },
    /// Current burden assessment
    Burden(commands::burden::BurdenArgs),
    /// Timing recommendation for an app and hour
    Timing(commands::timing::TimingArgs),
    /// Outcome history management
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("JITAI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let db = cli.db.as_deref();
    let result = match cli.command {
        Commands::Decide(args) => commands::decide::run_decide(args, db).await,
        Commands::Select(args) => commands::decide::run_select(args, db),
        Commands::Outcome(args) => commands::outcome::run(args, db).await,
        Commands::Arms { action } => commands::arms::run(action, db),
        Commands::Burden(args) => commands::burden::run(args, db).await,
        Commands::Timing(args) => commands::timing::run(args, db).await,
        Commands::History { action } => commands::history::run(action, db).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
