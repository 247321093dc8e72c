use booking_insights::Result;
use booking_insights::commands::{ask_question, run_report, show_status};
use booking_insights::config::{get_config_dir, run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "booking-insights")]
#[command(about = "Answer questions about hotel bookings with analytics and retrieval")]
#[command(version)]
struct Cli {
    /// Configuration directory (defaults to ~/.booking-insights)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, dataset and index settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ask a question about the bookings
    Ask {
        /// Free-text question, e.g. "What is the cancellation rate?"
        question: String,
    },
    /// Run a named analytics report
    Report {
        /// One of revenue_trends, cancellation_rate, top_locations, lead_time_distribution
        report_type: String,
    },
    /// Show dataset, index and Ollama status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Ask { question } => {
            ask_question(&config_dir, &question).await?;
        }
        Commands::Report { report_type } => {
            run_report(&config_dir, &report_type).await?;
        }
        Commands::Status => {
            show_status(&config_dir).await?;
        }
    }

    Ok(())
}
