/// vitalflow CLI - runs the clinical risk pipeline and answers its questions
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

mod commands;
mod output;

use commands::{answer, init, run, status};

#[derive(Parser)]
#[command(name = "vitalflow")]
#[command(about = "Staged clinical risk pipeline with human-in-the-loop questions", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Override log level (defaults to RUST_LOG, then warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .vitalflow directory with default settings and stage agents
    Init {
        /// Replace an existing .vitalflow directory
        #[arg(short, long)]
        force: bool,

        /// Only write config.toml
        #[arg(short, long)]
        minimal: bool,
    },

    /// Run the pipeline for one patient
    Run {
        /// Patient data file (.yaml, .yml, .json or .toml)
        #[arg(short, long)]
        patient: PathBuf,

        /// Subject identifier (defaults to the file stem)
        #[arg(short, long)]
        subject: Option<String>,

        /// Prompt for answers on stdin
        #[arg(short, long)]
        interactive: bool,

        /// Database URL (defaults to the configured one)
        #[arg(long)]
        database: Option<String>,
    },

    /// Show the status of a subject
    Status {
        #[arg(short, long)]
        subject: String,

        /// Print the status as JSON
        #[arg(long)]
        json: bool,

        #[arg(long)]
        database: Option<String>,
    },

    /// Answer a pending question
    Answer {
        /// Interaction ID printed with the question
        interaction_id: Uuid,

        /// The answer text
        text: String,

        #[arg(long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_level = match (&args.log_level, args.verbose) {
        (Some(level), _) => level.clone(),
        (None, true) => "debug".to_string(),
        (None, false) => "warn".to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let root = std::env::current_dir()?;

    match args.command {
        Commands::Init { force, minimal } => {
            init::execute(root, force, minimal).await?;
        }

        Commands::Run {
            patient,
            subject,
            interactive,
            database,
        } => {
            run::execute(
                &root,
                run::RunArgs {
                    patient,
                    subject,
                    interactive,
                    database,
                },
            )
            .await?;
        }

        Commands::Status {
            subject,
            json,
            database,
        } => {
            status::execute(&root, &subject, json, database.as_deref()).await?;
        }

        Commands::Answer {
            interaction_id,
            text,
            database,
        } => {
            answer::execute(&root, interaction_id, &text, database.as_deref()).await?;
        }
    }

    Ok(())
}
