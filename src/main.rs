use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use statpilot::cli::commands;

#[derive(Parser)]
#[command(name = "statpilot")]
#[command(
    version,
    about = "AI-guided statistical analysis for tabular datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a dataset, profile it and get column suggestions
    Start {
        #[arg(long, short, help = "CSV dataset to analyze")]
        file: PathBuf,
        #[arg(long, short = 'q', help = "What you want to find out")]
        query: String,
    },

    /// Confirm analysis columns and request a plan
    Confirm {
        #[arg(long, short, help = "Session id (defaults to the current session)")]
        session: Option<String>,
        #[arg(
            long,
            short,
            value_delimiter = ',',
            required = true,
            help = "Comma-separated column names"
        )]
        columns: Vec<String>,
        #[arg(long, help = "Answer to the clarifying questions")]
        clarify: Option<String>,
    },

    /// Execute the confirmed analysis plan
    Execute {
        #[arg(long, short, help = "Session id (defaults to the current session)")]
        session: Option<String>,
        #[arg(long, short, help = "Write a Markdown report to this path")]
        report: Option<PathBuf>,
    },

    /// Run the whole workflow interactively
    Run {
        #[arg(long, short, help = "CSV dataset to analyze")]
        file: PathBuf,
        #[arg(long, short = 'q', help = "What you want to find out")]
        query: String,
        #[arg(long, short, help = "Write a Markdown report to this path")]
        report: Option<PathBuf>,
    },

    /// Discard a session and its uploaded dataset
    Restart {
        #[arg(long, short, help = "Session id (defaults to the current session)")]
        session: Option<String>,
    },

    /// Show session status
    Status {
        #[arg(long, short, help = "Session id (defaults to the current session)")]
        session: Option<String>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Remove all sessions and uploaded datasets
    Clean,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = statpilot::types::panic_message(panic_info.payload());

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mstatpilot encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Start { file, query } => {
            commands::start::run(&file, &query)?;
        }
        Commands::Confirm {
            session,
            columns,
            clarify,
        } => {
            commands::confirm::run(session.as_deref(), &columns, clarify.as_deref())?;
        }
        Commands::Execute { session, report } => {
            commands::execute::run(session.as_deref(), report.as_deref())?;
        }
        Commands::Run {
            file,
            query,
            report,
        } => {
            commands::run::run(&file, &query, report.as_deref())?;
        }
        Commands::Restart { session } => {
            commands::restart::run(session.as_deref())?;
        }
        Commands::Status { session, format } => {
            commands::status::run(session.as_deref(), &format)?;
        }
        Commands::Clean => {
            commands::clean::run()?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                commands::config::init(global, force)?;
            }
        },
    }

    Ok(())
}
