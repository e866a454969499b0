//! Planbook CLI entry point.

use clap::Parser;
use pb::cli::commands;
use pb::cli::{Cli, Commands, OutputFormat};
use pb::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR --format json OR non-TTY stdout
    let json = cli.json
        || cli.format == OutputFormat::Json
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    let result = run(&cli, json);
    let _ = pb::storage::close_db();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let db = cli.db.as_ref();
    match &cli.command {
        Commands::Init { docs_root, force } => {
            commands::init::execute(docs_root.as_deref(), *force, db, json)
        }
        Commands::Version => commands::version::execute(json),

        Commands::Sync(args) => commands::sync::execute(args, db, cli.actor.as_deref(), json),
        Commands::Discover { folder } => commands::discover::execute(folder.as_deref(), json),
        Commands::Workflow { command } => commands::workflow::execute(command, json),

        Commands::Task { command } => {
            commands::task::execute(command, db, cli.actor.as_deref(), json)
        }
        Commands::Epic { command } => commands::epic::execute(command, db, json),
        Commands::Feature { command } => commands::feature::execute(command, db, json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
