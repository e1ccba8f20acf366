use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sqlite_queue::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Print the tables and columns of a SQLite database as JSON")]
struct Args {
    /// Database file to open.
    path: String,
    /// Engine options as JSON (pragmas, JSON options); the positional path wins.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Journal mode to switch to before introspecting.
    #[arg(long, value_enum, ignore_case = true)]
    journal_mode: Option<JournalMode>,
    #[arg(long)]
    pretty: bool,
    #[arg(long, default_value_t = Level::WARN)]
    log_level: Level,
}

fn load_options(args: &Args) -> Result<EngineOptions, String> {
    let mut options = match &args.config {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .map_err(|err| format!("cannot read {}: {err}", file.display()))?;
            serde_json::from_str::<EngineOptions>(&text)
                .map_err(|err| format!("invalid config {}: {err}", file.display()))?
        }
        None => EngineOptions::default(),
    };
    options.path = Some(args.path.clone());
    if let Some(mode) = args.journal_mode {
        options.pragmas.journal_mode = mode;
    }
    Ok(options)
}

fn run(args: &Args) -> Result<String, String> {
    let options = load_options(args)?;
    let queue = DatabaseQueue::open(options, ModelRegistry::shared()).map_err(|e| e.to_string())?;
    let schema = queue
        .submit_sync(|db| {
            tracing::info!(journal_mode = %db.pragmas().journal_mode, "database opened");
            db.build_schema()
        })
        .map_err(|e| e.to_string())?;
    tracing::info!(tables = schema.tables().len(), "schema built");
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    };
    rendered.map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(args.log_level)
        .init();

    match run(&args) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("schema-dump: {message}");
            ExitCode::FAILURE
        }
    }
}
