#![forbid(unsafe_code)]

//! `triage` command-line front end.
//!
//! Thin wrapper over the library crates: every subcommand loads its inputs,
//! calls one library operation and prints the result to stdout. Diagnostics
//! go to stderr through `tracing`.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use triage_cache::QueryKey;
use triage_core::{Config, stable_stringify_value};
use triage_search::{FileStore, ParamsState, SearchFormat, SearchParser};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Core(#[from] triage_core::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(name = "triage", version, about = "Triage console query toolkit")]
pub struct Cli {
    /// Log at debug level (`RUST_LOG` takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

/// Search format selection shared by the query subcommands.
#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    /// JSON file declaring the search fields
    #[arg(long = "format", short = 'f', value_name = "FILE")]
    pub format: PathBuf,
    /// Fields always written to the query, even at their default
    #[arg(long, value_delimiter = ',', value_name = "FIELDS")]
    pub enforce: Vec<String>,
}

/// Persisted-store selection for `save` and `restore`.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Storage key the query is kept under
    #[arg(long)]
    pub key: String,
    /// Storage file (defaults to `TRIAGE_STORAGE_PATH` or the data dir)
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the stable serialization of a JSON value (stdin if omitted)
    Canon { json: Option<String> },
    /// Print the opaque cache key and its stable identity for a request
    Key {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Request body as JSON
        #[arg(long)]
        body: Option<String>,
    },
    /// Print the typed parameters a query decodes to
    Parse {
        #[command(flatten)]
        format: FormatArgs,
        #[arg(default_value = "")]
        query: String,
    },
    /// Print the minimal query reproducing the same view
    Delta {
        #[command(flatten)]
        format: FormatArgs,
        #[arg(default_value = "")]
        query: String,
    },
    /// Print the complete query with every field written out
    Full {
        #[command(flatten)]
        format: FormatArgs,
        #[arg(default_value = "")]
        query: String,
    },
    /// Persist the delta of a query under a storage key
    Save {
        #[command(flatten)]
        format: FormatArgs,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(default_value = "")]
        query: String,
    },
    /// Print the query persisted under a storage key
    Restore {
        #[command(flatten)]
        format: FormatArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the effective configuration as JSON
    Config,
}

pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match execute(cli, &mut out) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run one parsed command, writing its output to `out`.
pub fn execute(cli: Cli, out: &mut dyn Write) -> CliResult<()> {
    let config = Config::from_env();
    match cli.command {
        Commands::Canon { json } => {
            let text = match json {
                Some(text) => text,
                None => read_stdin()?,
            };
            let value: Value = serde_json::from_str(&text)?;
            writeln!(out, "{}", stable_stringify_value(&value))?;
        }
        Commands::Key { url, method, body } => {
            let mut key = QueryKey::new(url, method);
            if let Some(body) = body {
                let body: Value = serde_json::from_str(&body)?;
                key = key.with_body(&body);
            }
            writeln!(out, "{}", serde_json::to_string(&key.to_value())?)?;
            writeln!(out, "{}", key.stable_id())?;
        }
        Commands::Parse { format, query } => {
            let parser = load_parser(&format, &config)?;
            let typed = parser.parse(&ParamsState::parse(&query));
            writeln!(out, "{}", serde_json::to_string_pretty(&typed)?)?;
        }
        Commands::Delta { format, query } => {
            let parser = load_parser(&format, &config)?;
            writeln!(out, "{}", parser.delta_params(&ParamsState::parse(&query)))?;
        }
        Commands::Full { format, query } => {
            let parser = load_parser(&format, &config)?;
            writeln!(out, "{}", parser.full_params(&ParamsState::parse(&query)))?;
        }
        Commands::Save {
            format,
            store,
            query,
        } => {
            let parser = load_parser(&format, &config)?;
            let file = open_store(&store, &config);
            let saved = parser.save_to(&file, &store.key, &ParamsState::parse(&query))?;
            tracing::info!(key = %store.key, path = %file.path().display(), "saved search view");
            writeln!(out, "{saved}")?;
        }
        Commands::Restore { format, store } => {
            let parser = load_parser(&format, &config)?;
            let file = open_store(&store, &config);
            writeln!(out, "{}", parser.restore_from(&file, &store.key)?)?;
        }
        Commands::Config => {
            writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
        }
    }
    Ok(())
}

fn read_stdin() -> CliResult<String> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    if text.trim().is_empty() {
        return Err(CliError::InvalidArgument(
            "expected a JSON value as argument or on stdin".to_string(),
        ));
    }
    Ok(text)
}

/// Load a format file and build a parser with the configured prefixes.
fn load_parser(args: &FormatArgs, config: &Config) -> CliResult<SearchParser> {
    let format = load_format(&args.format)?;
    for name in &args.enforce {
        if !format.contains(name) {
            return Err(CliError::InvalidArgument(format!(
                "--enforce names unknown field '{name}'"
            )));
        }
    }
    let enforced: Vec<&str> = args.enforce.iter().map(String::as_str).collect();
    Ok(SearchParser::from_config(format, config).with_enforced(&enforced))
}

fn load_format(path: &Path) -> CliResult<SearchFormat> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        CliError::InvalidArgument(format!("cannot read format file {}: {err}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "loaded search format");
    Ok(SearchFormat::from_json_str(&text)?)
}

fn open_store(args: &StoreArgs, config: &Config) -> FileStore {
    args.store
        .as_ref()
        .map_or_else(|| FileStore::from_config(config), FileStore::new)
}
