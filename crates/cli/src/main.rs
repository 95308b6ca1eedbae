//! PASTA CLI: offline audit and view tool for notebook files.
//!
//! - `pasta check [--repair]`: consistency report (exit code 2 when hard
//!   violations remain)
//! - `pasta views [--ensure]`: compile or recover the schema views
//! - `pasta history ID`: archived revisions of a document
//! - `pasta config init|show`: manage `pasta.toml`
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

mod commands;
mod format;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use pasta_engine::config::CONFIG_FILE_NAME;
use pasta_engine::{DocumentId, EngineConfig, Notebook};
use pasta_storage::FileStore;
use tracing_subscriber::EnvFilter;

use commands::{build_cli, DEFAULT_DB};
use format::{format_error, format_history, format_names, format_report, OutputMode};

fn main() {
    init_logging();
    let matches = build_cli().get_matches();

    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match run(&matches, mode) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}", format_error(&format!("{:#}", e), mode));
            process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(matches: &clap::ArgMatches, mode: OutputMode) -> Result<i32> {
    let db = PathBuf::from(
        matches
            .get_one::<String>("db")
            .map(String::as_str)
            .unwrap_or(DEFAULT_DB),
    );
    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| db.with_file_name(CONFIG_FILE_NAME));

    match matches.subcommand() {
        Some(("config", sub)) => run_config(sub, &config_path, mode),
        Some((name, sub)) => {
            let config = load_config(&config_path)?;
            tracing::debug!(db = %db.display(), command = name, "opening notebook");
            let store = FileStore::open(&db)
                .with_context(|| format!("failed to open notebook {}", db.display()))?;
            let notebook = Notebook::open(store, config)?;
            match name {
                "check" => {
                    let report = notebook.check_db(sub.get_flag("repair"))?;
                    println!("{}", format_report(&report, mode));
                    Ok(if report.is_clean() { 0 } else { 2 })
                }
                "views" => {
                    let (label, names) = if sub.get_flag("ensure") {
                        ("recreated", notebook.ensure_views()?)
                    } else {
                        ("compiled", notebook.init_views()?)
                    };
                    println!("{}", format_names(label, &names, mode));
                    Ok(0)
                }
                "history" => {
                    let id = sub
                        .get_one::<String>("id")
                        .context("missing document id")?;
                    let history = notebook.history(&DocumentId::new(id.as_str())?)?;
                    println!("{}", format_history(&history, mode));
                    Ok(0)
                }
                other => anyhow::bail!("unknown command {}", other),
            }
        }
        None => anyhow::bail!("no command given"),
    }
}

fn run_config(matches: &clap::ArgMatches, path: &Path, mode: OutputMode) -> Result<i32> {
    match matches.subcommand_name() {
        Some("init") => {
            EngineConfig::write_default_if_missing(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", format_names("config", &[path.display().to_string()], mode));
            Ok(0)
        }
        Some("show") => {
            let config = load_config(path)?;
            match mode {
                OutputMode::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputMode::Human => println!("{:#?}", config),
            }
            Ok(0)
        }
        _ => anyhow::bail!("unknown config command"),
    }
}

/// Config from `path`, or defaults when the file does not exist.
fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    EngineConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}
