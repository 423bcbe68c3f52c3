//! bt - bugtrail CLI
//!
//! Feeds recorded host events (JSON lines) through a recorder and turns the
//! resulting history into an error report.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use bugtrail::prelude::*;
use bugtrail::Error;

#[derive(Parser)]
#[command(name = "bt")]
#[command(about = "bugtrail - what happened right before it broke")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record events from a JSON-lines file (or stdin) and capture an error report
    Record {
        /// JSON-lines event file; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Recorder config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_actions: Option<usize>,
        /// Extra sanitize pattern, selector or regex (repeatable)
        #[arg(long)]
        sanitize: Vec<String>,
        #[arg(long)]
        no_components: bool,
        /// Starting page URL
        #[arg(long, default_value = "http://localhost/")]
        url: String,
        /// Error message to report
        #[arg(short, long)]
        error: String,
        /// Save the report instead of printing it
        #[arg(long)]
        save: bool,
    },
    /// List saved reports
    List,
    /// Show report info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
    },
    /// Delete a report
    Delete {
        file: String,
    },
}

#[derive(Serialize)]
struct Output {
    success: bool,
    error: Error,
}

fn print_json<T: Serialize>(output: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Record {
            input,
            config,
            max_actions,
            sanitize,
            no_components,
            url,
            error,
            save,
        } => load_config(config, max_actions, sanitize, no_components)
            .and_then(|config| record(config, input, &url, &error, save)),
        Commands::List => list(),
        Commands::Show { file, all } => show(&file, all),
        Commands::Delete { file } => delete(&file),
    };

    if let Err(e) = result {
        if let Some(err) = e.downcast_ref::<Error>() {
            let _ = print_json(&Output {
                success: false,
                error: err.clone(),
            });
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<PathBuf>,
    max_actions: Option<usize>,
    sanitize: Vec<String>,
    no_components: bool,
) -> Result<RecorderConfig> {
    let mut config = match path {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {}", path.display()))?
        }
        None => RecorderConfig::default(),
    };
    if let Some(n) = max_actions {
        config.max_actions = n;
    }
    config.sanitize.extend(sanitize);
    if no_components {
        config.capture_components = false;
    }
    Ok(config)
}

fn record(config: RecorderConfig, input: Option<PathBuf>, url: &str, error: &str, save: bool) -> Result<()> {
    let env = Arc::new(StaticEnvironment::new(url).with_platform(std::env::consts::OS));
    let mut recorder = Recorder::with_environment(config, env)?;

    let mut sources = HashMap::new();
    for kind in ActionKind::ALL {
        let source = ManualSource::new(kind);
        recorder.register_source(Box::new(source.clone()));
        sources.insert(kind, source);
    }

    let reader: Box<dyn BufRead> = match &input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    recorder.start();
    let (mut seen, mut recorded) = (0, 0);
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawEvent = serde_json::from_str(line).with_context(|| format!("line {}: invalid event", i + 1))?;
        seen += 1;

        if sources.get(&raw.kind()).is_some_and(|s| s.emit(raw)) {
            recorded += 1;
        }
    }
    recorder.stop();
    tracing::info!(seen, recorded, buffered = recorder.action_count(), "events replayed");

    let report = recorder.capture(error);
    if save {
        let storage = ReportStorage::new()?;
        let path = storage.save(&report)?;
        println!("Saved: {}", path.display());
    } else {
        print_json(&report)?;
    }
    Ok(())
}

fn list() -> Result<()> {
    let storage = ReportStorage::new()?;
    let files = storage.list()?;
    if files.is_empty() {
        println!("No reports saved.");
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

fn show(file: &str, all: bool) -> Result<()> {
    let storage = ReportStorage::new()?;
    let report = storage.load(file)?;
    println!("Report: {}", report.report_id);
    println!("Error: [{}] {}", report.error.error_type, report.error.message);
    println!("Page: {}", report.context.url);
    println!("Actions: {}", report.actions.len());

    let mut counts: HashMap<ActionKind, usize> = HashMap::new();
    for a in &report.actions {
        *counts.entry(a.action.kind()).or_default() += 1;
    }
    let summary: Vec<String> = ActionKind::ALL
        .iter()
        .map(|k| format!("{} {}", counts.get(k).copied().unwrap_or(0), k))
        .collect();
    println!("\nSummary: {}", summary.join(", "));

    if all {
        for (i, a) in report.actions.iter().enumerate() {
            println!("{}: {} {} {}", i, a.relative_time, a.action.page, serde_json::to_string(&a.action.data)?);
        }
    }
    Ok(())
}

fn delete(file: &str) -> Result<()> {
    let storage = ReportStorage::new()?;
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}
