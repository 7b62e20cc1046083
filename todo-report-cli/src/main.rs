//! Todo Reporter CLI Application
//!
//! Runs a command as a recorded todo: the due date is checked first, then the
//! command runs, then the todo is reported using the todo-report library.
//! The process exits with the command's exit code.

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Duration;
use todo_report::{
    middleware, DrainSummary, DueDateBehaviour, Timestamp, TodoConfig, TodoContext, Todos,
};

mod config;

use config::CliConfig;

/// Todo Reporter - run a command and report it as a pending todo
#[derive(Parser, Debug)]
#[command(name = "todo-report")]
#[command(about = "Run a command and report it as a known-incomplete todo", long_about = None)]
#[command(version)]
struct Args {
    /// Description of the pending work
    #[arg(short, long, value_name = "TEXT")]
    todo: String,

    /// Due date (RFC 3339, e.g. 2030-01-01T00:00:00Z)
    #[arg(long, value_name = "DATE")]
    due_date: Option<Timestamp>,

    /// What to do once the due date has passed: ignore, warn or error
    #[arg(long, value_name = "POLICY")]
    behaviour: Option<DueDateBehaviour>,

    /// Extra report field as key=value (can be repeated; JSON values allowed)
    #[arg(short, long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, Value)>,

    /// Endpoint receiving the report (overrides the config file)
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Environment tag added to the report (overrides the config file)
    #[arg(short, long, value_name = "ENV")]
    env: Option<String>,

    /// Path to configuration file (todo-report.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds to wait for the report before exiting
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    drain_timeout: u64,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Command to run as the todo's callback
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("Todo Reporter CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using todo-report library v{}", todo_report::VERSION);

    let code = run(args)?;
    std::process::exit(code);
}

/// Record the todo, run the command, wait for the report
fn run(args: Args) -> Result<i32> {
    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => CliConfig::default(),
    };
    let config = file_config.merge(args.url, args.env, args.fields);

    if config.url.is_none() {
        log::warn!("No URL configured, the todo will not be reported");
    }

    let todos = Todos::new();
    todos.initialize(reporter_config(&config));

    let mut context = TodoContext::new(args.todo);
    context.due_date = args.due_date;
    context.due_date_behaviour = args.behaviour;

    let mut status: Option<std::io::Result<ExitStatus>> = None;
    todos.record(|| status = run_command(&args.command), context)?;

    let summary = todos.drain(Duration::from_secs(args.drain_timeout));
    if let Some(line) = summary_line(&summary, config.url.is_some()) {
        log::info!("{}", line);
    }

    match status {
        Some(result) => {
            let status = result
                .with_context(|| format!("Failed to run command: {:?}", args.command))?;
            Ok(status.code().unwrap_or(1))
        }
        None => Ok(0),
    }
}

/// Report summary for the log; `None` when the todo had nowhere to go
fn summary_line(summary: &DrainSummary, has_target: bool) -> Option<String> {
    has_target.then(|| {
        format!(
            "Reports: {} delivered, {} failed, {} pending",
            summary.delivered, summary.failed, summary.pending
        )
    })
}

/// Translate the merged CLI configuration into a reporter configuration
fn reporter_config(config: &CliConfig) -> TodoConfig {
    let mut todo_config = TodoConfig::new();
    if let Some(url) = &config.url {
        todo_config = todo_config.with_url(url.clone());
    }
    if let Some(env) = &config.env {
        todo_config = todo_config.with_env(env.clone());
    }
    for (key, value) in &config.fields {
        todo_config = todo_config.add_middleware(middleware::insert_field(key.clone(), value.clone()));
    }
    todo_config
}

/// Run `command` to completion; `None` when there is nothing to run
fn run_command(command: &[String]) -> Option<std::io::Result<ExitStatus>> {
    let (program, rest) = command.split_first()?;
    log::debug!("Running command: {:?}", command);
    Some(Command::new(program).args(rest).status())
}

/// Parse `key=value`; the value is read as JSON when possible, else as text
fn parse_field(s: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid field '{s}': expected KEY=VALUE"))?;
    if key.is_empty() {
        return Err(format!("invalid field '{s}': empty key"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
