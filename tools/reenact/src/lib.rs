pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod pose;
pub mod replay;
pub mod runtime;
pub mod script;
pub mod session;
pub mod types;

use clap::{error::ErrorKind, Parser, Subcommand};
use config::load_config;
use errors::ReenactError;
use logging::{append_run_log, clear_run_logger, init_run_logger, JsonlLogger};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "reenact")]
#[command(about = "Record an object interaction and replay it as guided playback")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a scripted scene through a record pass and a guided playback pass.
    Simulate(SimulateArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct SimulateArgs {
    #[arg(long)]
    pub script: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long = "recording-out")]
    pub recording_out: Option<PathBuf>,
    /// JSONL run log; overrides `[logging] path` from the config.
    #[arg(long)]
    pub log: Option<PathBuf>,
}

pub fn run() -> Result<i32, ReenactError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_args(&args, &mut out)
}

pub fn run_with_args(
    args: &[std::ffi::OsString],
    out: &mut dyn Write,
) -> Result<i32, ReenactError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                write!(out, "{error}").map_err(|e| ReenactError::Io(e.to_string()))?;
                return Ok(0);
            }
            _ => return Err(ReenactError::Cli(error.to_string())),
        },
    };

    match cli.command {
        Command::Simulate(args) => run_simulate(&args, out),
    }
}

fn run_simulate(args: &SimulateArgs, out: &mut dyn Write) -> Result<i32, ReenactError> {
    let cfg = load_config(args.config.as_deref())?;
    let log_path = args.log.clone().or_else(|| cfg.logging.path.clone());
    if let Some(path) = log_path {
        let mut logger = JsonlLogger::new(path);
        logger.max_payload_bytes = cfg.logging.max_payload_bytes;
        init_run_logger(logger);
    }

    let result = simulate_and_report(args, &cfg, out);
    if let Err(error) = &result {
        append_run_log(
            "error",
            "simulate.failed",
            json!({ "kind": error.kind(), "message": error.to_string() }),
        );
    }
    clear_run_logger();
    result
}

fn simulate_and_report(
    args: &SimulateArgs,
    cfg: &config::AppConfig,
    out: &mut dyn Write,
) -> Result<i32, ReenactError> {
    let script = script::load_script(&args.script)?;
    append_run_log(
        "info",
        "simulate.started",
        json!({
            "script": args.script.display().to_string(),
            "objects": script.objects.len(),
        }),
    );
    let report = script::simulate(&script, cfg)?;

    for line in &report.transcript {
        writeln!(out, "{line}").map_err(|e| ReenactError::Io(e.to_string()))?;
    }

    if let Some(path) = &args.recording_out {
        let recording = report.recording.as_ref().ok_or_else(|| {
            ReenactError::Script("script produced no recording to write".to_string())
        })?;
        let text = serde_json::to_string_pretty(recording)
            .map_err(|e| ReenactError::Io(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ReenactError::Io(e.to_string()))?;
        }
        std::fs::write(path, text)
            .map_err(|e| ReenactError::Io(format!("{}: {e}", path.display())))?;
    }

    append_run_log(
        "info",
        "simulate.finished",
        json!({ "lines": report.transcript.len() }),
    );
    Ok(0)
}
