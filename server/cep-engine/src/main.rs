//! Binary entrypoint: feed readings through the engine, write matches as JSON lines.
//!
//! Readings come either from the synthetic generator (default) or from stdin,
//! one InboundReading JSON object per line. Output lines on stdout are either:
//! - a MatchPayload (tagged by `kind`)
//! - an ErrorOutput (when an input line fails validation)
//!
//! Logs go to stderr. Tunables come from `CEP_*` environment variables.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::{error, info};

use cep_engine::generator::{ReadingGenerator, DEFAULT_EVENT_COUNT};
use cep_engine::normalize::normalize;
use cep_engine::types::ErrorOutput;
use cep_engine::{
  EngineConfig, EngineError, InboundReading, JsonLinesSubscriber, LogSubscriber, Runtime,
  StandardSubscribers, Subscriber, SystemClock,
};

#[derive(Parser)]
#[command(name = "cep-engine", about = "Continuous temperature pattern detection")]
struct Cli {
  /// Number of synthetic readings to generate.
  #[arg(short, long, default_value_t = DEFAULT_EVENT_COUNT)]
  events: u64,

  /// Generator seed (random when omitted).
  #[arg(long)]
  seed: Option<u64>,

  /// Pause between generated readings, in milliseconds.
  #[arg(long, default_value_t = 0)]
  delay_ms: u64,

  /// Read InboundReading JSON lines from stdin instead of generating.
  #[arg(long)]
  stdin: bool,

  /// Where matches go.
  #[arg(long, value_enum, default_value_t = Output::Json)]
  output: Output,

  /// Log level when RUST_LOG is unset.
  #[arg(long, default_value = "info")]
  log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
  /// JSON lines on stdout.
  Json,
  /// Human-readable log lines on stderr.
  Log,
}

fn main() {
  let cli = Cli::parse();

  let filter = tracing_subscriber::EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();

  if let Err(e) = run(&cli) {
    error!(error = %e, "cep-engine failed");
    std::process::exit(1);
  }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
  let config = EngineConfig::from_env()?;
  info!(?config, "configuration loaded");

  let subscribers = match cli.output {
    Output::Json => {
      let stdout: Arc<dyn Subscriber> = Arc::new(JsonLinesSubscriber::new("stdout", io::stdout()));
      StandardSubscribers {
        critical: Arc::clone(&stdout),
        warning: Arc::clone(&stdout),
        monitor: stdout,
      }
    }
    Output::Log => StandardSubscribers {
      critical: Arc::new(LogSubscriber::new("critical-alert")),
      warning: Arc::new(LogSubscriber::new("warning-alert")),
      monitor: Arc::new(LogSubscriber::new("temperature-monitor")),
    },
  };

  let runtime = Runtime::standard(&config, subscribers, Arc::new(SystemClock))?;
  runtime.start()?;

  let fed = if cli.stdin {
    feed_stdin(&runtime)?
  } else {
    feed_generated(&runtime, cli)?
  };

  // Close the last, partial interval before stopping.
  runtime.tick()?;
  runtime.shutdown();
  info!(readings = fed, "done");
  Ok(())
}

fn feed_generated(runtime: &Runtime, cli: &Cli) -> Result<u64, EngineError> {
  let seed = cli.seed.unwrap_or_else(rand::random);
  info!(seed, events = cli.events, "generating readings");

  let mut fed = 0;
  for event in ReadingGenerator::new(seed, Utc::now()).take(cli.events as usize) {
    runtime.submit(&event)?;
    fed += 1;
    if cli.delay_ms > 0 {
      thread::sleep(Duration::from_millis(cli.delay_ms));
    }
  }
  Ok(fed)
}

fn feed_stdin(runtime: &Runtime) -> Result<u64, EngineError> {
  let stdin = io::stdin();
  let mut fed = 0;

  for line in stdin.lock().lines() {
    let line = line?;

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let raw: InboundReading = match serde_json::from_str(trimmed) {
      Ok(v) => v,
      Err(e) => {
        emit_error(ErrorOutput::new(format!("json parse: {}", e)))?;
        continue;
      }
    };

    match normalize(&raw) {
      Ok(event) => {
        runtime.submit(&event)?;
        fed += 1;
      }
      Err(EngineError::Validation { field, reason }) => {
        emit_error(ErrorOutput::new(reason).with_field(field))?;
      }
      Err(e) => emit_error(ErrorOutput::new(e.to_string()))?,
    }
  }
  Ok(fed)
}

fn emit_error(err: ErrorOutput) -> Result<(), EngineError> {
  let mut line = serde_json::to_vec(&err)?;
  line.push(b'\n');
  io::stdout().write_all(&line)?;
  Ok(())
}
