//! CLI output formatting utilities.
//!
//! Colored status lines, duration formatting, and the console renderer of
//! build progress.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use crossbuild_lib::execute::OpOutcome;
use crossbuild_lib::execute::progress::{Progress, StepKind};
use crossbuild_lib::graph::NodeKey;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Renders engine progress on stdout, one line per operation.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ConsoleProgress {
  pub fn new() -> Self {
    Self
  }

  fn flush() {
    let _ = std::io::stdout().flush();
  }
}

impl Progress for ConsoleProgress {
  fn phase(&self, name: &str) {
    println!("{}", format!("[{name}]").if_supports_color(Stream::Stdout, |s| s.bold()));
  }

  fn node(&self, key: &NodeKey, kind: StepKind) {
    match kind {
      StepKind::Source => println!("prepare sources {} :", key.component),
      StepKind::Build => println!("build {} ({}):", key.component, key.config),
    }
  }

  fn op_start(&self, op: &str, component: &str) {
    print!("  {op} {component} : ");
    Self::flush();
  }

  fn op_end(&self, _op: &str, outcome: &OpOutcome, elapsed: Duration) {
    let label = outcome.to_string();
    match outcome {
      OpOutcome::Done => println!(
        "{} ({})",
        label.if_supports_color(Stream::Stdout, |s| s.green()),
        format_duration(elapsed)
      ),
      OpOutcome::Warning(_) => println!("{}", label.if_supports_color(Stream::Stdout, |s| s.yellow())),
      OpOutcome::Cached | OpOutcome::Skipped(_) => println!("{}", label.if_supports_color(Stream::Stdout, |s| s.dimmed())),
    }
  }

  fn heartbeat(&self) {
    print!(".");
    Self::flush();
  }

  fn failure_log(&self, log: &str) {
    println!("{}", "ERROR".if_supports_color(Stream::Stdout, |s| s.red()));
    eprintln!("{log}");
  }

  fn message(&self, message: &str) {
    println!("{message}");
  }
}
