//! Command-line interface.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "timetable", version, about = "Portal timetable scraper and session keeper")]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP API together with the session renewal loop (default)
    Serve,
    /// Write today's schedule as JSON
    Export {
        /// Output path; falls back to `SCHEDULE_OUTPUT_PATH`
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Repeat the export on this interval (e.g. `24h`, `90m`) until interrupted
        #[arg(long)]
        every: Option<String>,
    },
    /// Print today's schedule to the terminal
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Compact, colored output for local development
    Pretty,
    /// Structured JSON for log aggregation
    Json,
}

fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

impl Args {
    /// The subcommand to run; `serve` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
