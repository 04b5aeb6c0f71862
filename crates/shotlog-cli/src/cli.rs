use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "shotlog")]
#[command(about = "Batch screenshot metadata enrichment via a local LLM", version)]
pub struct Cli {
    /// Screenshot metadata collection to operate on.
    #[arg(long, default_value = "screenshots.json")]
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enrich pending records, one batch at a time.
    Run(RunArgs),
    /// Print progress counters for the collection as JSON.
    Status,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Records per model invocation.
    #[arg(long, default_value_t = 5, value_parser = parse_min_one_usize)]
    pub batch_size: usize,
    /// Model name handed to the model program.
    #[arg(long, default_value = "llama3.2")]
    pub model: String,
    /// Executable invoked as `<program> run <model>` with the prompt on stdin.
    #[arg(long, default_value = "ollama")]
    pub model_program: String,
    /// Pause between batches, in seconds.
    #[arg(long, default_value_t = 2.0, value_parser = parse_non_negative_f64)]
    pub sleep: f64,
    /// Results below this confidence need attention.
    #[arg(long, default_value_t = 0.6, value_parser = parse_unit_interval_f64)]
    pub confidence_threshold: f64,
    /// How far into the future a deferred record is pushed.
    #[arg(long, default_value_t = 12.0, value_parser = parse_non_negative_f64)]
    pub defer_hours: f64,
    /// Never prompt; records that need attention are deferred.
    #[arg(long, default_value_t = false)]
    pub no_interactive: bool,
    /// Continue from batch to batch without asking.
    #[arg(long, default_value_t = false)]
    pub auto: bool,
    /// Do not ask for confirmation between batches.
    #[arg(long, default_value_t = false)]
    pub no_confirm: bool,
    /// Disable prompt/response captures and batch summaries.
    #[arg(long, default_value_t = false)]
    pub no_logs: bool,
    /// Directory for capture and summary files.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
}

impl RunArgs {
    #[must_use]
    pub fn interactive(&self) -> bool {
        !self.no_interactive
    }

    #[must_use]
    pub fn confirm_between_batches(&self) -> bool {
        !(self.no_confirm || self.auto)
    }
}

fn parse_unit_interval_f64(raw: &str) -> std::result::Result<f64, String> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("invalid float value '{raw}'"))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("value must be within [0.0, 1.0], got {value}"));
    }
    Ok(value)
}

fn parse_non_negative_f64(raw: &str) -> std::result::Result<f64, String> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("invalid float value '{raw}'"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("value must be finite and >= 0, got {value}"));
    }
    Ok(value)
}

fn parse_min_one_usize(raw: &str) -> std::result::Result<usize, String> {
    let value = raw
        .parse::<usize>()
        .map_err(|_| format!("invalid integer value '{raw}'"))?;
    if value == 0 {
        return Err("value must be >= 1".to_string());
    }
    Ok(value)
}
