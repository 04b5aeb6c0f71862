use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use shotlog_core::batch::pending_records;
use shotlog_core::diagnostics::Diagnostics;
use shotlog_core::invoke::OllamaBackend;
use shotlog_core::progress::RunProgress;
use shotlog_core::resolve::{AutoResolver, Resolver};
use shotlog_core::{CancelToken, EnrichOptions, Enricher, RecordStore, RunOutcome};

use crate::cli::{Cli, Commands, RunArgs};
use crate::console::ConsoleResolver;

pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run_enrichment(&cli.file, &args),
        Commands::Status => print_status(&cli.file),
    }
}

fn print_status(file: &Path) -> Result<()> {
    let store = RecordStore::new(file);
    let loaded = store
        .load()
        .with_context(|| format!("failed to load {}", file.display()))?;
    let progress = RunProgress::recompute(&loaded.records);
    print_json(&progress)
}

fn run_enrichment(file: &Path, args: &RunArgs) -> Result<()> {
    let store = RecordStore::new(file);
    let loaded = store
        .load()
        .with_context(|| format!("failed to load {}", file.display()))?;
    if loaded.sanitized_defer_timestamps > 0 {
        println!(
            "normalized {} defer timestamp(s) to UTC",
            loaded.sanitized_defer_timestamps
        );
    }

    let records = loaded.records;
    let pending = pending_records(&records, Utc::now());
    let progress = RunProgress::recompute(&records);
    println!(
        "{} record(s) total, {} processed, {} deferred, {} eligible now",
        progress.total,
        progress.processed,
        progress.deferred,
        pending.len()
    );
    if pending.is_empty() {
        println!("nothing to enrich");
        return Ok(());
    }

    let options = EnrichOptions {
        batch_size: args.batch_size,
        confidence_threshold: args.confidence_threshold,
        defer_hours: args.defer_hours,
        sleep_seconds: args.sleep,
        confirm_between_batches: args.confirm_between_batches(),
        ..EnrichOptions::default()
    };
    let diagnostics = if args.no_logs {
        Diagnostics::disabled()
    } else {
        Diagnostics::enabled(&args.log_dir)
    };
    let backend = OllamaBackend::new(&args.model_program, &args.model);
    let mut resolver: Box<dyn Resolver> = if args.interactive() {
        Box::new(ConsoleResolver::new())
    } else {
        Box::new(AutoResolver)
    };

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("failed to install interrupt handler")?;

    let mut enricher = Enricher::new(
        &store,
        records,
        &backend,
        resolver.as_mut(),
        &diagnostics,
        options,
        cancel,
    );
    let outcome = enricher.run(&mut |report| {
        println!(
            "batch of {} resolved: {} processed, {} deferred, {} retried",
            report.outcome.batch_size,
            report.outcome.processed,
            report.outcome.deferred,
            report.outcome.retried
        );
        println!(
            "progress: {}/{} processed, {} deferred, {} remaining",
            report.progress.processed,
            report.progress.total,
            report.progress.deferred,
            report.progress.remaining()
        );
    })?;

    match outcome {
        RunOutcome::Completed => println!("run complete"),
        RunOutcome::Interrupted => println!("run interrupted, collection saved"),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
