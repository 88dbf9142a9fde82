//! s3-hauler - Parallel File Tree Uploader
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use s3_hauler::config::{CliArgs, EngineConfig};
use s3_hauler::engine::{UploadEngine, WorkItem};
use s3_hauler::fs_ops::LocalFs;
use s3_hauler::progress::{print_header, print_summary, ProgressReporter};
use s3_hauler::store::S3Connector;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = match EngineConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            CliArgs::command().print_help().context("printing usage")?;
            return Ok(ExitCode::FAILURE);
        }
    };

    if !args.quiet {
        print_header(
            &args.source.display().to_string(),
            &config.bucket,
            config.max_workers,
            config.pretend,
        );
    }

    // Build the engine and seed the queue with the root item
    let engine = UploadEngine::with_config(
        config.clone(),
        Box::new(S3Connector),
        Arc::new(LocalFs),
    );
    engine.enqueue(WorkItem::root(args.source.clone()));

    let progress = if args.quiet {
        None
    } else {
        Some(ProgressReporter::new())
    };

    if let Some(ref p) = progress {
        p.set_status("Uploading...");
    }

    // Run the full drain loop
    let report = engine.upload().context("Upload failed")?;

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    if !args.quiet {
        print_summary(&report, &config.bucket);
    }

    if report.errors > 0 {
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("s3_hauler=debug,warn")
    } else {
        EnvFilter::new("s3_hauler=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
