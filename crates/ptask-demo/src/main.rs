//! cabdemo - periodic audio analysis pipeline
//!
//! Runs a sampler, an analyzer and a reporter as periodic tasks that hand
//! data to each other through CABs, then prints per-task deadline-miss
//! statistics.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod analysis;
mod error;
mod output;
mod pipeline;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ptask_runtime::{Runtime, RuntimeConfig};
use ptask_scheduler::SchedPolicy;

use crate::error::DemoError;
use crate::output::RunReport;
use crate::pipeline::{Pipeline, PipelineOptions};

#[derive(Parser, Debug)]
#[command(name = "cabdemo")]
#[command(about = "Periodic audio analysis pipeline built on tasks and CABs")]
#[command(version)]
#[command(long_about = "
cabdemo synthesizes a tone in a periodic sampler task, analyzes the latest
frame in a second task and logs the latest analysis from a third. Tasks
exchange data through cyclic asynchronous buffers, so none of them ever
waits for another.

Real-time policies (fifo, round_robin) usually need CAP_SYS_NICE.
Use --json for machine-readable output.
")]
struct Cli {
    /// Runtime configuration file (JSON or YAML)
    #[arg(short, long, env = "CABDEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Scheduling policy, overriding the configuration file
    #[arg(short, long)]
    policy: Option<SchedPolicy>,

    /// How long to run before shutting down
    #[arg(short, long, default_value_t = 2000)]
    duration_ms: u64,

    /// Sampler period
    #[arg(long, default_value_t = 10)]
    period_ms: u64,

    /// Frequency of the synthesized tone
    #[arg(long, default_value_t = 440.0)]
    frequency_hz: f32,

    /// Output in JSON format for machine parsing
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::load(path)
                .map_err(DemoError::from)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RuntimeConfig::default(),
        };
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        Ok(config)
    }

    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            period: Duration::from_millis(self.period_ms),
            frequency_hz: self.frequency_hz,
            ..PipelineOptions::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cabdemo={log_level},ptask={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = run(&cli).and_then(|report| {
        output::print_report(&report, cli.json);
        match report.unclean_tasks() {
            0 => Ok(()),
            n => Err(DemoError::UncleanShutdown(n).into()),
        }
    });

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<DemoError>().map_or(1, DemoError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

fn run(cli: &Cli) -> Result<RunReport> {
    let config = cli.runtime_config()?;
    let runtime = Runtime::new(config).map_err(DemoError::from)?;
    let options = cli.pipeline_options();

    let pipeline = match Pipeline::start(&runtime, &options) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            let _partial = runtime.shutdown();
            return Err(DemoError::from(err)).context("starting pipeline");
        }
    };
    tracing::info!(
        "running {} for {} ms",
        Pipeline::describe(runtime.tasks().policy(), &options),
        cli.duration_ms
    );

    thread::sleep(Duration::from_millis(cli.duration_ms));
    let shutdown = runtime.shutdown();
    Ok(RunReport::new(&runtime, &pipeline, &shutdown, cli.duration_ms))
}
