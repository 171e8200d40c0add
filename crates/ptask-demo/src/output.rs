//! Output formatting for run reports

use anyhow::Error;
use colored::*;
use serde::Serialize;
use serde_json::json;

use ptask_runtime::{Runtime, ShutdownReport};
use ptask_scheduler::TaskId;

use crate::analysis::Analysis;
use crate::pipeline::Pipeline;

/// How a pipeline task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Joined,
    Panicked,
    TimedOut,
    Unknown,
}

/// Final statistics of one pipeline task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: &'static str,
    pub task: String,
    pub period_ms: u64,
    pub priority: u8,
    pub outcome: Outcome,
    /// Completed periods; absent if the task was not joined.
    pub activations: Option<u64>,
    pub deadline_misses: Option<u64>,
}

/// Everything cabdemo prints at exit.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub policy: String,
    pub duration_ms: u64,
    pub clean: bool,
    pub frames_published: u64,
    pub latest: Option<Analysis>,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn new(
        runtime: &Runtime,
        pipeline: &Pipeline,
        shutdown: &ShutdownReport,
        duration_ms: u64,
    ) -> Self {
        let tasks = pipeline
            .tasks()
            .iter()
            .map(|task| {
                let joined = shutdown.joined.iter().find(|s| s.id == task.id);
                TaskReport {
                    name: task.name,
                    task: task.id.to_string(),
                    period_ms: u64::try_from(task.params.period.as_millis()).unwrap_or(u64::MAX),
                    priority: task.params.priority,
                    outcome: outcome_of(shutdown, task.id),
                    activations: joined.map(|s| s.activations),
                    deadline_misses: joined.map(|s| s.miss_count),
                }
            })
            .collect();

        Self {
            policy: runtime.tasks().policy().to_string(),
            duration_ms,
            clean: shutdown.is_clean(),
            frames_published: pipeline.frames_published(),
            latest: pipeline.latest_analysis(),
            tasks,
        }
    }

    /// Tasks that panicked or did not stop in time.
    pub fn unclean_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, Outcome::Panicked | Outcome::TimedOut))
            .count()
    }
}

fn outcome_of(shutdown: &ShutdownReport, id: TaskId) -> Outcome {
    if shutdown.joined.iter().any(|s| s.id == id) {
        Outcome::Joined
    } else if shutdown.panicked.contains(&id) {
        Outcome::Panicked
    } else if shutdown.timed_out.contains(&id) {
        Outcome::TimedOut
    } else {
        Outcome::Unknown
    }
}

/// Print the run report in the requested format
pub fn print_report(report: &RunReport, json: bool) {
    if json {
        let output = json!({
            "success": report.clean,
            "report": report
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format report as JSON: {e}"),
        }
        return;
    }

    println!(
        "{} {} for {} ms",
        "Run:".bold(),
        report.policy.cyan(),
        report.duration_ms
    );
    println!("  Frames published: {}", report.frames_published);
    match &report.latest {
        Some(a) => println!(
            "  Latest analysis: frame {}, RMS {:.3}, pitch {:.1} Hz",
            a.seq, a.rms, a.pitch_hz
        ),
        None => println!("  {}", "No analysis published".yellow()),
    }

    println!("  {}:", "Tasks".bold());
    for task in &report.tasks {
        let outcome = match task.outcome {
            Outcome::Joined => "joined".green(),
            Outcome::Panicked => "panicked".red(),
            Outcome::TimedOut => "timed out".red(),
            Outcome::Unknown => "unknown".yellow(),
        };
        let misses = match task.deadline_misses {
            Some(0) => "0".green(),
            Some(n) => n.to_string().yellow(),
            None => "-".dimmed(),
        };
        println!(
            "    {:<9} {} every {} ms, {} activations, {} misses ({})",
            task.name,
            task.task.dimmed(),
            task.period_ms,
            task.activations.map_or_else(|| "-".to_owned(), |n| n.to_string()),
            misses,
            outcome
        );
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>()
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineOptions;
    use ptask_runtime::RuntimeConfig;
    use std::time::Duration;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_report_serializes_task_rows() -> TestResult {
        let runtime = Runtime::new(RuntimeConfig::default())?;
        let options = PipelineOptions {
            period: Duration::from_millis(2),
            ..PipelineOptions::default()
        };
        let pipeline = Pipeline::start(&runtime, &options)?;
        std::thread::sleep(Duration::from_millis(30));
        let shutdown = runtime.shutdown();

        let report = RunReport::new(&runtime, &pipeline, &shutdown, 30);
        assert!(report.clean);
        assert_eq!(report.unclean_tasks(), 0);
        assert_eq!(report.policy, "time_shared");

        let value = serde_json::to_value(&report)?;
        let names: Vec<_> = value["tasks"]
            .as_array()
            .ok_or("tasks is not an array")?
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, ["sampler", "analyzer", "reporter"]);
        assert_eq!(value["tasks"][0]["outcome"], "joined");
        assert_eq!(value["tasks"][0]["period_ms"], 2);
        Ok(())
    }

    #[test]
    fn test_outcome_of_missing_task_is_unknown() -> TestResult {
        let runtime = Runtime::new(RuntimeConfig::default())?;
        let id = runtime.tasks().init()?;
        assert_eq!(outcome_of(&ShutdownReport::default(), id), Outcome::Unknown);
        Ok(())
    }
}
