//! The three periodic tasks of the demo and the CABs connecting them.
//!
//! ```text
//! sampler --[frames]--> analyzer --[analysis]--> reporter
//! ```
//!
//! Each CAB has one reader task, so three buffers are enough for the writer
//! to always find a free one.

use std::sync::Arc;
use std::time::Duration;

use ptask_cab::Cab;
use ptask_errors::PtaskResult;
use ptask_runtime::Runtime;
use ptask_scheduler::{SchedPolicy, TaskId, TaskParams};

use crate::analysis::{Analysis, Frame, SineSource, analyze};

const BUFFERS_PER_CAB: usize = 3;

/// Knobs of one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Sampler period; the analyzer runs at twice and the reporter at ten
    /// times this period.
    pub period: Duration,
    pub frequency_hz: f32,
    pub amplitude: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            frequency_hz: 440.0,
            amplitude: 0.8,
        }
    }
}

/// A task started by the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTask {
    pub name: &'static str,
    pub id: TaskId,
    pub params: TaskParams,
}

/// Running pipeline: its CABs and the tasks feeding them.
#[derive(Debug)]
pub struct Pipeline {
    frames: Arc<Cab<Frame>>,
    analyses: Arc<Cab<Analysis>>,
    tasks: Vec<PipelineTask>,
}

impl Pipeline {
    /// Create both CABs and start the sampler, analyzer and reporter.
    ///
    /// Under a real-time policy the sampler gets the highest priority.
    pub fn start(runtime: &Runtime, options: &PipelineOptions) -> PtaskResult<Self> {
        let frames = runtime
            .cabs()
            .create("frames", vec![Frame::default(); BUFFERS_PER_CAB])?;
        let analyses = runtime
            .cabs()
            .create("analysis", vec![Analysis::default(); BUFFERS_PER_CAB])?;

        let real_time = runtime.tasks().policy().is_real_time();
        let params = |multiple: u32, rt_priority: u8| {
            TaskParams::new(options.period.saturating_mul(multiple))
                .with_priority(if real_time { rt_priority } else { 0 })
        };

        let mut pipeline = Self {
            frames,
            analyses,
            tasks: Vec::with_capacity(3),
        };
        pipeline.spawn_sampler(runtime, params(1, 30), options)?;
        pipeline.spawn_analyzer(runtime, params(2, 20))?;
        pipeline.spawn_reporter(runtime, params(10, 10))?;
        Ok(pipeline)
    }

    fn spawn_sampler(
        &mut self,
        runtime: &Runtime,
        params: TaskParams,
        options: &PipelineOptions,
    ) -> PtaskResult {
        let frames = Arc::clone(&self.frames);
        let mut source = SineSource::new(options.frequency_hz, options.amplitude);
        let mut seq = 0_u64;

        let id = runtime.spawn_periodic(params, move |_task| {
            seq = seq.wrapping_add(1);
            let published = frames.write_with(|frame| {
                frame.seq = seq;
                source.fill(&mut frame.samples);
            });
            if let Err(err) = published {
                tracing::warn!(seq, error = %err, "frame dropped");
            }
        })?;
        self.record("sampler", id, params);
        Ok(())
    }

    fn spawn_analyzer(&mut self, runtime: &Runtime, params: TaskParams) -> PtaskResult {
        let frames = Arc::clone(&self.frames);
        let analyses = Arc::clone(&self.analyses);
        let mut last_seq = 0_u64;

        let id = runtime.spawn_periodic(params, move |_task| {
            let Ok(result) = frames.read_with(|frame, _at| analyze(frame)) else {
                return;
            };
            if result.seq == last_seq {
                return;
            }
            last_seq = result.seq;
            if let Err(err) = analyses.write_with(|slot| *slot = result) {
                tracing::warn!(seq = result.seq, error = %err, "analysis dropped");
            }
        })?;
        self.record("analyzer", id, params);
        Ok(())
    }

    fn spawn_reporter(&mut self, runtime: &Runtime, params: TaskParams) -> PtaskResult {
        let analyses = Arc::clone(&self.analyses);

        let id = runtime.spawn_periodic(params, move |task| {
            match analyses.read_with(|analysis, at| (*analysis, at)) {
                Ok((analysis, at)) => tracing::info!(
                    seq = analysis.seq,
                    rms = analysis.rms,
                    pitch_hz = analysis.pitch_hz,
                    published = %at,
                    misses = task.miss_count(),
                    "latest analysis"
                ),
                Err(_) => tracing::debug!("no analysis yet"),
            }
        })?;
        self.record("reporter", id, params);
        Ok(())
    }

    fn record(&mut self, name: &'static str, id: TaskId, params: TaskParams) {
        tracing::debug!(task = %id, name, period = ?params.period, "pipeline task started");
        self.tasks.push(PipelineTask { name, id, params });
    }

    /// Tasks in start order.
    pub fn tasks(&self) -> &[PipelineTask] {
        &self.tasks
    }

    /// Sequence number of the newest published frame.
    pub fn frames_published(&self) -> u64 {
        self.frames.read_with(|frame, _at| frame.seq).unwrap_or(0)
    }

    /// Newest published analysis.
    pub fn latest_analysis(&self) -> Option<Analysis> {
        self.analyses.read_with(|analysis, _at| *analysis).ok()
    }

    /// One-line summary of a run, for logs.
    pub fn describe(policy: SchedPolicy, options: &PipelineOptions) -> String {
        format!(
            "{policy} sampler every {:?}, {} Hz tone",
            options.period, options.frequency_hz
        )
    }
}
