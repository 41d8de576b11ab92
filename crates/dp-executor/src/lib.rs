//! # dp-executor
//!
//! Runs the experiments described by a design sheet.
//!
//! Command templates are rendered once per design row and executed by a
//! [`PipelineExecutor`]. The [`LocalExecutor`] runs them as shell processes
//! on this machine, either one process per job or one batch process per
//! command step, and is polled without blocking.

mod local;
mod template;

pub use local::{ExecutorConfig, LocalExecutor};
pub use template::{render_jobs, CommandTemplate, Job};

use std::fs::File;
use std::path::Path;

use dp_types::{DesignSheet, DpResult, ResponseSheet};

/// State of the jobs started by the last `run_jobs` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
}

/// Executes the jobs of a design sheet.
pub trait PipelineExecutor: Send {
    /// Start one job per design row running `commands` in order.
    fn run_jobs(&mut self, design: &DesignSheet, commands: &[CommandTemplate]) -> DpResult<()>;

    /// Check on the started jobs without blocking.
    fn poll_jobs(&mut self) -> (JobStatus, String);

    /// Read the response sheet the jobs produced.
    fn collect_responses(&self, path: &Path) -> DpResult<ResponseSheet> {
        ResponseSheet::from_csv_reader(File::open(path)?)
    }
}
