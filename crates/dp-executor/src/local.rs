//! Shell execution on the local machine.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Child, Command};
use tracing::{debug, info, warn};

use dp_types::{DesignSheet, DpError, DpResult};

use crate::template::{render_jobs, CommandTemplate, Job};
use crate::{JobStatus, PipelineExecutor};

fn default_shell() -> String {
    "sh".to_string()
}

/// Settings of a [`LocalExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Run each step for all jobs in one batch process instead of one
    /// process per job.
    #[serde(default)]
    pub run_in_batch: bool,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            run_in_batch: false,
            shell: default_shell(),
            workdir: None,
        }
    }
}

/// Runs jobs as child processes of `shell -c`.
///
/// Per-job mode starts one process per design row that runs the row's steps
/// in order and stops at the first failing step. Batch mode starts one
/// process per step that runs the step for all jobs in parallel; the next
/// step is launched by `poll_jobs` once the current one has succeeded.
///
/// The first failure kills and reaps every remaining process and is reported
/// by `poll_jobs` until the next `run_jobs` or [`reset`](Self::reset).
pub struct LocalExecutor {
    config: ExecutorConfig,
    running: Vec<(String, Child)>,
    pending: VecDeque<(String, String)>,
    failure: Option<String>,
}

impl std::fmt::Debug for LocalExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let running: Vec<&str> = self.running.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("LocalExecutor")
            .field("config", &self.config)
            .field("running", &running)
            .field("pending_steps", &self.pending.len())
            .field("failure", &self.failure)
            .finish()
    }
}

impl LocalExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            running: Vec::new(),
            pending: VecDeque::new(),
            failure: None,
        }
    }

    pub fn per_job() -> Self {
        Self::new(ExecutorConfig::default())
    }

    pub fn batch() -> Self {
        Self::new(ExecutorConfig {
            run_in_batch: true,
            ..ExecutorConfig::default()
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Kill and reap all processes, drop pending steps and forget a failure.
    pub fn reset(&mut self) {
        self.terminate();
        self.failure = None;
    }

    fn terminate(&mut self) {
        self.pending.clear();
        for (name, mut child) in self.running.drain(..) {
            if let Err(e) = child.kill() {
                debug!("Could not kill {}: {}", name, e);
            }
            if let Err(e) = child.wait() {
                warn!("Could not reap {}: {}", name, e);
            }
        }
    }

    fn fail(&mut self, message: String) -> (JobStatus, String) {
        warn!("{}", message);
        self.terminate();
        self.failure = Some(message.clone());
        (JobStatus::Failed, message)
    }

    fn spawn(&mut self, name: String, script: &str) -> DpResult<()> {
        debug!("Starts {}: {}", name, script);
        let mut command = Command::new(&self.config.shell);
        command.arg("-c").arg(script);
        if let Some(dir) = &self.config.workdir {
            command.current_dir(dir);
        }
        let child = command
            .spawn()
            .map_err(|e| DpError::Executor(format!("failed to start {}: {}", name, e)))?;
        self.running.push((name, child));
        Ok(())
    }
}

/// Script running one job's steps in sequence.
fn job_script(job: &Job) -> String {
    job.commands
        .iter()
        .map(|c| format!("( {} )", c))
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Script running one step for every job in parallel; fails if any job
/// fails.
fn batch_script(jobs: &[Job], step: usize) -> String {
    let mut script = String::from("pids=''\n");
    for job in jobs {
        script.push_str(&format!("( {} ) &\npids=\"$pids $!\"\n", job.commands[step]));
    }
    script.push_str("status=0\n");
    script.push_str("for pid in $pids; do wait \"$pid\" || status=1; done\n");
    script.push_str("exit $status\n");
    script
}

impl PipelineExecutor for LocalExecutor {
    fn run_jobs(&mut self, design: &DesignSheet, commands: &[CommandTemplate]) -> DpResult<()> {
        if !self.running.is_empty() || !self.pending.is_empty() {
            return Err(DpError::Executor(
                "previous jobs are still registered".to_string(),
            ));
        }
        if commands.is_empty() {
            return Err(DpError::Executor("no commands to run".to_string()));
        }
        self.failure = None;
        let jobs = render_jobs(design, commands)?;
        info!(
            "Runs {} jobs with {} steps ({})",
            jobs.len(),
            commands.len(),
            if self.config.run_in_batch { "batch" } else { "per job" }
        );

        if self.config.run_in_batch {
            self.pending = commands
                .iter()
                .enumerate()
                .map(|(i, step)| (format!("step {}", step.name), batch_script(&jobs, i)))
                .collect();
            if let Some((name, script)) = self.pending.pop_front() {
                self.spawn(name, &script)?;
            }
        } else {
            for job in &jobs {
                self.spawn(job.name.clone(), &job_script(job))?;
            }
        }
        Ok(())
    }

    fn poll_jobs(&mut self) -> (JobStatus, String) {
        if let Some(message) = &self.failure {
            return (JobStatus::Failed, message.clone());
        }
        let mut still_running = Vec::new();
        let mut i = 0;
        while i < self.running.len() {
            let (name, child) = &mut self.running[i];
            match child.try_wait() {
                Ok(None) => {
                    still_running.push(name.clone());
                    i += 1;
                }
                Ok(Some(status)) if status.success() => {
                    debug!("{} finished", name);
                    self.running.remove(i);
                }
                Ok(Some(status)) => {
                    debug!("{} exited with {}", name, status);
                    let message = format!("{} has failed", name);
                    self.running.remove(i);
                    return self.fail(message);
                }
                Err(e) => {
                    let message = format!("{} could not be polled: {}", name, e);
                    return self.fail(message);
                }
            }
        }

        if !still_running.is_empty() {
            return (
                JobStatus::Running,
                format!("{} still running", still_running.join(", ")),
            );
        }
        if let Some((name, script)) = self.pending.pop_front() {
            let message = format!("{} started", name);
            return match self.spawn(name, &script) {
                Ok(()) => (JobStatus::Running, message),
                Err(e) => self.fail(e.to_string()),
            };
        }
        (JobStatus::Finished, "no jobs running.".to_string())
    }
}

impl Drop for LocalExecutor {
    fn drop(&mut self) {
        self.terminate();
    }
}
