//! Command templates and their per-row rendering.

use serde::{Deserialize, Serialize};

use dp_types::{DesignSheet, DpError, DpResult};

/// Placeholder replaced by the job name.
const JOB_PLACEHOLDER: &str = "job";

/// One pipeline step.
///
/// `{factor}` placeholders are replaced by the factor value of the job's
/// design row and `{job}` by the job name. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub name: String,
    pub template: String,
}

impl CommandTemplate {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Render this step for one job.
    pub fn render(&self, job: &str, design: &DesignSheet, row: usize) -> DpResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let key: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    if key == JOB_PLACEHOLDER {
                        out.push_str(job);
                    } else {
                        let value = design.value(row, &key).ok_or_else(|| {
                            DpError::Executor(format!(
                                "step {}: unknown placeholder {{{}}}",
                                self.name, key
                            ))
                        })?;
                        out.push_str(&value.to_string());
                    }
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

/// Rendered commands of one design row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    /// One rendered command per step, in step order.
    pub commands: Vec<String>,
}

/// Render every step for every design row. Jobs are named `job_1`,
/// `job_2`, ... in row order.
pub fn render_jobs(design: &DesignSheet, commands: &[CommandTemplate]) -> DpResult<Vec<Job>> {
    (0..design.n_rows())
        .map(|row| {
            let name = format!("job_{}", row + 1);
            let commands = commands
                .iter()
                .map(|step| step.render(&name, design, row))
                .collect::<DpResult<Vec<_>>>()?;
            Ok(Job { name, commands })
        })
        .collect()
}
