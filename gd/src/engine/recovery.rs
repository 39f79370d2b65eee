//! Failure classification and plan rewriting

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{StepState, StoreError, Task, TaskState, TaskStep};
use crate::planner::Planner;

use super::core::TaskEngine;
use super::executor::{StepExecutor, StepOutcome};

/// In-memory re-attempts for a transient failure, before it is
/// recorded as a real failure
pub const MAX_TRANSIENT_RETRIES: u32 = 2;

const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "connection",
    "network",
    "rate limit",
    "temporarily unavailable",
    "retry",
    "reset",
];

/// Heuristic: does this error message look like a passing condition
/// rather than a wrong plan?
pub fn is_transient(error: &str) -> bool {
    let error = error.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| error.contains(p))
}

/// Drives transient retries and the replanning protocol
pub struct RecoveryController {
    executor: Arc<StepExecutor>,
    planner: Arc<dyn Planner>,
    backoff_base: Duration,
}

impl RecoveryController {
    pub fn new(executor: Arc<StepExecutor>, planner: Arc<dyn Planner>) -> Self {
        Self {
            executor,
            planner,
            backoff_base: Duration::from_secs(1),
        }
    }

    /// Shrink the backoff so tests do not sleep for real
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Execute a step, absorbing transient failures in memory
    ///
    /// Transient errors are re-attempted up to [`MAX_TRANSIENT_RETRIES`]
    /// times with doubling backoff. These attempts are invisible to the
    /// store and do not touch the step's retry counter; only the final
    /// outcome is returned to be recorded.
    pub async fn execute_with_retry(&self, task: &Task, step: &TaskStep) -> StepOutcome {
        let mut attempt = 0u32;
        loop {
            let outcome = self.executor.execute(task, step).await;
            match &outcome {
                StepOutcome::Failed { error } if is_transient(error) && attempt < MAX_TRANSIENT_RETRIES => {
                    let delay = self.backoff_base * 2u32.pow(attempt);
                    debug!(step_id = %step.id, attempt, ?delay, %error, "RecoveryController: transient failure, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => return outcome,
            }
        }
    }

    /// Ask the planner for a corrected continuation and splice it in
    ///
    /// On success the failed step and every still-pending step are
    /// retired as skipped, the recovery steps are appended, and the
    /// task goes back to running. A planner error or empty answer
    /// leaves the task untouched and reports no recovery.
    pub async fn attempt_recovery(
        &self,
        engine: &TaskEngine,
        task: &mut Task,
        failed_step_id: &str,
        error: &str,
    ) -> Result<bool, StoreError> {
        debug!(task_id = %task.id, %failed_step_id, "RecoveryController::attempt_recovery: called");

        let history = render_history(task);
        let failed = task.get_step(failed_step_id);
        let error_context = match failed {
            Some(step) => format!("Step '{}' ({}) failed: {error}", step.id, step.skill_name),
            None => format!("Step '{failed_step_id}' failed: {error}"),
        };

        let recovery_steps = match self.planner.replan(&task.goal, &history, &error_context).await {
            Ok(steps) if !steps.is_empty() => steps,
            Ok(_) => {
                warn!(task_id = %task.id, "RecoveryController: planner returned an empty recovery plan");
                return Ok(false);
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "RecoveryController: replanning failed");
                return Ok(false);
            }
        };

        for step in &mut task.steps {
            if step.id == failed_step_id {
                step.state = StepState::Skipped;
                step.error = Some(format!("Replaced by recovery: {error}"));
            } else if step.state == StepState::Pending {
                step.state = StepState::Skipped;
                step.error = Some("Plan changed".to_string());
            }
        }
        let count = recovery_steps.len();
        task.steps.extend(recovery_steps);
        task.state = TaskState::Running;
        engine.save_task(task)?;

        debug!(task_id = %task.id, recovery_steps = count, "RecoveryController: recovery plan spliced in");
        Ok(true)
    }
}

/// One-line-per-step account of the task so far, for the planner
pub fn render_history(task: &Task) -> String {
    let mut out = String::new();
    for step in &task.steps {
        let _ = write!(out, "- [{}] {} ({})", step.state, step.id, step.skill_name);
        if !step.skill_config.is_empty() {
            let config = serde_json::Value::Object(step.skill_config.clone()).to_string();
            let _ = write!(out, " config: {}", truncate(&config, 120));
        }
        if let Some(error) = &step.error {
            let _ = write!(out, " error: {error}");
        } else if let Some(output) = &step.output {
            let _ = write!(out, " output: {}", truncate(output, 200));
        }
        out.push('\n');
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
