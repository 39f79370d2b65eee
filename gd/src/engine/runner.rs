//! The task run loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Artifact, StepState, Task, TaskState};
use crate::guard::{AuthorizationGate, GateDecision};

use super::core::TaskEngine;
use super::executor::{StepExecutor, StepOutcome};
use super::recovery::RecoveryController;
use super::scheduler;

/// Cooperative cancellation flag shared with whoever started the run
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives one task from its current state to a terminal state
///
/// One step executes at a time. Every state change is persisted before
/// the loop moves on, so a killed process resumes exactly where it
/// stopped.
pub struct TaskRunner {
    engine: Arc<TaskEngine>,
    executor: Arc<StepExecutor>,
    gate: AuthorizationGate,
    recovery: RecoveryController,
    poll_interval: Duration,
    step_delay: Duration,
    cancel: CancelHandle,
}

impl TaskRunner {
    pub fn new(
        engine: Arc<TaskEngine>,
        executor: Arc<StepExecutor>,
        gate: AuthorizationGate,
        recovery: RecoveryController,
        poll_interval: Duration,
        step_delay: Duration,
    ) -> Self {
        Self {
            engine,
            executor,
            gate,
            recovery,
            poll_interval,
            step_delay,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle for cancelling this run from another task or thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run the task to a terminal state
    ///
    /// Resumable: a task loaded mid-flight picks up from its persisted
    /// step states. Blocked steps park the task and the loop polls the
    /// store for approvals or cancellation.
    pub async fn run(&self, task_id: &Uuid) -> eyre::Result<TaskState> {
        let mut task = self.engine.load_task(task_id)?;
        info!(task_id = %task.id, goal = %task.goal, "TaskRunner::run: starting");

        if task.state.is_terminal() {
            return Ok(task.state);
        }
        // A step left running means a previous process died mid-step.
        // Nothing is in flight here, so it goes back to the pool.
        for step in &mut task.steps {
            if step.state == StepState::Running {
                info!(step_id = %step.id, "TaskRunner::run: resetting orphaned running step");
                step.state = StepState::Pending;
            }
        }
        task.state = TaskState::Running;
        self.engine.save_task(&mut task)?;

        loop {
            if self.cancel.is_cancelled() {
                info!(task_id = %task.id, "TaskRunner::run: cancelled");
                task.state = TaskState::Cancelled;
                self.engine.save_task(&mut task)?;
                return Ok(TaskState::Cancelled);
            }
            // Another process may have finalized the task (gd cancel)
            // since the last save; its terminal state wins.
            let stored = self.engine.load_task(&task.id)?;
            if stored.state.is_terminal() {
                info!(task_id = %task.id, state = %stored.state, "TaskRunner::run: finalized externally");
                task.state = stored.state;
                return Ok(stored.state);
            }

            let next = scheduler::runnable_steps(&task).first().map(|s| s.id.clone());
            match next {
                Some(step_id) => {
                    if let Some(state) = self.run_step(&mut task, &step_id).await? {
                        task.state = state;
                        return Ok(state);
                    }
                    if self.engine.check_task_completion(&mut task)? {
                        break;
                    }
                    tokio::time::sleep(self.step_delay).await;
                }
                None => {
                    if self.engine.check_task_completion(&mut task)? {
                        break;
                    }
                    if scheduler::has_blocked_steps(&task) {
                        if task.state != TaskState::Blocked {
                            info!(task_id = %task.id, "TaskRunner::run: waiting for approval");
                            task.state = TaskState::Blocked;
                            self.engine.save_task(&mut task)?;
                        }
                        tokio::time::sleep(self.poll_interval).await;
                        if self.sync_external(&mut task)? {
                            return Ok(TaskState::Cancelled);
                        }
                    } else {
                        // Remaining pending steps depend on skipped or
                        // running-state debris; nothing can ever progress.
                        warn!(task_id = %task.id, "TaskRunner::run: no runnable steps and task is not complete");
                        task.state = TaskState::Failed;
                        self.engine.save_task(&mut task)?;
                        break;
                    }
                }
            }
        }

        info!(task_id = %task.id, state = %task.state, "TaskRunner::run: finished");
        Ok(task.state)
    }

    /// Gate, execute, and record one step
    ///
    /// Returns `Some(state)` when the task was finalized externally
    /// while the step executed; the outcome is discarded unrecorded so
    /// the terminal state in the store is not overwritten.
    async fn run_step(&self, task: &mut Task, step_id: &str) -> eyre::Result<Option<TaskState>> {
        let skill_name = match task.get_step(step_id) {
            Some(step) => step.skill_name.clone(),
            None => return Ok(None),
        };

        let skill = match self.executor.registry().get(&skill_name) {
            Some(skill) => skill,
            None => {
                // No amount of retrying invents a capability.
                self.engine
                    .fail_step_terminal(task, step_id, format!("Skill '{skill_name}' not found"))?;
                return Ok(None);
            }
        };

        match self.gate.authorize(&self.engine, task, step_id, skill.as_ref()).await? {
            GateDecision::Blocked { permission } => {
                self.engine.update_step_state(
                    task,
                    step_id,
                    StepState::Blocked,
                    None,
                    Some(format!("Awaiting approval for permission '{permission}'")),
                )?;
            }
            GateDecision::Rejected { reason } => {
                self.engine
                    .update_step_state(task, step_id, StepState::Failed, None, Some(reason))?;
            }
            GateDecision::Proceed => {
                self.engine
                    .update_step_state(task, step_id, StepState::Running, None, None)?;
                let step = task
                    .get_step(step_id)
                    .cloned()
                    .ok_or_else(|| eyre::eyre!("step '{step_id}' vanished mid-run"))?;

                let outcome = self.recovery.execute_with_retry(task, &step).await;

                // The skill may have run for a long time; a cancel
                // written meanwhile must not be clobbered by recording
                // the outcome.
                let stored = self.engine.load_task(&task.id)?;
                if stored.state.is_terminal() {
                    info!(task_id = %task.id, %step_id, state = %stored.state, "TaskRunner::run_step: finalized externally mid-step");
                    return Ok(Some(stored.state));
                }

                match outcome {
                    StepOutcome::Completed { output } => {
                        debug!(%step_id, "TaskRunner::run_step: completed");
                        record_artifact(task, step_id, &output);
                        self.engine
                            .update_step_state(task, step_id, StepState::Completed, Some(output), None)?;
                    }
                    StepOutcome::UnknownSkill { error } => {
                        self.engine.fail_step_terminal(task, step_id, error)?;
                    }
                    StepOutcome::Failed { error } => {
                        info!(%step_id, %error, "TaskRunner::run_step: failed");
                        self.engine.update_step_state(
                            task,
                            step_id,
                            StepState::Failed,
                            None,
                            Some(error.clone()),
                        )?;
                        self.recovery
                            .attempt_recovery(&self.engine, task, step_id, &error)
                            .await?;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Fold in writes made by other processes while we were parked
    ///
    /// Returns true when the store says the task was cancelled
    /// externally.
    fn sync_external(&self, task: &mut Task) -> eyre::Result<bool> {
        let latest = self.engine.load_task(&task.id)?;
        if latest.state == TaskState::Cancelled {
            info!(task_id = %task.id, "TaskRunner::sync_external: cancelled externally");
            task.state = TaskState::Cancelled;
            return Ok(true);
        }

        let mut released = false;
        for step in &mut task.steps {
            if step.state != StepState::Blocked {
                continue;
            }
            let approved = latest.get_step(&step.id).map(|s| s.is_approved()).unwrap_or(false);
            if approved {
                info!(step_id = %step.id, "TaskRunner::sync_external: approval observed, releasing step");
                step.approve();
                step.state = StepState::Pending;
                released = true;
            }
        }
        if released {
            task.state = TaskState::Running;
            self.engine.save_task(task)?;
        }
        Ok(false)
    }
}

/// Attach an artifact when a step's output names a file it produced
fn record_artifact(task: &mut Task, step_id: &str, output: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(output) else {
        return;
    };
    if let Some(path) = value.get("path").and_then(serde_json::Value::as_str) {
        task.add_artifact(Artifact::new(step_id, None, Some(path.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStep;
    use crate::guard::PermissionPolicy;
    use crate::planner::{PlanError, Planner};
    use crate::skills::{Skill, SkillError, SkillRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Skill that replays a scripted sequence of outputs
    struct ScriptedSkill {
        outputs: Mutex<Vec<Result<Value, SkillError>>>,
    }

    impl ScriptedSkill {
        fn new(outputs: Vec<Result<Value, SkillError>>) -> Self {
            Self {
                outputs: Mutex::new(outputs),
            }
        }
    }

    #[async_trait]
    impl Skill for ScriptedSkill {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn description(&self) -> &'static str {
            "test skill"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn permissions(&self) -> &'static [&'static str] {
            &["file_read"]
        }

        async fn execute(&self, _input: Value) -> Result<Value, SkillError> {
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.is_empty() {
                Ok(json!({"success": true}))
            } else {
                outputs.remove(0)
            }
        }
    }

    struct NoRecovery;

    #[async_trait]
    impl Planner for NoRecovery {
        async fn plan(&self, _goal: &str) -> Result<Vec<TaskStep>, PlanError> {
            Ok(vec![])
        }

        async fn replan(
            &self,
            _goal: &str,
            _history: &str,
            _error_context: &str,
        ) -> Result<Vec<TaskStep>, PlanError> {
            Err(PlanError::Parse("no recovery in this test".to_string()))
        }
    }

    fn runner_with(registry: SkillRegistry, root: &std::path::Path) -> (Arc<TaskEngine>, TaskRunner) {
        let engine = Arc::new(TaskEngine::open(root).unwrap());
        let executor = Arc::new(StepExecutor::new(Arc::new(registry)));
        let gate = AuthorizationGate::new(PermissionPolicy::default(), false);
        let recovery = RecoveryController::new(executor.clone(), Arc::new(NoRecovery))
            .with_backoff_base(Duration::from_millis(1));
        let runner = TaskRunner::new(
            engine.clone(),
            executor,
            gate,
            recovery,
            Duration::from_millis(5),
            Duration::from_millis(0),
        );
        (engine, runner)
    }

    fn scripted_step(id: &str, deps: &[&str]) -> TaskStep {
        TaskStep::new(id, "scripted", Map::new())
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    #[tokio::test]
    async fn test_runs_dependency_chain_to_completion() {
        let temp = tempdir().unwrap();
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(ScriptedSkill::new(vec![])));
        let (engine, runner) = runner_with(registry, temp.path());

        let task = engine
            .create_task("chain", vec![scripted_step("a", &[]), scripted_step("b", &["a"])])
            .unwrap();

        let state = runner.run(&task.id).await.unwrap();
        assert_eq!(state, TaskState::Completed);

        let loaded = engine.load_task(&task.id).unwrap();
        assert_eq!(loaded.get_step("a").unwrap().state, StepState::Completed);
        assert_eq!(loaded.get_step("b").unwrap().state, StepState::Completed);
    }

    #[tokio::test]
    async fn test_unknown_skill_fails_task_without_retries() {
        let temp = tempdir().unwrap();
        let (engine, runner) = runner_with(SkillRegistry::new(), temp.path());

        let task = engine
            .create_task("oops", vec![TaskStep::new("a", "teleport", Map::new())])
            .unwrap();

        let state = runner.run(&task.id).await.unwrap();
        assert_eq!(state, TaskState::Failed);

        let loaded = engine.load_task(&task.id).unwrap();
        let a = loaded.get_step("a").unwrap();
        assert!(a.retries_exhausted());
        assert_eq!(a.error.as_deref(), Some("Skill 'teleport' not found"));
    }

    #[tokio::test]
    async fn test_persistent_failure_exhausts_retries_and_fails_task() {
        let temp = tempdir().unwrap();
        let mut registry = SkillRegistry::new();
        // Always fails with a non-transient error; no recovery plan.
        registry.register(Arc::new(ScriptedSkill::new(vec![
            Ok(json!({"success": false, "error": "bad input"})),
            Ok(json!({"success": false, "error": "bad input"})),
            Ok(json!({"success": false, "error": "bad input"})),
        ])));
        let (engine, runner) = runner_with(registry, temp.path());

        let task = engine.create_task("stubborn", vec![scripted_step("a", &[])]).unwrap();
        let state = runner.run(&task.id).await.unwrap();
        assert_eq!(state, TaskState::Failed);

        let loaded = engine.load_task(&task.id).unwrap();
        let a = loaded.get_step("a").unwrap();
        assert_eq!(a.retry_count, a.max_retries);
    }

    #[tokio::test]
    async fn test_step_output_path_becomes_artifact() {
        let temp = tempdir().unwrap();
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(ScriptedSkill::new(vec![Ok(json!({
            "success": true,
            "path": "/tmp/report.txt"
        }))])));
        let (engine, runner) = runner_with(registry, temp.path());

        let task = engine.create_task("produce", vec![scripted_step("a", &[])]).unwrap();
        runner.run(&task.id).await.unwrap();

        let loaded = engine.load_task(&task.id).unwrap();
        assert_eq!(loaded.artifacts.len(), 1);
        assert_eq!(loaded.artifacts[0].name, "a");
        assert_eq!(loaded.artifacts[0].path.as_deref(), Some("/tmp/report.txt"));
    }

    #[tokio::test]
    async fn test_cancel_handle_stops_the_run() {
        let temp = tempdir().unwrap();
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(ScriptedSkill::new(vec![])));
        let (engine, runner) = runner_with(registry, temp.path());

        let task = engine.create_task("halt", vec![scripted_step("a", &[])]).unwrap();
        runner.cancel_handle().cancel();

        let state = runner.run(&task.id).await.unwrap();
        assert_eq!(state, TaskState::Cancelled);
        assert_eq!(engine.load_task(&task.id).unwrap().state, TaskState::Cancelled);
    }
}
