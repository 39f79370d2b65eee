//! Durable task state transitions

use std::path::PathBuf;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{FileStore, StepState, StoreError, Task, TaskStep};

use super::scheduler;

/// Persistence-backed task engine
///
/// Every mutation goes through a method here and is saved before it is
/// considered visible to other actors. Saves are atomic per task and
/// last-write-wins.
pub struct TaskEngine {
    store: FileStore,
}

impl TaskEngine {
    /// Open an engine storing tasks under `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            store: FileStore::open(root)?,
        })
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Create and persist a new task for a goal
    pub fn create_task(&self, goal: impl Into<String>, steps: Vec<TaskStep>) -> Result<Task, StoreError> {
        let mut task = Task::new(goal, steps);
        debug!(task_id = %task.id, steps = task.steps.len(), "TaskEngine::create_task: called");
        self.save_task(&mut task)?;
        Ok(task)
    }

    /// Persist the task, bumping its update timestamp
    pub fn save_task(&self, task: &mut Task) -> Result<(), StoreError> {
        task.updated_at = Utc::now();
        self.store.save(task)
    }

    /// Load a task by id
    pub fn load_task(&self, task_id: &Uuid) -> Result<Task, StoreError> {
        self.store.load(&task_id.to_string())
    }

    /// All known tasks, newest first
    pub fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.store.list()?;
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Transition a step and persist the task
    ///
    /// A `Failed` transition increments the step's retry counter
    /// exactly once. `Running` stamps `started_at` on first entry;
    /// `Completed` and `Failed` stamp `completed_at`.
    pub fn update_step_state(
        &self,
        task: &mut Task,
        step_id: &str,
        state: StepState,
        output: Option<String>,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        debug!(task_id = %task.id, %step_id, %state, "TaskEngine::update_step_state: called");
        if let Some(step) = task.get_step_mut(step_id) {
            step.state = state;
            if let Some(output) = output {
                step.output = Some(output);
            }
            if let Some(error) = error {
                step.error = Some(error);
            }
            if state == StepState::Failed {
                step.retry_count += 1;
            }
            if state == StepState::Completed {
                // Clear stale messages from earlier blocked or failed attempts.
                step.error = None;
            }
            if state == StepState::Running && step.started_at.is_none() {
                step.started_at = Some(Utc::now());
            }
            if matches!(state, StepState::Completed | StepState::Failed) {
                step.completed_at = Some(Utc::now());
            }
            self.save_task(task)?;
        }
        Ok(())
    }

    /// Fail a step with its retry budget spent, so the scheduler never
    /// re-offers it (unknown capability, and nothing else, ends here)
    pub fn fail_step_terminal(&self, task: &mut Task, step_id: &str, error: String) -> Result<(), StoreError> {
        debug!(task_id = %task.id, %step_id, "TaskEngine::fail_step_terminal: called");
        if let Some(step) = task.get_step_mut(step_id) {
            step.state = StepState::Failed;
            step.error = Some(error);
            step.retry_count = step.max_retries;
            step.completed_at = Some(Utc::now());
            self.save_task(task)?;
        }
        Ok(())
    }

    /// Append a step to the task's graph and persist
    pub fn add_step(&self, task: &mut Task, step: TaskStep) -> Result<(), StoreError> {
        debug!(task_id = %task.id, step_id = %step.id, "TaskEngine::add_step: called");
        task.steps.push(step);
        self.save_task(task)
    }

    /// Check whether the task has reached a terminal state, persisting
    /// the state if so
    ///
    /// Steps merely blocked on approval keep the task undecided.
    pub fn check_task_completion(&self, task: &mut Task) -> Result<bool, StoreError> {
        match scheduler::evaluate_completion(task) {
            Some(state) => {
                debug!(task_id = %task.id, %state, "TaskEngine::check_task_completion: terminal");
                task.state = state;
                self.save_task(task)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Operator surface: set the external approval flag on a step and
    /// persist. This is the only out-of-band write path into a running
    /// task.
    pub fn approve_step(&self, task_id: &Uuid, step_id: &str) -> Result<(), StoreError> {
        debug!(%task_id, %step_id, "TaskEngine::approve_step: called");
        let mut task = self.load_task(task_id)?;
        match task.get_step_mut(step_id) {
            Some(step) => step.approve(),
            None => {
                return Err(StoreError::NotFound {
                    kind: "steps",
                    id: step_id.to_string(),
                });
            }
        }
        self.save_task(&mut task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::tempdir;

    fn step(id: &str) -> TaskStep {
        TaskStep::new(id, "file_read", Map::new())
    }

    #[test]
    fn test_create_and_reload_round_trip() {
        let temp = tempdir().unwrap();
        let engine = TaskEngine::open(temp.path()).unwrap();

        let steps = vec![step("a"), step("b").with_dependencies(vec!["a".to_string()])];
        let task = engine.create_task("demo", steps).unwrap();

        let loaded = engine.load_task(&task.id).unwrap();
        assert_eq!(loaded.goal, "demo");
        let ids: Vec<&str> = loaded.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(loaded.steps[1].dependencies, vec!["a"]);
    }

    #[test]
    fn test_failed_transition_increments_retry_count_once() {
        let temp = tempdir().unwrap();
        let engine = TaskEngine::open(temp.path()).unwrap();
        let mut task = engine.create_task("demo", vec![step("a")]).unwrap();

        engine
            .update_step_state(&mut task, "a", StepState::Failed, None, Some("boom".to_string()))
            .unwrap();
        assert_eq!(task.get_step("a").unwrap().retry_count, 1);
        assert_eq!(task.get_step("a").unwrap().error.as_deref(), Some("boom"));

        // Non-failed transitions leave the counter alone.
        engine
            .update_step_state(&mut task, "a", StepState::Running, None, None)
            .unwrap();
        assert_eq!(task.get_step("a").unwrap().retry_count, 1);
    }

    #[test]
    fn test_running_stamps_started_at_once() {
        let temp = tempdir().unwrap();
        let engine = TaskEngine::open(temp.path()).unwrap();
        let mut task = engine.create_task("demo", vec![step("a")]).unwrap();

        engine
            .update_step_state(&mut task, "a", StepState::Running, None, None)
            .unwrap();
        let first = task.get_step("a").unwrap().started_at;
        assert!(first.is_some());

        engine
            .update_step_state(&mut task, "a", StepState::Running, None, None)
            .unwrap();
        assert_eq!(task.get_step("a").unwrap().started_at, first);
    }

    #[test]
    fn test_fail_step_terminal_exhausts_retries() {
        let temp = tempdir().unwrap();
        let engine = TaskEngine::open(temp.path()).unwrap();
        let mut task = engine.create_task("demo", vec![step("a")]).unwrap();

        engine
            .fail_step_terminal(&mut task, "a", "Skill 'nope' not found".to_string())
            .unwrap();
        let s = task.get_step("a").unwrap();
        assert_eq!(s.state, StepState::Failed);
        assert!(s.retries_exhausted());
    }

    #[test]
    fn test_approve_step_visible_to_fresh_load() {
        let temp = tempdir().unwrap();
        let engine = TaskEngine::open(temp.path()).unwrap();
        let task = engine.create_task("demo", vec![step("a")]).unwrap();

        engine.approve_step(&task.id, "a").unwrap();

        let loaded = engine.load_task(&task.id).unwrap();
        assert!(loaded.get_step("a").unwrap().is_approved());
    }

    #[test]
    fn test_approve_unknown_step_is_not_found() {
        let temp = tempdir().unwrap();
        let engine = TaskEngine::open(temp.path()).unwrap();
        let task = engine.create_task("demo", vec![step("a")]).unwrap();

        let err = engine.approve_step(&task.id, "zz").unwrap_err();
        assert!(err.is_not_found());
    }
}
