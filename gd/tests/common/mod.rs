//! Shared fixtures for integration tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use gantryd::domain::TaskStep;
use gantryd::engine::{RecoveryController, StepExecutor, TaskEngine, TaskRunner};
use gantryd::guard::{AuthorizationGate, PermissionPolicy};
use gantryd::planner::{PlanError, Planner};
use gantryd::skills::{Skill, SkillError, SkillRegistry};

/// Skill that replays a scripted sequence of results, then succeeds
pub struct MockSkill {
    name: &'static str,
    permissions: &'static [&'static str],
    outputs: Mutex<Vec<Value>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockSkill {
    pub fn new(name: &'static str, outputs: Vec<Value>) -> Self {
        Self {
            name,
            permissions: &["file_read"],
            outputs: Mutex::new(outputs),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_permissions(mut self, permissions: &'static [&'static str]) -> Self {
        self.permissions = permissions;
        self
    }

    /// Number of times `execute` ran
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Skill for MockSkill {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        "scripted test skill"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn permissions(&self) -> &'static [&'static str] {
        self.permissions
    }

    async fn execute(&self, _input: Value) -> Result<Value, SkillError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            Ok(json!({"success": true}))
        } else {
            Ok(outputs.remove(0))
        }
    }
}

/// Planner that replays a fixed recovery plan
pub struct ScriptedPlanner {
    recovery: Mutex<Vec<Vec<TaskStep>>>,
}

impl ScriptedPlanner {
    /// Each call to `replan` pops the next plan; further calls fail
    pub fn new(recovery_plans: Vec<Vec<TaskStep>>) -> Self {
        Self {
            recovery: Mutex::new(recovery_plans),
        }
    }

    pub fn never() -> Self {
        Self::new(vec![])
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, _goal: &str) -> Result<Vec<TaskStep>, PlanError> {
        Ok(vec![])
    }

    async fn replan(&self, _goal: &str, _history: &str, _error_context: &str) -> Result<Vec<TaskStep>, PlanError> {
        let mut plans = self.recovery.lock().unwrap();
        if plans.is_empty() {
            Err(PlanError::Parse("no more scripted plans".to_string()))
        } else {
            Ok(plans.remove(0))
        }
    }
}

pub fn step(id: &str, skill: &str) -> TaskStep {
    TaskStep::new(id, skill, Map::new())
}

pub fn step_with_deps(id: &str, skill: &str, deps: &[&str]) -> TaskStep {
    step(id, skill).with_dependencies(deps.iter().map(|d| d.to_string()).collect())
}

/// Build a runner over a fresh engine with fast timings and safe mode off
pub fn build_runner(
    root: &std::path::Path,
    registry: SkillRegistry,
    planner: Arc<dyn Planner>,
) -> (Arc<TaskEngine>, TaskRunner) {
    build_runner_with_gate(root, registry, planner, AuthorizationGate::new(PermissionPolicy::default(), false))
}

pub fn build_runner_with_gate(
    root: &std::path::Path,
    registry: SkillRegistry,
    planner: Arc<dyn Planner>,
    gate: AuthorizationGate,
) -> (Arc<TaskEngine>, TaskRunner) {
    let engine = Arc::new(TaskEngine::open(root).unwrap());
    let executor = Arc::new(StepExecutor::new(Arc::new(registry)));
    let recovery =
        RecoveryController::new(executor.clone(), planner).with_backoff_base(Duration::from_millis(1));
    let runner = TaskRunner::new(
        engine.clone(),
        executor,
        gate,
        recovery,
        Duration::from_millis(10),
        Duration::from_millis(0),
    );
    (engine, runner)
}
