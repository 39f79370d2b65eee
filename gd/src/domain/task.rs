//! Task and step records

use chrono::{DateTime, Utc};
use gantrystore::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Overall state of a task
///
/// Derived from the states of its steps, except for the `Running`
/// transition the run loop applies when it picks the task up. A task
/// never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// True if the task can never execute again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Blocked => "blocked",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// State of a single step
///
/// `Blocked` means runnable by dependency but held for an explicit
/// external approval, distinct from waiting on dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Blocked,
    Completed,
    Failed,
    Skipped,
}

impl StepState {
    /// True if the step can never execute again
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Skipped)
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Blocked => "blocked",
            StepState::Completed => "completed",
            StepState::Failed => "failed",
            StepState::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A named byproduct of a step, attached to the task for traceability
///
/// Never consumed by scheduling logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Create an artifact with inline content
    pub fn new(name: impl Into<String>, content: Option<String>, path: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            content,
            path,
            created_at: Utc::now(),
        }
    }
}

/// One node in a task's execution graph, bound to a single skill invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStep {
    /// Identifier unique within the task (e.g. "research_api"),
    /// referenced by other steps' dependency lists
    pub id: String,

    /// Name of the skill to execute
    pub skill_name: String,

    /// Configuration/inputs for the skill, interpreted only by it
    #[serde(default)]
    pub skill_config: Map<String, Value>,

    pub state: StepState,

    /// Opaque result, set once on success
    #[serde(default)]
    pub output: Option<String>,

    /// Error message, set on failure
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Ids of steps that must complete first
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_max_retries() -> u32 {
    3
}

impl TaskStep {
    /// Create a pending step with default retry bounds
    pub fn new(id: impl Into<String>, skill_name: impl Into<String>, skill_config: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            skill_name: skill_name.into(),
            skill_config,
            state: StepState::Pending,
            output: None,
            error: None,
            retry_count: 0,
            max_retries: default_max_retries(),
            dependencies: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// True if the step's retry budget is spent
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// True if the step carries an externally-set approval flag
    pub fn is_approved(&self) -> bool {
        self.skill_config.get("approved").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Set the approval flag on the step's configuration
    pub fn approve(&mut self) {
        self.skill_config.insert("approved".to_string(), Value::Bool(true));
    }
}

/// A goal with its ordered step graph and shared context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub goal: String,

    pub steps: Vec<TaskStep>,
    pub state: TaskState,

    #[serde(default)]
    pub artifacts: Vec<Artifact>,

    /// Shared context/memory for the task
    #[serde(default)]
    pub context: Map<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with a freshly generated identifier
    pub fn new(goal: impl Into<String>, steps: Vec<TaskStep>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            goal: goal.into(),
            steps,
            state: TaskState::Pending,
            artifacts: Vec::new(),
            context: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get_step(&self, step_id: &str) -> Option<&TaskStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn get_step_mut(&mut self, step_id: &str) -> Option<&mut TaskStep> {
        self.steps.iter_mut().find(|s| s.id == step_id)
    }

    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }
}

impl Record for Task {
    const KIND: &'static str = "tasks";

    fn record_id(&self) -> String {
        self.id.to_string()
    }
}
