//! Step execution and outcome classification

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{StepState, Task, TaskStep};
use crate::skills::SkillRegistry;

/// Normalized result of running one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { output: String },
    Failed { error: String },
    /// The step names a skill the registry does not know. Retrying
    /// cannot help, so this is surfaced separately from `Failed`.
    UnknownSkill { error: String },
}

/// Runs steps through the skill registry and normalizes their results
pub struct StepExecutor {
    registry: Arc<SkillRegistry>,
}

impl StepExecutor {
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Execute one step and classify its outcome
    ///
    /// The skill's raw JSON output is preserved verbatim in
    /// `Completed::output` so downstream steps can mine it.
    pub async fn execute(&self, task: &Task, step: &TaskStep) -> StepOutcome {
        debug!(task_id = %task.id, step_id = %step.id, skill = %step.skill_name, "StepExecutor::execute: called");

        let skill = match self.registry.get(&step.skill_name) {
            Some(skill) => skill,
            None => {
                return StepOutcome::UnknownSkill {
                    error: format!("Skill '{}' not found", step.skill_name),
                };
            }
        };

        let config = resolve_config(task, step);
        if let Err(missing) = check_required(&skill.input_schema(), &config) {
            return StepOutcome::Failed {
                error: format!("Missing required input '{missing}' for skill '{}'", step.skill_name),
            };
        }

        match skill.execute(Value::Object(config)).await {
            Ok(output) => classify_output(&output),
            Err(e) => StepOutcome::Failed { error: e.to_string() },
        }
    }
}

/// Check the config against the schema's `required` list
fn check_required(schema: &Value, config: &Map<String, Value>) -> Result<(), String> {
    let required = schema.get("required").and_then(Value::as_array);
    for key in required.into_iter().flatten().filter_map(Value::as_str) {
        if !config.contains_key(key) {
            return Err(key.to_string());
        }
    }
    Ok(())
}

/// Fill in input the planner left implicit
///
/// A `computer_control` click without coordinates inherits them from
/// the most recent earlier step whose output carried a `coordinates`
/// pair, so a "find the button" step can feed the click that follows.
fn resolve_config(task: &Task, step: &TaskStep) -> Map<String, Value> {
    let mut config = step.skill_config.clone();

    let is_bare_click = step.skill_name == "computer_control"
        && config.get("action").and_then(Value::as_str) == Some("click")
        && (!config.contains_key("x") || !config.contains_key("y"));
    if !is_bare_click {
        return config;
    }

    match find_prior_coordinates(task, &step.id) {
        Some((x, y)) => {
            debug!(step_id = %step.id, x, y, "StepExecutor: backfilled click coordinates");
            config.insert("x".to_string(), Value::from(x));
            config.insert("y".to_string(), Value::from(y));
        }
        None => warn!(step_id = %step.id, "StepExecutor: click without coordinates and no prior step provides any"),
    }
    config
}

fn find_prior_coordinates(task: &Task, step_id: &str) -> Option<(i64, i64)> {
    let end = task.steps.iter().position(|s| s.id == step_id)?;
    task.steps[..end]
        .iter()
        .rev()
        .filter(|s| matches!(s.state, StepState::Completed | StepState::Skipped))
        .find_map(|s| {
            let output: Value = serde_json::from_str(s.output.as_deref()?).ok()?;
            let coords = output.get("coordinates")?.as_array()?;
            Some((coords.first()?.as_i64()?, coords.get(1)?.as_i64()?))
        })
}

/// Decide whether a skill's output means success or failure
///
/// A JSON object fails when it says `"success": false`, reports a
/// nonzero exit code, or carries a non-empty `error`. Stderr alone is
/// not failure; stderr plus a nonzero exit code is. Non-object output
/// is taken as success.
pub fn classify_output(output: &Value) -> StepOutcome {
    let obj = match output.as_object() {
        Some(obj) => obj,
        None => {
            return StepOutcome::Completed {
                output: output.to_string(),
            }
        }
    };

    let explicit_failure = obj.get("success").and_then(Value::as_bool) == Some(false);
    let nonzero_exit = matches!(obj.get("exit_code").and_then(Value::as_i64), Some(code) if code != 0);
    let has_error = obj
        .get("error")
        .and_then(Value::as_str)
        .map(|e| !e.is_empty())
        .unwrap_or(false);

    if explicit_failure || nonzero_exit || has_error {
        StepOutcome::Failed {
            error: extract_error(obj, output),
        }
    } else {
        StepOutcome::Completed {
            output: output.to_string(),
        }
    }
}

/// Most specific error message available, in fixed preference order
fn extract_error(obj: &Map<String, Value>, output: &Value) -> String {
    for key in ["error", "stderr", "message", "data"] {
        if let Some(text) = obj.get(key).and_then(Value::as_str) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    output.to_string()
}
