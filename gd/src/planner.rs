//! Goal decomposition via the LLM
//!
//! The planner turns a natural-language goal into an ordered list of
//! skill invocations with explicit dependencies, and later produces
//! corrected continuations when a step fails. Plans are accepted only
//! if every dependency id resolves within the returned list.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::TaskStep;
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};
use crate::skills::SkillRegistry;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Failed to parse plan: {0}")]
    Parse(String),

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },
}

/// Produces and repairs step plans for a goal
#[async_trait]
pub trait Planner: Send + Sync {
    /// Decompose a goal into an ordered list of steps
    async fn plan(&self, goal: &str) -> Result<Vec<TaskStep>, PlanError>;

    /// Produce a corrected continuation after a step failed
    ///
    /// `history` describes what already ran; `error_context` describes
    /// the failure. The returned steps replace everything that has not
    /// yet run.
    async fn replan(&self, goal: &str, history: &str, error_context: &str) -> Result<Vec<TaskStep>, PlanError>;
}

/// Every dependency must name a step in the same list
pub fn validate_dependencies(steps: &[TaskStep]) -> Result<(), PlanError> {
    for step in steps {
        for dep in &step.dependencies {
            if !steps.iter().any(|s| &s.id == dep) {
                return Err(PlanError::UnknownDependency {
                    step: step.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Pull the first JSON array out of model output, tolerating markdown
/// fences and prose around it
fn extract_json_array(content: &str) -> Option<&str> {
    let content = match content.find("```") {
        Some(start) => {
            let after = &content[start..];
            let inner_start = after.find('\n')? + start + 1;
            let inner_end = content[inner_start..].find("```")? + inner_start;
            &content[inner_start..inner_end]
        }
        None => content,
    };
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

#[derive(Deserialize)]
struct StepSpec {
    id: Option<String>,
    skill_name: String,
    #[serde(default)]
    skill_config: Map<String, Value>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Parse model output into validated steps
fn parse_steps(content: &str) -> Result<Vec<TaskStep>, PlanError> {
    let json = extract_json_array(content)
        .ok_or_else(|| PlanError::Parse(format!("no JSON array in response: {content}")))?;
    let specs: Vec<StepSpec> = serde_json::from_str(json).map_err(|e| PlanError::Parse(e.to_string()))?;

    let steps: Vec<TaskStep> = specs
        .into_iter()
        .map(|spec| {
            let id = spec
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::now_v7().simple().to_string()[..8].to_string());
            TaskStep::new(id, spec.skill_name, spec.skill_config).with_dependencies(spec.dependencies)
        })
        .collect();

    validate_dependencies(&steps)?;
    Ok(steps)
}

const PLAN_RULES: &str = "Rules:\n\
- Respond with ONLY a JSON array, no prose before or after.\n\
- Each element: {\"id\": string, \"skill_name\": string, \"skill_config\": object, \"dependencies\": [string]}.\n\
- Use only the skills listed above; skill_config must match the skill's input schema.\n\
- Dependencies must reference ids of other steps in this array.\n\
- Keep the plan minimal: no verification steps unless the goal asks for them.";

/// LLM-backed planner
pub struct LlmPlanner {
    client: Arc<dyn LlmClient>,
    registry: Arc<SkillRegistry>,
}

impl LlmPlanner {
    pub fn new(client: Arc<dyn LlmClient>, registry: Arc<SkillRegistry>) -> Self {
        Self { client, registry }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are the planning component of a task execution agent. \
You decompose goals into steps executed by skills.\n\n\
Available skills:\n{}\n\n{PLAN_RULES}",
            serde_json::to_string_pretty(&self.registry.catalog()).unwrap_or_default()
        )
    }

    async fn complete(&self, prompt: String) -> Result<Vec<TaskStep>, PlanError> {
        let request = CompletionRequest {
            system_prompt: self.system_prompt(),
            messages: vec![Message::user(prompt)],
            max_tokens: 4096,
        };
        let response = self.client.complete(request).await?;
        parse_steps(response.text())
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, goal: &str) -> Result<Vec<TaskStep>, PlanError> {
        debug!(%goal, "LlmPlanner::plan: called");
        let steps = self.complete(format!("Goal: {goal}\n\nProduce the step plan.")).await?;
        debug!(steps = steps.len(), "LlmPlanner::plan: accepted");
        Ok(steps)
    }

    async fn replan(&self, goal: &str, history: &str, error_context: &str) -> Result<Vec<TaskStep>, PlanError> {
        debug!(%goal, "LlmPlanner::replan: called");
        let prompt = format!(
            "Goal: {goal}\n\n\
Execution so far:\n{history}\n\
A step failed: {error_context}\n\n\
Produce a corrected plan for the REMAINING work only. Do not repeat \
completed steps. If the failure makes the goal impossible, respond \
with an empty array []."
        );
        let steps = self.complete(prompt).await?;
        debug!(steps = steps.len(), "LlmPlanner::replan: accepted");
        Ok(steps)
    }
}
