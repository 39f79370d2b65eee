//! Skill trait definition

use async_trait::async_trait;
use serde_json::Value;

use super::SkillError;

/// A named capability a task step can invoke
///
/// `input_schema` is a JSON Schema object; the executor checks the
/// step's configuration against its `required` list before invoking.
/// `permissions` names the permission classes the authorization gate
/// evaluates for this skill.
///
/// The output value may expose any subset of: a `success` flag, an
/// `error` field, an `exit_code`, a `stderr` stream, a `coordinates`
/// pair. The executor works with whatever subset is present.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Skill name (matches step `skill_name`)
    fn name(&self) -> &'static str;

    /// Human-readable description, shown to the planner
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Permission classes required to run this skill
    fn permissions(&self) -> &'static [&'static str];

    /// Execute the skill with a validated input object
    async fn execute(&self, input: Value) -> Result<Value, SkillError>;
}
