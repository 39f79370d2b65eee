//! Skill registry - maps capability names to implementations

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::builtin::{FetchSkill, FileReadSkill, FileWriteSkill, ShellCommandSkill};
use super::Skill;

/// Registry mapping skill name to implementation
///
/// Registration is explicit and closed over at startup; dispatch is by
/// the step's `skill_name`.
pub struct SkillRegistry {
    skills: HashMap<&'static str, Arc<dyn Skill>>,
}

impl SkillRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { skills: HashMap::new() }
    }

    /// Create a registry with the built-in skills registered
    pub fn with_builtins() -> Self {
        debug!("SkillRegistry::with_builtins: called");
        let mut registry = Self::new();
        registry.register(Arc::new(FileReadSkill));
        registry.register(Arc::new(FileWriteSkill));
        registry.register(Arc::new(ShellCommandSkill));
        registry.register(Arc::new(FetchSkill));
        registry
    }

    /// Register a skill under its own name
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        debug!(name = skill.name(), "SkillRegistry::register: called");
        self.skills.insert(skill.name(), skill);
    }

    /// Resolve a skill by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    /// Names of all registered skills, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.skills.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Catalog of skills for the planner prompt
    ///
    /// One entry per skill: description, argument descriptions pulled
    /// from the input schema, and the required argument list.
    pub fn catalog(&self) -> Value {
        let mut catalog = serde_json::Map::new();
        for name in self.names() {
            let skill = &self.skills[name];
            let schema = skill.input_schema();
            let arguments: serde_json::Map<String, Value> = schema["properties"]
                .as_object()
                .map(|props| {
                    props
                        .iter()
                        .map(|(k, v)| (k.clone(), v["description"].clone()))
                        .collect()
                })
                .unwrap_or_default();
            catalog.insert(
                name.to_string(),
                serde_json::json!({
                    "description": skill.description(),
                    "arguments": arguments,
                    "required": schema["required"].clone(),
                }),
            );
        }
        Value::Object(catalog)
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
