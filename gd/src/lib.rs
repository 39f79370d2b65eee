//! Gantry - goal-driven task execution agent
//!
//! Gantry decomposes a natural-language goal into a dependency-ordered
//! plan of skill invocations, executes the plan one step at a time, and
//! survives being killed at any point: every state change is persisted
//! before the run loop moves on, so a restarted run resumes exactly
//! where it stopped.
//!
//! # Core Concepts
//!
//! - **State in Files**: Tasks live in a file-backed store, one JSON
//!   document per task, written atomically
//! - **Gated Execution**: A static permission policy and an LLM risk
//!   judge both clear a step before it runs
//! - **Self-Correction**: A failed step triggers a replan that retires
//!   the stale remainder of the plan and splices in a corrected one
//!
//! # Modules
//!
//! - [`domain`] - Task and step records
//! - [`engine`] - Run loop, scheduling, recovery
//! - [`skills`] - Skill trait, registry, and built-ins
//! - [`guard`] - Permission policy and risk judge
//! - [`planner`] - LLM plan generation and repair
//! - [`llm`] - LLM client trait and Anthropic implementation

pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod guard;
pub mod llm;
pub mod planner;
pub mod skills;

// Re-export commonly used types
pub use config::{Config, EngineConfig, GuardConfig, LlmConfig, StorageConfig};
pub use domain::{Artifact, FileStore, Record, StepState, StoreError, Task, TaskState, TaskStep};
pub use engine::{CancelHandle, RecoveryController, StepExecutor, StepOutcome, TaskEngine, TaskRunner};
pub use guard::{AuthorizationGate, GateDecision, PermissionLevel, PermissionPolicy};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, Message};
pub use planner::{LlmPlanner, PlanError, Planner};
pub use skills::{Skill, SkillError, SkillRegistry};
