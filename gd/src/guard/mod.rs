//! Authorization gate
//!
//! Two independent layers a step must pass before execution: the static
//! permission policy (allow/deny/ask per permission class) and the LLM
//! risk judge for a fixed set of state-mutating skills. The gate
//! reloads the task from the store before deciding an `ask` step, so
//! approvals written by a separate process are observed even though
//! the run loop's in-memory copy is stale.

mod judge;
mod policy;

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{StoreError, Task};
use crate::engine::TaskEngine;
use crate::skills::Skill;

pub use judge::{LlmRiskJudge, RiskJudge, Verdict, HIGH_RISK_SKILLS};
pub use policy::{PermissionLevel, PermissionPolicy};

/// Gate decision for a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Step may execute now
    Proceed,
    /// Step must wait for an explicit external approval
    Blocked { permission: String },
    /// Step is rejected outright
    Rejected { reason: String },
}

/// Asks a human a yes/no question about a step
pub trait ApprovalPrompt: Send + Sync {
    fn confirm(&self, question: &str) -> bool;
}

/// Terminal prompt reading y/N from stdin
pub struct TerminalPrompt;

impl ApprovalPrompt for TerminalPrompt {
    fn confirm(&self, question: &str) -> bool {
        println!("{question} [y/N]");
        print!("> ");
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("y")
    }
}

/// The combined permission-policy and risk-judge check
pub struct AuthorizationGate {
    policy: PermissionPolicy,
    judge: Option<Arc<dyn RiskJudge>>,
    prompt: Option<Arc<dyn ApprovalPrompt>>,
    safe_mode: bool,
    fail_open: bool,
}

impl AuthorizationGate {
    pub fn new(policy: PermissionPolicy, safe_mode: bool) -> Self {
        Self {
            policy,
            judge: None,
            prompt: None,
            safe_mode,
            fail_open: true,
        }
    }

    /// Attach the LLM risk judge
    pub fn with_judge(mut self, judge: Arc<dyn RiskJudge>, fail_open: bool) -> Self {
        self.judge = Some(judge);
        self.fail_open = fail_open;
        self
    }

    /// Attach an interactive approval prompt
    pub fn with_prompt(mut self, prompt: Arc<dyn ApprovalPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Decide whether a step may execute
    ///
    /// May mutate the in-memory step: an approval observed in the store
    /// (or granted interactively) is copied onto the step's config so
    /// later iterations skip the ask path.
    pub async fn authorize(
        &self,
        engine: &TaskEngine,
        task: &mut Task,
        step_id: &str,
        skill: &dyn Skill,
    ) -> Result<GateDecision, StoreError> {
        debug!(%step_id, skill = skill.name(), "AuthorizationGate::authorize: called");

        // Layer 1: static permission policy
        if let Some(decision) = self.check_policy(engine, task, step_id, skill)? {
            return Ok(decision);
        }

        // Layer 2: risk judge for state-mutating skills
        if let Some(judge) = &self.judge {
            if HIGH_RISK_SKILLS.contains(&skill.name()) {
                let config = task
                    .get_step(step_id)
                    .map(|s| s.skill_config.clone())
                    .unwrap_or_default();
                match judge.review(skill.name(), &config).await {
                    Ok(Verdict::Approve) => {
                        debug!(%step_id, "AuthorizationGate::authorize: judge approved");
                    }
                    Ok(Verdict::Reject { reason }) => {
                        info!(%step_id, %reason, "AuthorizationGate::authorize: judge rejected");
                        return Ok(GateDecision::Rejected { reason });
                    }
                    Err(e) if self.fail_open => {
                        warn!(%step_id, error = %e, "AuthorizationGate::authorize: risk judge unavailable, failing open");
                    }
                    Err(e) => {
                        return Ok(GateDecision::Rejected {
                            reason: format!("risk judge unavailable: {e}"),
                        });
                    }
                }
            }
        }

        Ok(GateDecision::Proceed)
    }

    fn check_policy(
        &self,
        engine: &TaskEngine,
        task: &mut Task,
        step_id: &str,
        skill: &dyn Skill,
    ) -> Result<Option<GateDecision>, StoreError> {
        let approved = task.get_step(step_id).map(|s| s.is_approved()).unwrap_or(false);

        for permission in skill.permissions() {
            match self.policy.level(permission) {
                PermissionLevel::Allow => {}
                PermissionLevel::Deny => {
                    return Ok(Some(GateDecision::Rejected {
                        reason: format!("permission '{permission}' denied by policy"),
                    }));
                }
                PermissionLevel::Ask => {
                    if !self.safe_mode || approved {
                        continue;
                    }

                    if let Some(prompt) = &self.prompt {
                        let question = format!("Step '{step_id}' wants permission '{permission}'. Allow?");
                        if prompt.confirm(&question) {
                            if let Some(step) = task.get_step_mut(step_id) {
                                step.approve();
                            }
                            continue;
                        }
                        return Ok(Some(GateDecision::Blocked {
                            permission: permission.to_string(),
                        }));
                    }

                    // Daemon mode: reload the task from the store to
                    // observe an approval written by a separate
                    // process. The in-memory copy is stale by design.
                    let latest = match engine.load_task(&task.id) {
                        Ok(latest) => latest,
                        Err(e) if e.is_not_found() => {
                            return Ok(Some(GateDecision::Blocked {
                                permission: permission.to_string(),
                            }));
                        }
                        Err(e) => return Err(e),
                    };
                    if latest.get_step(step_id).map(|s| s.is_approved()).unwrap_or(false) {
                        info!(%step_id, "AuthorizationGate::check_policy: approval observed in store");
                        if let Some(step) = task.get_step_mut(step_id) {
                            step.approve();
                        }
                        continue;
                    }

                    info!(%step_id, %permission, "AuthorizationGate::check_policy: waiting for external approval");
                    return Ok(Some(GateDecision::Blocked {
                        permission: permission.to_string(),
                    }));
                }
            }
        }

        Ok(None)
    }
}
