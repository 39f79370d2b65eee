//! Runnable-step selection and task completion rules

use crate::domain::{StepState, Task, TaskState, TaskStep};

/// Steps eligible to run right now, in declaration order
///
/// A step is runnable when it is pending, or failed with retry budget
/// remaining, and every dependency has completed. Skipped or failed
/// dependencies keep the dependent off the runnable list for good.
pub fn runnable_steps(task: &Task) -> Vec<&TaskStep> {
    task.steps
        .iter()
        .filter(|step| {
            let eligible = match step.state {
                StepState::Pending => true,
                StepState::Failed => !step.retries_exhausted(),
                _ => false,
            };
            eligible && deps_satisfied(task, step)
        })
        .collect()
}

fn deps_satisfied(task: &Task, step: &TaskStep) -> bool {
    step.dependencies.iter().all(|dep| {
        task.get_step(dep)
            .map(|d| d.state == StepState::Completed)
            .unwrap_or(false)
    })
}

/// Terminal state for the task, if it has reached one
///
/// Failed wins: any step out of retries fails the whole task. A task
/// where every step is completed or skipped is done; skipped steps
/// count because plan rewrites retire steps by skipping them. Anything
/// else (running, blocked, retryable failures) leaves the task open.
pub fn evaluate_completion(task: &Task) -> Option<TaskState> {
    if task
        .steps
        .iter()
        .any(|s| s.state == StepState::Failed && s.retries_exhausted())
    {
        return Some(TaskState::Failed);
    }
    let done = task
        .steps
        .iter()
        .all(|s| matches!(s.state, StepState::Completed | StepState::Skipped));
    if done {
        Some(TaskState::Completed)
    } else {
        None
    }
}

/// True if any step is parked awaiting approval
pub fn has_blocked_steps(task: &Task) -> bool {
    task.steps.iter().any(|s| s.state == StepState::Blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Map;

    fn step(id: &str, deps: &[&str]) -> TaskStep {
        TaskStep::new(id, "file_read", Map::new())
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    fn task(steps: Vec<TaskStep>) -> Task {
        Task::new("t", steps)
    }

    #[test]
    fn test_pending_without_deps_is_runnable() {
        let t = task(vec![step("a", &[]), step("b", &["a"])]);
        let ids: Vec<&str> = runnable_steps(&t).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_dependent_becomes_runnable_when_dep_completes() {
        let mut t = task(vec![step("a", &[]), step("b", &["a"])]);
        t.get_step_mut("a").unwrap().state = StepState::Completed;
        let ids: Vec<&str> = runnable_steps(&t).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_skipped_dependency_does_not_satisfy() {
        let mut t = task(vec![step("a", &[]), step("b", &["a"])]);
        t.get_step_mut("a").unwrap().state = StepState::Skipped;
        assert!(runnable_steps(&t).is_empty());
    }

    #[test]
    fn test_failed_with_budget_is_runnable_again() {
        let mut t = task(vec![step("a", &[])]);
        let s = t.get_step_mut("a").unwrap();
        s.state = StepState::Failed;
        s.retry_count = 1;
        let ids: Vec<&str> = runnable_steps(&t).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_failed_exhausted_is_not_runnable() {
        let mut t = task(vec![step("a", &[])]);
        let s = t.get_step_mut("a").unwrap();
        s.state = StepState::Failed;
        s.retry_count = s.max_retries;
        assert!(runnable_steps(&t).is_empty());
    }

    #[test]
    fn test_blocked_is_not_runnable() {
        let mut t = task(vec![step("a", &[])]);
        t.get_step_mut("a").unwrap().state = StepState::Blocked;
        assert!(runnable_steps(&t).is_empty());
        assert!(has_blocked_steps(&t));
    }

    #[test]
    fn test_unknown_dependency_never_satisfied() {
        let t = task(vec![step("b", &["ghost"])]);
        assert!(runnable_steps(&t).is_empty());
    }

    #[test]
    fn test_declaration_order_preserved() {
        let t = task(vec![step("c", &[]), step("a", &[]), step("b", &[])]);
        let ids: Vec<&str> = runnable_steps(&t).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_completion_all_completed_or_skipped() {
        let mut t = task(vec![step("a", &[]), step("b", &[])]);
        t.get_step_mut("a").unwrap().state = StepState::Completed;
        t.get_step_mut("b").unwrap().state = StepState::Skipped;
        assert_eq!(evaluate_completion(&t), Some(TaskState::Completed));
    }

    #[test]
    fn test_completion_exhausted_failure_wins() {
        let mut t = task(vec![step("a", &[]), step("b", &[])]);
        t.get_step_mut("a").unwrap().state = StepState::Completed;
        let b = t.get_step_mut("b").unwrap();
        b.state = StepState::Failed;
        b.retry_count = b.max_retries;
        assert_eq!(evaluate_completion(&t), Some(TaskState::Failed));
    }

    #[test]
    fn test_completion_open_while_retryable_or_blocked() {
        let mut t = task(vec![step("a", &[])]);
        let a = t.get_step_mut("a").unwrap();
        a.state = StepState::Failed;
        a.retry_count = 1;
        assert_eq!(evaluate_completion(&t), None);

        t.get_step_mut("a").unwrap().state = StepState::Blocked;
        assert_eq!(evaluate_completion(&t), None);
    }

    proptest! {
        // Whatever the step states, a runnable step never has an
        // incomplete dependency and is never terminal-or-blocked.
        #[test]
        fn prop_runnable_steps_have_completed_deps(states in proptest::collection::vec(0u8..6, 4)) {
            let to_state = |n: u8| match n {
                0 => StepState::Pending,
                1 => StepState::Running,
                2 => StepState::Completed,
                3 => StepState::Failed,
                4 => StepState::Skipped,
                _ => StepState::Blocked,
            };
            let mut t = task(vec![
                step("a", &[]),
                step("b", &["a"]),
                step("c", &["a", "b"]),
                step("d", &["c"]),
            ]);
            for (i, n) in states.iter().enumerate() {
                t.steps[i].state = to_state(*n);
            }
            let runnable: Vec<String> = runnable_steps(&t).iter().map(|s| s.id.clone()).collect();
            for id in runnable {
                let s = t.get_step(&id).unwrap();
                prop_assert!(matches!(s.state, StepState::Pending | StepState::Failed));
                for dep in &s.dependencies {
                    prop_assert_eq!(t.get_step(dep).unwrap().state, StepState::Completed);
                }
            }
        }
    }
}
