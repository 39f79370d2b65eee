//! Task execution engine
//!
//! The orchestration core: durable task persistence, runnable-step
//! selection, gated step execution, failure classification, and the
//! self-correction protocol that rewrites the remaining plan in place.
//!
//! Exactly one task's steps execute per runner instance; steps never
//! run concurrently. The task store is the one shared mutable
//! resource - a separate approval process may write to it between
//! scheduling ticks, which is why `ask` decisions reload before
//! deciding.

mod core;
mod executor;
mod recovery;
mod runner;
pub mod scheduler;

pub use self::core::TaskEngine;
pub use executor::{StepExecutor, StepOutcome};
pub use recovery::{is_transient, RecoveryController, MAX_TRANSIENT_RETRIES};
pub use runner::{CancelHandle, TaskRunner};
