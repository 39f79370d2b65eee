//! Domain types for Gantry
//!
//! Core domain types: Task, TaskStep, Artifact and their state machines.
//! Task implements the gantrystore Record trait for persistence.

mod task;

pub use task::{Artifact, StepState, Task, TaskState, TaskStep};

// Re-export store types for convenience
pub use gantrystore::{FileStore, Record, StoreError};
