//! Skill system for Gantry
//!
//! A skill is a named external capability with a declared input shape,
//! invoked by exactly one task step. Skills report success and failure
//! in heterogeneous shapes (exit codes, success flags, error fields);
//! the step executor normalizes them into a single predicate.

mod error;
mod registry;
mod traits;

pub mod builtin;

pub use error::SkillError;
pub use registry::SkillRegistry;
pub use traits::Skill;
