//! Built-in skills

mod fetch;
mod file;
mod shell;

pub use fetch::FetchSkill;
pub use file::{FileReadSkill, FileWriteSkill};
pub use shell::ShellCommandSkill;
