//! Local and remote command execution

pub mod command;
pub mod runner;
pub mod script;
pub mod ssh;
