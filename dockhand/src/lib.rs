//! dockhand library
//!
//! Deployment pipeline for shipping a containerized git repository to a
//! remote Linux host over SSH and exposing it through nginx.

pub mod cli;
pub mod errors;
pub mod exec;
pub mod filesys;
pub mod inputs;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod settings;
pub mod stages;
pub mod utils;
