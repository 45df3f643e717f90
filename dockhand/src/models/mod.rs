//! Data model of a deployment run

pub mod app_id;
pub mod descriptor;
pub mod outcome;
pub mod repository;
pub mod target;
