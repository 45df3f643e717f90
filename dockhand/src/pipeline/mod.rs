//! Deployment pipeline

pub mod fsm;
pub mod run;
