//! Data models for runbook-triage

pub mod configuration;
pub mod incident;
pub mod state;

pub use configuration::*;
pub use incident::*;
pub use state::*;
