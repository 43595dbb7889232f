//! Incident workflow orchestration module

pub mod approval;
pub mod engine;
pub mod router;
pub mod state_store;
pub mod steps;

pub use approval::*;
pub use engine::*;
pub use router::*;
pub use state_store::*;
pub use steps::*;
