//! Language-model service client and reply parsing

pub mod client;
pub mod parse;

pub use client::*;
pub use parse::*;
