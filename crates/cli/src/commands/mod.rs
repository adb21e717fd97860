//! CLI command implementations

pub mod lifecycle;
pub mod status;
pub mod workloads;
