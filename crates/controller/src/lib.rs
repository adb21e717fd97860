//! Workload controller service
//!
//! Exposes the deployment lifecycle controller over HTTP together with
//! health endpoints and Prometheus metrics.

pub mod api;
pub mod config;
