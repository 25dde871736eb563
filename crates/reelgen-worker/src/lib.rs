//! Reel generation orchestrator.
//!
//! This crate provides:
//! - Run configuration loaded once from the environment
//! - The caller-facing error taxonomy
//! - Structured run logging and tracing setup
//! - The end-to-end pipeline and its summary

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::ReelConfig;
pub use error::{ReelError, ReelResult};
pub use logging::{init_tracing, RunLogger};
pub use pipeline::{Deadline, ReelPipeline, ReelSummary};
