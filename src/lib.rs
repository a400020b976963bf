//! Convoy - batch feature-processing orchestrator with resumable checkpoints

pub mod batch;
pub mod commands;
pub mod config;
pub mod error;
pub mod subprocess;
pub mod telemetry;
