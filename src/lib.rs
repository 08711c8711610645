//! earlybird library - automatic airline check-in
//!
//! This module exports internal components for integration testing.

pub mod airline;
pub mod checkin;
pub mod cli;
pub mod config;
pub mod notify;
pub mod orchestrator;
pub mod redact;
pub mod scheduler;
pub mod templates;
