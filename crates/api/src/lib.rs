//! # CvForge App
//!
//! Application layer - context wiring and user-facing commands.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Commands mapping user actions onto services
//! - The `cvforge` command-line entry point
//!
//! ## Architecture
//! - Depends on `domain`, `common`, `core`, and `infra`
//! - Constructs every process-wide service once

pub mod commands;
pub mod context;

pub use commands::{CommandError, CommandResult, SessionStatus};
pub use context::AppContext;
