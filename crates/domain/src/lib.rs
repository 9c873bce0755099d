//! # CvForge Domain
//!
//! Domain types shared by every CvForge crate.
//!
//! This crate contains:
//! - The cross-crate error type and `Result` alias
//! - Configuration structures (API, resilience, session, jobs, logging)
//! - Credential and job-session data types
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other CvForge crates
//! - No I/O; pure data and invariants

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
