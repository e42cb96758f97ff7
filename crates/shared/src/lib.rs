//! Shared types and configuration for Tally.
//!
//! This crate provides common building blocks used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Configuration management
//! - Tracing subscriber setup

pub mod config;
pub mod telemetry;
pub mod types;

pub use config::AppConfig;
