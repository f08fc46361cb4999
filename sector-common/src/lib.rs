//! Sector Common - shared types for the sector rotation hunter.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - The HTTP-facing error type
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{Config, ObservabilityConfig, ScreenerConfig, ServerConfig, SourceConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
