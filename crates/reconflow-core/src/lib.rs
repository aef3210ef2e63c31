//! Reconflow Core - Foundation crate for the reconflow job engine.
//!
//! This crate provides shared types, error handling, configuration management
//! and the settings capability that all other reconflow crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`JobId`, `TargetId`, `ScanType`, `JobStatus`)
//! - [`settings`] - Credential lookup capability consumed by every source adapter
//!
//! # Example
//!
//! ```rust
//! use reconflow_core::{AppConfig, JobStatus, ScanType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.sources.request_timeout_secs, 30);
//!
//! let scan: ScanType = "whois".parse()?;
//! assert!(!scan.is_script());
//! assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, DatabaseConfig, EventsConfig, ScriptsConfig, SourcesConfig};
pub use error::{ConfigError, ConfigResult, ReconflowError, Result};
pub use settings::{SettingsProvider, StaticSettings};
pub use types::{validate_domain, JobId, JobStatus, ScanType, TargetId};
