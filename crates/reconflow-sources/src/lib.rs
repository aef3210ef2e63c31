//! Reconflow Source Adapters
//!
//! A source adapter turns a domain into a normalized result by querying one
//! external intelligence provider. Every adapter implements [`SourceAdapter`],
//! so the orchestrator dispatches them uniformly and tests can swap in fakes.
//!
//! # Credentials
//!
//! Adapters read API keys through a shared
//! [`SettingsProvider`](reconflow_core::SettingsProvider). A missing mandatory
//! key fails the adapter with [`SourceError::Configuration`] before any
//! network traffic. Optional keys only change how a provider is queried.
//!
//! # Example
//!
//! ```ignore
//! use reconflow_sources::{build_http_client, providers::WhoisAdapter, JobContext, SourceAdapter};
//!
//! let client = build_http_client(&config.sources)?;
//! let whois = WhoisAdapter::new(client, settings);
//! let outcome = whois.run(&JobContext::new("example.com", publisher)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod error;
pub mod providers;
pub mod resolver;

pub use adapter::{JobContext, ScanOutcome, SourceAdapter};
pub use error::{Result, SourceError};
pub use providers::common::build_http_client;
pub use providers::http_adapters;
pub use resolver::{FixedResolver, HostResolver, SystemResolver};
