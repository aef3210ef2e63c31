//! Reconflow Engine
//!
//! Job orchestration for recon scans. [`ReconOrchestrator::start_scan`]
//! records a job, dispatches the adapter for the requested scan type onto the
//! runtime and returns immediately. Progress streams over the
//! [`ProgressBus`](reconflow_events::ProgressBus) while the adapter runs; the
//! final outcome is written to the job store before the terminal event is
//! published.
//!
//! # Example
//!
//! ```ignore
//! use reconflow_engine::ReconOrchestrator;
//! use reconflow_events::ScopeKey;
//!
//! let engine = ReconOrchestrator::from_config(&config, db)?;
//! let mut events = engine.subscribe(ScopeKey::Target(target_id.clone()));
//! let job_id = engine.start_scan(&target_id, ScanType::Whois).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod reporter;

pub use error::{EngineError, Result};
pub use orchestrator::ReconOrchestrator;
pub use registry::AdapterRegistry;
pub use reporter::JobReporter;
