//! Reconflow Script Execution
//!
//! Runs the local recon scripts (`passive-recon.sh`, `active-recon.sh`,
//! `quick-vuln-scan.sh`) as child processes. Each output line is published
//! as a progress update and appended to a per-job log; stderr lines are
//! tagged so observers can tell them apart, and written to the log with an
//! `ERROR: ` prefix.
//!
//! Live processes are tracked by job id in [`ScriptRunner`] so that a job can
//! be killed. Killing sends SIGTERM to the script's process group and
//! escalates to SIGKILL after the configured grace period.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod error;
pub mod output;
pub mod runner;

pub use adapter::ScriptAdapter;
pub use error::{Result, ScriptError};
pub use output::{parse_recon_results, LiveHost, OutputFile, ReconResults, ReconSummary};
pub use runner::{ProcessInfo, ScriptOutput, ScriptRunner};
