//! Reconflow Progress Bus
//!
//! In-process publish/subscribe for live job progress. Observers subscribe to
//! a job, a target, or the global status feed; adapters publish through a
//! [`ProgressPublisher`] bound to their job.
//!
//! Events are ephemeral. Nothing is persisted or replayed, so an observer that
//! subscribes late sees only what is published afterwards.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bus;
pub mod event;
pub mod publisher;

pub use bus::{ProgressBus, ScopeKey, Subscription};
pub use event::{
    BusEvent, JobStatusChange, OutputStream, ProgressEvent, ProgressKind, ProgressPayload,
};
pub use publisher::ProgressPublisher;
