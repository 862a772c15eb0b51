//! # talos-orchestrator
//!
//! Ties scanning, candidate selection and the push queue together:
//! - [`Orchestrator::scan_repository`] clones a repository, finds its
//!   locations and routes each available upgrade by its bump strategy
//! - [`Orchestrator::process_batch`] lands queued pushes from one clone,
//!   either directly on the branch or as one merge request per push
//! - [`Scheduler`] runs the scan loop and the queue consumer, enforcing
//!   the queue lock, repository cooldowns and registry throttles

pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod sink;

pub use error::{Error, Result};
pub use orchestrator::{BatchReport, HostServices, Orchestrator, RouteOutcome, ScanReport};
pub use scheduler::{DrainReport, Scheduler};
pub use sink::{InteractionSink, LoggingSink};
