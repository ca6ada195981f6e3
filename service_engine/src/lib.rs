//! # Service Engine
//!
//! The service state-transition engine: a dependency-aware supervisor
//! core that brings named services up and down on behalf of an init
//! system, session manager or test harness.
//!
//! ## Philosophy
//!
//! - **Explicit collaborators**: the process agent and timer source are
//!   passed in at construction; there are no process-wide singletons, so
//!   the whole engine runs deterministically under `cargo test`.
//! - **Queues, not recursion**: cross-record effects are deferred into
//!   per-set propagation and transition queues and drained to a fixed
//!   point, so no record is mutated while the graph is being walked.
//! - **Single-threaded**: every transition happens on the caller's
//!   thread between queue drains; there is no locking and no interior
//!   mutability.
//!
//! ## Structure
//!
//! - [`ServiceSet`] owns the records, the work queues and the console
//!   FIFO, and is the single entry point for commands and events.
//! - [`ServiceRecord`] is the per-service node: state, flags, counters,
//!   timers and edges.
//! - Dependency edges are typed ([`service_types::DependencyKind`]) and
//!   carry acquisition/wait bookkeeping ([`DepLink`]).

pub mod console;
pub mod dep;
pub mod error;
pub mod journal;
pub mod proc;
pub mod record;
pub mod set;
pub mod transitions;

pub use dep::DepLink;
pub use error::SetError;
pub use journal::{JournalEntry, LogLevel};
pub use record::{RestartTracker, ServiceConfig, ServiceRecord, TimerPurpose};
pub use set::{ServiceSet, ServiceSummary};
