//! # Agent API
//!
//! The downward interfaces of the supervision engine: process launching
//! and signalling, and monotonic time with armable timers.
//!
//! ## Philosophy
//!
//! The engine never touches operating-system primitives directly. It
//! talks to collaborators through these traits, supplied at construction:
//! - A process agent launches and signals children; outcomes (exec
//!   result, exit status, readiness data) come back as events delivered
//!   into the engine by the event dispatcher, never as blocking returns.
//! - A timer source provides `now` and armable one-shot timers; expiry
//!   is likewise an event.
//!
//! This keeps the whole engine runnable under `cargo test` against the
//! deterministic implementations in `sim_agent`.
//!
//! ## Non-Goals
//!
//! This is not a POSIX binding. Real fork/exec/kill wiring lives behind
//! an implementation of these traits, outside the engine.

pub mod error;
pub mod process;
pub mod time;
pub mod timer;

pub use error::AgentError;
pub use process::{ExecStage, ExitStatus, LaunchSpec, Pid, ProcessAgent, Signal};
pub use time::{Deadline, Duration, Instant};
pub use timer::{TimerHandle, TimerSource};
