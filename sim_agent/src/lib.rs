//! # Simulated Agent
//!
//! Deterministic, in-process implementations of the engine's
//! collaborators, for tests and the sim runtime.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! Nothing here forks, sleeps or polls. The simulated clock only moves
//! when explicitly advanced, and the simulated process agent records
//! every launch and signal for inspection instead of touching the OS.
//! Exec results, exits and readiness lines are injected by the test (or
//! script runtime) through the engine's event entry points, mirroring
//! how a real dispatcher would deliver them.
//!
//! This is not a mock bristling with expectations - it is a full,
//! inspectable implementation of the agent contracts that happens to run
//! in-process.

pub mod agent;
pub mod clock;

pub use agent::{LaunchRecord, SimProcessAgent};
pub use clock::SimClock;
