//! # Warden Host Daemon
//!
//! Script-driven host runtime around the service engine.
//!
//! The daemon runs the engine against the simulated collaborators: a
//! command script registers services, issues commands and injects the
//! process/timer events a real dispatcher would deliver. Journal lines
//! and listener events are printed as they are produced, which makes the
//! runtime double as a workbench for supervision scenarios.

pub mod commands;
pub mod input_script;
pub mod runtime;

pub use commands::HostCommand;
pub use input_script::InputScript;
pub use runtime::{HostRuntime, HostRuntimeConfig, HostRuntimeError};
