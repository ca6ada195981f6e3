//! # Service Types
//!
//! Shared vocabulary for the Warden supervision engine.
//!
//! ## Philosophy
//!
//! States, flags and reasons are explicit enums, not integers or strings.
//! Every observable outcome a service can have is representable here and
//! serializable, so the control layer and the engine never exchange
//! ad-hoc encodings.

pub mod flags;
pub mod ids;
pub mod state;

pub use flags::ServiceFlags;
pub use ids::{LaunchId, ServiceId};
pub use state::{
    DependencyKind, DesiredState, ServiceEvent, ServiceKind, ServiceState, StopReason,
};
