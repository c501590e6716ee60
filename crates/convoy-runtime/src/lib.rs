//! Convoy Runtime - One follow context per client
//!
//! A [`Convoy`] wires the geometry engine, collision detector, relation
//! store, ownership resolver and event bus together for one connected
//! user. Every peer runs the same handlers; the ownership resolver makes
//! sure only one of them writes each change.

pub mod config;
pub mod telemetry;
pub mod context;
pub mod orchestrator;
pub mod links;
pub mod lookout;
pub mod api;

pub use config::*;
pub use telemetry::*;
pub use context::*;
pub use orchestrator::*;
pub use api::*;
